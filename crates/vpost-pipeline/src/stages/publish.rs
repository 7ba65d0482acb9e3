//! Stage 11: publication to the video host.
//!
//! Always a separate, user-gated submission. Past-dated items re-anchor to
//! one hour out; public items with a future slot upload private with a
//! publish_at; unlisted items ignore the schedule entirely. Per-item
//! failures collect into the results; the stage succeeds when at least one
//! item shipped.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use vpost_models::{
    Privacy, ProjectId, ProjectStatus, Schedule, ScheduledUpload, UploadError, UploadKind,
    UploadResult, UploadResults,
};
use vpost_registry::ProjectRegistry;
use vpost_services::{UploadVideoRequest, VideoHost};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    let mut schedule: Schedule = dir.read_json(names::SCHEDULE).await?;
    if schedule.uploads.is_empty() {
        return Err(PipelineError::invalid_state("schedule has no uploads"));
    }

    let now = Utc::now();
    let mut results = UploadResults::default();

    for upload in &schedule.uploads {
        let file_path = dir.path(&upload.file);
        if !file_path.exists() {
            warn!(file = %upload.file, "scheduled file missing");
            results.errors.push(UploadError {
                kind: upload.kind,
                title: Some(upload.title.clone()),
                error: format!("file not found: {}", upload.file),
            });
            continue;
        }

        let scheduled = resolve_publish_at(&upload.scheduled_date, &upload.scheduled_time, now);
        let (privacy, publish_at) = effective_publication(upload.privacy, scheduled);

        info!(
            kind = upload.kind.as_str(),
            title = %upload.title,
            ?publish_at,
            "uploading"
        );

        let request = UploadVideoRequest {
            file_path,
            title: upload.title.clone(),
            description: upload.description.clone(),
            tags: upload.tags.clone(),
            privacy,
            publish_at: publish_at.clone(),
            is_short: upload.kind == UploadKind::Short,
        };

        match ctx.services.host.upload_video(&request).await {
            Ok(hosted) => {
                attach_thumbnail(ctx, dir, upload, &hosted.id).await;
                results.uploads.push(UploadResult {
                    kind: upload.kind,
                    title: upload.title.clone(),
                    video_id: hosted.id,
                    url: hosted.url,
                    status: "uploaded".to_string(),
                    privacy,
                    scheduled: publish_at,
                });
            }
            Err(e) => {
                warn!(title = %upload.title, "upload failed: {e}");
                results.errors.push(UploadError {
                    kind: upload.kind,
                    title: Some(upload.title.clone()),
                    error: e.to_string(),
                });
            }
        }
    }

    results.success = !results.uploads.is_empty();
    let succeeded = results.success;
    let uploaded = results.uploads.len();
    let failed = results.errors.len();

    schedule.upload_results = Some(results);
    schedule.uploaded_at = Some(Utc::now());
    dir.write_json(names::SCHEDULE, &schedule).await?;
    info!(uploaded, failed, "publication finished");

    if !succeeded {
        return Err(PipelineError::invalid_state(format!(
            "no scheduled item uploaded ({failed} failed)"
        )));
    }

    ctx.registry
        .update_fields(
            project_id,
            vec![
                ("status".to_string(), json!(ProjectStatus::Completed)),
                ("progress".to_string(), json!(100)),
                ("step_name".to_string(), json!("Published")),
                ("completed_at".to_string(), json!(Utc::now())),
            ],
        )
        .await?;
    Ok(())
}

/// Main-video uploads carry the generated thumbnail; a thumbnail failure
/// never sinks an otherwise successful upload.
async fn attach_thumbnail(
    ctx: &StageContext,
    dir: &ArtifactDir,
    upload: &ScheduledUpload,
    video_id: &str,
) {
    if !matches!(upload.kind, UploadKind::Illustrated | UploadKind::Classroom) {
        return;
    }
    if !dir.exists(names::THUMBNAIL) {
        return;
    }
    if let Err(e) = ctx
        .services
        .host
        .set_thumbnail(video_id, &dir.path(names::THUMBNAIL))
        .await
    {
        warn!(video_id, "thumbnail upload failed: {e}");
    }
}

/// Scheduled moment in RFC3339, re-anchored to one hour out when past.
fn resolve_publish_at(date: &str, time: &str, now: DateTime<Utc>) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").ok()?;
    let mut moment = naive.and_utc();
    if moment <= now {
        moment = now + Duration::hours(1);
    }
    Some(moment.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

/// Host-side privacy for a scheduled item.
fn effective_publication(
    privacy: Privacy,
    publish_at: Option<String>,
) -> (Privacy, Option<String>) {
    match privacy {
        // Unlisted items go up immediately, no scheduling.
        Privacy::Unlisted => (Privacy::Unlisted, None),
        // Public with a future slot: private until the host flips it.
        Privacy::Public if publish_at.is_some() => (Privacy::Private, publish_at),
        _ => (privacy, publish_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{project_fixture, test_context};
    use std::sync::Arc;
    use vpost_services::StubVideoHost;

    fn upload(kind: UploadKind, file: &str, privacy: Privacy, date: &str) -> ScheduledUpload {
        ScheduledUpload {
            kind,
            file: file.to_string(),
            title: format!("{} title", kind.as_str()),
            description: String::new(),
            tags: vec![],
            privacy,
            scheduled_date: date.to_string(),
            scheduled_time: "18:00".to_string(),
            thumbnail: None,
            status: "pending".to_string(),
        }
    }

    #[test]
    fn past_dates_reanchor_one_hour_out() {
        let now = DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let past = resolve_publish_at("2026-07-01", "18:00", now).unwrap();
        assert_eq!(past, "2026-08-01T13:00:00Z");

        let future = resolve_publish_at("2026-08-10", "18:00", now).unwrap();
        assert_eq!(future, "2026-08-10T18:00:00Z");

        assert!(resolve_publish_at("not-a-date", "18:00", now).is_none());
    }

    #[test]
    fn privacy_mapping() {
        let slot = Some("2026-08-10T18:00:00Z".to_string());
        assert_eq!(
            effective_publication(Privacy::Unlisted, slot.clone()),
            (Privacy::Unlisted, None)
        );
        assert_eq!(
            effective_publication(Privacy::Public, slot.clone()),
            (Privacy::Private, slot.clone())
        );
        assert_eq!(
            effective_publication(Privacy::Public, None),
            (Privacy::Public, None)
        );
    }

    #[tokio::test]
    async fn uploads_everything_and_completes_the_project() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_bytes(names::ILLUSTRATED, b"v").await.unwrap();
        dir.write_bytes(names::NOSILENCE, b"v").await.unwrap();
        dir.write_bytes(names::THUMBNAIL, b"p").await.unwrap();
        dir.ensure_subdir(names::SHORTS_DIR).await.unwrap();
        dir.write_bytes("shorts/short_01.mp4", b"s").await.unwrap();

        let schedule = Schedule::new(vec![
            upload(UploadKind::Illustrated, "illustrated.mp4", Privacy::Public, "2099-01-05"),
            upload(UploadKind::Classroom, "nosilence.mp4", Privacy::Unlisted, "2099-01-05"),
            upload(UploadKind::Short, "shorts/short_01.mp4", Privacy::Public, "2099-01-06"),
        ]);
        dir.write_json(names::SCHEDULE, &schedule).await.unwrap();

        let host = Arc::new(StubVideoHost::default());
        let mut ctx = test_context(registry.clone());
        ctx.services.host = host.clone();

        run(&ctx, &id, &dir).await.unwrap();

        let recorded = host.uploads.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        // Public scheduled items go up private with a publish_at.
        assert_eq!(recorded[0].privacy, Privacy::Private);
        assert!(recorded[0].publish_at.is_some());
        // Unlisted ignores the schedule.
        assert_eq!(recorded[1].privacy, Privacy::Unlisted);
        assert!(recorded[1].publish_at.is_none());
        assert!(recorded[2].is_short);
        drop(recorded);

        // Thumbnail attached to main video and classroom only.
        assert_eq!(host.thumbnails.lock().unwrap().len(), 2);

        let written: Schedule = dir.read_json(names::SCHEDULE).await.unwrap();
        let results = written.upload_results.unwrap();
        assert!(results.success);
        assert_eq!(results.uploads.len(), 3);
        assert!(results.errors.is_empty());
        assert!(written.uploaded_at.is_some());

        let project = registry.require(&id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(project.progress, 100);
        assert!(project.completed_at.is_some());
    }

    #[tokio::test]
    async fn missing_file_is_a_per_item_error() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_bytes(names::ILLUSTRATED, b"v").await.unwrap();

        let schedule = Schedule::new(vec![
            upload(UploadKind::Illustrated, "illustrated.mp4", Privacy::Public, "2099-01-05"),
            upload(UploadKind::Short, "shorts/missing.mp4", Privacy::Public, "2099-01-06"),
        ]);
        dir.write_json(names::SCHEDULE, &schedule).await.unwrap();

        let ctx = test_context(registry);
        run(&ctx, &id, &dir).await.unwrap();

        let written: Schedule = dir.read_json(names::SCHEDULE).await.unwrap();
        let results = written.upload_results.unwrap();
        assert!(results.success);
        assert_eq!(results.uploads.len(), 1);
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].error.contains("missing.mp4"));
    }

    #[tokio::test]
    async fn zero_successes_fail_the_stage_with_results_recorded() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_bytes(names::ILLUSTRATED, b"v").await.unwrap();

        let schedule = Schedule::new(vec![upload(
            UploadKind::Illustrated,
            "illustrated.mp4",
            Privacy::Public,
            "2099-01-05",
        )]);
        dir.write_json(names::SCHEDULE, &schedule).await.unwrap();

        let mut ctx = test_context(registry.clone());
        ctx.services.host = Arc::new(StubVideoHost {
            fail_marker: Some("title".to_string()),
            ..Default::default()
        });

        let err = run(&ctx, &id, &dir).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));

        let written: Schedule = dir.read_json(names::SCHEDULE).await.unwrap();
        let results = written.upload_results.unwrap();
        assert!(!results.success);
        assert_eq!(results.errors.len(), 1);

        // Project status stays untouched; the worker records the failure.
        let project = registry.require(&id).await.unwrap();
        assert_ne!(project.status, ProjectStatus::Completed);
    }
}
