//! Stage 10: publication schedule and blob-store mirror.
//!
//! The automatic pipeline's terminus: the main video lands on the next
//! optimal day, the unlisted classroom variant the same day at an
//! off-hour, and each short on a distinct subsequent day. After writing
//! schedule.json the artifact directory is mirrored into long-term storage
//! and the project waits for human approval.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};

use vpost_models::{
    Privacy, ProjectId, ProjectStatus, Schedule, ScheduledUpload, SeoFile, UploadKind,
};
use vpost_registry::ProjectRegistry;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::PipelineResult;
use crate::schedule_policy::SchedulePolicy;

/// Progress pinned when the automatic pipeline finishes.
const READY_PROGRESS: u8 = 90;

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    let seo: Option<SeoFile> = if dir.exists(names::SEO) {
        Some(dir.read_json(names::SEO).await?)
    } else {
        None
    };

    let shorts: Vec<String> = dir
        .list(names::SHORTS_DIR, "mp4")
        .await?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();

    let uploads = build_uploads(
        &ctx.schedule_policy,
        Utc::now().date_naive(),
        seo.as_ref(),
        dir.exists(names::ILLUSTRATED),
        dir.exists(names::NOSILENCE),
        dir.exists(names::THUMBNAIL),
        &shorts,
    );
    info!(uploads = uploads.len(), "publication schedule prepared");

    let schedule = Schedule::new(uploads);
    dir.write_json(names::SCHEDULE, &schedule).await?;

    // Mirroring is best-effort: a missing or unreachable blob store never
    // blocks the hand-off to the user.
    let mut mirror = json!({});
    if let Some(store) = &ctx.blob_store {
        match store.mirror_project_dir(dir.root(), &dir.folder_name()).await {
            Ok(map) => {
                info!(files = map.len(), "artifact directory mirrored");
                mirror = json!(map);
            }
            Err(e) => warn!("blob store unavailable, skipping mirror: {e}"),
        }
    }

    ctx.registry
        .update_fields(
            project_id,
            vec![
                ("outputs.schedule".to_string(), json!(names::SCHEDULE)),
                ("outputs.mirror".to_string(), mirror),
                ("status".to_string(), json!(ProjectStatus::ReadyToUpload)),
                ("progress".to_string(), json!(READY_PROGRESS)),
                ("step_name".to_string(), json!("Ready for upload")),
            ],
        )
        .await?;
    Ok(())
}

/// Pure schedule construction from what exists on disk.
pub fn build_uploads(
    policy: &SchedulePolicy,
    today: NaiveDate,
    seo: Option<&SeoFile>,
    has_illustrated: bool,
    has_nosilence: bool,
    has_thumbnail: bool,
    shorts: &[String],
) -> Vec<ScheduledUpload> {
    let mut uploads = Vec::new();
    let thumbnail = has_thumbnail.then(|| names::THUMBNAIL.to_string());

    let main_title = seo
        .map(|s| s.main_video.title.clone())
        .unwrap_or_else(|| "Untitled video".to_string());
    let main_description = seo.map(|s| s.main_video.description.clone()).unwrap_or_default();
    let main_tags = seo.map(|s| s.main_video.tags.clone()).unwrap_or_default();

    // Main illustrated cut: first optimal slot.
    if has_illustrated {
        let (date, time) = policy.next_optimal(today, 0);
        uploads.push(ScheduledUpload {
            kind: UploadKind::Illustrated,
            file: names::ILLUSTRATED.to_string(),
            title: main_title.clone(),
            description: main_description.clone(),
            tags: main_tags.clone(),
            privacy: Privacy::Public,
            scheduled_date: date,
            scheduled_time: time,
            thumbnail: thumbnail.clone(),
            status: "pending".to_string(),
        });
    }

    // Unlisted full-length variant, same day at the fixed off-hour.
    if has_nosilence {
        let (date, _) = policy.next_optimal(today, 0);
        uploads.push(ScheduledUpload {
            kind: UploadKind::Classroom,
            file: names::NOSILENCE.to_string(),
            title: format!("[Classroom] {main_title}"),
            description: format!("Full-length version for students.\n\n{main_description}"),
            tags: main_tags,
            privacy: Privacy::Unlisted,
            scheduled_date: date,
            scheduled_time: policy.classroom_hour.clone(),
            thumbnail,
            status: "pending".to_string(),
        });
    }

    // Shorts: one per subsequent optimal day, stepping through the hours.
    let empty = Vec::new();
    let shorts_seo = seo.map(|s| &s.shorts).unwrap_or(&empty);
    for (i, file) in shorts.iter().enumerate() {
        let (date, time) = policy.next_optimal(today, 1 + i as u32);
        let meta = shorts_seo.get(i);

        let mut title = meta
            .map(|m| m.title.clone())
            .unwrap_or_else(|| file.trim_end_matches(".mp4").to_string());
        if !title.to_lowercase().contains("#shorts") {
            title = format!("{title} #Shorts");
        }

        let hashtags: Vec<String> = meta.map(|m| m.hashtags.clone()).unwrap_or_default();
        let hashtags_line = hashtags
            .iter()
            .map(|h| {
                if h.starts_with('#') {
                    h.clone()
                } else {
                    format!("#{h}")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let description = format!(
            "{}\n\n{}\n\n#Shorts #Short #YouTubeShorts",
            meta.map(|m| m.description.clone()).unwrap_or_default(),
            hashtags_line
        );
        let mut tags: Vec<String> = hashtags.iter().map(|h| h.replace('#', "")).collect();
        tags.extend(["Shorts", "Short", "YouTubeShorts"].map(String::from));

        uploads.push(ScheduledUpload {
            kind: UploadKind::Short,
            file: format!("{}/{}", names::SHORTS_DIR, file),
            title,
            description,
            tags,
            privacy: Privacy::Public,
            scheduled_date: date,
            scheduled_time: time,
            thumbnail: None,
            status: "pending".to_string(),
        });
    }

    uploads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{project_fixture, test_context};
    use vpost_models::{MainVideoSeo, ShortSeo};

    fn seo_fixture() -> SeoFile {
        SeoFile {
            main_video: MainVideoSeo {
                title: "🚀 Ship faster".to_string(),
                description: "How we ship.".to_string(),
                tags: vec!["dev".to_string()],
                category: "Education".to_string(),
                pinned_comment: "?".to_string(),
            },
            shorts: vec![ShortSeo {
                title: "Hot take #shorts".to_string(),
                description: "Watch this.".to_string(),
                hashtags: vec!["#dev".to_string(), "shipping".to_string()],
                pinned_comment: "?".to_string(),
                file: "short_01.mp4".to_string(),
                start: 0.0,
                end: 20.0,
            }],
        }
    }

    #[test]
    fn schedule_spaces_main_classroom_and_shorts() {
        let policy = SchedulePolicy::default();
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let seo = seo_fixture();
        let shorts = vec!["short_01.mp4".to_string(), "short_02.mp4".to_string()];

        let uploads = build_uploads(&policy, today, Some(&seo), true, true, true, &shorts);
        assert_eq!(uploads.len(), 4);

        let main = &uploads[0];
        assert_eq!(main.kind, UploadKind::Illustrated);
        assert_eq!(main.privacy, Privacy::Public);
        assert_eq!(main.scheduled_time, "18:00");
        assert_eq!(main.thumbnail.as_deref(), Some("thumbnail.png"));

        let classroom = &uploads[1];
        assert_eq!(classroom.kind, UploadKind::Classroom);
        assert_eq!(classroom.privacy, Privacy::Unlisted);
        assert_eq!(classroom.scheduled_date, main.scheduled_date);
        assert_eq!(classroom.scheduled_time, "10:00");
        assert!(classroom.title.starts_with("[Classroom] "));

        let short1 = &uploads[2];
        assert_eq!(short1.kind, UploadKind::Short);
        assert_eq!(short1.file, "shorts/short_01.mp4");
        assert_eq!(short1.title, "Hot take #shorts");
        assert!(short1.description.contains("#dev #shipping"));
        assert!(short1.tags.contains(&"YouTubeShorts".to_string()));
        assert!(short1.scheduled_date >= main.scheduled_date);

        let short2 = &uploads[3];
        assert!(short2.scheduled_date >= short1.scheduled_date);
        assert_ne!(short1.scheduled_time, short2.scheduled_time);
    }

    #[test]
    fn missing_artifacts_shrink_the_schedule() {
        let policy = SchedulePolicy::default();
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let uploads = build_uploads(&policy, today, None, false, true, false, &[]);
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].kind, UploadKind::Classroom);
        assert!(uploads[0].thumbnail.is_none());
        assert_eq!(uploads[0].title, "[Classroom] Untitled video");
    }

    #[tokio::test]
    async fn run_writes_schedule_and_hands_off() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_json(names::SEO, &seo_fixture()).await.unwrap();
        dir.write_bytes(names::ILLUSTRATED, b"v").await.unwrap();
        dir.write_bytes(names::NOSILENCE, b"v").await.unwrap();
        dir.write_bytes(names::THUMBNAIL, b"p").await.unwrap();
        dir.ensure_subdir(names::SHORTS_DIR).await.unwrap();
        dir.write_bytes("shorts/short_01.mp4", b"s").await.unwrap();

        let ctx = test_context(registry.clone());
        run(&ctx, &id, &dir).await.unwrap();

        let schedule: Schedule = dir.read_json(names::SCHEDULE).await.unwrap();
        assert_eq!(schedule.uploads.len(), 3);
        assert!(schedule.upload_results.is_none());

        let project = registry.require(&id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::ReadyToUpload);
        assert_eq!(project.progress, 90);
        assert_eq!(project.outputs.schedule.as_deref(), Some("schedule.json"));
    }
}
