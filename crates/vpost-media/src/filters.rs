//! FFmpeg filter-graph builders.
//!
//! Pure string builders so the graphs stay testable without running the
//! encoder. Masking uses per-pixel geq alpha: a circle test for round
//! bubbles and an order-10 superellipse for rounded rectangles.

use vpost_models::{RecordingConfig, SwitchLayout, TimeSpan, WebcamShape};

/// Output canvas for the main video.
pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

/// Vertical short canvas.
pub const SHORT_WIDTH: u32 = 1080;
pub const SHORT_HEIGHT: u32 = 1920;
pub const SHORT_HALF_HEIGHT: u32 = SHORT_HEIGHT / 2;

/// Screen pane magnification inside a short.
pub const SHORT_SCREEN_ZOOM: f64 = 3.0;
/// Webcam pane magnification inside a short.
pub const SHORT_WEBCAM_ZOOM: f64 = 1.3;

/// Screen thumbnail shown during webcam-fullscreen intervals.
const SCREEN_MINI_WIDTH: u32 = 800;
const SCREEN_MINI_MARGIN: u32 = 20;

/// Superellipse order for rounded-rectangle masks.
const ROUNDED_ORDER: u32 = 10;

/// `between(t,a,b)+between(t,c,d)+...` over the kept segments.
pub fn select_expr(segments: &[TimeSpan]) -> String {
    segments
        .iter()
        .map(|s| format!("between(t,{},{})", s.start, s.end))
        .collect::<Vec<_>>()
        .join("+")
}

/// Single-pass segment extraction keeping audio-video sync.
pub fn segment_cut_filter(segments: &[TimeSpan], with_audio: bool) -> String {
    let expr = select_expr(segments);
    if with_audio {
        format!(
            "[0:v]select='{expr}',setpts=N/FRAME_RATE/TB[outv];\
             [0:a]aselect='{expr}',asetpts=N/SR/TB[outa]"
        )
    } else {
        format!("[0:v]select='{expr}',setpts=N/FRAME_RATE/TB[outv]")
    }
}

/// Mask + border for the webcam bubble.
///
/// Consumes `[1:v]`, emits `out_label`. The input is center-cropped square,
/// scaled to the inner size, alpha-masked per shape, then framed by a solid
/// ring in the border color.
pub fn webcam_bubble(config: &RecordingConfig, out_label: &str) -> String {
    let size = config.webcam_size;
    let inner = config.inner_size();
    let half_inner = inner / 2;
    let half_size = size / 2;
    let color = &config.border_color;
    let bw = config.border_width;

    let masked = match config.webcam_shape {
        WebcamShape::Circle => format!(
            "[1:v]fps=30,crop='min(iw,ih)':'min(iw,ih)',scale={inner}:{inner}:flags=lanczos,\
             format=rgba,geq=lum='p(X,Y)':cb='cb(X,Y)':cr='cr(X,Y)':\
             a='if(lt(pow(X-{half_inner},2)+pow(Y-{half_inner},2),pow({half_inner},2)),255,0)'[wc];\
             color=c={color}:s={size}x{size},format=rgba,\
             geq=lum='p(X,Y)':cb='cb(X,Y)':cr='cr(X,Y)':\
             a='if(lt(pow(X-{half_size},2)+pow(Y-{half_size},2),pow({half_size},2)),255,0)'[bd]"
        ),
        WebcamShape::Rounded => format!(
            "[1:v]fps=30,crop='min(iw,ih)':'min(iw,ih)',scale={inner}:{inner}:flags=lanczos,\
             format=rgba,geq=lum='p(X,Y)':cb='cb(X,Y)':cr='cr(X,Y)':\
             a='if(lt(pow(abs(X-{half_inner}),{n})+pow(abs(Y-{half_inner}),{n}),pow({half_inner},{n})),255,0)'[wc];\
             color=c={color}:s={size}x{size},format=rgba,\
             geq=lum='p(X,Y)':cb='cb(X,Y)':cr='cr(X,Y)':\
             a='if(lt(pow(abs(X-{half_size}),{n})+pow(abs(Y-{half_size}),{n}),pow({half_size},{n})),255,0)'[bd]",
            n = ROUNDED_ORDER
        ),
        WebcamShape::Square => format!(
            "[1:v]fps=30,crop='min(iw,ih)':'min(iw,ih)',scale={inner}:{inner}:flags=lanczos[wc];\
             color=c={color}:s={size}x{size}[bd]"
        ),
    };

    format!("{masked};[bd][wc]overlay={bw}:{bw}{out_label}")
}

/// Static overlay composition: screen full-frame, webcam bubble on top.
pub fn overlay_compose(config: &RecordingConfig) -> String {
    format!(
        "[0:v]fps=30,scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:flags=lanczos[screen];\
         {bubble};\
         [screen][wcb]overlay={x}:{y}[out]",
        bubble = webcam_bubble(config, "[wcb]"),
        x = config.webcam_x,
        y = config.webcam_y,
    )
}

/// Re-encode filter for canvas-composited input and screen-only projects.
pub fn canvas_rescale() -> String {
    format!("fps=30,scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:flags=lanczos")
}

/// Layout intervals derived from the switch list.
///
/// The timeline always starts in overlay mode; each switch point flips the
/// active layout until the next one. The final interval is extended one
/// second past the end to be safe against rounding.
pub fn switch_intervals(
    switches: &[vpost_models::LayoutSwitch],
    duration: f64,
) -> Vec<(f64, f64, SwitchLayout)> {
    let mut intervals = Vec::new();
    let mut current_start = 0.0;
    let mut current_layout = SwitchLayout::Overlay;

    for switch in switches {
        if switch.timestamp > current_start {
            intervals.push((current_start, switch.timestamp, current_layout));
        }
        current_start = switch.timestamp;
        current_layout = switch.layout;
    }

    if current_start < duration {
        intervals.push((current_start, duration + 1.0, current_layout));
    }
    intervals
}

/// Time-gated composition honoring layout switches.
///
/// Returns None when no interval ever enters webcam-fullscreen mode; the
/// caller falls back to the static overlay graph.
pub fn layout_switch_compose(config: &RecordingConfig, duration: f64) -> Option<String> {
    let switches = config.sorted_switches();
    let intervals = switch_intervals(&switches, duration);

    let overlay_enable: Vec<String> = intervals
        .iter()
        .filter(|(_, _, l)| *l == SwitchLayout::Overlay)
        .map(|(s, e, _)| format!("between(t,{s},{e})"))
        .collect();
    let webcam_full_enable: Vec<String> = intervals
        .iter()
        .filter(|(_, _, l)| *l == SwitchLayout::WebcamOnly)
        .map(|(s, e, _)| format!("between(t,{s},{e})"))
        .collect();

    if webcam_full_enable.is_empty() {
        return None;
    }

    let overlay_enable = if overlay_enable.is_empty() {
        "0".to_string()
    } else {
        overlay_enable.join("+")
    };
    let webcam_full_enable = webcam_full_enable.join("+");

    let mini_height = SCREEN_MINI_WIDTH * CANVAS_HEIGHT / CANVAS_WIDTH;
    let mini_x = CANVAS_WIDTH - SCREEN_MINI_WIDTH - SCREEN_MINI_MARGIN;
    let mini_y = CANVAS_HEIGHT - mini_height - SCREEN_MINI_MARGIN;

    Some(format!(
        "[0:v]fps=30,scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:flags=lanczos[screen];\
         [0:v]fps=30,scale={SCREEN_MINI_WIDTH}:{mini_height}:flags=lanczos,\
         drawbox=x=0:y=0:w={SCREEN_MINI_WIDTH}:h={mini_height}:c={color}:t=3[screen_mini];\
         [1:v]fps=30,scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:flags=lanczos[wc_full];\
         {bubble};\
         [screen][wc_full]overlay=0:0:enable='{webcam_full_enable}'[with_wc_full];\
         [with_wc_full][screen_mini]overlay={mini_x}:{mini_y}:enable='{webcam_full_enable}'[with_mini];\
         [with_mini][wcb]overlay={x}:{y}:enable='{overlay_enable}'[out]",
        color = config.border_color,
        bubble = webcam_bubble(config, "[wcb]"),
        x = config.webcam_x,
        y = config.webcam_y,
    ))
}

/// Vertical short: zoomed screen with a slow sinusoidal pan stacked above a
/// center-cropped webcam, optionally with burned subtitles.
pub fn shorts_stack(start: f64, end: f64, ass_path: Option<&str>) -> String {
    let zoom_w = (SHORT_WIDTH as f64 * SHORT_SCREEN_ZOOM) as u32;
    let zoom_h = (SHORT_HALF_HEIGHT as f64 * SHORT_SCREEN_ZOOM) as u32;
    let webcam_w = (SHORT_WIDTH as f64 * SHORT_WEBCAM_ZOOM) as u32;
    let webcam_h = (SHORT_HALF_HEIGHT as f64 * SHORT_WEBCAM_ZOOM) as u32;

    let base = format!(
        "[0:v]trim=start={start}:end={end},setpts=PTS-STARTPTS,fps=30,\
         scale={zoom_w}:{zoom_h}:force_original_aspect_ratio=increase,\
         crop={SHORT_WIDTH}:{SHORT_HALF_HEIGHT}:'(iw-ow)/2+(iw-ow)/4*sin(n*0.005)':'(ih-oh)/2+(ih-oh)/4*cos(n*0.004)'[screen];\
         [1:v]trim=start={start}:end={end},setpts=PTS-STARTPTS,\
         scale={webcam_w}:{webcam_h}:force_original_aspect_ratio=increase,\
         crop={SHORT_WIDTH}:{SHORT_HALF_HEIGHT}[webcam];\
         [screen][webcam]vstack=inputs=2[stacked]"
    );

    let video = match ass_path {
        Some(path) => {
            let escaped = path.replace('\\', "/").replace(':', "\\:");
            format!("{base};[stacked]subtitles='{escaped}'[out]")
        }
        None => base.replace("[stacked]", "[out]"),
    };

    format!(
        "{video};[0:a]atrim=start={start}:end={end},asetpts=PTS-STARTPTS[audio]"
    )
}

/// Letterbox the outro to the short canvas.
pub fn outro_letterbox() -> String {
    format!(
        "scale={SHORT_WIDTH}:{SHORT_HEIGHT}:force_original_aspect_ratio=decrease,\
         pad={SHORT_WIDTH}:{SHORT_HEIGHT}:(ow-iw)/2:(oh-ih)/2"
    )
}

/// Normalize a b-roll clip for overlay: letterbox to the canvas at 30 fps.
pub fn broll_prepare() -> String {
    format!(
        "scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}:force_original_aspect_ratio=decrease,\
         pad={CANVAS_WIDTH}:{CANVAS_HEIGHT}:(ow-iw)/2:(oh-ih)/2,fps=30"
    )
}

/// Chain of full-frame time-gated b-roll overlays.
///
/// `clips` are (timestamp, duration) pairs in timeline order; input index i+1
/// carries clip i. Emits `[vout]`.
pub fn broll_overlay_chain(clips: &[(f64, f64)]) -> String {
    let mut parts: Vec<String> = clips
        .iter()
        .enumerate()
        .map(|(i, (ts, _))| format!("[{}:v]setpts=PTS+{ts}/TB[broll{i}]", i + 1))
        .collect();

    let mut prev = "[0:v]".to_string();
    for (i, (ts, dur)) in clips.iter().enumerate() {
        let out = if i == clips.len() - 1 {
            "[vout]".to_string()
        } else {
            format!("[v{}]", i + 1)
        };
        parts.push(format!(
            "{prev}[broll{i}]overlay=0:0:enable='between(t,{ts},{end})':eof_action=pass{out}",
            end = ts + dur,
        ));
        prev = out;
    }
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpost_models::LayoutSwitch;

    fn config() -> RecordingConfig {
        RecordingConfig::default()
    }

    #[test]
    fn select_expr_joins_segments() {
        let expr = select_expr(&[TimeSpan::new(0.0, 5.0), TimeSpan::new(7.0, 9.5)]);
        assert_eq!(expr, "between(t,0,5)+between(t,7,9.5)");
    }

    #[test]
    fn cut_filter_audio_variants() {
        let segs = [TimeSpan::new(0.0, 5.0)];
        let with = segment_cut_filter(&segs, true);
        assert!(with.contains("aselect"));
        assert!(with.contains("asetpts=N/SR/TB"));
        let without = segment_cut_filter(&segs, false);
        assert!(!without.contains("aselect"));
        assert!(without.contains("setpts=N/FRAME_RATE/TB"));
    }

    #[test]
    fn circle_bubble_uses_quadratic_mask() {
        let filter = webcam_bubble(&config(), "[wcb]");
        assert!(filter.contains("pow(X-190,2)+pow(Y-190,2)"));
        assert!(filter.contains("color=c=#FFB6C1:s=389x389"));
        assert!(filter.contains("overlay=4:4[wcb]"));
    }

    #[test]
    fn rounded_bubble_uses_superellipse() {
        let mut cfg = config();
        cfg.webcam_shape = WebcamShape::Rounded;
        let filter = webcam_bubble(&cfg, "[wcb]");
        assert!(filter.contains("pow(abs(X-190),10)"));
    }

    #[test]
    fn square_bubble_has_no_mask() {
        let mut cfg = config();
        cfg.webcam_shape = WebcamShape::Square;
        let filter = webcam_bubble(&cfg, "[wcb]");
        assert!(!filter.contains("geq"));
    }

    #[test]
    fn overlay_compose_places_bubble() {
        let filter = overlay_compose(&config());
        assert!(filter.contains("scale=1920:1080:flags=lanczos[screen]"));
        assert!(filter.ends_with("[screen][wcb]overlay=1486:645[out]"));
    }

    #[test]
    fn intervals_start_in_overlay_mode() {
        let switches = vec![
            LayoutSwitch { timestamp: 5.0, layout: SwitchLayout::WebcamOnly },
            LayoutSwitch { timestamp: 10.0, layout: SwitchLayout::Overlay },
        ];
        let intervals = switch_intervals(&switches, 20.0);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0], (0.0, 5.0, SwitchLayout::Overlay));
        assert_eq!(intervals[1], (5.0, 10.0, SwitchLayout::WebcamOnly));
        assert_eq!(intervals[2].2, SwitchLayout::Overlay);
        assert!(intervals[2].1 > 20.0);
    }

    #[test]
    fn switch_compose_requires_webcam_only_interval() {
        let mut cfg = config();
        cfg.layout_switches = vec![LayoutSwitch {
            timestamp: 3.0,
            layout: SwitchLayout::Overlay,
        }];
        assert!(layout_switch_compose(&cfg, 20.0).is_none());

        cfg.layout_switches = vec![LayoutSwitch {
            timestamp: 3.0,
            layout: SwitchLayout::WebcamOnly,
        }];
        let filter = layout_switch_compose(&cfg, 20.0).unwrap();
        assert!(filter.contains("[wc_full]"));
        assert!(filter.contains("[screen_mini]"));
        assert!(filter.contains("enable='between(t,3,21)'"));
    }

    #[test]
    fn shorts_stack_pan_and_subtitles() {
        let filter = shorts_stack(7.12, 31.05, Some("/tmp/karaoke.ass"));
        assert!(filter.contains("trim=start=7.12:end=31.05"));
        assert!(filter.contains("sin(n*0.005)"));
        assert!(filter.contains("cos(n*0.004)"));
        assert!(filter.contains("scale=3240:2880"));
        assert!(filter.contains("scale=1404:1248"));
        assert!(filter.contains("vstack=inputs=2"));
        assert!(filter.contains("subtitles='/tmp/karaoke.ass'"));
        assert!(filter.contains("atrim=start=7.12:end=31.05"));

        let plain = shorts_stack(0.0, 10.0, None);
        assert!(!plain.contains("subtitles"));
        assert!(plain.contains("vstack=inputs=2[out]"));
    }

    #[test]
    fn broll_chain_is_time_gated() {
        let filter = broll_overlay_chain(&[(15.0, 3.0), (42.0, 2.5)]);
        assert!(filter.contains("[1:v]setpts=PTS+15/TB[broll0]"));
        assert!(filter.contains("[2:v]setpts=PTS+42/TB[broll1]"));
        assert!(filter.contains("enable='between(t,15,18)':eof_action=pass[v1]"));
        assert!(filter.contains("enable='between(t,42,44.5)':eof_action=pass[vout]"));
    }

    #[test]
    fn broll_chain_single_clip() {
        let filter = broll_overlay_chain(&[(5.0, 3.0)]);
        assert!(filter.ends_with("[vout]"));
        assert!(!filter.contains("[v1]"));
    }
}
