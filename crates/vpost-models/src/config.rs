//! Compositing configuration written by the controller (config.json).

use serde::{Deserialize, Serialize};

/// Overall layout chosen at project creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayout {
    /// Screen full-frame with the webcam bubble overlaid
    #[default]
    Overlay,
    /// Browser-composited single stream (combined.webm)
    Composite,
    ScreenOnly,
    WebcamOnly,
    SideBySide,
}

/// Shape of the webcam bubble mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebcamShape {
    #[default]
    Circle,
    Rounded,
    Square,
}

/// Layout active after a switch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchLayout {
    Overlay,
    WebcamOnly,
}

/// A timed layout switch recorded during capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSwitch {
    /// Absolute timestamp in seconds on the source timeline
    pub timestamp: f64,
    pub layout: SwitchLayout,
}

/// Parameters for stage 1 composition, set once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default)]
    pub layout: OverlayLayout,
    /// Top-left X of the webcam bubble on the 1920x1080 canvas
    #[serde(default = "default_webcam_x")]
    pub webcam_x: i32,
    /// Top-left Y of the webcam bubble
    #[serde(default = "default_webcam_y")]
    pub webcam_y: i32,
    /// Outer size of the webcam bubble, border included
    #[serde(default = "default_webcam_size")]
    pub webcam_size: u32,
    #[serde(default)]
    pub webcam_shape: WebcamShape,
    /// Border ring color, "#RRGGBB"
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    /// Timed overlay/webcam_only switches; empty means static overlay
    #[serde(default)]
    pub layout_switches: Vec<LayoutSwitch>,
}

fn default_webcam_x() -> i32 {
    1486
}

fn default_webcam_y() -> i32 {
    645
}

fn default_webcam_size() -> u32 {
    389
}

fn default_border_color() -> String {
    "#FFB6C1".to_string()
}

fn default_border_width() -> u32 {
    4
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            layout: OverlayLayout::default(),
            webcam_x: default_webcam_x(),
            webcam_y: default_webcam_y(),
            webcam_size: default_webcam_size(),
            webcam_shape: WebcamShape::default(),
            border_color: default_border_color(),
            border_width: default_border_width(),
            layout_switches: Vec::new(),
        }
    }
}

impl RecordingConfig {
    /// Inner (masked video) size of the webcam bubble.
    pub fn inner_size(&self) -> u32 {
        self.webcam_size.saturating_sub(self.border_width * 2)
    }

    /// Switches sorted by timestamp; the graph builder requires order.
    pub fn sorted_switches(&self) -> Vec<LayoutSwitch> {
        let mut switches = self.layout_switches.clone();
        switches.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        switches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_ui() {
        let config: RecordingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.webcam_x, 1486);
        assert_eq!(config.webcam_y, 645);
        assert_eq!(config.webcam_size, 389);
        assert_eq!(config.webcam_shape, WebcamShape::Circle);
        assert_eq!(config.border_color, "#FFB6C1");
        assert_eq!(config.border_width, 4);
        assert!(config.layout_switches.is_empty());
    }

    #[test]
    fn inner_size_subtracts_border_ring() {
        let config = RecordingConfig::default();
        assert_eq!(config.inner_size(), 389 - 8);
    }

    #[test]
    fn switches_parse_and_sort() {
        let config: RecordingConfig = serde_json::from_str(
            r#"{
                "layout": "overlay",
                "layout_switches": [
                    {"timestamp": 10.0, "layout": "overlay"},
                    {"timestamp": 5.0, "layout": "webcam_only"}
                ]
            }"#,
        )
        .unwrap();
        let sorted = config.sorted_switches();
        assert_eq!(sorted[0].timestamp, 5.0);
        assert_eq!(sorted[0].layout, SwitchLayout::WebcamOnly);
    }
}
