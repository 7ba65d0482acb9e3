//! Generated metadata document (seo.json).

use serde::{Deserialize, Serialize};

/// Metadata for the main (illustrated) video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainVideoSeo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub pinned_comment: String,
}

impl MainVideoSeo {
    /// Hard-coded skeleton used when the model response fails to parse.
    pub fn skeleton(signature: &str) -> Self {
        Self {
            title: "Untitled video".to_string(),
            description: format!("Description pending{signature}"),
            tags: Vec::new(),
            category: "Education".to_string(),
            pinned_comment: "What do you think?".to_string(),
        }
    }
}

/// Metadata for one short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortSeo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub pinned_comment: String,
    /// Filled in by the stage, not the model
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl ShortSeo {
    /// Hard-coded skeleton used when the model response fails to parse.
    pub fn skeleton(index: usize, signature: &str) -> Self {
        Self {
            title: format!("Short #{} #shorts", index + 1),
            description: format!("Watch this!{signature}"),
            hashtags: vec!["#shorts".to_string(), "#youtube".to_string()],
            pinned_comment: "Thoughts?".to_string(),
            file: String::new(),
            start: 0.0,
            end: 0.0,
        }
    }

    /// Short titles must carry the #shorts marker.
    pub fn ensure_shorts_marker(&mut self) {
        if !self.title.to_lowercase().contains("#shorts") {
            self.title = format!("{} #shorts", self.title);
        }
        if !self.hashtags.iter().any(|h| h.eq_ignore_ascii_case("#shorts")) {
            self.hashtags.push("#shorts".to_string());
        }
    }
}

/// The complete seo.json document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoFile {
    pub main_video: MainVideoSeo,
    #[serde(default)]
    pub shorts: Vec<ShortSeo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorts_marker_is_enforced() {
        let mut seo = ShortSeo {
            title: "Big reveal".to_string(),
            description: String::new(),
            hashtags: vec!["#dev".to_string()],
            pinned_comment: String::new(),
            file: String::new(),
            start: 0.0,
            end: 0.0,
        };
        seo.ensure_shorts_marker();
        assert_eq!(seo.title, "Big reveal #shorts");
        assert!(seo.hashtags.contains(&"#shorts".to_string()));

        // idempotent
        seo.ensure_shorts_marker();
        assert_eq!(seo.title, "Big reveal #shorts");
        assert_eq!(
            seo.hashtags.iter().filter(|h| *h == "#shorts").count(),
            1
        );
    }

    #[test]
    fn skeleton_has_required_shape() {
        let seo = MainVideoSeo::skeleton("\n--\nsig");
        assert!(seo.description.ends_with("sig"));
        assert!(!seo.title.is_empty());
    }
}
