use std::fmt;

use serde::Serialize;

use crate::{select::Quality, twitch::structs::Variant};

/// Output-ready view of a selected variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub channel: String,
    pub quality: Quality,
    pub resolution: String,
    pub frame_rate: f64,
    pub url: String,
}

impl SelectionResult {
    #[must_use]
    pub fn new(channel: &str, quality: &Quality, variant: &Variant) -> Self {
        Self {
            channel: channel.to_string(),
            quality: quality.clone(),
            resolution: variant.resolution.clone(),
            frame_rate: variant.frame_rate,
            url: variant.url.clone(),
        }
    }

    #[must_use]
    pub fn as_url(&self) -> &str {
        &self.url
    }

    /// # Errors
    /// Only if serde fails to serialize plain strings and numbers
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let resolution = if self.resolution.is_empty() {
            "audio only"
        } else {
            &self.resolution
        };
        indoc::formatdoc!(
            "Channel: {}
            Quality: {}
            Resolution: {}
            Frame rate: {}
            URL: {}",
            self.channel,
            self.quality,
            resolution,
            self.frame_rate,
            self.url
        )
    }
}

impl fmt::Display for SelectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
