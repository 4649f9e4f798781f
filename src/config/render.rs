//! Output document settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which renderer produces the artifact. Fixed for a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Word-wrapped text pages.
    #[default]
    Flowed,
    /// One full-page capture per sub-page.
    Raster,
}

impl std::fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flowed => write!(f, "flowed"),
            Self::Raster => write!(f, "raster"),
        }
    }
}

/// Section headings printed into flowed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLabels {
    pub untitled: String,
    pub description: String,
    pub images: String,
    pub comments: String,
    pub total: String,
    pub captured: String,
}

impl Default for RenderLabels {
    fn default() -> Self {
        Self {
            untitled: "Untitled thread".to_string(),
            description: "Description".to_string(),
            images: "Images (URLs):".to_string(),
            comments: "Comments".to_string(),
            total: "Total".to_string(),
            captured: "Captured".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub strategy: RenderStrategy,
    /// Where the PDF is written.
    pub output: PathBuf,
    /// Points per captured pixel in raster output.
    pub pixel_to_point: f32,
    /// JPEG quality requested for page captures.
    pub capture_quality: u8,
    pub labels: RenderLabels,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            strategy: RenderStrategy::default(),
            output: PathBuf::from("thread-output.pdf"),
            pixel_to_point: 0.75,
            capture_quality: 85,
            labels: RenderLabels::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_strategy_serde() {
        let flowed: RenderStrategy = serde_json::from_str("\"flowed\"").unwrap();
        assert_eq!(flowed, RenderStrategy::Flowed);
        let raster: RenderStrategy = serde_json::from_str("\"raster\"").unwrap();
        assert_eq!(raster, RenderStrategy::Raster);
        assert_eq!(RenderStrategy::Raster.to_string(), "raster");
    }

    #[test]
    fn test_render_config_defaults() {
        let config: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.strategy, RenderStrategy::Flowed);
        assert_eq!(config.output, PathBuf::from("thread-output.pdf"));
        assert_eq!(config.labels.comments, "Comments");
    }
}
