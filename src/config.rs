//! Configuration management using the prefer crate for discovery.

pub mod browser;
pub mod harvest;
pub mod render;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::patterns::PatternConfig;
pub use browser::BrowserEngineConfig;
pub use harvest::{DedupConfig, ExtractionConfig, HarvestConfig};
pub use render::{RenderConfig, RenderLabels, RenderStrategy};

/// Name used for config file auto-discovery.
pub const CONFIG_NAME: &str = "threadpress";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },
}

/// Outbound notification after a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// ntfy topic URL (e.g. "https://ntfy.sh/my-topic"). Disabled when unset.
    pub ntfy_url: Option<String>,
    pub title: String,
    pub tags: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            ntfy_url: None,
            title: "Thread PDF created".to_string(),
            tags: "floppy_disk".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must load; otherwise prefer discovers a
    /// `threadpress.*` file in the standard locations and defaults are used
    /// when none is found.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path).await;
        }

        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => Ok(config),
                    Err(e) => {
                        tracing::warn!("Ignoring discovered config: {}", e);
                        Ok(Self::default_with_env())
                    }
                },
                None => Ok(Self::default_with_env()),
            },
            // No config file found, use defaults with env overrides
            Err(_) => Ok(Self::default_with_env()),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.browser = config.browser.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            format,
            path: path.to_path_buf(),
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_err("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_err("JSON", e.to_string())),
        }
    }

    /// Base directory for resolving relative paths: the config file's
    /// directory, or the current directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Paths starting with ~ are expanded
    /// - Absolute paths are returned as-is
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        let expanded = shellexpand::tilde(raw.as_ref());
        let expanded = Path::new(expanded.as_ref());

        if expanded.is_absolute() {
            expanded.to_path_buf()
        } else {
            self.base_dir().join(expanded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_sections() {
        let toml = r#"
            [harvest]
            max_rounds = 12

            [render]
            strategy = "raster"
            output = "out/thread.pdf"

            [patterns]
            expansion_phrases = ["Show more"]

            [notify]
            ntfy_url = "https://ntfy.sh/topic"
        "#;
        let config = Config::parse(toml, Path::new("threadpress.toml")).unwrap();
        assert_eq!(config.harvest.max_rounds, 12);
        assert_eq!(config.harvest.max_probe_pages, 50);
        assert_eq!(config.render.strategy, RenderStrategy::Raster);
        assert_eq!(config.render.output, PathBuf::from("out/thread.pdf"));
        assert_eq!(config.patterns.expansion_phrases, vec!["Show more"]);
        assert_eq!(config.patterns.page_param, "page");
        assert_eq!(config.notify.ntfy_url.as_deref(), Some("https://ntfy.sh/topic"));
        assert_eq!(config.notify.tags, "floppy_disk");
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "dedup:\n  body_prefix_chars: 30\n";
        let config = Config::parse(yaml, Path::new("threadpress.yaml")).unwrap();
        assert_eq!(config.dedup.body_prefix_chars, 30);

        let json = r#"{"extraction": {"min_body_chars": 5}}"#;
        let config = Config::parse(json, Path::new("threadpress.json")).unwrap();
        assert_eq!(config.extraction.min_body_chars, 5);
        assert_eq!(config.extraction.indent_px_per_level, 24.0);
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = Config::parse("[harvest", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[tokio::test]
    async fn test_load_from_path_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threadpress.toml");
        std::fs::write(&path, "[render]\noutput = \"x.pdf\"\n").unwrap();

        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.resolve_path(&config.render.output), dir.path().join("x.pdf"));
    }

    #[tokio::test]
    async fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("missing.toml"))).await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_resolve_absolute_path_unchanged() {
        let config = Config::default();
        assert_eq!(
            config.resolve_path(Path::new("/tmp/out.pdf")),
            PathBuf::from("/tmp/out.pdf")
        );
    }
}
