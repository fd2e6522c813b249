//! Engine configuration (YAML).
//!
//! ```yaml
//! tokens: [abc123]
//! dimensions:
//!   business_unit: Business Unit
//!   team: Team
//! RAG:
//!   red: ["#d9534f", "#ffffff"]
//!   amber: ["#f0ad4e", "#000000"]
//!   green: ["#5cb85c", "#ffffff"]
//! data:
//!   detail: /var/lib/assurance/detail.parquet
//!   summary: /var/lib/assurance/summary.parquet
//! retention:
//!   detail_days: 2
//! validation: auto
//! ```
//!
//! Every section is optional. Unknown keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rag::Rag;
use super::summary::RetentionPolicy;
use super::validate::ValidationMode;
use crate::constants::{
    DEFAULT_DETAIL_RETENTION_DAYS, DEFAULT_SUMMARY_DAILY_DAYS, DEFAULT_SUMMARY_RETENTION_MONTHS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Accepted bearer tokens
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Dimension field name -> display label, in declaration order
    #[serde(default)]
    pub dimensions: IndexMap<String, String>,

    #[serde(default, rename = "RAG")]
    pub rag: RagPalette,

    #[serde(default)]
    pub data: DataPaths,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub validation: ValidationMode,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        log::info!(
            "Loaded config {} ({} dimensions, {} tokens)",
            path.display(),
            config.dimensions.len(),
            config.tokens.len()
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        if config.tokens.is_empty() {
            log::warn!("No tokens configured; every ingest request will be rejected");
        }
        Ok(config)
    }

    /// Declared dimension field names, in order
    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.keys().cloned().collect()
    }

    /// The first declared dimension
    pub fn primary_dimension(&self) -> Option<&str> {
        self.dimensions.keys().next().map(String::as_str)
    }
}

/// `[background, foreground]` colours per status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagPalette {
    pub red: [String; 2],
    pub amber: [String; 2],
    pub green: [String; 2],
}

impl RagPalette {
    pub fn colours(&self, rag: Rag) -> &[String; 2] {
        match rag {
            Rag::Red => &self.red,
            Rag::Amber => &self.amber,
            Rag::Green => &self.green,
        }
    }
}

impl Default for RagPalette {
    fn default() -> Self {
        let pair = |bg: &str, fg: &str| [bg.to_string(), fg.to_string()];
        Self {
            red: pair("#d9534f", "#ffffff"),
            amber: pair("#f0ad4e", "#000000"),
            green: pair("#5cb85c", "#ffffff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    #[serde(default = "default_detail_path")]
    pub detail: PathBuf,
    #[serde(default = "default_summary_path")]
    pub summary: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            detail: default_detail_path(),
            summary: default_summary_path(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("assurance")
}

fn default_detail_path() -> PathBuf {
    data_dir().join("detail.parquet")
}

fn default_summary_path() -> PathBuf {
    data_dir().join("summary.parquet")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Detail pruning window; 0 keeps everything
    pub detail_days: u32,
    pub summary_months: u32,
    pub summary_daily_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            detail_days: DEFAULT_DETAIL_RETENTION_DAYS,
            summary_months: DEFAULT_SUMMARY_RETENTION_MONTHS,
            summary_daily_days: DEFAULT_SUMMARY_DAILY_DAYS,
        }
    }
}

impl RetentionConfig {
    pub fn summary_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            months: self.summary_months,
            daily_days: self.summary_daily_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_document() {
        let yaml = r##"
tokens: [abc123, def456]
dimensions:
  business_unit: Business Unit
  team: Team
RAG:
  red: ["#ff0000", "#ffffff"]
  amber: ["#ffbf00", "#000000"]
  green: ["#00ff00", "#000000"]
data:
  detail: /tmp/d.parquet
  summary: /tmp/s.parquet
retention:
  detail_days: 0
validation: lenient
users: {admin: secret}
"##;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.tokens.len(), 2);
        assert_eq!(config.dimension_names(), vec!["business_unit", "team"]);
        assert_eq!(config.primary_dimension(), Some("business_unit"));
        assert_eq!(config.rag.colours(Rag::Amber)[0], "#ffbf00");
        assert_eq!(config.data.detail, PathBuf::from("/tmp/d.parquet"));
        assert_eq!(config.retention.detail_days, 0);
        assert_eq!(config.retention.summary_months, 13);
        assert_eq!(config.validation, ValidationMode::Lenient);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();
        assert!(config.tokens.is_empty());
        assert!(config.dimensions.is_empty());
        assert_eq!(config.primary_dimension(), None);
        assert_eq!(config.retention, RetentionConfig::default());
        assert_eq!(config.validation, ValidationMode::Auto);
        assert!(config.data.summary.ends_with("summary.parquet"));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/config.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            EngineConfig::from_yaml_str("tokens: {{"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
