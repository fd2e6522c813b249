//! Server configuration

use std::env;
use std::path::PathBuf;

/// Default request body limit (16 MiB)
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Process configuration, read once from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Engine YAML (tokens, dimensions, RAG colours, store paths)
    pub config_path: PathBuf,

    /// Environment (development, production)
    pub environment: String,

    /// Largest accepted ingest body
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            config_path: env::var("ASSURANCE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config.yml")),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            max_body_bytes: env::var("ASSURANCE_MAX_BODY_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            config_path: PathBuf::from("config.yml"),
            environment: "development".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
