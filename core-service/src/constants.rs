//! Central Configuration Constants
//!
//! Single source of truth for field defaults and retention windows.
//! To change a default threshold, only edit this file.

/// Default SLO (green threshold) for a metric
pub const DEFAULT_SLO: f64 = 0.95;

/// Default SLO minimum (amber threshold) for a metric
pub const DEFAULT_SLO_MIN: f64 = 0.90;

/// Default weight of a metric inside weighted averages
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// Default compliance when the column is absent
pub const DEFAULT_COMPLIANCE: f64 = 0.0;

/// Default occurrence count of a detail row
pub const DEFAULT_COUNT: f64 = 1.0;

/// Placeholder for category and dimension values that were not supplied
pub const UNDEFINED: &str = "undefined";

/// Detail rows older than this many days are pruned on every write
pub const DEFAULT_DETAIL_RETENTION_DAYS: u32 = 2;

/// Summary rows older than this many months are dropped
pub const DEFAULT_SUMMARY_RETENTION_MONTHS: u32 = 13;

/// Summary rows younger than this many days keep daily resolution
pub const DEFAULT_SUMMARY_DAILY_DAYS: u32 = 40;

/// Timeout applied to mirrored sink requests (seconds)
pub const DEFAULT_MIRROR_TIMEOUT_SECS: u64 = 30;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Continuous Assurance";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Object-storage base URL for the store mirror, if configured
pub fn get_blob_url() -> Option<String> {
    std::env::var("ASSURANCE_BLOB_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Shared-access query string appended to blob uploads
pub fn get_blob_sas() -> Option<String> {
    std::env::var("ASSURANCE_BLOB_SAS")
        .ok()
        .map(|s| s.trim_start_matches('?').to_string())
        .filter(|s| !s.is_empty())
}

/// Get mirror request timeout from environment or use default
pub fn get_mirror_timeout() -> u64 {
    std::env::var("ASSURANCE_BLOB_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MIRROR_TIMEOUT_SECS)
}

/// SQLite database path for the relational mirror, if configured
pub fn get_sqlite_path() -> Option<String> {
    std::env::var("ASSURANCE_SQLITE_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
}
