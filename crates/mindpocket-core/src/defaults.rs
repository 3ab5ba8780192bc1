//! Centralized default constants for MindPocket.
//!
//! Every crate references these instead of defining its own magic numbers.

// =============================================================================
// INGEST LIMITS
// =============================================================================

/// Maximum accepted upload size in bytes (50 MiB). Exactly this size is accepted.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// File extensions accepted by the upload path.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".docx", ".doc", ".xlsx", ".xls", ".csv", ".html", ".htm", ".xml", ".jpg", ".jpeg",
    ".png", ".gif", ".webp", ".mp3", ".wav", ".ipynb", ".zip",
];

/// Maximum length of a derived bookmark description.
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Maximum length of a persisted ingest error.
pub const INGEST_ERROR_MAX_CHARS: usize = 1000;

/// Maximum length of a folder description.
pub const FOLDER_DESCRIPTION_MAX_CHARS: usize = 200;

/// Emoji assigned to folders created without one.
pub const DEFAULT_FOLDER_EMOJI: &str = "📁";

// =============================================================================
// CONVERSION
// =============================================================================

/// Bounded wait for headless browser navigation and network idle.
pub const BROWSER_TIMEOUT_SECS: u64 = 30;

/// User agent presented by the headless browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Accept-Language header presented by the headless browser.
pub const BROWSER_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Accept header presented by the headless browser.
pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Timeout for plain HTTP fetches made by converters.
pub const FETCH_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Target characters per embedding chunk.
pub const CHUNK_SIZE: usize = 1000;

// =============================================================================
// AUTO FOLDER
// =============================================================================

/// Hard ceiling on model calls in the folder resolution loop.
pub const AUTO_FOLDER_MAX_STEPS: usize = 4;

// =============================================================================
// HISTORY PAGINATION
// =============================================================================

/// Default page size for the ingest history endpoint.
pub const HISTORY_LIMIT: i64 = 20;

/// Maximum page size for the ingest history endpoint.
pub const HISTORY_LIMIT_MAX: i64 = 100;

// =============================================================================
// SWEEP
// =============================================================================

/// Interval between orphan sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Age after which a non-terminal record is considered orphaned.
pub const SWEEP_STALE_AFTER_SECS: u64 = 900;

/// Error recorded on records reconciled by the sweep.
pub const SWEEP_FAILURE_MESSAGE: &str = "Ingestion interrupted before completion";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;
