//! Structured logging schema and field name constants for MindPocket.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query ingest events consistently across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), ingest completions |
//! | DEBUG | Decision points, strategy selection, config choices |
//! | TRACE | Per-item iteration (chunks, tool calls) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "ingest"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "converter", "browser", "sweep", "auto_folder"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "ingest_url", "convert", "embed", "resolve"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Bookmark (ingest record) UUID.
pub const BOOKMARK_ID: &str = "bookmark_id";

/// Owning user id.
pub const USER_ID: &str = "user_id";

/// Platform detected from the URL.
pub const PLATFORM: &str = "platform";

/// Conversion strategy name.
pub const STRATEGY: &str = "strategy";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks embedded.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Error message attached to a WARN/ERROR event.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_distinct_snake_case() {
        let fields = [
            REQUEST_ID, SUBSYSTEM, COMPONENT, OPERATION, BOOKMARK_ID, USER_ID, PLATFORM, STRATEGY,
            DURATION_MS, CHUNK_COUNT, ERROR_MSG,
        ];
        let unique: HashSet<_> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
        for field in fields {
            assert!(field.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{}", field);
        }
    }
}
