//! # mindpocket-core
//!
//! Core types, traits, and abstractions for the MindPocket ingestion service.
//!
//! This crate holds the bookmark taxonomy, the ingest status state machine,
//! the shared error type, and the repository/backend traits that the other
//! MindPocket crates implement or consume.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod text;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use text::{sanitize_ingest_error, truncate_chars};
pub use traits::*;

/// Embedding vector type (shared with the pgvector column type).
pub use pgvector::Vector;
