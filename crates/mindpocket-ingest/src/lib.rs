//! # mindpocket-ingest
//!
//! Ingestion pipeline for MindPocket.
//!
//! This crate provides:
//! - URL/file type inference and platform classification
//! - Content converters: an ordered URL strategy chain (platform parsers,
//!   direct fetch, headless browser), HTML-to-Markdown with platform DOM
//!   rules, and a document converter registry for uploaded files
//! - The ingestion orchestrator with supervised background processing
//! - A sweep worker that reconciles orphaned records
//! - The auto-folder resolver and its folder tools

pub mod auto_folder;
pub mod chunking;
pub mod classify;
pub mod converters;
pub mod description;
pub mod folder_tools;
pub mod pipeline;
pub mod platform;
pub mod sweep;

// Re-export core types
pub use mindpocket_core::*;

pub use auto_folder::{parse_decision, AutoFolderResolver, FolderResolveRequest};
pub use chunking::chunk_paragraphs;
pub use classify::{file_extension, infer_type_from_extension, infer_type_from_url};
pub use converters::{
    BrowserConfig, ChromePageRenderer, ConversionEngine, DocumentConverter,
    DocumentConverterRegistry, PageRenderer, UrlStrategy,
};
pub use description::{extract_description, sanitize_error};
pub use folder_tools::FolderTools;
pub use pipeline::{
    IngestExtensionRequest, IngestFileRequest, IngestPipeline, IngestUrlRequest,
};
pub use platform::{classify, needs_browser_rendering};
pub use sweep::{SweepConfig, SweepEvent, SweepHandle, SweepWorker};
