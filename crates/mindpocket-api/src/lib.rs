//! # mindpocket-api
//!
//! HTTP surface of the MindPocket ingestion service.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/api/ingest` | POST | Submit a URL, an HTML snapshot (JSON) or a file (multipart) |
//! | `/api/ingest/history` | GET | Paginated ingest history of the caller |
//! | `/health` | GET | Liveness probe |

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use mindpocket_core::defaults::MAX_FILE_SIZE;
use mindpocket_core::{ApiTokenRepository, BookmarkRepository};
use mindpocket_ingest::IngestPipeline;

pub use error::ApiError;

/// Upload bodies may exceed the file limit so the handler reports the size error itself.
pub const REQUEST_BODY_LIMIT: usize = MAX_FILE_SIZE as usize + 10 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub tokens: Arc<dyn ApiTokenRepository>,
}

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Time-ordered request correlation ids.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/ingest", post(handlers::ingest::ingest))
        .route("/api/ingest/history", get(handlers::history::history))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .with_state(state)
}
