//! `GET /api/ingest/history`.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use mindpocket_core::defaults::{HISTORY_LIMIT, HISTORY_LIMIT_MAX};
use mindpocket_core::{HistoryQuery, IngestStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

/// Raw query parameters. Parsed leniently: bad values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl HistoryParams {
    pub fn to_query(&self) -> HistoryQuery {
        let status = self
            .status
            .as_deref()
            .and_then(|s| s.parse::<IngestStatus>().ok());
        let limit = self
            .limit
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(HISTORY_LIMIT)
            .min(HISTORY_LIMIT_MAX);
        let offset = self
            .offset
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(0);
        HistoryQuery {
            status,
            limit,
            offset,
        }
    }
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<JsonValue>, ApiError> {
    let items = state.bookmarks.history(&user_id, params.to_query()).await?;
    Ok(Json(json!({ "items": items })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(status: Option<&str>, limit: Option<&str>, offset: Option<&str>) -> HistoryParams {
        HistoryParams {
            status: status.map(String::from),
            limit: limit.map(String::from),
            offset: offset.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let q = HistoryParams::default().to_query();
        assert_eq!(q, HistoryQuery::default());
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(params(None, Some("0"), None).to_query().limit, 20);
        assert_eq!(params(None, Some("abc"), None).to_query().limit, 20);
        assert_eq!(params(None, Some("-5"), None).to_query().limit, 20);
        assert_eq!(params(None, Some("500"), None).to_query().limit, 100);
        assert_eq!(params(None, Some("35"), None).to_query().limit, 35);
    }

    #[test]
    fn test_status_and_offset() {
        let q = params(Some("failed"), None, Some("40")).to_query();
        assert_eq!(q.status, Some(IngestStatus::Failed));
        assert_eq!(q.offset, 40);

        let q = params(Some("archived"), None, Some("-1")).to_query();
        assert_eq!(q.status, None);
        assert_eq!(q.offset, 0);
    }
}
