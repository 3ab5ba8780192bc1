//! `POST /api/ingest`.
//!
//! One endpoint, three admission paths:
//! - `multipart/form-data` with a `file` field goes to the file path
//! - JSON with a non-empty `html` goes to the extension path
//! - any other JSON goes to the URL path

use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;
use url::Url;

use mindpocket_core::{ClientSource, IngestAck};
use mindpocket_ingest::{IngestExtensionRequest, IngestFileRequest, IngestUrlRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::{AppState, REQUEST_BODY_LIMIT};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlIngestBody {
    pub url: String,
    pub folder_id: Option<String>,
    pub title: Option<String>,
    pub client_source: ClientSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionIngestBody {
    pub url: String,
    pub html: String,
    pub title: Option<String>,
    pub folder_id: Option<String>,
    pub client_source: ClientSource,
}

#[derive(Debug)]
pub enum IngestBody {
    Url(UrlIngestBody),
    Extension(ExtensionIngestBody),
}

fn issue(path: &str, message: impl Into<String>) -> JsonValue {
    json!({ "path": path, "message": message.into() })
}

fn invalid(issues: Vec<JsonValue>) -> ApiError {
    ApiError::InvalidRequest(JsonValue::Array(issues))
}

fn check_url(url: &str, issues: &mut Vec<JsonValue>) {
    if Url::parse(url.trim()).is_err() {
        issues.push(issue("url", "Invalid url"));
    }
}

/// Parse and validate a JSON ingest body, choosing the path by `html`.
pub fn parse_json_body(bytes: &[u8]) -> Result<IngestBody, ApiError> {
    let value: JsonValue =
        serde_json::from_slice(bytes).map_err(|e| invalid(vec![issue("", e.to_string())]))?;

    let has_html = value
        .get("html")
        .and_then(JsonValue::as_str)
        .is_some_and(|html| !html.is_empty());

    let mut issues = Vec::new();
    if has_html {
        let body: ExtensionIngestBody =
            serde_json::from_value(value).map_err(|e| invalid(vec![issue("", e.to_string())]))?;
        check_url(&body.url, &mut issues);
        if body.folder_id.as_deref().is_some_and(|f| f.trim().is_empty()) {
            issues.push(issue("folderId", "Folder id must not be empty"));
        }
        if !issues.is_empty() {
            return Err(invalid(issues));
        }
        Ok(IngestBody::Extension(body))
    } else {
        let body: UrlIngestBody =
            serde_json::from_value(value).map_err(|e| invalid(vec![issue("", e.to_string())]))?;
        check_url(&body.url, &mut issues);
        if !issues.is_empty() {
            return Err(invalid(issues));
        }
        Ok(IngestBody::Url(body))
    }
}

pub async fn ingest(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    request: Request,
) -> Result<(StatusCode, Json<IngestAck>), ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    let ack = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let file_request = read_multipart(multipart, user_id).await?;
        state.pipeline.ingest_from_file(file_request).await?
    } else {
        let bytes = to_bytes(request.into_body(), REQUEST_BODY_LIMIT)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;
        match parse_json_body(&bytes)? {
            IngestBody::Url(body) => {
                state
                    .pipeline
                    .ingest_from_url(IngestUrlRequest {
                        user_id,
                        url: body.url.trim().to_string(),
                        folder_id: body.folder_id,
                        title: body.title,
                        client_source: body.client_source,
                    })
                    .await?
            }
            IngestBody::Extension(body) => {
                state
                    .pipeline
                    .ingest_from_extension(IngestExtensionRequest {
                        user_id,
                        url: body.url.trim().to_string(),
                        html: body.html,
                        folder_id: body.folder_id,
                        title: body.title,
                        client_source: body.client_source,
                    })
                    .await?
            }
        }
    };

    debug!(
        subsystem = "api",
        component = "ingest",
        bookmark_id = %ack.bookmark_id,
        bookmark_type = %ack.bookmark_type,
        "Ingest accepted"
    );
    Ok((StatusCode::CREATED, Json(ack)))
}

async fn read_multipart(mut multipart: Multipart, user_id: String) -> Result<IngestFileRequest, ApiError> {
    let bad_multipart = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Invalid multipart body: {}", e))
    };

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder_id = None;
    let mut title = None;
    let mut client_source = ClientSource::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some((file_name, bytes.to_vec()));
            }
            "folderId" => folder_id = Some(field.text().await.map_err(bad_multipart)?),
            "title" => title = Some(field.text().await.map_err(bad_multipart)?),
            "clientSource" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    client_source = raw.parse().map_err(|e: String| {
                        invalid(vec![issue("clientSource", e)])
                    })?;
                }
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };
    Ok(IngestFileRequest {
        user_id,
        file_name,
        bytes,
        folder_id,
        title,
        client_source,
    })
}
