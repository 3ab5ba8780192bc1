//! Direct HTTP fetch with content-type dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use mindpocket_core::{ConversionResult, Error, Platform, Result};

use super::documents::DocumentConverterRegistry;
use super::html::html_to_markdown;
use super::UrlStrategy;
use crate::classify::file_extension;

/// URLs that only ever produce a usable page when rendered.
static BROWSER_ONLY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^https?://mp\.weixin\.qq\.com/"]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid browser-only regex"))
        .collect()
});

pub fn is_browser_only(url: &str) -> bool {
    BROWSER_ONLY_PATTERNS.iter().any(|p| p.is_match(url))
}

/// Extension understood by the document registry for a response content type.
fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Some(".pdf"),
        "text/plain" => Some(".txt"),
        "text/markdown" | "text/x-markdown" => Some(".md"),
        "application/json" => Some(".json"),
        "text/csv" => Some(".csv"),
        "application/xml" | "text/xml" => Some(".xml"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some(".docx"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(".xlsx"),
        _ => None,
    }
}

fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

/// Fetches the URL directly and converts the body by content type.
pub struct GenericStrategy {
    client: reqwest::Client,
    documents: Arc<DocumentConverterRegistry>,
}

impl GenericStrategy {
    pub fn new(client: reqwest::Client, documents: Arc<DocumentConverterRegistry>) -> Self {
        Self { client, documents }
    }
}

#[async_trait]
impl UrlStrategy for GenericStrategy {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn applies_to(&self, url: &str, _platform: Option<Platform>) -> bool {
        !is_browser_only(url)
    }

    async fn attempt(&self, url: &str, _platform: Option<Platform>) -> Result<Option<ConversionResult>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Conversion(format!("HTTP {} fetching {}", status, url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await?;

        debug!(
            subsystem = "ingest",
            component = "generic",
            url = %url,
            content_type = %content_type,
            bytes = body.len(),
            "Fetched"
        );

        if is_html(&content_type) {
            return Ok(html_to_markdown(&String::from_utf8_lossy(&body), Some(url)));
        }

        // Content type first, then the URL path's extension.
        let path_ext = url::Url::parse(url)
            .map(|u| file_extension(u.path()))
            .unwrap_or_default();
        let ext = extension_for_content_type(&content_type)
            .map(str::to_string)
            .or_else(|| Some(path_ext).filter(|e| self.documents.supports(e)));

        match ext {
            Some(ext) => self.documents.convert_blocking(body.to_vec(), ext).await,
            None => Err(Error::Conversion(format!(
                "Unsupported content type: {}",
                if content_type.is_empty() { "unknown" } else { &content_type }
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy() -> GenericStrategy {
        GenericStrategy::new(
            reqwest::Client::new(),
            Arc::new(DocumentConverterRegistry::with_defaults()),
        )
    }

    #[test]
    fn test_browser_only_patterns() {
        assert!(is_browser_only("https://mp.weixin.qq.com/s/abc"));
        assert!(is_browser_only("http://mp.weixin.qq.com/s?__biz=1"));
        assert!(!is_browser_only("https://example.com/?u=https://mp.weixin.qq.com/"));
        assert!(!strategy().applies_to("https://mp.weixin.qq.com/s/abc", Some(Platform::Wechat)));
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("application/pdf"), Some(".pdf"));
        assert_eq!(extension_for_content_type("text/plain; charset=utf-8"), Some(".txt"));
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn test_html_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html><head><title>Post</title></head><body><p>Hello <a href=\"/x\">x</a></p></body></html>",
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let url = format!("{}/post", server.uri());
        let result = strategy().attempt(&url, None).await.unwrap().unwrap();
        assert_eq!(result.title.as_deref(), Some("Post"));
        assert_eq!(result.markdown, format!("Hello [x]({}/x)", server.uri()));
    }

    #[tokio::test]
    async fn test_plain_text_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("# Notes\n\nline", "text/plain"))
            .mount(&server)
            .await;

        let result = strategy().attempt(&server.uri(), None).await.unwrap().unwrap();
        assert_eq!(result.title.as_deref(), Some("Notes"));
        assert_eq!(result.markdown, "# Notes\n\nline");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = strategy().attempt(&server.uri(), None).await.unwrap_err();
        assert!(matches!(err, Error::Conversion(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let err = strategy().attempt(&server.uri(), None).await.unwrap_err();
        assert!(matches!(err, Error::Conversion(msg) if msg.contains("application/octet-stream")));
    }
}
