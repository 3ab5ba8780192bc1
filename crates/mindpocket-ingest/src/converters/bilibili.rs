//! Bilibili videos via the public view API.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use mindpocket_core::{ConversionResult, Platform, Result};

use super::UrlStrategy;

pub const DEFAULT_BILIBILI_API: &str = "https://api.bilibili.com";

static BV_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/video/(BV[A-Za-z0-9]+)").expect("valid BV regex"));
static SITE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_哔哩哔哩.*$").expect("valid suffix regex"));

#[derive(Debug, Deserialize)]
struct ViewResponse {
    data: Option<ViewData>,
}

#[derive(Debug, Deserialize)]
struct ViewData {
    title: Option<String>,
}

/// Builds an embed page for a Bilibili video without rendering the site.
pub struct BilibiliStrategy {
    client: reqwest::Client,
    api_base: String,
}

impl BilibiliStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_BILIBILI_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_title(&self, bvid: &str) -> Option<String> {
        let url = format!("{}/x/web-interface/view", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("bvid", bvid)])
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let body: ViewResponse = match response {
            Ok(r) => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(subsystem = "ingest", component = "bilibili", bvid, error = %e, "Malformed view response");
                    return None;
                }
            },
            Err(e) => {
                warn!(subsystem = "ingest", component = "bilibili", bvid, error = %e, "Failed to fetch video info");
                return None;
            }
        };

        body.data
            .and_then(|d| d.title)
            .map(|t| SITE_SUFFIX.replace(&t, "").trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// BV id from a video URL.
pub fn extract_bvid(url: &str) -> Option<&str> {
    BV_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn video_markdown(title: Option<&str>, bvid: &str) -> String {
    [
        format!("# {}", title.unwrap_or("B站视频")),
        String::new(),
        format!("**视频链接**：https://www.bilibili.com/video/{}", bvid),
        String::new(),
        format!(
            r#"<iframe src="//player.bilibili.com/player.html?isOutside=true&bvid={}" scrolling="no" border="0" frameborder="no" framespacing="0" allowfullscreen="true"></iframe>"#,
            bvid
        ),
    ]
    .join("\n")
}

#[async_trait]
impl UrlStrategy for BilibiliStrategy {
    fn name(&self) -> &'static str {
        "bilibili"
    }

    fn applies_to(&self, _url: &str, platform: Option<Platform>) -> bool {
        platform == Some(Platform::Bilibili)
    }

    async fn attempt(&self, url: &str, _platform: Option<Platform>) -> Result<Option<ConversionResult>> {
        let Some(bvid) = extract_bvid(url) else {
            return Ok(None);
        };
        let title = self.fetch_title(bvid).await;
        let markdown = video_markdown(title.as_deref(), bvid);
        Ok(Some(ConversionResult::new(title, markdown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_bvid() {
        assert_eq!(
            extract_bvid("https://www.bilibili.com/video/BV1GJ411x7h7/?spm=1"),
            Some("BV1GJ411x7h7")
        );
        assert_eq!(extract_bvid("https://www.bilibili.com/bangumi/play/ep1"), None);
    }

    #[tokio::test]
    async fn test_builds_embed_with_api_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/view"))
            .and(query_param("bvid", "BV1GJ411x7h7"))
            .and(header("user-agent", "Mozilla/5.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "title": "Rust 入门_哔哩哔哩_bilibili" }
            })))
            .mount(&server)
            .await;

        let strategy = BilibiliStrategy::new(reqwest::Client::new()).with_api_base(server.uri());
        let result = strategy
            .attempt("https://www.bilibili.com/video/BV1GJ411x7h7", Some(Platform::Bilibili))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.title.as_deref(), Some("Rust 入门"));
        let lines: Vec<&str> = result.markdown.lines().collect();
        assert_eq!(lines[0], "# Rust 入门");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "**视频链接**：https://www.bilibili.com/video/BV1GJ411x7h7");
        assert!(lines[4].contains("bvid=BV1GJ411x7h7"));
    }

    #[tokio::test]
    async fn test_api_failure_uses_placeholder_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let strategy = BilibiliStrategy::new(reqwest::Client::new()).with_api_base(server.uri());
        let result = strategy
            .attempt("https://www.bilibili.com/video/BV1xx", Some(Platform::Bilibili))
            .await
            .unwrap()
            .unwrap();
        assert!(result.title.is_none());
        assert!(result.markdown.starts_with("# B站视频\n"));
    }

    #[tokio::test]
    async fn test_without_bvid_is_none() {
        let strategy = BilibiliStrategy::new(reqwest::Client::new());
        let result = strategy
            .attempt("https://space.bilibili.com/123", Some(Platform::Bilibili))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!strategy.applies_to("https://example.com", None));
    }
}
