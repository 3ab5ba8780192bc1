//! Content conversion to Markdown.
//!
//! URLs go through an ordered chain of [`UrlStrategy`] implementations:
//! platform parsers that need no rendering, a direct HTTP fetch, and finally
//! a headless browser. Uploaded files go through the
//! [`DocumentConverterRegistry`], keyed by extension.

pub mod bilibili;
pub mod browser;
pub mod documents;
pub mod generic;
pub mod html;
pub mod wechat;
pub mod xiaohongshu;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mindpocket_core::defaults::FETCH_TIMEOUT_SECS;
use mindpocket_core::{ConversionResult, Error, Platform, Result};

use crate::platform::classify;

pub use bilibili::BilibiliStrategy;
pub use browser::{BrowserConfig, BrowserStrategy, ChromePageRenderer, PageRenderer};
pub use documents::{DocumentConverter, DocumentConverterRegistry};
pub use generic::GenericStrategy;
pub use html::html_to_markdown;
pub use wechat::convert_wechat;
pub use xiaohongshu::convert_xiaohongshu;

/// One way of turning a URL into Markdown.
#[async_trait]
pub trait UrlStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy should be tried for the URL at all.
    fn applies_to(&self, url: &str, platform: Option<Platform>) -> bool;

    /// Try to convert. `Ok(None)` means "nothing usable, try the next one".
    async fn attempt(&self, url: &str, platform: Option<Platform>) -> Result<Option<ConversionResult>>;
}

/// Convert a rendered HTML snapshot, applying platform-specific DOM rules.
pub fn convert_from_html(html: &str, source_url: &str) -> Option<ConversionResult> {
    match classify(source_url) {
        Some(Platform::Wechat) => convert_wechat(html, Some(source_url)),
        Some(Platform::Xiaohongshu) => convert_xiaohongshu(html),
        _ => html_to_markdown(html, Some(source_url)),
    }
}

/// Conversion entry point shared by the ingestion pipeline.
pub struct ConversionEngine {
    strategies: Vec<Arc<dyn UrlStrategy>>,
    documents: Arc<DocumentConverterRegistry>,
}

impl ConversionEngine {
    pub fn new(strategies: Vec<Arc<dyn UrlStrategy>>, documents: Arc<DocumentConverterRegistry>) -> Self {
        Self {
            strategies,
            documents,
        }
    }

    /// The production chain: Bilibili, direct fetch, then the given renderer.
    pub fn with_renderer(renderer: Arc<dyn PageRenderer>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        let documents = Arc::new(DocumentConverterRegistry::with_defaults());

        let strategies: Vec<Arc<dyn UrlStrategy>> = vec![
            Arc::new(BilibiliStrategy::new(client.clone())),
            Arc::new(GenericStrategy::new(client, documents.clone())),
            Arc::new(BrowserStrategy::new(renderer)),
        ];
        Ok(Self::new(strategies, documents))
    }

    /// [`Self::with_renderer`] using headless Chrome.
    pub fn default_chain(config: BrowserConfig) -> Result<Self> {
        Self::with_renderer(Arc::new(ChromePageRenderer::new(config)))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn documents(&self) -> &DocumentConverterRegistry {
        &self.documents
    }

    /// Walk the strategy chain and return the first usable result.
    ///
    /// When every strategy comes up empty, the outcome of the last strategy
    /// that ran decides: its error if it failed, otherwise `Ok(None)`.
    /// Errors from earlier strategies are only logged.
    pub async fn convert_from_url(&self, url: &str) -> Result<Option<ConversionResult>> {
        let platform = classify(url);
        let mut final_error = None;

        for strategy in &self.strategies {
            if !strategy.applies_to(url, platform) {
                debug!(
                    subsystem = "ingest",
                    component = "converter",
                    strategy = strategy.name(),
                    url = %url,
                    "Strategy skipped"
                );
                continue;
            }

            let start = Instant::now();
            match strategy.attempt(url, platform).await {
                Ok(Some(result)) if result.is_usable() => {
                    info!(
                        subsystem = "ingest",
                        component = "converter",
                        op = "convert_url",
                        strategy = strategy.name(),
                        platform = ?platform,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "URL converted"
                    );
                    return Ok(Some(result));
                }
                Ok(_) => {
                    final_error = None;
                    debug!(
                        subsystem = "ingest",
                        component = "converter",
                        strategy = strategy.name(),
                        url = %url,
                        "Strategy produced no usable content"
                    );
                }
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "converter",
                        strategy = strategy.name(),
                        url = %url,
                        error = %e,
                        "Strategy failed, trying next"
                    );
                    final_error = Some(e);
                }
            }
        }

        match final_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Convert an HTML snapshot captured by the browser extension.
    pub fn convert_from_html(&self, html: &str, source_url: &str) -> Option<ConversionResult> {
        convert_from_html(html, source_url)
    }

    /// Convert uploaded bytes by extension. Unknown extensions yield `Ok(None)`.
    pub async fn convert_from_buffer(&self, data: Vec<u8>, ext: &str) -> Result<Option<ConversionResult>> {
        self.documents.convert_blocking(data, ext.to_lowercase()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy with a fixed outcome that counts its invocations.
    struct Scripted {
        name: &'static str,
        outcome: fn() -> Result<Option<ConversionResult>>,
        only: Option<Platform>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, outcome: fn() -> Result<Option<ConversionResult>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                only: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UrlStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies_to(&self, url: &str, platform: Option<Platform>) -> bool {
            match self.only {
                Some(p) => platform == Some(p),
                None => !generic::is_browser_only(url) || self.name == "browser",
            }
        }

        async fn attempt(&self, _url: &str, _platform: Option<Platform>) -> Result<Option<ConversionResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn ok_result() -> Result<Option<ConversionResult>> {
        Ok(Some(ConversionResult::new(Some("T".into()), "body")))
    }

    fn empty_result() -> Result<Option<ConversionResult>> {
        Ok(Some(ConversionResult::new(None, "   ")))
    }

    fn none_result() -> Result<Option<ConversionResult>> {
        Ok(None)
    }

    fn failing() -> Result<Option<ConversionResult>> {
        Err(Error::Conversion("boom".into()))
    }

    fn engine(strategies: Vec<Arc<dyn UrlStrategy>>) -> ConversionEngine {
        ConversionEngine::new(strategies, Arc::new(DocumentConverterRegistry::with_defaults()))
    }

    #[tokio::test]
    async fn test_generic_failure_falls_back_to_browser_once() {
        let generic = Scripted::new("generic", failing);
        let browser = Scripted::new("browser", ok_result);
        let engine = engine(vec![generic.clone(), browser.clone()]);

        let result = engine.convert_from_url("https://example.com/a").await.unwrap();
        assert_eq!(result.unwrap().markdown, "body");
        assert_eq!(generic.calls(), 1);
        assert_eq!(browser.calls(), 1);
    }

    #[tokio::test]
    async fn test_browser_only_url_skips_generic() {
        let generic = Scripted::new("generic", ok_result);
        let browser = Scripted::new("browser", ok_result);
        let engine = engine(vec![generic.clone(), browser.clone()]);

        engine
            .convert_from_url("https://mp.weixin.qq.com/s/abc")
            .await
            .unwrap();
        assert_eq!(generic.calls(), 0);
        assert_eq!(browser.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_result_moves_on() {
        let first = Scripted::new("generic", empty_result);
        let browser = Scripted::new("browser", ok_result);
        let engine = engine(vec![first.clone(), browser.clone()]);

        let result = engine.convert_from_url("https://example.com").await.unwrap();
        assert!(result.is_some());
        assert_eq!(browser.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_final_strategy_yields_none() {
        let engine_none = engine(vec![
            Scripted::new("generic", none_result),
            Scripted::new("browser", none_result),
        ]);
        assert!(engine_none
            .convert_from_url("https://example.com")
            .await
            .unwrap()
            .is_none());

        let engine_recovered = engine(vec![
            Scripted::new("generic", failing),
            Scripted::new("browser", none_result),
        ]);
        assert!(engine_recovered
            .convert_from_url("https://example.com")
            .await
            .unwrap()
            .is_none());

        let engine_err = engine(vec![
            Scripted::new("generic", none_result),
            Scripted::new("browser", failing),
        ]);
        let err = engine_err
            .convert_from_url("https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }

    #[tokio::test]
    async fn test_platform_strategy_short_circuits() {
        let bilibili = Arc::new(Scripted {
            name: "bilibili",
            outcome: ok_result,
            only: Some(Platform::Bilibili),
            calls: AtomicUsize::new(0),
        });
        let generic = Scripted::new("generic", ok_result);
        let engine = engine(vec![bilibili.clone(), generic.clone()]);

        engine
            .convert_from_url("https://www.bilibili.com/video/BV1xx")
            .await
            .unwrap();
        assert_eq!(bilibili.calls(), 1);
        assert_eq!(generic.calls(), 0);

        engine.convert_from_url("https://example.com").await.unwrap();
        assert_eq!(bilibili.calls(), 1);
        assert_eq!(generic.calls(), 1);
    }

    #[test]
    fn test_convert_from_html_dispatches_by_platform() {
        let html = r#"<html><head><title>Generic</title></head><body>
            <div id="js_content"><p>Account body</p></div>
            <div id="detail-title">Note</div></body></html>"#;

        let wechat = convert_from_html(html, "https://mp.weixin.qq.com/s/1").unwrap();
        assert_eq!(wechat.markdown, "Account body");

        let xhs = convert_from_html(html, "https://www.xiaohongshu.com/explore/1").unwrap();
        assert_eq!(xhs.markdown, "# Note");

        let generic = convert_from_html(html, "https://example.com").unwrap();
        assert_eq!(generic.title.as_deref(), Some("Generic"));
        assert_eq!(generic.markdown, "Account body\n\nNote");
    }

    #[tokio::test]
    async fn test_convert_from_buffer_unknown_extension() {
        let engine = engine(Vec::new());
        assert!(engine
            .convert_from_buffer(b"data".to_vec(), ".exe")
            .await
            .unwrap()
            .is_none());
        let md = engine
            .convert_from_buffer(b"hello".to_vec(), ".TXT")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(md.markdown, "hello");
    }

    #[test]
    fn test_default_chain_order() {
        let engine = ConversionEngine::default_chain(BrowserConfig::default()).unwrap();
        assert_eq!(engine.strategy_names(), vec!["bilibili", "generic", "browser"]);
    }
}
