//! Headless Chrome page rendering.
//!
//! Pages that build their DOM client-side (WeChat articles, Xiaohongshu
//! notes, most SPAs) are rendered in a headless browser and the resulting
//! HTML snapshot is handed to [`super::convert_from_html`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, warn};

use mindpocket_core::defaults::{
    BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE, BROWSER_TIMEOUT_SECS, BROWSER_USER_AGENT,
};
use mindpocket_core::{ConversionResult, Error, Platform, Result};

use super::{convert_from_html, UrlStrategy};

/// Produces a rendered HTML snapshot of a page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return its HTML, or `None` on any failure.
    async fn render(&self, url: &str) -> Option<String>;
}

/// Headless browser configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Chrome/Chromium executable. Auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    /// Bound on navigation, and separately on the network-idle wait.
    pub timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            timeout: Duration::from_secs(BROWSER_TIMEOUT_SECS),
        }
    }
}

impl BrowserConfig {
    /// Create config from environment variables.
    ///
    /// - `CHROME_PATH`: browser executable
    /// - `BROWSER_TIMEOUT_SECS`: navigation and network-idle timeout (default 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chrome_path: std::env::var("CHROME_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            timeout: std::env::var("BROWSER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`PageRenderer`] backed by a freshly launched headless Chrome per page.
#[derive(Debug, Clone, Default)]
pub struct ChromePageRenderer {
    config: BrowserConfig,
}

impl ChromePageRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[async_trait]
impl PageRenderer for ChromePageRenderer {
    async fn render(&self, url: &str) -> Option<String> {
        let config = self.config.clone();
        let target = url.to_string();
        let start = Instant::now();

        let outcome = tokio::task::spawn_blocking(move || render_blocking(&config, &target)).await;

        match outcome {
            Ok(Ok(Some(html))) => {
                debug!(
                    subsystem = "ingest",
                    component = "browser",
                    url = %url,
                    bytes = html.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Page rendered"
                );
                Some(html)
            }
            Ok(Ok(None)) => {
                warn!(
                    subsystem = "ingest",
                    component = "browser",
                    url = %url,
                    "Rendered page was empty"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(
                    subsystem = "ingest",
                    component = "browser",
                    url = %url,
                    error = %e,
                    "Browser fetch failed"
                );
                None
            }
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "browser",
                    url = %url,
                    error = %e,
                    "Browser task did not complete"
                );
                None
            }
        }
    }
}

/// Quiet period with no new resource entries that counts as network idle.
const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);
const NETWORK_IDLE_POLL: Duration = Duration::from_millis(100);
const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

fn browser_error(context: &str) -> impl Fn(anyhow::Error) -> Error + '_ {
    move |e| Error::Browser(format!("{}: {}", context, e))
}

/// Launch, navigate, snapshot. The browser process is killed when `browser`
/// drops at the end of this scope, on success and on every error path.
fn render_blocking(config: &BrowserConfig, url: &str) -> Result<Option<String>> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .path(config.chrome_path.clone())
        .idle_browser_timeout(config.timeout * 2 + Duration::from_secs(5))
        .build()
        .map_err(|e| Error::Browser(format!("invalid launch options: {}", e)))?;

    let browser = Browser::new(options).map_err(browser_error("launch failed"))?;
    let tab = browser.new_tab().map_err(browser_error("could not open tab"))?;
    tab.set_default_timeout(config.timeout);
    tab.set_user_agent(BROWSER_USER_AGENT, Some(BROWSER_ACCEPT_LANGUAGE), None)
        .map_err(browser_error("could not set user agent"))?;

    let mut headers = HashMap::new();
    headers.insert("Accept-Language", BROWSER_ACCEPT_LANGUAGE);
    headers.insert("Accept", BROWSER_ACCEPT);
    tab.set_extra_http_headers(headers)
        .map_err(browser_error("could not set headers"))?;

    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .map_err(browser_error("navigation failed"))?;
    if !wait_for_network_idle(&tab, config.timeout)? {
        debug!(
            subsystem = "ingest",
            component = "browser",
            url = %url,
            "Network still busy at timeout, taking snapshot anyway"
        );
    }
    let html = tab.get_content().map_err(browser_error("could not read page"))?;

    Ok(Some(html).filter(|h| !h.trim().is_empty()))
}

/// Poll the page's resource timeline until it stops growing for
/// [`NETWORK_IDLE_QUIET`]. Returns `false` if `timeout` elapses first.
fn wait_for_network_idle(tab: &Tab, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut last_count = None;
    let mut quiet_since = Instant::now();
    loop {
        let count = tab
            .evaluate(RESOURCE_COUNT_JS, false)
            .map_err(browser_error("could not inspect network activity"))?
            .value
            .and_then(|v| v.as_u64());
        let now = Instant::now();
        if count != last_count {
            last_count = count;
            quiet_since = now;
        } else if now.duration_since(quiet_since) >= NETWORK_IDLE_QUIET {
            return Ok(true);
        }
        if now >= deadline {
            return Ok(false);
        }
        std::thread::sleep(NETWORK_IDLE_POLL);
    }
}

/// Last-resort strategy: render the page and apply platform DOM rules.
pub struct BrowserStrategy {
    renderer: Arc<dyn PageRenderer>,
}

impl BrowserStrategy {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl UrlStrategy for BrowserStrategy {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn applies_to(&self, _url: &str, _platform: Option<Platform>) -> bool {
        true
    }

    async fn attempt(&self, url: &str, _platform: Option<Platform>) -> Result<Option<ConversionResult>> {
        match self.renderer.render(url).await {
            Some(html) => Ok(convert_from_html(&html, url)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_defaults_and_builders() {
        let config = BrowserConfig::default();
        assert!(config.chrome_path.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));

        let config = config
            .with_chrome_path("/usr/bin/chromium")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_launch_failure_is_a_browser_error() {
        let config = BrowserConfig::default().with_chrome_path("/nonexistent/mindpocket/chrome");
        let err = render_blocking(&config, "https://example.com").unwrap_err();
        let Error::Browser(message) = err else {
            panic!("expected browser error, got {:?}", err);
        };
        assert!(message.starts_with("launch failed"), "{}", message);
    }

    #[tokio::test]
    async fn test_renderer_collapses_launch_failure_to_none() {
        let renderer = ChromePageRenderer::new(
            BrowserConfig::default().with_chrome_path("/nonexistent/mindpocket/chrome"),
        );
        assert!(renderer.render("https://example.com").await.is_none());
    }

    struct FixedRenderer(Option<&'static str>);

    #[async_trait]
    impl PageRenderer for FixedRenderer {
        async fn render(&self, _url: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[tokio::test]
    async fn test_browser_strategy_applies_platform_rules() {
        let html = r#"<html><head><meta property="og:title" content="Post"></head>
            <body><div id="js_content"><p>Body text</p></div></body></html>"#;
        let strategy = BrowserStrategy::new(Arc::new(FixedRenderer(Some(html))));
        let result = strategy
            .attempt("https://mp.weixin.qq.com/s/x", Some(Platform::Wechat))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.markdown, "# Post\n\nBody text");
    }

    #[tokio::test]
    async fn test_browser_strategy_none_when_render_fails() {
        let strategy = BrowserStrategy::new(Arc::new(FixedRenderer(None)));
        let result = strategy.attempt("https://example.com", None).await.unwrap();
        assert!(result.is_none());
    }
}
