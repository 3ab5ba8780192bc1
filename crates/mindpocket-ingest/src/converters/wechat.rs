//! WeChat official-account article pages.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use mindpocket_core::ConversionResult;

use super::html::{first_text, meta_content, selector, MarkdownWriter};

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static ACTIVITY_NAME: Lazy<Selector> = Lazy::new(|| selector("#activity-name"));
static ACCOUNT_NAME: Lazy<Selector> = Lazy::new(|| selector("#js_name"));
static CONTENT: Lazy<Selector> = Lazy::new(|| selector("#js_content"));

/// Lazy-loaded article images carry their real source in `data-src`.
const IMAGE_ATTRS: &[&str] = &["data-src", "src"];

pub fn convert_wechat(html: &str, source_url: Option<&str>) -> Option<ConversionResult> {
    let document = Html::parse_document(html);
    let content = document.select(&CONTENT).next()?;

    let base = source_url.and_then(|u| Url::parse(u).ok());
    let body = MarkdownWriter::new(base.as_ref(), IMAGE_ATTRS).convert(content);
    if body.is_empty() {
        return None;
    }

    let title = meta_content(&document, &OG_TITLE).or_else(|| first_text(&document, &ACTIVITY_NAME));
    let author = first_text(&document, &ACCOUNT_NAME);

    let mut parts = Vec::with_capacity(3);
    if let Some(title) = &title {
        parts.push(format!("# {}", title));
    }
    if let Some(author) = author {
        parts.push(format!("> 公众号：{}", author));
    }
    parts.push(body);

    Some(ConversionResult::new(title, parts.join("\n\n")))
}
