//! Xiaohongshu note pages.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use mindpocket_core::ConversionResult;

use super::html::{collapse_whitespace, first_text, meta_content, selector};

static DETAIL_TITLE: Lazy<Selector> = Lazy::new(|| selector("#detail-title"));
static DETAIL_DESC: Lazy<Selector> = Lazy::new(|| selector("#detail-desc"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[name="og:image"], meta[property="og:image"]"#));
static TAG: Lazy<Selector> = Lazy::new(|| selector("a.tag"));

const TITLE_SUFFIX: &str = " - 小红书";

pub fn convert_xiaohongshu(html: &str) -> Option<ConversionResult> {
    let document = Html::parse_document(html);

    let title = first_text(&document, &DETAIL_TITLE).or_else(|| {
        meta_content(&document, &OG_TITLE)
            .map(|t| t.trim_end_matches(TITLE_SUFFIX).trim().to_string())
            .filter(|t| !t.is_empty())
    });
    let description = first_text(&document, &DETAIL_DESC)
        .or_else(|| meta_content(&document, &META_DESCRIPTION));

    let mut images: Vec<String> = Vec::new();
    for src in document
        .select(&OG_IMAGE)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !images.iter().any(|seen| seen == src) {
            images.push(src.to_string());
        }
    }

    let tags: Vec<String> = document
        .select(&TAG)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .map(|t| t.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{}", t))
        .collect();

    if title.is_none() && description.is_none() && images.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(title) = &title {
        parts.push(format!("# {}", title));
    }
    if let Some(description) = description {
        parts.push(description);
    }
    if !images.is_empty() {
        parts.push(
            images
                .iter()
                .map(|src| format!("![]({})", src))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    if !tags.is_empty() {
        parts.push(tags.join(" "));
    }

    Some(ConversionResult::new(title, parts.join("\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_with_detail_elements() {
        let html = r##"<html><head>
            <meta property="og:title" content="Ignored - 小红书">
            <meta name="og:image" content="https://sns-img.xhscdn.com/1.jpg">
            <meta property="og:image" content="https://sns-img.xhscdn.com/1.jpg">
            <meta property="og:image" content="https://sns-img.xhscdn.com/2.jpg">
            </head><body>
            <div id="detail-title">周末去哪儿</div>
            <div id="detail-desc">城市漫步路线</div>
            <a class="tag" href="/t/1">#citywalk</a>
            <a class="tag" href="/t/2">周末</a>
            </body></html>"##;

        let result = convert_xiaohongshu(html).unwrap();
        assert_eq!(result.title.as_deref(), Some("周末去哪儿"));
        assert_eq!(
            result.markdown,
            "# 周末去哪儿\n\n城市漫步路线\n\n![](https://sns-img.xhscdn.com/1.jpg)\n![](https://sns-img.xhscdn.com/2.jpg)\n\n#citywalk #周末"
        );
    }

    #[test]
    fn test_falls_back_to_meta() {
        let html = r#"<html><head>
            <meta property="og:title" content="Coffee notes - 小红书">
            <meta name="description" content="Pour-over ratios">
            </head><body></body></html>"#;
        let result = convert_xiaohongshu(html).unwrap();
        assert_eq!(result.title.as_deref(), Some("Coffee notes"));
        assert_eq!(result.markdown, "# Coffee notes\n\nPour-over ratios");
    }

    #[test]
    fn test_empty_page() {
        assert!(convert_xiaohongshu("<html><body><p>login</p></body></html>").is_none());
    }
}
