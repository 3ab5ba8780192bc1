//! Short plain-text descriptions derived from converted Markdown.

use once_cell::sync::Lazy;
use regex::Regex;

use mindpocket_core::defaults::DESCRIPTION_MAX_CHARS;
use mindpocket_core::truncate_chars;

pub use mindpocket_core::sanitize_ingest_error as sanitize_error;

static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#+\s+.+$").expect("valid heading regex"));
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").expect("valid image regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(.*?\)").expect("valid link regex"));
static MARKUP_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*_~`#>|\-]").expect("valid markup regex"));

/// First paragraph of `markdown` as plain text, at most 200 characters.
pub fn extract_description(markdown: &str) -> String {
    let text = HEADING_LINE.replace_all(markdown, "");
    let text = IMAGE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = MARKUP_CHARS.replace_all(&text, "");
    let text = text.trim();

    let first_paragraph = text.split("\n\n").next().unwrap_or_default();
    truncate_chars(first_paragraph, DESCRIPTION_MAX_CHARS)
        .trim()
        .to_string()
}
