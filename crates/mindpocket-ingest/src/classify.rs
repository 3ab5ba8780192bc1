//! Bookmark type inference from URLs and file extensions.

use once_cell::sync::Lazy;
use regex::Regex;

use mindpocket_core::BookmarkType;

/// Ordered URL patterns; the first match wins.
static URL_TYPE_PATTERNS: Lazy<Vec<(Regex, BookmarkType)>> = Lazy::new(|| {
    [
        (r"youtube\.com|youtu\.be", BookmarkType::Video),
        (r"bilibili\.com", BookmarkType::Video),
        (r"mp\.weixin\.qq\.com", BookmarkType::Article),
        (r"(?i)\.pdf$", BookmarkType::Document),
        (r"(?i)\.(mp3|wav)$", BookmarkType::Audio),
        (r"(?i)\.(jpg|jpeg|png|gif|webp)$", BookmarkType::Image),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid URL type regex"), kind))
    .collect()
});

static FILE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^.]+$").expect("valid extension regex"));

/// Infer the bookmark type of a URL submission.
pub fn infer_type_from_url(url: &str) -> BookmarkType {
    URL_TYPE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(url))
        .map(|(_, kind)| *kind)
        .unwrap_or(BookmarkType::Link)
}

/// Infer the bookmark type of an uploaded file from its extension (with dot).
pub fn infer_type_from_extension(ext: &str) -> BookmarkType {
    match ext.to_lowercase().as_str() {
        ".pdf" | ".docx" | ".doc" | ".md" | ".markdown" | ".ipynb" => BookmarkType::Document,
        ".xlsx" | ".xls" | ".csv" => BookmarkType::Spreadsheet,
        ".mp3" | ".wav" => BookmarkType::Audio,
        ".mp4" => BookmarkType::Video,
        ".jpg" | ".jpeg" | ".png" | ".gif" | ".webp" => BookmarkType::Image,
        ".html" | ".htm" | ".xml" => BookmarkType::Article,
        _ => BookmarkType::Other,
    }
}

/// Lowercased extension of a file name including the dot, or `""`.
pub fn file_extension(name: &str) -> String {
    FILE_EXT
        .find(name)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}
