//! Small text helpers shared by the repositories and the pipeline.

use crate::defaults::INGEST_ERROR_MAX_CHARS;

/// Truncate to at most `max` Unicode scalar values.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Prepare an ingest error for persistence.
///
/// Postgres rejects NUL bytes in text columns, so they are stripped before
/// the message is capped at [`INGEST_ERROR_MAX_CHARS`].
pub fn sanitize_ingest_error(msg: &str) -> String {
    let stripped: String = msg.chars().filter(|c| *c != '\0').collect();
    truncate_chars(&stripped, INGEST_ERROR_MAX_CHARS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("小红书笔记", 3), "小红书");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_sanitize_strips_nul_bytes() {
        assert_eq!(sanitize_ingest_error("bad\0input\0"), "badinput");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(5000);
        assert_eq!(sanitize_ingest_error(&long).chars().count(), 1000);
    }

    #[test]
    fn test_sanitize_counts_after_stripping() {
        let msg = format!("{}{}", "\0".repeat(10), "y".repeat(1000));
        let out = sanitize_ingest_error(&msg);
        assert_eq!(out.len(), 1000);
        assert!(!out.contains('\0'));
    }
}
