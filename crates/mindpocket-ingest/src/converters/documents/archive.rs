use std::io::{Cursor, Read};
use std::sync::Arc;

use tracing::warn;
use zip::ZipArchive;

use mindpocket_core::{ConversionResult, Result};

use super::office::MAX_XML_ENTRY_BYTES;
use super::{malformed, DocumentConverter, DocumentConverterRegistry};
use crate::classify::file_extension;

const MAX_ENTRIES: usize = 1000;
const MAX_TOTAL_BYTES: u64 = 200 * 1024 * 1024;

/// Lists archive entries and converts the ones the inner registry supports.
pub struct ZipConverter {
    inner: Arc<DocumentConverterRegistry>,
}

impl ZipConverter {
    pub fn new(inner: Arc<DocumentConverterRegistry>) -> Self {
        Self { inner }
    }
}

impl DocumentConverter for ZipConverter {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".zip"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| malformed("ZIP", e))?;

        let mut listing = Vec::new();
        let mut sections = Vec::new();
        let mut total: u64 = 0;

        for i in 0..archive.len().min(MAX_ENTRIES) {
            let entry = archive.by_index(i).map_err(|e| malformed("ZIP", e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let size = entry.size();
            listing.push(format!("- {} ({} bytes)", name, size));

            let ext = file_extension(&name);
            if !self.inner.supports(&ext) {
                continue;
            }
            let remaining = MAX_TOTAL_BYTES.saturating_sub(total);
            if remaining == 0 {
                break;
            }

            let mut bytes = Vec::new();
            entry
                .take(remaining.min(MAX_XML_ENTRY_BYTES))
                .read_to_end(&mut bytes)
                .map_err(|e| malformed("ZIP", e))?;
            total += bytes.len() as u64;

            match self.inner.convert(&bytes, &ext) {
                Ok(Some(result)) => sections.push(format!("## {}\n\n{}", name, result.markdown)),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "documents",
                        entry = %name,
                        error = %e,
                        "Skipping unconvertible archive entry"
                    );
                }
            }
        }

        if listing.is_empty() {
            return Ok(None);
        }
        let mut parts = vec![listing.join("\n")];
        parts.extend(sections);
        Ok(Some(ConversionResult::new(None, parts.join("\n\n"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::documents::office::tests::build_zip;
    use mindpocket_core::Error;

    #[test]
    fn test_lists_and_converts_entries() {
        let data = build_zip(&[
            ("notes.md", b"# Notes\n\nhello"),
            ("data.csv", b"a,b\n1,2"),
            ("bin/tool.exe", b"MZ"),
        ]);
        let result = DocumentConverterRegistry::with_defaults()
            .convert(&data, ".zip")
            .unwrap()
            .unwrap();

        assert_eq!(
            result.markdown,
            "- notes.md (14 bytes)\n- data.csv (7 bytes)\n- bin/tool.exe (2 bytes)\n\n\
             ## notes.md\n\n# Notes\n\nhello\n\n\
             ## data.csv\n\n| a | b |\n| --- | --- |\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_nested_archive() {
        let inner = build_zip(&[("inner.txt", b"deep")]);
        let outer = build_zip(&[("inner.zip", &inner)]);
        let result = DocumentConverterRegistry::with_defaults()
            .convert(&outer, ".zip")
            .unwrap()
            .unwrap();
        assert!(result.markdown.contains("## inner.zip"));
        assert!(result.markdown.contains("## inner.txt\n\ndeep"));
    }

    #[test]
    fn test_bad_entry_is_skipped() {
        let data = build_zip(&[("broken.docx", b"not a zip"), ("ok.txt", b"fine")]);
        let result = DocumentConverterRegistry::with_defaults()
            .convert(&data, ".zip")
            .unwrap()
            .unwrap();
        assert!(result.markdown.contains("- broken.docx (9 bytes)"));
        assert!(!result.markdown.contains("## broken.docx"));
        assert!(result.markdown.contains("## ok.txt\n\nfine"));
    }

    #[test]
    fn test_not_a_zip() {
        let err = DocumentConverterRegistry::with_defaults()
            .convert(b"nope", ".zip")
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }
}
