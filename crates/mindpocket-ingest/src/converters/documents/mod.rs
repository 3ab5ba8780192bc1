//! Extension-keyed converters for uploaded files.

mod archive;
mod media;
mod office;
mod pdf;
mod text;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use mindpocket_core::{ConversionResult, Error, Result};

pub use archive::ZipConverter;
pub use media::{AudioConverter, ImageConverter};
pub use office::{DocxConverter, LegacyDocConverter, XlsxConverter};
pub use pdf::PdfConverter;
pub use text::{
    CsvConverter, HtmlFileConverter, JsonConverter, NotebookConverter, PlainTextConverter,
    XmlConverter,
};

/// How many archives deep the default registry will descend.
const MAX_ARCHIVE_DEPTH: usize = 2;

/// Converts the bytes of one file format to Markdown.
///
/// Converters are synchronous and CPU-bound; async callers go through
/// [`DocumentConverterRegistry::convert_blocking`].
pub trait DocumentConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lowercased extensions, with dot, this converter handles.
    fn extensions(&self) -> &'static [&'static str];

    /// `Ok(None)` when the file holds no extractable content,
    /// `Err(Error::Conversion)` when it is malformed.
    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>>;
}

/// Registry of document converters keyed by extension.
#[derive(Clone, Default)]
pub struct DocumentConverterRegistry {
    converters: HashMap<&'static str, Arc<dyn DocumentConverter>>,
}

impl DocumentConverterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in converter.
    pub fn with_defaults() -> Self {
        Self::with_archive_depth(MAX_ARCHIVE_DEPTH)
    }

    fn with_archive_depth(depth: usize) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfConverter));
        registry.register(Arc::new(DocxConverter));
        registry.register(Arc::new(XlsxConverter));
        registry.register(Arc::new(LegacyDocConverter));
        registry.register(Arc::new(CsvConverter));
        registry.register(Arc::new(HtmlFileConverter));
        registry.register(Arc::new(XmlConverter));
        registry.register(Arc::new(NotebookConverter));
        registry.register(Arc::new(JsonConverter));
        registry.register(Arc::new(PlainTextConverter));
        registry.register(Arc::new(ImageConverter));
        registry.register(Arc::new(AudioConverter));
        if depth > 0 {
            let inner = Arc::new(Self::with_archive_depth(depth - 1));
            registry.register(Arc::new(ZipConverter::new(inner)));
        }
        registry
    }

    /// Register a converter for all of its extensions, replacing earlier ones.
    pub fn register(&mut self, converter: Arc<dyn DocumentConverter>) {
        for ext in converter.extensions() {
            self.converters.insert(*ext, converter.clone());
        }
    }

    pub fn supports(&self, ext: &str) -> bool {
        self.converters.contains_key(ext.to_lowercase().as_str())
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut exts: Vec<_> = self.converters.keys().copied().collect();
        exts.sort_unstable();
        exts
    }

    /// Convert `data` by extension. Unknown extensions yield `Ok(None)`.
    pub fn convert(&self, data: &[u8], ext: &str) -> Result<Option<ConversionResult>> {
        let ext = ext.to_lowercase();
        let Some(converter) = self.converters.get(ext.as_str()) else {
            debug!(subsystem = "ingest", component = "documents", ext = %ext, "No converter registered");
            return Ok(None);
        };

        debug!(
            subsystem = "ingest",
            component = "documents",
            converter = converter.name(),
            bytes = data.len(),
            "Converting document"
        );
        let result = converter.convert(data)?;
        Ok(result.filter(ConversionResult::is_usable))
    }

    /// [`Self::convert`] on the blocking thread pool.
    pub async fn convert_blocking(
        self: &Arc<Self>,
        data: Vec<u8>,
        ext: String,
    ) -> Result<Option<ConversionResult>> {
        let registry = Arc::clone(self);
        tokio::task::spawn_blocking(move || registry.convert(&data, &ext))
            .await
            .map_err(|e| Error::Internal(format!("Conversion task failed: {}", e)))?
    }
}

/// Wrap a converter failure.
pub(crate) fn malformed(kind: &str, err: impl std::fmt::Display) -> Error {
    Error::Conversion(format!("Malformed {}: {}", kind, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindpocket_core::defaults::ALLOWED_EXTENSIONS;

    #[test]
    fn test_defaults_cover_upload_extensions() {
        let registry = DocumentConverterRegistry::with_defaults();
        for ext in ALLOWED_EXTENSIONS {
            assert!(registry.supports(ext), "missing converter for {}", ext);
        }
        assert!(registry.supports(".MD"));
        assert!(registry.supports(".txt"));
        assert!(!registry.supports(".exe"));
    }

    #[test]
    fn test_unknown_extension_is_none() {
        let registry = DocumentConverterRegistry::with_defaults();
        assert!(registry.convert(b"MZ", ".exe").unwrap().is_none());
        assert!(DocumentConverterRegistry::new()
            .convert(b"text", ".txt")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        struct Shout;
        impl DocumentConverter for Shout {
            fn name(&self) -> &'static str {
                "shout"
            }
            fn extensions(&self) -> &'static [&'static str] {
                &[".txt"]
            }
            fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
                Ok(Some(ConversionResult::new(
                    None,
                    String::from_utf8_lossy(data).to_uppercase(),
                )))
            }
        }

        let mut registry = DocumentConverterRegistry::with_defaults();
        registry.register(Arc::new(Shout));
        let result = registry.convert(b"quiet", ".txt").unwrap().unwrap();
        assert_eq!(result.markdown, "QUIET");
    }

    #[test]
    fn test_empty_result_is_none() {
        let registry = DocumentConverterRegistry::with_defaults();
        assert!(registry.convert(b"   \n", ".txt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_convert_blocking() {
        let registry = Arc::new(DocumentConverterRegistry::with_defaults());
        let result = registry
            .convert_blocking(b"a,b\n1,2".to_vec(), ".csv".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.markdown, "| a | b |\n| --- | --- |\n| 1 | 2 |");
    }
}
