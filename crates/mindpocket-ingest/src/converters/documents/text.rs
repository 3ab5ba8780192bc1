//! Text-based formats.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use mindpocket_core::{ConversionResult, Result};

use super::{malformed, DocumentConverter};
use crate::converters::html::{html_to_markdown, pipe_table};

fn decode_utf8(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

fn fenced(language: &str, body: &str) -> String {
    format!("```{}\n{}\n```", language, body.trim_end_matches('\n'))
}

// =============================================================================
// PLAIN TEXT / MARKDOWN
// =============================================================================

/// Markdown and plain text pass through unchanged.
pub struct PlainTextConverter;

impl DocumentConverter for PlainTextConverter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".md", ".markdown", ".txt"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let text = decode_utf8(data);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let title = text
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string());
        Ok(Some(ConversionResult::new(title, text)))
    }
}

// =============================================================================
// CSV
// =============================================================================

pub struct CsvConverter;

impl DocumentConverter for CsvConverter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".csv"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let rows: Vec<Vec<String>> = parse_csv(&decode_utf8(data))
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        cell.split_whitespace()
                            .collect::<Vec<_>>()
                            .join(" ")
                            .replace('|', "\\|")
                    })
                    .collect()
            })
            .collect();
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(None, pipe_table(&rows))))
    }
}

/// RFC 4180 records: quoted fields may hold separators, newlines and `""`.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

// =============================================================================
// HTML / XML
// =============================================================================

pub struct HtmlFileConverter;

impl DocumentConverter for HtmlFileConverter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".html", ".htm"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        Ok(html_to_markdown(&decode_utf8(data), None))
    }
}

/// Well-formed XML, fenced, titled by its root element.
pub struct XmlConverter;

impl DocumentConverter for XmlConverter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".xml"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let source = decode_utf8(data);
        let mut reader = Reader::from_str(&source);
        reader.config_mut().check_end_names = true;

        let mut root: Option<String> = None;
        let mut depth = 0usize;
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if root.is_none() {
                        root = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    }
                    depth += 1;
                }
                Ok(Event::Empty(e)) if root.is_none() => {
                    root = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed("XML", e)),
                _ => {}
            }
        }
        if depth != 0 {
            return Err(malformed("XML", "unclosed elements at end of document"));
        }

        let Some(root) = root else {
            return Ok(None);
        };
        Ok(Some(ConversionResult::new(
            Some(root),
            fenced("xml", source.trim()),
        )))
    }
}

// =============================================================================
// JSON / NOTEBOOK
// =============================================================================

pub struct JsonConverter;

impl DocumentConverter for JsonConverter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let value: JsonValue = serde_json::from_slice(data).map_err(|e| malformed("JSON", e))?;
        let pretty = serde_json::to_string_pretty(&value)?;
        Ok(Some(ConversionResult::new(None, fenced("json", &pretty))))
    }
}

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<NotebookCell>,
    #[serde(default)]
    metadata: JsonValue,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    cell_type: String,
    #[serde(default)]
    source: JsonValue,
    #[serde(default)]
    outputs: Vec<JsonValue>,
}

/// nbformat stores multi-line text either as a string or a list of lines.
fn multiline(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(lines) => lines.iter().filter_map(JsonValue::as_str).collect(),
        _ => String::new(),
    }
}

fn output_text(output: &JsonValue) -> String {
    match output.get("output_type").and_then(JsonValue::as_str) {
        Some("stream") => multiline(output.get("text").unwrap_or(&JsonValue::Null)),
        Some("execute_result") | Some("display_data") => output
            .get("data")
            .and_then(|d| d.get("text/plain"))
            .map(multiline)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Jupyter notebooks: markdown cells verbatim, code and outputs fenced.
pub struct NotebookConverter;

impl DocumentConverter for NotebookConverter {
    fn name(&self) -> &'static str {
        "notebook"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".ipynb"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let notebook: Notebook =
            serde_json::from_slice(data).map_err(|e| malformed("notebook", e))?;

        let language = notebook
            .metadata
            .pointer("/kernelspec/language")
            .or_else(|| notebook.metadata.pointer("/language_info/name"))
            .and_then(JsonValue::as_str)
            .unwrap_or("python")
            .to_string();

        let mut title = None;
        let mut blocks = Vec::new();
        for cell in &notebook.cells {
            let source = multiline(&cell.source);
            let source = source.trim();
            match cell.cell_type.as_str() {
                "markdown" => {
                    if source.is_empty() {
                        continue;
                    }
                    if title.is_none() {
                        title = source
                            .lines()
                            .find_map(|l| l.strip_prefix("# "))
                            .map(|t| t.trim().to_string());
                    }
                    blocks.push(source.to_string());
                }
                "code" => {
                    if !source.is_empty() {
                        blocks.push(fenced(&language, source));
                    }
                    for output in &cell.outputs {
                        let text = output_text(output);
                        if !text.trim().is_empty() {
                            blocks.push(fenced("output", &text));
                        }
                    }
                }
                _ => {
                    if !source.is_empty() {
                        blocks.push(source.to_string());
                    }
                }
            }
        }

        if blocks.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(title, blocks.join("\n\n"))))
    }
}
