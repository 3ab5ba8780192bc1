//! Office documents: OOXML via `zip` + `quick-xml`, legacy binaries by scraping.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use mindpocket_core::{ConversionResult, Result};

use super::{malformed, DocumentConverter};
use crate::converters::html::{normalize_markdown, pipe_table};

/// Maximum decompressed bytes read from a single ZIP entry.
pub(super) const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Column `XFD`, the last one Excel addresses.
const XLSX_MAX_COLUMN: u32 = 16_383;
const XLSX_MAX_TABLE_COLUMNS: usize = 256;
const XLSX_MAX_TABLE_CELLS: usize = 1_000_000;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(super) fn read_entry_bounded<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: u64,
    kind: &str,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(|e| malformed(kind, e))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| malformed(kind, e))?;
    if out.len() as u64 >= max_bytes {
        return Err(malformed(
            kind,
            format!("entry {} exceeds size limit ({} bytes)", name, max_bytes),
        ));
    }
    Ok(out)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

// =============================================================================
// DOCX
// =============================================================================

/// Word documents. Paragraph styles `Title` and `Heading1..6` become headings.
pub struct DocxConverter;

impl DocumentConverter for DocxConverter {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".docx"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| malformed("DOCX", e))?;
        let xml = read_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES, "DOCX")?;
        let (title, markdown) = docx_markdown(&xml)?;
        if markdown.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(title, markdown)))
    }
}

fn heading_level(e: &BytesStart<'_>) -> Option<usize> {
    let style = e
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| String::from_utf8_lossy(&a.value).to_lowercase().replace(' ', ""))?;
    if style == "title" {
        return Some(1);
    }
    style
        .strip_prefix("heading")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=6).contains(n))
}

fn docx_markdown(xml: &[u8]) -> Result<(Option<String>, String)> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut title = None;
    let mut current = String::new();
    let mut heading: Option<usize> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    current.clear();
                    heading = None;
                }
                b"t" => in_text = true,
                b"pStyle" => heading = heading_level(&e),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"pStyle" => heading = heading_level(&e),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| malformed("DOCX", e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        match heading {
                            Some(level) => {
                                if title.is_none() && level == 1 {
                                    title = Some(text.to_string());
                                }
                                paragraphs.push(format!("{} {}", "#".repeat(level), text));
                            }
                            None => paragraphs.push(text.to_string()),
                        }
                    }
                    current.clear();
                    heading = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed("DOCX", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok((title, paragraphs.join("\n\n")))
}

// =============================================================================
// XLSX
// =============================================================================

/// Excel workbooks. One pipe table per worksheet.
pub struct XlsxConverter;

impl DocumentConverter for XlsxConverter {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".xlsx"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| malformed("XLSX", e))?;

        let has_shared = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
        let shared = if has_shared {
            let xml = read_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES, "XLSX")?;
            shared_strings(&xml)?
        } else {
            Vec::new()
        };

        let mut sheets: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|n| {
                let number = n
                    .strip_prefix("xl/worksheets/sheet")?
                    .strip_suffix(".xml")?
                    .parse::<u32>()
                    .ok()?;
                Some((number, n.to_string()))
            })
            .collect();
        sheets.sort();

        let mut sections = Vec::new();
        for (number, name) in sheets.into_iter().take(XLSX_MAX_SHEETS) {
            let xml = read_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES, "XLSX")?;
            let rows = sheet_rows(&xml, &shared)?;
            if rows.is_empty() {
                continue;
            }
            sections.push(format!("## Sheet{}\n\n{}", number, pipe_table(&rows)));
        }

        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(None, sections.join("\n\n"))))
    }
}

fn shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(te)) if in_text && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(|e| malformed("XLSX", e))?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed("XLSX", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column and one-based row of an `A1`-style reference.
///
/// `Ok(None)` when the reference has no column letters; an error when the
/// column lies past `XFD`.
fn parse_cell_ref(reference: &str) -> Result<Option<(u32, u32)>> {
    let letters: String = reference.chars().take_while(char::is_ascii_alphabetic).collect();
    if letters.is_empty() {
        return Ok(None);
    }
    let out_of_range = || malformed("XLSX", format!("cell reference out of range: {}", reference));
    let mut col = 0u32;
    for b in letters.to_ascii_uppercase().bytes() {
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(u32::from(b - b'A' + 1)))
            .filter(|c| *c <= XLSX_MAX_COLUMN + 1)
            .ok_or_else(out_of_range)?;
    }
    let Ok(row) = reference[letters.len()..].parse() else {
        return Ok(None);
    };
    Ok(Some((col - 1, row)))
}

struct CellStart {
    row: u32,
    col: u32,
    kind: String,
}

fn cell_text(kind: &str, raw: &str, shared: &[String]) -> String {
    let text = match kind {
        "s" => raw
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        "b" => match raw {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    };
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut cells: BTreeMap<(u32, u32), String> = BTreeMap::new();
    let mut row_number = 0u32;
    let mut next_col = 0u32;
    let mut cell: Option<CellStart> = None;
    let mut in_value = false;
    let mut value = String::new();

    loop {
        if cells.len() >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_number = attr(&e, b"r")
                        .and_then(|r| r.parse().ok())
                        .unwrap_or(row_number + 1);
                    next_col = 0;
                }
                b"c" => {
                    let parsed = match attr(&e, b"r") {
                        Some(r) => parse_cell_ref(&r)?,
                        None => None,
                    };
                    let (col, row) = parsed.unwrap_or((next_col, row_number));
                    if col > XLSX_MAX_COLUMN {
                        return Err(malformed("XLSX", "too many columns"));
                    }
                    next_col = col + 1;
                    cell = Some(CellStart {
                        row,
                        col,
                        kind: attr(&e, b"t").unwrap_or_default(),
                    });
                    value.clear();
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                value.push_str(&te.unescape().map_err(|e| malformed("XLSX", e))?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(start) = cell.take() {
                        let text = cell_text(&start.kind, value.trim(), shared);
                        if !text.is_empty() {
                            cells.insert((start.row, start.col), text);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed("XLSX", e)),
            _ => {}
        }
        buf.clear();
    }

    // Empty columns are dropped; the table keeps the used ones in order.
    let used: BTreeSet<u32> = cells.keys().map(|(_, col)| *col).collect();
    let columns: BTreeMap<u32, usize> = used
        .into_iter()
        .take(XLSX_MAX_TABLE_COLUMNS)
        .enumerate()
        .map(|(index, col)| (col, index))
        .collect();
    let width = columns.len();
    if width == 0 {
        return Ok(Vec::new());
    }
    let max_rows = (XLSX_MAX_TABLE_CELLS / width).max(1);

    let mut rows: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for ((row, col), text) in cells {
        let Some(&index) = columns.get(&col) else {
            continue;
        };
        if !rows.contains_key(&row) && rows.len() >= max_rows {
            break;
        }
        rows.entry(row).or_insert_with(|| vec![String::new(); width])[index] = text;
    }
    Ok(rows.into_values().collect())
}

// =============================================================================
// LEGACY (.doc / .xls)
// =============================================================================

/// Pre-2007 Office binaries. Recovers printable text runs from the compound file.
pub struct LegacyDocConverter;

const MIN_UTF16_RUN: usize = 4;
const MIN_ASCII_RUN: usize = 8;

impl DocumentConverter for LegacyDocConverter {
    fn name(&self) -> &'static str {
        "legacy-office"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".doc", ".xls"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        if !data.starts_with(&OLE_MAGIC) {
            return Err(malformed("legacy Office document", "missing compound file header"));
        }

        let wide = utf16_runs(data);
        let narrow = ascii_runs(data);
        let total = |runs: &[String]| runs.iter().map(|r| r.chars().count()).sum::<usize>();
        let runs = if total(&wide) >= total(&narrow) { wide } else { narrow };

        let markdown = normalize_markdown(&runs.join("\n\n"));
        if markdown.is_empty() {
            return Ok(None);
        }
        Ok(Some(ConversionResult::new(None, markdown)))
    }
}

fn is_text_char(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t' | ' '..='~')
        || ('\u{00a0}'..='\u{024f}').contains(&c)
        || ('\u{3000}'..='\u{303f}').contains(&c)
        || ('\u{4e00}'..='\u{9fff}').contains(&c)
        || ('\u{ff00}'..='\u{ffef}').contains(&c)
}

fn push_run(runs: &mut Vec<String>, current: &mut String, min_chars: usize) {
    let run = current.trim();
    if run.chars().filter(|c| !c.is_whitespace()).count() >= min_chars {
        runs.push(run.replace('\r', "\n"));
    }
    current.clear();
}

fn utf16_runs(data: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for pair in data.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)).filter(|c| is_text_char(*c)) {
            Some(c) => current.push(c),
            None => push_run(&mut runs, &mut current, MIN_UTF16_RUN),
        }
    }
    push_run(&mut runs, &mut current, MIN_UTF16_RUN);
    runs
}

fn ascii_runs(data: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in data {
        let c = char::from(b);
        if b.is_ascii() && is_text_char(c) {
            current.push(c);
        } else {
            push_run(&mut runs, &mut current, MIN_ASCII_RUN);
        }
    }
    push_run(&mut runs, &mut current, MIN_ASCII_RUN);
    runs
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use mindpocket_core::Error;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Summary</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Revenue </w:t></w:r><w:r><w:t>grew &amp; held.</w:t></w:r></w:p>
    <w:p></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_docx_paragraphs_and_headings() {
        let data = build_zip(&[("word/document.xml", DOCUMENT_XML.as_bytes())]);
        let result = DocxConverter.convert(&data).unwrap().unwrap();
        assert_eq!(result.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(
            result.markdown,
            "# Quarterly Report\n\n## Summary\n\nRevenue grew & held."
        );
    }

    #[test]
    fn test_docx_errors() {
        let err = DocxConverter.convert(b"not a zip").unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));

        let data = build_zip(&[("other.xml", b"<x/>")]);
        assert!(matches!(DocxConverter.convert(&data), Err(Error::Conversion(_))));
    }

    #[test]
    fn test_xlsx_shared_inline_and_numeric_cells() {
        let shared = r#"<sst><si><t>Name</t></si><si><t>Qty</t></si>
            <si><r><t>Ap</t></r><r><t>ple</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
            <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>3</v></c></row>
            <row r="3"><c r="A3" t="inlineStr"><is><t>Pear</t></is></c></row>
            </sheetData></worksheet>"#;
        let sheet2 = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1.5</v></c></row></sheetData></worksheet>"#;
        let data = build_zip(&[
            ("xl/sharedStrings.xml", shared.as_bytes()),
            ("xl/worksheets/sheet2.xml", sheet2.as_bytes()),
            ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
        ]);

        let result = XlsxConverter.convert(&data).unwrap().unwrap();
        assert_eq!(
            result.markdown,
            "## Sheet1\n\n| Name | Qty |\n| --- | --- |\n| Apple | 3 |\n| Pear |  |\n\n## Sheet2\n\n| 1.5 |\n| --- |"
        );
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1").unwrap(), Some((0, 1)));
        assert_eq!(parse_cell_ref("AB12").unwrap(), Some((27, 12)));
        assert_eq!(parse_cell_ref("XFD3").unwrap(), Some((16_383, 3)));
        assert_eq!(parse_cell_ref("12").unwrap(), None);
        assert!(parse_cell_ref("XFE1").is_err());
        assert!(parse_cell_ref("ZZZZZZ1").is_err());
        assert!(parse_cell_ref("AAAAAAAAAAAAAAAA1").is_err());
    }

    #[test]
    fn test_xlsx_rejects_column_past_xfd() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#;
        let data = build_zip(&[("xl/worksheets/sheet1.xml", sheet.as_bytes())]);
        assert!(matches!(XlsxConverter.convert(&data), Err(Error::Conversion(_))));
    }

    #[test]
    fn test_xlsx_sparse_columns_are_compacted() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="XFD1"><v>2</v></c></row>
            <row r="2"><c r="A2"><v>3</v></c></row>
            </sheetData></worksheet>"#;
        let rows = sheet_rows(sheet.as_bytes(), &[]).unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), "2".to_string()], vec!["3".to_string(), String::new()]]);
    }

    #[test]
    fn test_legacy_doc_utf16_text() {
        let mut data = OLE_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 8]);
        for unit in "Hello legacy world".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.extend_from_slice(&[0u8; 16]);

        let result = LegacyDocConverter.convert(&data).unwrap().unwrap();
        assert_eq!(result.markdown, "Hello legacy world");
    }

    #[test]
    fn test_legacy_doc_requires_ole_header() {
        assert!(matches!(
            LegacyDocConverter.convert(b"plain text pretending"),
            Err(Error::Conversion(_))
        ));
    }
}
