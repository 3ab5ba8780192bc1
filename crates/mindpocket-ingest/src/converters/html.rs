//! Generic HTML to Markdown conversion over the `scraper` DOM.

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use mindpocket_core::ConversionResult;

/// Elements whose subtree never contributes content.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "svg", "iframe", "form", "head",
    "template",
];

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static CONTENT_ROOTS: Lazy<[Selector; 3]> =
    Lazy::new(|| [selector("article"), selector("main"), selector("body")]);
static TABLE_ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static TABLE_CELL: Lazy<Selector> = Lazy::new(|| selector("th, td"));
static CODE: Lazy<Selector> = Lazy::new(|| selector("code"));

/// Convert a whole HTML document to Markdown.
///
/// Returns `None` when no text survives conversion.
pub fn html_to_markdown(html: &str, source_url: Option<&str>) -> Option<ConversionResult> {
    let document = Html::parse_document(html);
    let base = source_url.and_then(|u| Url::parse(u).ok());

    let title = meta_content(&document, &OG_TITLE)
        .or_else(|| first_text(&document, &TITLE))
        .or_else(|| first_text(&document, &H1));

    let root = CONTENT_ROOTS
        .iter()
        .find_map(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let markdown = MarkdownWriter::new(base.as_ref(), &["src"]).convert(root);
    if markdown.trim().is_empty() {
        return None;
    }
    Some(ConversionResult::new(title, markdown))
}

/// `content` attribute of the first element matching `sel`, trimmed and non-empty.
pub(crate) fn meta_content(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Whitespace-collapsed text of the first element matching `sel`.
pub(crate) fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|s| !s.is_empty())
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recursive DOM to Markdown writer.
pub(crate) struct MarkdownWriter<'a> {
    base: Option<&'a Url>,
    /// Attributes consulted in order for an image source.
    image_attrs: &'a [&'a str],
    list_depth: usize,
}

impl<'a> MarkdownWriter<'a> {
    pub(crate) fn new(base: Option<&'a Url>, image_attrs: &'a [&'a str]) -> Self {
        Self {
            base,
            image_attrs,
            list_depth: 0,
        }
    }

    /// Render the children of `root` and normalize blank lines.
    pub(crate) fn convert(&mut self, root: ElementRef<'_>) -> String {
        let mut out = String::new();
        self.children(root, &mut out);
        normalize_markdown(&out)
    }

    fn children(&mut self, el: ElementRef<'_>, out: &mut String) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => push_text(out, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn inline(&mut self, el: ElementRef<'_>) -> String {
        let mut s = String::new();
        self.children(el, &mut s);
        collapse_whitespace(&s)
    }

    fn element(&mut self, el: ElementRef<'_>, out: &mut String) {
        let name = el.value().name();
        if DROPPED_ELEMENTS.contains(&name) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = self.inline(el);
                if !text.is_empty() {
                    blank_line(out);
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    out.push_str(&text);
                    blank_line(out);
                }
            }
            "p" | "div" | "section" | "article" | "main" | "figure" | "figcaption" | "dl"
            | "dd" | "dt" | "details" | "summary" | "aside" | "center" => {
                blank_line(out);
                self.children(el, out);
                blank_line(out);
            }
            "br" => {
                trim_trailing_spaces(out);
                out.push('\n');
            }
            "hr" => {
                blank_line(out);
                out.push_str("---");
                blank_line(out);
            }
            "a" => {
                let text = self.inline(el);
                let href = el
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"));
                match href {
                    Some(href) if !text.is_empty() => {
                        out.push_str(&format!("[{}]({})", text, self.resolve(href)));
                    }
                    _ => out.push_str(&text),
                }
            }
            "img" => {
                let src = self
                    .image_attrs
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .map(str::trim)
                    .find(|s| !s.is_empty() && !s.starts_with("data:"));
                if let Some(src) = src {
                    let alt = collapse_whitespace(el.value().attr("alt").unwrap_or_default());
                    out.push_str(&format!("![{}]({})", alt, self.resolve(src)));
                }
            }
            "strong" | "b" => wrap_inline(out, "**", &self.inline(el)),
            "em" | "i" => wrap_inline(out, "*", &self.inline(el)),
            "del" | "s" | "strike" => wrap_inline(out, "~~", &self.inline(el)),
            "code" => {
                let code = collapse_whitespace(&el.text().collect::<String>());
                if !code.is_empty() {
                    out.push('`');
                    out.push_str(&code);
                    out.push('`');
                }
            }
            "pre" => self.preformatted(el, out),
            "blockquote" => {
                let mut inner = String::new();
                self.children(el, &mut inner);
                let inner = normalize_markdown(&inner);
                if !inner.is_empty() {
                    blank_line(out);
                    let quoted: Vec<String> = inner
                        .lines()
                        .map(|line| {
                            if line.is_empty() {
                                ">".to_string()
                            } else {
                                format!("> {}", line)
                            }
                        })
                        .collect();
                    out.push_str(&quoted.join("\n"));
                    blank_line(out);
                }
            }
            "ul" | "ol" => self.list(el, name == "ol", out),
            "li" => {
                // A list item outside a list.
                blank_line(out);
                out.push_str("- ");
                out.push_str(&self.inline(el));
                blank_line(out);
            }
            "table" => self.table(el, out),
            _ => self.children(el, out),
        }
    }

    fn preformatted(&mut self, el: ElementRef<'_>, out: &mut String) {
        let language = el
            .select(&CODE)
            .next()
            .and_then(|code| code.value().attr("class"))
            .and_then(|class| {
                class
                    .split_whitespace()
                    .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
            })
            .unwrap_or_default()
            .to_string();
        let text: String = el.text().collect();
        let text = text.trim_end_matches(['\n', ' ', '\t']);
        if text.trim().is_empty() {
            return;
        }
        blank_line(out);
        out.push_str("```");
        out.push_str(&language);
        out.push('\n');
        out.push_str(text.trim_start_matches('\n'));
        out.push_str("\n```");
        blank_line(out);
    }

    fn list(&mut self, el: ElementRef<'_>, ordered: bool, out: &mut String) {
        let indent = "  ".repeat(self.list_depth);
        if self.list_depth == 0 {
            blank_line(out);
        } else {
            trim_trailing_spaces(out);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        self.list_depth += 1;
        let mut index = 1;
        for item in el.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                continue;
            }
            let mut body = String::new();
            self.children(item, &mut body);
            let body = normalize_markdown(&body);
            let marker = if ordered {
                format!("{}. ", index)
            } else {
                "- ".to_string()
            };
            index += 1;

            out.push_str(&indent);
            out.push_str(&marker);
            let nested = format!("{}  ", indent);
            let continuation = format!("\n{}", nested);
            let mut lines = body.lines().filter(|l| !l.trim().is_empty());
            if let Some(first) = lines.next() {
                out.push_str(first);
            }
            for line in lines {
                if line.starts_with(&nested) {
                    out.push('\n');
                    out.push_str(line);
                } else {
                    out.push_str(&continuation);
                    out.push_str(line);
                }
            }
            out.push('\n');
        }
        self.list_depth -= 1;

        if self.list_depth == 0 {
            blank_line(out);
        }
    }

    fn table(&mut self, el: ElementRef<'_>, out: &mut String) {
        let rows: Vec<Vec<String>> = el
            .select(&TABLE_ROW)
            .map(|row| {
                row.select(&TABLE_CELL)
                    .map(|cell| self.inline(cell).replace('|', "\\|"))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();
        let markdown = pipe_table(&rows);
        if !markdown.is_empty() {
            blank_line(out);
            out.push_str(&markdown);
            blank_line(out);
        }
    }

    fn resolve(&self, href: &str) -> String {
        match self.base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}

/// Render rows as a pipe table with the first row as header.
pub(crate) fn pipe_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let render_row = |row: &[String]| {
        let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
        cells.resize(width, "");
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }
    lines.join("\n")
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !(out.is_empty() || out.ends_with(char::is_whitespace)) {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn wrap_inline(out: &mut String, marker: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(marker);
    out.push_str(text);
    out.push_str(marker);
}

fn trim_trailing_spaces(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
}

fn blank_line(out: &mut String) {
    trim_trailing_spaces(out);
    if out.is_empty() || out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}

/// Trim line ends, collapse blank runs outside code fences, trim the result.
pub(crate) fn normalize_markdown(s: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut previous_blank = true;

    for line in s.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if in_fence {
            lines.push(line);
            previous_blank = false;
            continue;
        }
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}
