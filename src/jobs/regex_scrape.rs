//! Regex scraper for downloaded regexlib-style pages
//!
//! Each page lists expressions in table rows marked `class="expression"`;
//! the regex itself is the leading text of the first element inside the
//! row's second cell. Rows that do not have that shape, or whose regex
//! spans several lines, are skipped.

use crate::error::{TransformError, TransformResult};
use crate::pool::{Transform, WorkItem};
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Selector for the regex cell of every expression row
const REGEX_CELL_SELECTOR: &str = "tr.expression > :nth-child(2)";

/// One downloaded page to scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTask {
    /// Category the page was downloaded for
    pub category: String,

    /// Local HTML file
    pub path: PathBuf,
}

impl ScrapeTask {
    pub fn new(category: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            category: category.into(),
            path: path.into(),
        }
    }
}

impl WorkItem for ScrapeTask {
    fn label(&self) -> String {
        format!("{}:{}", self.category, self.path.display())
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegexRow {
    pub category: String,
    pub regex: String,
}

/// Transform extracting `RegexRow`s from an HTML page
#[derive(Debug, Clone)]
pub struct RegexScraper {
    cell_selector: Selector,
}

impl RegexScraper {
    pub fn new() -> Self {
        Self {
            cell_selector: Selector::parse(REGEX_CELL_SELECTOR)
                .expect("Invalid regex cell selector"),
        }
    }

    /// Extract every valid row from an HTML document
    pub fn scrape_document(&self, category: &str, html: &str) -> Vec<RegexRow> {
        let document = Html::parse_document(html);

        document
            .select(&self.cell_selector)
            .filter_map(|cell| {
                let row = to_row(category, cell);
                if row.is_none() {
                    trace!(category = category, "Skipping malformed expression row");
                }
                row
            })
            .collect()
    }
}

impl Default for RegexScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<ScrapeTask> for RegexScraper {
    type Record = RegexRow;

    fn apply(&self, task: &ScrapeTask) -> TransformResult<Vec<RegexRow>> {
        let bytes = fs::read(&task.path).map_err(|source| TransformError::Read {
            path: task.path.clone(),
            source,
        })?;
        let html = String::from_utf8(bytes).map_err(|e| TransformError::Encoding {
            path: task.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(self.scrape_document(&task.category, &html))
    }
}

/// Build a row from a regex cell, or `None` if the cell is malformed
fn to_row(category: &str, cell: ElementRef<'_>) -> Option<RegexRow> {
    let first_child = cell.children().find_map(ElementRef::wrap)?;
    let raw = leading_text(first_child)?;

    Some(RegexRow {
        category: category.to_string(),
        regex: clean_regex(&raw)?,
    })
}

/// Text of an element up to its first child element or comment
fn leading_text(element: ElementRef<'_>) -> Option<String> {
    let mut text = String::new();
    for node in element.children() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(_) | Node::Comment(_) => break,
            _ => {}
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Normalize a scraped regex
///
/// Decodes entities left over after HTML parsing, rejects multi-line
/// values, removes spaces and one pair of surrounding double quotes.
pub fn clean_regex(raw: &str) -> Option<String> {
    let unescaped = unescape_entities(raw);
    if unescaped.contains('\n') {
        return None;
    }

    let clean: String = unescaped.chars().filter(|&c| c != ' ').collect();
    if clean.starts_with('"') && clean.ends_with('"') {
        if clean.len() >= 2 {
            return Some(clean[1..clean.len() - 1].to_string());
        }
        return Some(String::new());
    }

    Some(clean)
}

/// Decode character references left in text after the page was parsed
///
/// The text is run through the HTML5 tokenizer once more, so the full named
/// entity table applies, including legacy names and numeric references
/// written without the closing `;`. `<` is escaped first so it stays text.
fn unescape_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let fragment = Html::parse_fragment(&input.replace('<', "&lt;"));
    fragment.root_element().text().collect()
}

/// Enumerate `<html_dir>/<category>/*.html`, sorted by category then file
pub fn discover_tasks(html_dir: &Path) -> io::Result<Vec<ScrapeTask>> {
    let mut categories = Vec::new();
    for entry in fs::read_dir(html_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            categories.push(path);
        }
    }
    categories.sort();

    let mut tasks = Vec::new();
    for dir in categories {
        let Some(category) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut pages = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "html") {
                pages.push(path);
            }
        }
        pages.sort();

        tasks.extend(pages.into_iter().map(|p| ScrapeTask::new(category.clone(), p)));
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: &str = r#"<html><body><table>
        <tr class="expression"><td>Title</td><td><div>^\d{5}$</div></td></tr>
        <tr class="expression"><td>Quoted</td><td><div>"[a-z] +"</div></td></tr>
        <tr class="expression"><td>Empty</td><td></td></tr>
        <tr class="expression"><td>Multi</td><td><div>a
b</div></td></tr>
        <tr class="expression"><td>Escaped</td><td><div>&amp;lt;b&amp;gt;</div></td></tr>
        <tr class="other"><td>Ignored</td><td><div>zzz</div></td></tr>
    </table></body></html>"#;

    #[test]
    fn test_scrape_document() {
        let rows = RegexScraper::new().scrape_document("zip", PAGE);
        let regexes: Vec<_> = rows.iter().map(|r| r.regex.as_str()).collect();

        assert_eq!(regexes, vec![r"^\d{5}$", "[a-z]+", "<b>"]);
        assert!(rows.iter().all(|r| r.category == "zip"));
    }

    #[test]
    fn test_clean_regex() {
        assert_eq!(clean_regex(" ^a b$ ").as_deref(), Some("^ab$"));
        assert_eq!(clean_regex("\"abc\"").as_deref(), Some("abc"));
        assert_eq!(clean_regex("\"").as_deref(), Some(""));
        assert_eq!(clean_regex("a\nb"), None);
        assert_eq!(clean_regex("&#65;&#x42;&unknown;").as_deref(), Some("AB&unknown;"));
    }

    #[test]
    fn test_clean_regex_decodes_entities() {
        assert_eq!(clean_regex("&copy;").as_deref(), Some("\u{a9}"));
        assert_eq!(clean_regex("&hellip;").as_deref(), Some("\u{2026}"));
        assert_eq!(clean_regex("&amp").as_deref(), Some("&"));
        assert_eq!(clean_regex("&lt").as_deref(), Some("<"));
        assert_eq!(clean_regex("&#65").as_deref(), Some("A"));
        assert_eq!(clean_regex("a<b&gt;c").as_deref(), Some("a<b>c"));
        assert_eq!(clean_regex(r"^\d+&amp;\w$").as_deref(), Some(r"^\d+&\w$"));
    }

    #[test]
    fn test_leading_text_stops_at_child() {
        let rows = RegexScraper::new().scrape_document(
            "email",
            r#"<table><tr class="expression"><td>x</td><td><span>\w+<b>@</b>tail</span></td></tr></table>"#,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].regex, r"\w+");
    }

    #[test]
    fn test_apply_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00.html");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let result = RegexScraper::new().apply(&ScrapeTask::new("bad", &path));
        assert!(matches!(result, Err(TransformError::Encoding { .. })));
    }

    #[test]
    fn test_discover_tasks() {
        let dir = tempdir().unwrap();
        for (cat, file) in [("url", "01.html"), ("email", "00.html"), ("url", "00.html")] {
            fs::create_dir_all(dir.path().join(cat)).unwrap();
            fs::write(dir.path().join(cat).join(file), "").unwrap();
        }
        fs::write(dir.path().join("stray.html"), "").unwrap();

        let tasks = discover_tasks(dir.path()).unwrap();
        let labels: Vec<_> = tasks
            .iter()
            .map(|t| {
                format!(
                    "{}/{}",
                    t.category,
                    t.path.file_name().unwrap().to_str().unwrap()
                )
            })
            .collect();
        assert_eq!(labels, vec!["email/00.html", "url/00.html", "url/01.html"]);
    }
}
