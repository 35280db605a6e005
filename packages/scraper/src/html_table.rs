//! HTML table fallback extractor.
//!
//! Used when the export action answers with a page instead of a file.
//! Locates the score grid, strips markup from every cell and rebuilds each
//! row as a [`TabularRecord`] keyed by the header row.
//!
//! Ragged rows are mapped up to the shorter of the header and the row;
//! surplus cells are dropped rather than guessed at.

use std::sync::LazyLock;

use archery_scores_models::TabularRecord;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};

/// Substrings of a table's `class` or `id` that mark it as the data grid.
pub const TABLE_HINTS: &[&str] = &["grid", "data", "score", "gv", "tbl"];

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").unwrap_or_else(|_| unreachable!()));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap_or_else(|_| unreachable!()));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|(nbsp|amp|lt|gt|quot|apos));")
        .unwrap_or_else(|_| unreachable!())
});
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()));

/// Extracts the rows of the first data-grid table in `html`.
///
/// Returns an empty vec when no table carries one of [`TABLE_HINTS`]; the
/// caller decides whether that is fatal.
#[must_use]
pub fn extract(html: &str) -> Vec<TabularRecord> {
    let document = Html::parse_document(html);

    let Some(table) = find_data_table(&document) else {
        log::debug!("No table matching {TABLE_HINTS:?} found");
        return Vec::new();
    };

    let rows = own_rows(table);

    let headers: Vec<String> = rows
        .iter()
        .map(|row| own_cells(*row, "th").map(cell_text).collect::<Vec<_>>())
        .find(|cells| !cells.is_empty())
        .unwrap_or_default();
    let names = column_names(&headers);

    let records: Vec<TabularRecord> = rows
        .iter()
        .filter_map(|row| {
            let cells: Vec<ElementRef<'_>> = own_cells(*row, "td").collect();
            if cells.is_empty() {
                return None;
            }
            if cells
                .iter()
                .any(|cell| cell.select(&TABLE_SELECTOR).next().is_some())
            {
                log::debug!("Skipping row with a nested table (pager)");
                return None;
            }
            Some(map_row(&names, cells.into_iter().map(cell_text).collect()))
        })
        .collect();

    log::debug!(
        "Extracted {} rows ({} header cells) from HTML table",
        records.len(),
        headers.len()
    );
    records
}

/// The table's own `<tr>` rows, directly or through `thead`/`tbody`/`tfoot`.
/// Rows of nested tables are not included.
fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|row| row.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn own_cells<'a>(row: ElementRef<'a>, tag: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(move |cell| cell.value().name() == tag)
}

fn find_data_table(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&TABLE_SELECTOR).find(|table| {
        let class = table.attr("class").unwrap_or_default().to_ascii_lowercase();
        let id = table.attr("id").unwrap_or_default().to_ascii_lowercase();
        TABLE_HINTS
            .iter()
            .any(|hint| class.contains(hint) || id.contains(hint))
    })
}

/// Field names for each header position: the header text, or
/// `Column{j}` (1-based) when blank. Repeated names get a `_{n}` suffix.
pub(crate) fn column_names(headers: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for (j, header) in headers.iter().enumerate() {
        let base = if header.is_empty() {
            placeholder(j)
        } else {
            header.clone()
        };
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        names.push(name);
    }
    names
}

fn placeholder(index: usize) -> String {
    format!("Column{}", index + 1)
}

/// Zips a row with the header names. Without any header, every cell gets a
/// positional placeholder.
fn map_row(names: &[String], cells: Vec<String>) -> TabularRecord {
    if names.is_empty() {
        return TabularRecord::from_pairs(
            cells
                .into_iter()
                .enumerate()
                .map(|(j, value)| (placeholder(j), value)),
        );
    }
    TabularRecord::from_pairs(names.iter().cloned().zip(cells))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    clean_html(&cell.inner_html())
}

/// Strips tags, decodes entities and collapses whitespace.
#[must_use]
pub fn clean_html(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let decoded = decode_entities(&stripped);
    SPACE_RE.replace_all(&decoded, " ").trim().to_owned()
}

/// Decodes the named entities the site emits plus any numeric entity.
///
/// Single pass, so `&amp;lt;` becomes `&lt;`, not `<`. Unknown or invalid
/// entities are left as written.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let code = caps
                .get(1)
                .and_then(|d| d.as_str().parse::<u32>().ok())
                .or_else(|| {
                    caps.get(2)
                        .and_then(|h| u32::from_str_radix(h.as_str(), 16).ok())
                });
            if let Some(code) = code {
                return char::from_u32(code).map_or_else(|| caps[0].to_owned(), String::from);
            }
            match caps.get(3).map(|m| m.as_str()) {
                Some("nbsp") => " ".to_owned(),
                Some("amp") => "&".to_owned(),
                Some("lt") => "<".to_owned(),
                Some("gt") => ">".to_owned(),
                Some("quot") => "\"".to_owned(),
                Some("apos") => "'".to_owned(),
                _ => caps[0].to_owned(),
            }
        })
        .into_owned()
}
