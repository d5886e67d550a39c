//! Projections of parsed feed documents onto rows, cells and metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::util::last_path_segment;
use crate::xml::{Scalar, Value};

/// Sparse grid: 1-based row index → 1-based column index → cell value.
pub type Rows = BTreeMap<u32, BTreeMap<u32, Scalar>>;

/// Options for [`Spreadsheet::receive`](crate::Spreadsheet::receive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Return the evaluated value of each cell instead of its input (formula) text.
    pub get_values: bool,
}

impl ReceiveOptions {
    pub fn values() -> Self {
        Self { get_values: true }
    }
}

/// Worksheet summary derived from a cells feed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedInfo {
    pub spreadsheet_id: String,
    pub worksheet_id: String,
    pub worksheet_title: String,
    pub worksheet_updated: Option<DateTime<Utc>>,
    pub authors: String,
    /// Number of cell entries in the feed.
    pub total_cells: usize,
    /// Number of distinct rows holding at least one cell.
    pub total_rows: usize,
    pub last_row: u32,
    pub next_row: u32,
    /// Worksheet dimensions as reported by `gs:rowCount` / `gs:colCount`.
    pub row_count: Option<i64>,
    pub col_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetMetadata {
    pub title: String,
    pub updated: Option<DateTime<Utc>>,
    pub row_count: Option<i64>,
    pub col_count: Option<i64>,
}

/// A spreadsheet or worksheet listed in a feed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SheetRef {
    pub id: String,
    pub title: String,
}

/// Builds the row grid and feed info from a parsed cells feed.
///
/// Any entry without a usable `gs:cell` fails the whole extraction.
pub fn extract_cells(
    document: &Value,
    spreadsheet_id: &str,
    worksheet_id: &str,
    options: &ReceiveOptions,
    use_cell_text_values: bool,
) -> Result<(Rows, FeedInfo), Error> {
    let feed = document.get("feed").ok_or(Error::MalformedFeed)?;

    let mut rows = Rows::new();
    let mut total_cells = 0usize;
    let mut last_row = 0u32;

    for entry in feed.field("entry").into_iter().flatten() {
        let cell = entry.get("gs:cell").ok_or(Error::MalformedFeed)?;
        let row = cell_index(cell, "row")?;
        let col = cell_index(cell, "col")?;

        rows.entry(row)
            .or_default()
            .insert(col, cell_value(cell, options, use_cell_text_values));
        last_row = last_row.max(row);
        total_cells += 1;
    }

    let next_row = last_row.checked_add(1).ok_or(Error::MalformedFeed)?;
    let info = FeedInfo {
        spreadsheet_id: spreadsheet_id.to_string(),
        worksheet_id: worksheet_id.to_string(),
        worksheet_title: text_of(feed, "title"),
        worksheet_updated: timestamp_of(feed, "updated"),
        authors: authors_of(feed),
        total_cells,
        total_rows: rows.len(),
        last_row,
        next_row,
        row_count: integer_of(feed, "gs:rowCount"),
        col_count: integer_of(feed, "gs:colCount"),
    };

    Ok((rows, info))
}

/// Reads a single worksheet entry (`feeds/worksheets/<key>/private/full/<id>`).
pub fn extract_metadata(document: &Value) -> Result<WorksheetMetadata, Error> {
    let entry = document.get("entry").ok_or(Error::MalformedFeed)?;
    Ok(WorksheetMetadata {
        title: text_of(entry, "title"),
        updated: timestamp_of(entry, "updated"),
        row_count: integer_of(entry, "gs:rowCount"),
        col_count: integer_of(entry, "gs:colCount"),
    })
}

/// Lists the entries of a spreadsheets or worksheets feed.
pub fn extract_sheet_refs(document: &Value) -> Result<Vec<SheetRef>, Error> {
    let feed = document.get("feed").ok_or(Error::MalformedFeed)?;
    feed.field("entry")
        .into_iter()
        .flatten()
        .map(|entry| -> Result<SheetRef, Error> {
            let id_url = entry
                .get("id")
                .and_then(Value::text)
                .map(Scalar::to_string)
                .ok_or(Error::MalformedFeed)?;
            let id = last_path_segment(&id_url).ok_or(Error::MalformedFeed)?;
            Ok(SheetRef {
                id: id.to_string(),
                title: text_of(entry, "title"),
            })
        })
        .collect()
}

fn cell_index(cell: &Value, attr: &str) -> Result<u32, Error> {
    cell.get(attr)
        .and_then(Value::text)
        .and_then(Scalar::as_i64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n >= 1)
        .ok_or(Error::MalformedFeed)
}

fn cell_value(cell: &Value, options: &ReceiveOptions, use_cell_text_values: bool) -> Scalar {
    let text = cell.text();
    let input = cell.get("inputValue").and_then(Value::text);

    let chosen = if options.get_values {
        match cell.get("numericValue").and_then(Value::text) {
            Some(numeric) => Some(numeric),
            None if use_cell_text_values => text.or(input),
            None => input.or(text),
        }
    } else {
        input.or(text)
    };

    chosen
        .cloned()
        .unwrap_or_else(|| Scalar::Text(String::new()))
}

fn text_of(parent: &Value, key: &str) -> String {
    parent
        .get(key)
        .and_then(Value::text)
        .map(Scalar::to_string)
        .unwrap_or_default()
}

fn integer_of(parent: &Value, key: &str) -> Option<i64> {
    parent.get(key).and_then(Value::text).and_then(Scalar::as_i64)
}

fn timestamp_of(parent: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = parent.get(key).and_then(Value::text)?.to_string();
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("ignoring unparseable <{}> timestamp {:?}: {}", key, raw, e);
            None
        }
    }
}

fn authors_of(feed: &Value) -> String {
    feed.field("author")
        .into_iter()
        .flatten()
        .filter_map(|author| author.get("name").and_then(Value::text))
        .map(Scalar::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
