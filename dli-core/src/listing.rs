//! Script listing: pull the stored script out of the switch's rendered `script.htm`.
//!
//! The switch has no machine-readable API for its script. The listing is scraped from the
//! page, so the page shape is an assumption; it lives behind [`ListingParser`] so callers
//! never depend on it.

use scraper::{ElementRef, Html, Selector};

use crate::error::Error;
use crate::script::SCRIPT_CAPACITY;

/// Phrase the switch puts in the listing table.
pub const LISTING_MARKER: &str = "Script listing";

/// The script as the switch reports it: `SCRIPT_CAPACITY` lines in line-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    lines: Vec<String>,
}

impl RemoteScript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Listing table found but not parseable. Row numbers count from the first row after the header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("row {row} has fewer than two cells")]
    MissingCells { row: usize },
    #[error("row {row} has line number {text:?}, which is not a number")]
    BadIndex { row: usize, text: String },
    #[error("row {row} has no <tt> element holding the line text")]
    MissingText { row: usize },
    #[error("line numbers are not 1..={expected} in order (found {found:?})")]
    IndexSequence { expected: usize, found: Vec<usize> },
}

/// Strategy for extracting the script from a rendered listing page.
pub trait ListingParser {
    /// `Error::UnexpectedPage` when the listing can't be located,
    /// `Error::UnexpectedFormat` when it is located but malformed.
    fn parse(&self, body: &str) -> Result<RemoteScript, Error>;
}

/// The listing is the last table on the page; its header row mentions [`LISTING_MARKER`].
/// Each following row is `<td>N</td><td>... <tt>text</tt> ...</td>`.
pub struct LastTableParser {
    table: Selector,
    row: Selector,
    cell: Selector,
    text: Selector,
}

impl LastTableParser {
    pub fn new() -> Self {
        Self {
            table: Selector::parse("table").unwrap(),
            row: Selector::parse("tr").unwrap(),
            cell: Selector::parse("td").unwrap(),
            text: Selector::parse("tt").unwrap(),
        }
    }

    fn parse_rows(&self, table: ElementRef<'_>) -> Result<RemoteScript, FormatError> {
        let mut pairs = Vec::with_capacity(SCRIPT_CAPACITY);
        // First row is the header.
        for (row, tr) in table.select(&self.row).skip(1).enumerate() {
            let mut cells = tr.select(&self.cell);
            let (index_cell, text_cell) = match (cells.next(), cells.next()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(FormatError::MissingCells { row }),
            };
            let index_text: String = index_cell.text().collect();
            let index = index_text
                .trim()
                .parse::<usize>()
                .map_err(|_| FormatError::BadIndex {
                    row,
                    text: index_text.clone(),
                })?;
            let text = text_cell
                .select(&self.text)
                .next()
                .ok_or(FormatError::MissingText { row })?
                .text()
                .collect::<String>();
            pairs.push((index, text));
        }

        let in_order = pairs.len() == SCRIPT_CAPACITY
            && pairs.iter().enumerate().all(|(i, (index, _))| *index == i + 1);
        if !in_order {
            return Err(FormatError::IndexSequence {
                expected: SCRIPT_CAPACITY,
                found: pairs.iter().map(|(index, _)| *index).collect(),
            });
        }
        Ok(RemoteScript {
            lines: pairs.into_iter().map(|(_, text)| text).collect(),
        })
    }
}

impl Default for LastTableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser for LastTableParser {
    fn parse(&self, body: &str) -> Result<RemoteScript, Error> {
        let document = Html::parse_document(body);
        let table = document
            .select(&self.table)
            .last()
            .ok_or(Error::UnexpectedPage)?;
        let table_text: String = table.text().collect();
        if !table_text.contains(LISTING_MARKER) {
            return Err(Error::UnexpectedPage);
        }
        Ok(self.parse_rows(table)?)
    }
}

/// Render a listing page the way the switch does. Used by tests and fake switches.
#[cfg(test)]
pub(crate) fn render_listing<S: AsRef<str>>(lines: &[S]) -> String {
    let mut rows = String::new();
    for (i, line) in lines.iter().enumerate() {
        rows.push_str(&format!(
            "<tr><td align=right>{}</td><td><tt>{}</tt></td></tr>\n",
            i + 1,
            line.as_ref()
        ));
    }
    format!(
        "<html><head><title>Scripting</title></head><body>\n\
         <table><tr><td><a href=\"index.htm\">Outlet control</a></td></tr></table>\n\
         <table><tr><th colspan=2>Script listing</th></tr>\n{}</table>\n\
         </body></html>",
        rows
    )
}
