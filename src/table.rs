//! In-memory table model shared by every pipeline stage, plus the elastic
//! terminal rendering used by `preview` and `sync` without an output dir.

use std::borrow::Cow;
use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::error::ReadError;

/// Label given to header-candidate cells that carry no text.
pub const EMPTY_LABEL: &str = "<blank>";

/// Raw cell value as read from the source. Never coerced after reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => f.write_str(text),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Normalizes a header-candidate cell into a label.
pub fn header_label(cell: &Cell) -> String {
    if cell.is_blank() {
        EMPTY_LABEL.to_string()
    } else {
        cell.to_string()
    }
}

/// Rectangular grid of cells. `headers` holds the current labels and every
/// row in `rows` has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub source: String,
    pub sheet: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table from explicit labels and data rows, padding or
    /// truncating rows to the label count.
    pub fn new(
        source: impl Into<String>,
        sheet: Option<String>,
        headers: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self {
            source: source.into(),
            sheet,
            headers,
            rows,
        }
    }

    /// Builds a table from physical rows. The first row becomes the
    /// header-candidate labels; ragged rows are padded to the widest row.
    pub fn from_physical_rows(
        source: impl Into<String>,
        sheet: Option<String>,
        physical: Vec<Vec<Cell>>,
    ) -> Self {
        let width = physical.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = physical.into_iter();
        let headers = match rows.next() {
            Some(mut first) => {
                first.resize(width, Cell::Empty);
                first.iter().map(header_label).collect()
            }
            None => Vec::new(),
        };
        Self::new(source, sheet, headers, rows.collect())
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the source had no physical rows at all.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Human-readable origin such as `book.xlsx[Sheet1]`.
    pub fn origin(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{}[{}]", self.source, sheet),
            None => self.source.clone(),
        }
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::to_string).collect())
            .collect()
    }

    pub fn render(&self, limit: Option<usize>) -> String {
        let mut rows = self.display_rows();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        render_table(&self.headers, &rows)
    }
}

/// Every sheet of a workbook, in workbook order.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub source: String,
    pub sheets: Vec<Table>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets
            .iter()
            .map(|sheet| sheet.sheet.clone().unwrap_or_default())
            .collect()
    }

    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.sheet.as_deref() == Some(name))
    }

    /// Resolves a requested sheet, failing with the list of available names.
    pub fn require_sheet(&self, name: &str) -> Result<usize, ReadError> {
        self.sheet_index(name).ok_or_else(|| ReadError::SheetNotFound {
            sheet: name.to_string(),
            available: self.sheet_names(),
        })
    }

    /// Swaps the sheet at `index` for `table`, keeping its name.
    pub fn replace_sheet(&mut self, index: usize, mut table: Table) {
        if let Some(slot) = self.sheets.get_mut(index) {
            table.sheet = slot.sheet.clone();
            *slot = table;
        }
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(sanitized.as_ref()));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from(*v)).collect()
    }

    #[test]
    fn physical_rows_pad_to_widest_row_and_label_blanks() {
        let table = Table::from_physical_rows(
            "a.csv",
            None,
            vec![text_row(&["id", ""]), text_row(&["1", "x", "extra"])],
        );
        assert_eq!(table.headers, vec!["id", EMPTY_LABEL, EMPTY_LABEL]);
        assert_eq!(table.rows[0].len(), 3);
    }

    #[test]
    fn empty_source_yields_empty_table() {
        let table = Table::from_physical_rows("a.csv", None, Vec::new());
        assert!(table.is_empty());
        assert_eq!(table.width(), 0);
    }

    #[test]
    fn replace_sheet_keeps_original_name() {
        let mut workbook = Workbook {
            source: "book.xlsx".into(),
            sheets: vec![Table::new("book.xlsx", Some("Data".into()), vec![], vec![])],
        };
        let replacement = Table::new("book.xlsx", None, vec!["a".into()], vec![]);
        workbook.replace_sheet(0, replacement);
        assert_eq!(workbook.sheets[0].sheet.as_deref(), Some("Data"));
        assert_eq!(workbook.sheets[0].headers, vec!["a"]);
    }

    #[test]
    fn float_cells_render_without_trailing_zeroes() {
        assert_eq!(Cell::Float(3.0).to_string(), "3");
        assert_eq!(Cell::Float(12.5).to_string(), "12.5");
        assert_eq!(Cell::Empty.to_string(), "");
    }
}
