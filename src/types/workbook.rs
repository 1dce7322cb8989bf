use serde::{Deserialize, Serialize};

use super::StyleRef;
use crate::error::{Result, XlsxtError};

/// Column width used when the sheet does not define one (character units).
pub const DEFAULT_COL_WIDTH: f64 = 8.43;

/// Row height used when a row does not define one (points).
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

const MAX_SHEET_NAME_LEN: usize = 31;
const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty sheet, enforcing SpreadsheetML naming rules.
    ///
    /// # Errors
    /// `SheetCreation` for an empty, too long, duplicate (case-insensitive)
    /// or otherwise invalid name.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        validate_sheet_name(name)?;
        if self
            .sheets
            .iter()
            .any(|s| s.name.to_lowercase() == name.to_lowercase())
        {
            return Err(XlsxtError::SheetCreation(format!(
                "duplicate sheet name '{name}'"
            )));
        }
        self.sheets.push(Sheet::new(name));
        let idx = self.sheets.len() - 1;
        self.sheets
            .get_mut(idx)
            .ok_or_else(|| XlsxtError::SheetCreation(name.to_string()))
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("sheet name is empty")
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some("sheet name exceeds 31 characters")
    } else if name.contains(INVALID_SHEET_NAME_CHARS) {
        Some("sheet name contains one of []:*?/\\")
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("sheet name starts or ends with an apostrophe")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(XlsxtError::SheetCreation(format!("{reason}: '{name}'"))),
        None => Ok(()),
    }
}

/// Page orientation from `<pageSetup orientation=...>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// A sheet as a dense grid: every row holds one cell per column.
///
/// Rows and cells live in owned vectors and are addressed by
/// `(row_index, col_index)`; nothing points back at its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub orientation: Orientation,
    /// Row height for rows without an explicit height (points).
    pub default_row_height: f64,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            orientation: Orientation::Portrait,
            default_row_height: DEFAULT_ROW_HEIGHT,
        }
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.rows.get_mut(row).and_then(|r| r.cells.get_mut(col))
    }

    /// Text of a cell, or `""` outside the grid.
    pub fn text(&self, row: usize, col: usize) -> &str {
        self.cell(row, col).map_or("", |c| c.text.as_str())
    }

    /// Height of a row in points, falling back to the sheet default.
    pub fn row_height(&self, row: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|r| r.height)
            .unwrap_or(self.default_row_height)
    }

    /// Grow the column list so it covers every cell and pad short rows with
    /// blank cells, restoring the "one cell per column" shape.
    pub fn normalize_shape(&mut self) {
        let width = self
            .rows
            .iter()
            .map(|r| r.cells.len())
            .max()
            .unwrap_or(0)
            .max(self.columns.len());
        self.columns.resize_with(width, Column::default);
        for row in &mut self.rows {
            row.cells.resize_with(width, Cell::default);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Width in character units, as stored in sheet XML.
    pub width: f64,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRef>,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            width: DEFAULT_COL_WIDTH,
            hidden: false,
            style: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Explicit height in points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub hidden: bool,
    pub cells: Vec<Cell>,
}

/// Value type of a cell as written back to the package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellType {
    #[default]
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub text: String,
    pub style: StyleRef,
    pub cell_type: CellType,
    /// Additional columns absorbed to the right.
    pub hmerge: u32,
    /// Additional rows absorbed below.
    pub vmerge: u32,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_fmt: Option<String>,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_merge_origin(&self) -> bool {
        self.hmerge > 0 || self.vmerge > 0
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn add_sheet_rejects_duplicates_case_insensitively() {
        let mut wb = Workbook::new();
        wb.add_sheet("Report").unwrap();
        let err = wb.add_sheet("REPORT").unwrap_err();
        assert!(matches!(err, XlsxtError::SheetCreation(_)));
        assert_eq!(wb.sheets.len(), 1);
    }

    #[test_case(""; "empty")]
    #[test_case("a/b"; "slash")]
    #[test_case("[x]"; "brackets")]
    #[test_case("'quoted"; "leading apostrophe")]
    #[test_case("this name is definitely longer than 31"; "too long")]
    fn add_sheet_rejects_invalid_names(name: &str) {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_sheet(name),
            Err(XlsxtError::SheetCreation(_))
        ));
    }

    #[test]
    fn normalize_shape_pads_rows_and_columns() {
        let mut sheet = Sheet::new("S");
        sheet.rows.push(Row {
            cells: vec![Cell::new("a")],
            ..Row::default()
        });
        sheet.rows.push(Row {
            cells: vec![Cell::new("b"), Cell::new("c"), Cell::new("d")],
            ..Row::default()
        });
        sheet.normalize_shape();
        assert_eq!(sheet.col_count(), 3);
        assert!(sheet.rows.iter().all(|r| r.cells.len() == 3));
        assert_eq!(sheet.text(0, 2), "");
        assert_eq!(sheet.text(1, 2), "d");
        assert_eq!(sheet.text(9, 9), "");
    }

    #[test]
    fn row_height_falls_back_to_default() {
        let mut sheet = Sheet::new("S");
        sheet.rows.push(Row {
            height: Some(30.0),
            ..Row::default()
        });
        sheet.rows.push(Row::default());
        assert!((sheet.row_height(0) - 30.0).abs() < f64::EPSILON);
        assert!((sheet.row_height(1) - DEFAULT_ROW_HEIGHT).abs() < f64::EPSILON);
    }
}
