//! Pre-computed page geometry for a rendered sheet.
//!
//! Column widths are stored in character units and scaled so the visible
//! columns exactly fill the printable width. Row heights start from the
//! sheet's point heights and may later be grown by the PDF measurer.

use std::collections::HashMap;

use crate::types::Sheet;

use super::page::PT_TO_MM;

/// Scaled layout of one sheet, in millimetres.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    /// Millimetres per column-width unit.
    pub scale: f64,
    /// Cumulative column positions (`col_positions[i]` = x of column i's left edge)
    pub col_positions: Vec<f64>,
    /// Column widths (0 for hidden columns)
    pub col_widths: Vec<f64>,
    /// Row heights (0 for hidden rows)
    pub row_heights: Vec<f64>,
    /// Merge info lookup by (row, col)
    pub merges: HashMap<(usize, usize), MergeInfo>,
}

/// Information about a merged cell region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeInfo {
    /// True if this cell is the top-left origin of the merge
    pub is_origin: bool,
    pub origin_row: usize,
    pub origin_col: usize,
    /// Number of rows in the merge
    pub row_span: usize,
    /// Number of columns in the merge
    pub col_span: usize,
}

/// Horizontal extent of a cell, merges included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub x: f64,
    pub width: f64,
    /// Part of a merge but not its origin.
    pub skip: bool,
}

impl SheetLayout {
    /// Lay out `sheet` across `printable_width` millimetres.
    pub fn new(sheet: &Sheet, printable_width: f64) -> Self {
        let visible_units: f64 = sheet
            .columns
            .iter()
            .filter(|c| !c.hidden)
            .map(|c| c.width.max(0.0))
            .sum();
        let scale = if visible_units > 0.0 {
            printable_width / visible_units
        } else {
            0.0
        };

        let mut col_positions = Vec::with_capacity(sheet.columns.len() + 1);
        let mut col_widths = Vec::with_capacity(sheet.columns.len());
        let mut x = 0.0;
        for column in &sheet.columns {
            col_positions.push(x);
            let w = if column.hidden {
                0.0
            } else {
                column.width.max(0.0) * scale
            };
            col_widths.push(w);
            x += w;
        }
        col_positions.push(x); // Final edge

        let row_heights = sheet
            .rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                if row.hidden {
                    0.0
                } else {
                    sheet.row_height(r) * PT_TO_MM
                }
            })
            .collect();

        let row_limit = sheet.rows.len();
        let mut merges = HashMap::new();
        for (r, row) in sheet.rows.iter().enumerate() {
            let col_limit = row.cells.len().max(sheet.columns.len());
            for (c, cell) in row.cells.iter().enumerate() {
                if cell.hidden || !cell.is_merge_origin() {
                    continue;
                }
                // Spans never reach past the grid.
                let row_span = (cell.vmerge as usize).saturating_add(1).min(row_limit - r);
                let col_span = (cell.hmerge as usize).saturating_add(1).min(col_limit - c);
                for rr in r..r + row_span {
                    for cc in c..c + col_span {
                        merges.insert(
                            (rr, cc),
                            MergeInfo {
                                is_origin: rr == r && cc == c,
                                origin_row: r,
                                origin_col: c,
                                row_span,
                                col_span,
                            },
                        );
                    }
                }
            }
        }

        Self {
            scale,
            col_positions,
            col_widths,
            row_heights,
            merges,
        }
    }

    pub fn col_count(&self) -> usize {
        self.col_widths.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_heights.len()
    }

    pub fn merge(&self, row: usize, col: usize) -> Option<&MergeInfo> {
        self.merges.get(&(row, col))
    }

    /// Get total width of the sheet
    pub fn total_width(&self) -> f64 {
        self.col_positions.last().copied().unwrap_or(0.0)
    }

    pub fn row_height(&self, row: usize) -> f64 {
        self.row_heights.get(row).copied().unwrap_or(0.0)
    }

    /// Combined height of `span` rows starting at `row`.
    pub fn span_height(&self, row: usize, span: usize) -> f64 {
        self.row_heights.iter().skip(row).take(span).sum()
    }

    /// Get cell bounds along the x axis
    pub fn cell_rect(&self, row: usize, col: usize) -> CellRect {
        let x = self.col_positions.get(col).copied().unwrap_or(0.0);
        let mut width = self.col_widths.get(col).copied().unwrap_or(0.0);

        if let Some(merge) = self.merge(row, col) {
            if !merge.is_origin {
                return CellRect {
                    x,
                    width,
                    skip: true,
                };
            }
            let end_col = (col + merge.col_span).min(self.col_count());
            width = self.col_positions.get(end_col).copied().unwrap_or(x) - x;
        }

        CellRect {
            x,
            width,
            skip: false,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::types::{Cell, Column, Row};

    fn sheet(widths: &[f64], rows: usize) -> Sheet {
        let mut sheet = Sheet::new("S");
        sheet.columns = widths
            .iter()
            .map(|w| Column {
                width: *w,
                ..Column::default()
            })
            .collect();
        for _ in 0..rows {
            sheet.rows.push(Row {
                cells: vec![Cell::default(); widths.len()],
                ..Row::default()
            });
        }
        sheet
    }

    #[test]
    fn visible_columns_fill_the_printable_width() {
        let layout = SheetLayout::new(&sheet(&[10.0, 30.0], 1), 200.0);
        assert_eq!(layout.scale, 5.0);
        assert_eq!(layout.col_widths, vec![50.0, 150.0]);
        assert_eq!(layout.total_width(), 200.0);
    }

    #[test]
    fn hidden_columns_take_no_space() {
        let mut s = sheet(&[10.0, 30.0, 10.0], 1);
        s.columns[1].hidden = true;
        let layout = SheetLayout::new(&s, 100.0);
        assert_eq!(layout.col_widths, vec![50.0, 0.0, 50.0]);
        assert_eq!(layout.cell_rect(0, 2).x, 50.0);
    }

    #[test]
    fn merged_origin_spans_its_columns() {
        let mut s = sheet(&[10.0, 10.0, 20.0], 2);
        s.rows[0].cells[0].hmerge = 1;
        s.rows[0].cells[0].vmerge = 1;
        s.rows[0].cells[1].hidden = true;
        s.rows[1].cells[0].hidden = true;
        s.rows[1].cells[1].hidden = true;
        let layout = SheetLayout::new(&s, 40.0);

        let rect = layout.cell_rect(0, 0);
        assert!(!rect.skip);
        assert_eq!(rect.width, 20.0);
        assert!(layout.cell_rect(0, 1).skip);
        assert!(layout.cell_rect(1, 0).skip);
        assert!(!layout.cell_rect(1, 2).skip);
        assert_eq!(layout.merge(1, 1).unwrap().origin_row, 0);
    }

    #[test]
    fn oversized_merge_spans_stop_at_the_grid_edge() {
        let mut s = sheet(&[10.0, 10.0], 3);
        s.rows[1].cells[0].vmerge = u32::MAX;
        s.rows[1].cells[0].hmerge = u32::MAX;
        let layout = SheetLayout::new(&s, 40.0);

        let merge = layout.merge(1, 0).unwrap();
        assert_eq!((merge.row_span, merge.col_span), (2, 2));
        assert_eq!(layout.merges.len(), 4);
        assert_eq!(layout.cell_rect(1, 0).width, 40.0);
    }

    #[test]
    fn row_heights_convert_points_and_skip_hidden_rows() {
        let mut s = sheet(&[10.0], 3);
        s.rows[0].height = Some(72.0);
        s.rows[1].hidden = true;
        let layout = SheetLayout::new(&s, 100.0);
        assert!((layout.row_height(0) - 25.4).abs() < 1e-9);
        assert_eq!(layout.row_height(1), 0.0);
        assert!((layout.span_height(0, 3) - (25.4 + 15.0 * PT_TO_MM)).abs() < 1e-9);
    }

    #[test]
    fn sheet_without_visible_columns_has_zero_scale() {
        let mut s = sheet(&[10.0], 1);
        s.columns[0].hidden = true;
        let layout = SheetLayout::new(&s, 100.0);
        assert_eq!(layout.scale, 0.0);
        assert_eq!(layout.total_width(), 0.0);
    }
}
