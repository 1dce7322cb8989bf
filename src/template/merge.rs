//! Merge-run resolver.
//!
//! Runs after every row of a sheet has been rendered. Directive flags are
//! kept in a grid parallel to the sheet and addressed by `(row, col)`.

use crate::types::{Sheet, Style, StyleRef};

use super::cell::Directives;

/// Directives of every rendered cell, indexed like the sheet grid.
#[derive(Debug, Default)]
pub struct DirectiveGrid {
    rows: Vec<Vec<Directives>>,
}

impl DirectiveGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, row: Vec<Directives>) {
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Directives> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    fn iter(&self) -> impl Iterator<Item = (usize, usize, &Directives)> {
        self.rows.iter().enumerate().flat_map(|(r, cells)| {
            cells.iter().enumerate().map(move |(c, d)| (r, c, d))
        })
    }
}

/// Turn `[v-merge]` candidates into vertical spans.
///
/// Each candidate scans upward while the cell above carries the same
/// non-empty text; the topmost match receives the span.
pub fn resolve_merges(sheet: &mut Sheet, flags: &DirectiveGrid) {
    for (row, col, directives) in flags.iter() {
        if !directives.merge_candidate {
            continue;
        }
        let text = sheet.text(row, col);
        if text.is_empty() {
            continue;
        }
        let mut top = row;
        while top > 0 && sheet.text(top - 1, col) == text {
            top -= 1;
        }
        if top == row {
            continue;
        }
        let span = u32::try_from(row - top).unwrap_or(u32::MAX);
        if let Some(origin) = sheet.cell_mut(top, col) {
            origin.vmerge = origin.vmerge.max(span);
        }
    }
}

/// Apply `[BR]` bold toggles row by row, left to right.
///
/// While the toggle is on, each following non-empty cell gets a bold copy of
/// its style. A cell is not affected by its own toggle.
pub fn apply_bold_toggles(sheet: &mut Sheet, flags: &DirectiveGrid) {
    // Derived styles keyed by the source Arc, so shared styles stay shared.
    let mut derived: Vec<(StyleRef, StyleRef)> = Vec::new();

    for (r, row) in sheet.rows.iter_mut().enumerate() {
        let mut bold = false;
        for (c, cell) in row.cells.iter_mut().enumerate() {
            if bold && !cell.text.is_empty() && !cell.style.bold {
                let bolded = match derived.iter().find(|(src, _)| src.ptr_eq(&cell.style)) {
                    Some((_, b)) => b.clone(),
                    None => {
                        let b = cell.style.derive(Style::emboldened);
                        derived.push((cell.style.clone(), b.clone()));
                        b
                    }
                };
                cell.style = bolded;
            }
            if flags.get(r, c).is_some_and(Directives::toggles_bold) {
                bold = !bold;
            }
        }
    }
}

/// Blank and hide every cell absorbed by a merge span.
///
/// Spans are clamped to the grid. Running this twice changes nothing.
pub fn materialize_merges(sheet: &mut Sheet) {
    let row_count = sheet.rows.len();
    let col_count = sheet.col_count();

    for r in 0..row_count {
        for c in 0..col_count {
            let Some(origin) = sheet.cell_mut(r, c) else {
                continue;
            };
            if origin.hidden || !origin.is_merge_origin() {
                continue;
            }
            let last_row = (r + origin.vmerge as usize).min(row_count - 1);
            let last_col = (c + origin.hmerge as usize).min(col_count - 1);
            origin.vmerge = u32::try_from(last_row - r).unwrap_or(0);
            origin.hmerge = u32::try_from(last_col - c).unwrap_or(0);

            for rr in r..=last_row {
                for cc in c..=last_col {
                    if (rr, cc) == (r, c) {
                        continue;
                    }
                    if let Some(absorbed) = sheet.cell_mut(rr, cc) {
                        absorbed.text.clear();
                        absorbed.hidden = true;
                        absorbed.hmerge = 0;
                        absorbed.vmerge = 0;
                    }
                }
            }
        }
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
    use crate::types::{Cell, Row};

    fn sheet(rows: &[&[&str]]) -> Sheet {
        let mut sheet = Sheet::new("S");
        for texts in rows {
            sheet.rows.push(Row {
                cells: texts.iter().map(|t| Cell::new(*t)).collect(),
                ..Row::default()
            });
        }
        sheet.normalize_shape();
        sheet
    }

    fn candidates(rows: usize, cols: usize, col: usize) -> DirectiveGrid {
        let mut grid = DirectiveGrid::new();
        for _ in 0..rows {
            let mut row = vec![Directives::default(); cols];
            row[col].merge_candidate = true;
            grid.push_row(row);
        }
        grid
    }

    #[test]
    fn three_equal_rows_collapse_into_one_span() {
        let mut s = sheet(&[&["A", "1"], &["A", "2"], &["A", "3"]]);
        resolve_merges(&mut s, &candidates(3, 2, 0));
        materialize_merges(&mut s);
        assert_eq!(s.rows[0].cells[0].vmerge, 2);
        assert!(!s.rows[0].cells[0].hidden);
        assert!(s.rows[1].cells[0].hidden && s.rows[2].cells[0].hidden);
        assert_eq!(s.text(1, 0), "");
        assert_eq!(s.text(2, 1), "3");
    }

    #[test]
    fn empty_candidates_never_merge() {
        let mut s = sheet(&[&[""], &[""], &[""]]);
        resolve_merges(&mut s, &candidates(3, 1, 0));
        assert!(s.rows.iter().all(|r| r.cells[0].vmerge == 0));
    }

    #[test]
    fn runs_break_on_different_text() {
        let mut s = sheet(&[&["A"], &["A"], &["B"], &["A"], &["A"]]);
        resolve_merges(&mut s, &candidates(5, 1, 0));
        let spans: Vec<u32> = s.rows.iter().map(|r| r.cells[0].vmerge).collect();
        assert_eq!(spans, [1, 0, 0, 1, 0]);
    }

    #[test]
    fn unmarked_cells_do_not_merge() {
        let mut s = sheet(&[&["A", "x"], &["A", "x"]]);
        resolve_merges(&mut s, &candidates(2, 2, 0));
        assert_eq!(s.rows[0].cells[1].vmerge, 0);
    }

    #[test]
    fn bold_toggle_applies_to_following_non_empty_cells() {
        let mut s = sheet(&[&["label", "", "value", "after"]]);
        let italic = StyleRef::new(Style {
            italic: true,
            font_size: Some(9.0),
            ..Style::default()
        });
        s.rows[0].cells[2].style = italic.clone();
        let mut grid = DirectiveGrid::new();
        let mut row = vec![Directives::default(); 4];
        row[0].bold_toggles = 1;
        row[2].bold_toggles = 1;
        grid.push_row(row);

        apply_bold_toggles(&mut s, &grid);
        let cells = &s.rows[0].cells;
        assert!(!cells[0].style.bold, "toggle cell is not bolded by itself");
        assert!(!cells[1].style.bold, "empty cells are skipped");
        assert!(cells[2].style.bold);
        assert!(cells[2].style.italic);
        assert_eq!(cells[2].style.font_size, Some(9.0));
        assert!(!cells[3].style.bold, "second toggle switches bold off");
        assert!(!italic.bold, "source style is never mutated");
    }

    #[test]
    fn materialize_is_idempotent_and_clamps() {
        let mut s = sheet(&[&["A", "B"], &["C", "D"]]);
        s.rows[0].cells[0].hmerge = 5;
        s.rows[0].cells[0].vmerge = 9;
        materialize_merges(&mut s);
        let once = s.clone();
        materialize_merges(&mut s);
        assert_eq!(s.rows, once.rows);
        assert_eq!((s.rows[0].cells[0].hmerge, s.rows[0].cells[0].vmerge), (1, 1));
        assert_eq!(s.text(1, 1), "");
    }
}
