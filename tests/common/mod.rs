//! Common test utilities and assertion helpers.
//!
//! Helpers to render fixture templates, read results back through the
//! package reader and provision font directories for PDF export.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::io::Cursor;
use std::path::Path;

use xlsxt::{Sheet, Workbook, XlsxTemplate};

// Re-export fixtures for convenience
pub use super::fixtures::*;

// ============================================================================
// Rendering Helpers
// ============================================================================

/// Load template bytes and render them against JSON data.
///
/// Panics if loading or rendering fails.
#[must_use]
pub fn render(xlsx: &[u8], data: serde_json::Value) -> XlsxTemplate {
    let mut template = XlsxTemplate::from_bytes(xlsx).expect("Failed to load template");
    template.render_json(data).expect("Failed to render template");
    template
}

/// Save through the writer and parse the package again.
#[must_use]
pub fn round_trip(template: &XlsxTemplate) -> Workbook {
    let mut buf = Cursor::new(Vec::new());
    template.write(&mut buf).expect("Failed to write package");
    xlsxt::reader::read_workbook(&buf.into_inner()).expect("Failed to re-read package")
}

/// Text of one column, top to bottom.
#[must_use]
pub fn column_texts(sheet: &Sheet, col: usize) -> Vec<String> {
    (0..sheet.rows.len())
        .map(|r| sheet.text(r, col).to_string())
        .collect()
}

// ============================================================================
// Assertion Helpers
// ============================================================================

pub fn assert_cell_text(sheet: &Sheet, row: usize, col: usize, expected: &str) {
    assert_eq!(
        sheet.text(row, col),
        expected,
        "text mismatch at ({row}, {col}) in sheet '{}'",
        sheet.name
    );
}

/// Assert a vertical merge owned by `(row, col)` and that the absorbed
/// cells are hidden and blank.
pub fn assert_vmerge(sheet: &Sheet, row: usize, col: usize, span: u32) {
    let origin = sheet.cell(row, col).expect("merge origin out of range");
    assert_eq!(origin.vmerge, span, "vmerge mismatch at ({row}, {col})");
    assert!(!origin.hidden, "merge origin at ({row}, {col}) is hidden");
    for r in row + 1..=row + span as usize {
        let absorbed = sheet.cell(r, col).expect("absorbed cell out of range");
        assert!(absorbed.hidden, "absorbed cell ({r}, {col}) is visible");
        assert!(absorbed.text.is_empty(), "absorbed cell ({r}, {col}) has text");
    }
}

pub fn assert_cell_bold(sheet: &Sheet, row: usize, col: usize, bold: bool) {
    let cell = sheet.cell(row, col).expect("cell out of range");
    assert_eq!(cell.style.bold, bold, "bold mismatch at ({row}, {col})");
}

// ============================================================================
// Font Helpers
// ============================================================================

const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

/// A temporary font directory with the system DejaVu faces copied under
/// the given file stems (`"Calibri"`, `"CalibriBold"`, ...). Stems ending
/// in `Bold` get the bold face.
///
/// Returns `None` when DejaVu is not installed; callers skip the test.
#[must_use]
pub fn font_dir(stems: &[&str]) -> Option<tempfile::TempDir> {
    let regular = Path::new(DEJAVU_DIR).join("DejaVuSans.ttf");
    let bold = Path::new(DEJAVU_DIR).join("DejaVuSans-Bold.ttf");
    if !regular.exists() || !bold.exists() {
        eprintln!("skipping: DejaVu fonts not found in {DEJAVU_DIR}");
        return None;
    }
    let dir = tempfile::tempdir().unwrap();
    for stem in stems {
        let source = if stem.ends_with("Bold") { &bold } else { &regular };
        std::fs::copy(source, dir.path().join(format!("{stem}.ttf"))).unwrap();
    }
    Some(dir)
}
