//! Layout engine for HTML and PDF export.
//!
//! This module handles:
//! - Scaling column widths to the printable width of an A4 page
//! - Merge lookup so absorbed cells are never drawn twice
//! - Font resolution, text measurement and word wrapping
//! - Row growth and pagination for PDF output

pub mod fonts;
pub mod html;
pub mod page;
pub mod pdf;
mod sheet_layout;

use crate::template::merge::materialize_merges;
use crate::types::Workbook;

/// Copy of `workbook` with every merge clamped to its grid and the
/// absorbed cells blanked, so exports accept workbooks from any source.
pub(crate) fn export_ready(workbook: &Workbook) -> Workbook {
    let mut prepared = workbook.clone();
    for sheet in &mut prepared.sheets {
        materialize_merges(sheet);
    }
    prepared
}

pub use fonts::{wrap_text, FixedWidth, FontKey, FontStore, TextMeasure};
pub use html::to_html;
pub use page::PageGeometry;
pub use pdf::{plan_sheet, to_pdf, SheetPlan};
pub use sheet_layout::{CellRect, MergeInfo, SheetLayout};
