//! HTML export: one `<table>` per sheet, inline styles.

use std::fmt::Write as _;

use crate::types::{Border, BorderStyle, Cell, HAlign, Sheet, Style, VAlign, Workbook};
use crate::xml_helpers::xml_escape;

use super::page::{PageGeometry, MARGIN_MM};
use super::sheet_layout::SheetLayout;

const HEAD: &str = "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
table { border-collapse: collapse; table-layout: fixed; }\n\
td { overflow: hidden; padding: 0 1mm; }\n\
table + table { page-break-before: always; }\n\
</style>\n</head>\n<body>\n";

const TAIL: &str = "</body>\n</html>\n";

/// Render every sheet of `workbook` as an HTML document.
///
/// The output depends only on the workbook, so exporting twice yields the
/// same bytes.
pub fn to_html(workbook: &Workbook) -> String {
    to_html_with_margin(workbook, MARGIN_MM)
}

pub fn to_html_with_margin(workbook: &Workbook, margin_mm: f64) -> String {
    let _span = tracing::debug_span!("to_html", sheets = workbook.sheets.len()).entered();
    let workbook = super::export_ready(workbook);
    let mut out = String::from(HEAD);
    for sheet in &workbook.sheets {
        write_table(&mut out, sheet, margin_mm);
    }
    out.push_str(TAIL);
    out
}

fn write_table(out: &mut String, sheet: &Sheet, margin_mm: f64) {
    let page = PageGeometry::new(sheet.orientation, margin_mm);
    let layout = SheetLayout::new(sheet, page.printable_width());

    let _ = writeln!(
        out,
        "<table data-sheet=\"{}\" style=\"width: {:.2}mm\">",
        xml_escape(&sheet.name),
        layout.total_width()
    );

    out.push_str("<colgroup>");
    for (column, width) in sheet.columns.iter().zip(&layout.col_widths) {
        if column.hidden {
            continue;
        }
        let _ = write!(out, "<col style=\"width: {width:.2}mm\">");
    }
    out.push_str("</colgroup>\n");

    for (r, row) in sheet.rows.iter().enumerate() {
        if row.hidden {
            continue;
        }
        let _ = write!(out, "<tr style=\"height: {:.2}mm\">", layout.row_height(r));
        for (c, cell) in row.cells.iter().enumerate() {
            let column_hidden = sheet.columns.get(c).is_some_and(|col| col.hidden);
            if column_hidden || cell.hidden || layout.cell_rect(r, c).skip {
                continue;
            }
            write_cell(out, sheet, r, c, cell);
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}

fn write_cell(out: &mut String, sheet: &Sheet, row: usize, col: usize, cell: &Cell) {
    out.push_str("<td");
    if cell.hmerge > 0 {
        let span = (col..=col + cell.hmerge as usize)
            .filter(|c| sheet.columns.get(*c).is_some_and(|column| !column.hidden))
            .count();
        if span > 1 {
            let _ = write!(out, " colspan=\"{span}\"");
        }
    }
    if cell.vmerge > 0 {
        let span = (row..=row + cell.vmerge as usize)
            .filter(|r| sheet.rows.get(*r).is_some_and(|row| !row.hidden))
            .count();
        if span > 1 {
            let _ = write!(out, " rowspan=\"{span}\"");
        }
    }
    let css = cell_css(&cell.style);
    if !css.is_empty() {
        let _ = write!(out, " style=\"{css}\"");
    }
    out.push('>');
    out.push_str(&xml_escape(&cell.text).replace('\n', "<br>"));
    out.push_str("</td>");
}

/// Inline CSS for a cell style; empty for the default style.
pub fn cell_css(style: &Style) -> String {
    let mut css = String::new();
    if let Some(family) = &style.font_family {
        let _ = write!(css, "font-family: '{}'; ", xml_escape(family));
    }
    if let Some(size) = style.font_size {
        let _ = write!(css, "font-size: {size}pt; ");
    }
    if style.bold {
        css.push_str("font-weight: bold; ");
    }
    if style.italic {
        css.push_str("font-style: italic; ");
    }
    match (style.underline, style.strikethrough) {
        (true, true) => css.push_str("text-decoration: underline line-through; "),
        (true, false) => css.push_str("text-decoration: underline; "),
        (false, true) => css.push_str("text-decoration: line-through; "),
        (false, false) => {}
    }
    if let Some(color) = &style.font_color {
        let _ = write!(css, "color: {color}; ");
    }
    if let Some(fill) = style.solid_fill() {
        let _ = write!(css, "background-color: {fill}; ");
    }
    for (side, border) in [
        ("top", &style.border_top),
        ("right", &style.border_right),
        ("bottom", &style.border_bottom),
        ("left", &style.border_left),
    ] {
        if let Some(border) = border {
            let _ = write!(css, "border-{side}: {}; ", border_css(border));
        }
    }
    if let Some(align) = style.align_h.and_then(text_align) {
        let _ = write!(css, "text-align: {align}; ");
    }
    if let Some(align) = style.align_v {
        let _ = write!(css, "vertical-align: {}; ", vertical_align(align));
    }
    if let Some(indent) = style.indent.filter(|i| *i > 0) {
        let _ = write!(css, "padding-left: {}mm; ", 1 + 3 * indent);
    }
    css.push_str(if style.wrap {
        "white-space: pre-wrap;"
    } else {
        "white-space: nowrap;"
    });
    if css == "white-space: nowrap;" {
        css.clear();
    }
    css
}

fn border_css(border: &Border) -> String {
    let line = match border.style {
        BorderStyle::Double => "double",
        BorderStyle::Dotted | BorderStyle::Hair => "dotted",
        BorderStyle::Dashed
        | BorderStyle::MediumDashed
        | BorderStyle::DashDot
        | BorderStyle::MediumDashDot
        | BorderStyle::DashDotDot
        | BorderStyle::MediumDashDotDot
        | BorderStyle::SlantDashDot => "dashed",
        BorderStyle::Thin | BorderStyle::Medium | BorderStyle::Thick => "solid",
    };
    // A double rule needs room for two lines and a gap.
    let width = match border.style {
        BorderStyle::Double => 2.25,
        other => other.width_pt(),
    };
    format!("{width}pt {line} {}", border.color)
}

fn text_align(align: HAlign) -> Option<&'static str> {
    match align {
        HAlign::General => None,
        HAlign::Left | HAlign::Fill => Some("left"),
        HAlign::Center | HAlign::CenterContinuous => Some("center"),
        HAlign::Right => Some("right"),
        HAlign::Justify | HAlign::Distributed => Some("justify"),
    }
}

fn vertical_align(align: VAlign) -> &'static str {
    match align {
        VAlign::Top => "top",
        VAlign::Center | VAlign::Justify | VAlign::Distributed => "middle",
        VAlign::Bottom => "bottom",
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
    use crate::types::{Column, Orientation, Row, StyleRef};

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Report").unwrap();
        sheet.columns = vec![
            Column {
                width: 10.0,
                ..Column::default()
            },
            Column {
                width: 30.0,
                ..Column::default()
            },
        ];
        sheet.rows.push(Row {
            cells: vec![Cell::new("a < b"), Cell::new("line1\nline2")],
            ..Row::default()
        });
        wb
    }

    #[test]
    fn document_has_doctype_and_one_table_per_sheet() {
        let mut wb = workbook();
        wb.add_sheet("Second").unwrap();
        let html = to_html(&wb);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<table ").count(), 2);
        assert!(html.contains("page-break-before: always"));
    }

    #[test]
    fn column_widths_are_scaled_to_the_page() {
        let html = to_html(&workbook());
        assert!(html.contains("<col style=\"width: 47.50mm\"><col style=\"width: 142.50mm\">"));

        let mut wb = workbook();
        wb.sheets[0].orientation = Orientation::Landscape;
        let html = to_html(&wb);
        assert!(html.contains("style=\"width: 277.00mm\""));
    }

    #[test]
    fn text_is_escaped_and_newlines_become_breaks() {
        let html = to_html(&workbook());
        assert!(html.contains("<td>a &lt; b</td>"));
        assert!(html.contains("<td>line1<br>line2</td>"));
    }

    #[test]
    fn merges_become_spans_and_absorbed_cells_are_skipped() {
        let mut wb = workbook();
        let sheet = &mut wb.sheets[0];
        sheet.rows.push(Row {
            cells: vec![Cell::new("x"), Cell::new("y")],
            ..Row::default()
        });
        sheet.rows[0].cells[0].vmerge = 1;
        sheet.rows[1].cells[0].hidden = true;
        let html = to_html(&wb);
        assert!(html.contains("<td rowspan=\"2\">a &lt; b</td>"));
        assert!(!html.contains(">x<"));
        assert!(html.contains("<td>y</td>"));
    }

    #[test]
    fn unmaterialized_merges_are_clamped_before_export() {
        let mut wb = workbook();
        let sheet = &mut wb.sheets[0];
        sheet.rows.push(Row {
            cells: vec![Cell::new("x"), Cell::new("y")],
            ..Row::default()
        });
        // As read from a package: spans unchecked, absorbed cells untouched.
        sheet.rows[0].cells[0].vmerge = u32::MAX;
        sheet.rows[0].cells[0].hmerge = u32::MAX;

        let html = to_html(&wb);
        assert!(html.contains("<td colspan=\"2\" rowspan=\"2\">a &lt; b</td>"));
        assert!(!html.contains(">x<"));
        assert!(!html.contains(">y<"));
        assert!(!html.contains("line1"));
        // The caller's workbook is left as it was.
        assert_eq!(wb.sheets[0].rows[0].cells[0].vmerge, u32::MAX);
    }

    #[test]
    fn styles_map_to_inline_css() {
        let style = Style {
            font_family: Some("Arial".into()),
            font_size: Some(12.0),
            bold: true,
            pattern_type: Some("solid".into()),
            fill_color: Some("#FFFF00".into()),
            border_bottom: Some(Border {
                style: BorderStyle::Medium,
                color: "#000000".into(),
            }),
            align_h: Some(HAlign::Center),
            align_v: Some(VAlign::Center),
            wrap: true,
            ..Style::default()
        };
        let css = cell_css(&StyleRef::new(style));
        assert_eq!(
            css,
            "font-family: 'Arial'; font-size: 12pt; font-weight: bold; \
             background-color: #FFFF00; border-bottom: 1pt solid #000000; \
             text-align: center; vertical-align: middle; white-space: pre-wrap;"
        );
        assert_eq!(cell_css(&Style::default()), "");
    }

    #[test]
    fn export_is_deterministic() {
        let wb = workbook();
        assert_eq!(to_html(&wb), to_html(&wb));
    }
}
