//! Generates worksheet XML from a grid `Sheet`.
//!
//! Text cells use inline strings (`t="inlineStr"`), so no shared string table
//! is emitted.

use std::fmt::Write as _;

use crate::cell_ref::{cell_name, col_to_letter};
use crate::types::{Cell, CellType, Orientation, Sheet};
use crate::xml_helpers::xml_escape;

use super::styles_writer::StylesCollector;

/// Write a complete worksheet XML string from a `Sheet`.
pub(crate) fn write_sheet_xml(sheet: &Sheet, styles: &mut StylesCollector) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    );
    out.push_str(
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    );
    out.push('\n');

    let rows = u32::try_from(sheet.rows.len()).unwrap_or(u32::MAX);
    let cols = u32::try_from(sheet.col_count()).unwrap_or(u32::MAX);
    if rows > 0 && cols > 0 {
        let _ = writeln!(
            out,
            r#"<dimension ref="A1:{}{}"/>"#,
            col_to_letter(cols - 1),
            rows
        );
    }

    let _ = writeln!(
        out,
        r#"<sheetFormatPr defaultRowHeight="{:.2}"/>"#,
        sheet.default_row_height
    );

    if !sheet.columns.is_empty() {
        out.push_str("<cols>\n");
        for (idx, column) in sheet.columns.iter().enumerate() {
            let col1 = idx + 1;
            let _ = write!(
                out,
                r#"<col min="{col1}" max="{col1}" width="{:.4}" customWidth="1""#,
                column.width
            );
            if column.hidden {
                out.push_str(r#" hidden="1""#);
            }
            if let Some(style) = &column.style {
                let _ = write!(out, r#" style="{}""#, styles.style_index(style, None));
            }
            out.push_str("/>\n");
        }
        out.push_str("</cols>\n");
    }

    out.push_str("<sheetData>\n");
    write_sheet_data(&mut out, sheet, styles);
    out.push_str("</sheetData>\n");

    let merges: Vec<String> = merge_refs(sheet);
    if !merges.is_empty() {
        let _ = writeln!(out, r#"<mergeCells count="{}">"#, merges.len());
        for merge in &merges {
            let _ = writeln!(out, r#"<mergeCell ref="{merge}"/>"#);
        }
        out.push_str("</mergeCells>\n");
    }

    out.push_str(
        r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    );
    if sheet.orientation == Orientation::Landscape {
        out.push_str(r#"<pageSetup orientation="landscape"/>"#);
    }
    out.push('\n');

    out.push_str("</worksheet>");
    out
}

/// `A1:B2` references for every merge-owning cell.
fn merge_refs(sheet: &Sheet) -> Vec<String> {
    let mut refs = Vec::new();
    for (r, row) in sheet.rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if !cell.is_merge_origin() {
                continue;
            }
            let (Ok(r), Ok(c)) = (u32::try_from(r), u32::try_from(c)) else {
                continue;
            };
            refs.push(format!(
                "{}:{}",
                cell_name(r, c),
                cell_name(r + cell.vmerge, c + cell.hmerge)
            ));
        }
    }
    refs
}

fn write_sheet_data(out: &mut String, sheet: &Sheet, styles: &mut StylesCollector) {
    for (r, row) in sheet.rows.iter().enumerate() {
        let _ = write!(out, r#"<row r="{}""#, r + 1);
        if let Some(h) = row.height {
            let _ = write!(out, r#" ht="{h:.2}" customHeight="1""#);
        }
        if row.hidden {
            out.push_str(r#" hidden="1""#);
        }
        out.push('>');

        for (c, cell) in row.cells.iter().enumerate() {
            let style_idx = styles.style_index(&cell.style, cell.num_fmt.as_deref());
            if cell.text.is_empty() && style_idx == 0 {
                continue;
            }
            let (Ok(r), Ok(c)) = (u32::try_from(r), u32::try_from(c)) else {
                continue;
            };
            write_cell(out, &cell_name(r, c), cell, style_idx);
        }

        out.push_str("</row>\n");
    }
}

/// Write a single `<c>` element.
fn write_cell(out: &mut String, cell_ref: &str, cell: &Cell, style_idx: usize) {
    let _ = write!(out, r#"<c r="{cell_ref}""#);
    if style_idx != 0 {
        let _ = write!(out, r#" s="{style_idx}""#);
    }

    if cell.text.is_empty() {
        out.push_str("/>");
        return;
    }

    match cell.cell_type {
        CellType::Number if cell.text.trim().parse::<f64>().is_ok() => {
            let _ = write!(out, "><v>{}</v></c>", cell.text.trim());
        }
        CellType::Boolean => {
            let v = u8::from(cell.text.eq_ignore_ascii_case("true") || cell.text == "1");
            let _ = write!(out, r#" t="b"><v>{v}</v></c>"#);
        }
        CellType::String | CellType::Number => {
            let _ = write!(
                out,
                r#" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                xml_escape(&cell.text)
            );
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
    use crate::types::{Column, Row};

    fn sheet_with(cells: Vec<Vec<Cell>>) -> Sheet {
        let mut sheet = Sheet::new("S");
        sheet.rows = cells
            .into_iter()
            .map(|cells| Row {
                cells,
                ..Row::default()
            })
            .collect();
        sheet.normalize_shape();
        sheet
    }

    #[test]
    fn numbers_fall_back_to_text_when_unparseable() {
        let mut n = Cell::new("12.5");
        n.cell_type = CellType::Number;
        let mut bad = Cell::new("n/a");
        bad.cell_type = CellType::Number;
        let sheet = sheet_with(vec![vec![n, bad]]);
        let xml = write_sheet_xml(&sheet, &mut StylesCollector::new());
        assert!(xml.contains(r#"<c r="A1"><v>12.5</v></c>"#));
        assert!(xml.contains(r#"<c r="B1" t="inlineStr"><is><t xml:space="preserve">n/a</t>"#));
    }

    #[test]
    fn merges_and_layout_attributes_are_written() {
        let mut origin = Cell::new("x & y");
        origin.vmerge = 2;
        origin.hmerge = 1;
        let mut sheet = sheet_with(vec![
            vec![origin, Cell::default()],
            vec![Cell::default(), Cell::default()],
            vec![Cell::default(), Cell::default()],
        ]);
        sheet.rows[1].height = Some(30.0);
        sheet.rows[2].hidden = true;
        sheet.columns[1] = Column {
            width: 20.0,
            hidden: true,
            style: None,
        };
        sheet.orientation = Orientation::Landscape;

        let xml = write_sheet_xml(&sheet, &mut StylesCollector::new());
        assert!(xml.contains(r#"<mergeCell ref="A1:B3"/>"#));
        assert!(xml.contains("x &amp; y"));
        assert!(xml.contains(r#"<row r="2" ht="30.00" customHeight="1">"#));
        assert!(xml.contains(r#"<row r="3" hidden="1">"#));
        assert!(xml.contains(r#"<col min="2" max="2" width="20.0000" customWidth="1" hidden="1"/>"#));
        assert!(xml.contains(r#"<pageSetup orientation="landscape"/>"#));
    }
}
