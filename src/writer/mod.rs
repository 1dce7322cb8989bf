//! XLSX package writer.
//!
//! Serializes a grid `Workbook` into a fresh OOXML package: content types,
//! relationships, workbook, one worksheet part per sheet and a stylesheet
//! rebuilt from the styles the cells actually use.

pub(crate) mod sheet_writer;
pub(crate) mod styles_writer;

use std::fmt::Write as _;
use std::io::{Cursor, Seek, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::Result;
use crate::types::Workbook;
use crate::xml_helpers::xml_escape;

use sheet_writer::write_sheet_xml;
use styles_writer::StylesCollector;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Write a workbook to XLSX bytes.
///
/// # Errors
/// `Zip` or `Io` if the archive cannot be assembled.
pub fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_workbook_to(workbook, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write a workbook as an XLSX package into any seekable sink.
///
/// # Errors
/// `Zip` or `Io` if the archive cannot be assembled.
#[tracing::instrument(level = "debug", skip_all, fields(sheets = workbook.sheets.len()))]
pub fn write_workbook_to<W: Write + Seek>(workbook: &Workbook, sink: W) -> Result<()> {
    let mut writer = ZipWriter::new(sink);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let sheet_count = workbook.sheets.len();

    writer.start_file("[Content_Types].xml", options)?;
    writer.write_all(content_types_xml(sheet_count).as_bytes())?;

    writer.start_file("_rels/.rels", options)?;
    writer.write_all(root_rels_xml().as_bytes())?;

    writer.start_file("xl/workbook.xml", options)?;
    writer.write_all(workbook_xml(workbook).as_bytes())?;

    writer.start_file("xl/_rels/workbook.xml.rels", options)?;
    writer.write_all(workbook_rels_xml(sheet_count).as_bytes())?;

    // Sheets first: the stylesheet is only complete once every cell was seen.
    let mut styles = StylesCollector::new();
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        let xml = write_sheet_xml(sheet, &mut styles);
        writer.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
        writer.write_all(xml.as_bytes())?;
    }

    writer.start_file("xl/styles.xml", options)?;
    writer.write_all(styles.to_xml().as_bytes())?;

    writer.finish()?;
    Ok(())
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut out = String::from(XML_DECL);
    out.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    out.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    out.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for idx in 1..=sheet_count {
        let _ = write!(
            out,
            r#"<Override PartName="/xl/worksheets/sheet{idx}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    out.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    out.push_str("</Types>");
    out
}

fn root_rels_xml() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut out = String::from(XML_DECL);
    let _ = write!(
        out,
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="{REL_NS}"><sheets>"#
    );
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        let id = idx + 1;
        let _ = write!(
            out,
            r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
            xml_escape(&sheet.name)
        );
    }
    out.push_str("</sheets></workbook>");
    out
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut out = String::from(XML_DECL);
    out.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for id in 1..=sheet_count {
        let _ = write!(
            out,
            r#"<Relationship Id="rId{id}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        );
    }
    let _ = write!(
        out,
        r#"<Relationship Id="rId{}" Type="{REL_NS}/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    out.push_str("</Relationships>");
    out
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
    use crate::reader::read_workbook;
    use crate::types::{Border, BorderStyle, Cell, Row, Style, StyleRef};

    #[test]
    fn written_package_reads_back() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Report & Co").unwrap();
        let style = StyleRef::new(Style {
            bold: true,
            font_family: Some("Arial".into()),
            font_size: Some(12.0),
            pattern_type: Some("solid".into()),
            fill_color: Some("#DDEEFF".into()),
            border_bottom: Some(Border {
                style: BorderStyle::Medium,
                color: "#112233".into(),
            }),
            ..Style::default()
        });
        let mut merged = Cell::new("Total");
        merged.style = style;
        merged.vmerge = 1;
        sheet.rows.push(Row {
            height: Some(22.5),
            cells: vec![merged, Cell::new("1")],
            ..Row::default()
        });
        sheet.rows.push(Row {
            cells: vec![Cell::default(), Cell::new("2")],
            ..Row::default()
        });
        sheet.normalize_shape();

        let bytes = write_workbook(&wb).unwrap();
        let back = read_workbook(&bytes).unwrap();

        let sheet = &back.sheets[0];
        assert_eq!(sheet.name, "Report & Co");
        assert_eq!(sheet.text(0, 0), "Total");
        assert_eq!(sheet.text(1, 1), "2");
        assert_eq!(sheet.rows[0].height, Some(22.5));
        let origin = sheet.cell(0, 0).unwrap();
        assert_eq!(origin.vmerge, 1);
        assert!(origin.style.bold);
        assert_eq!(origin.style.font_family.as_deref(), Some("Arial"));
        assert_eq!(origin.style.solid_fill(), Some("#DDEEFF"));
        let bottom = origin.style.border_bottom.as_ref().unwrap();
        assert_eq!(bottom.style, BorderStyle::Medium);
        assert_eq!(bottom.color, "#112233");
    }
}
