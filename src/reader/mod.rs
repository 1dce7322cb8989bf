//! XLSX package reader
//!
//! Loads the parts a template needs (sheet list, shared strings, styles,
//! theme, worksheets) from the ZIP archive into the grid model.

mod package;
pub(crate) mod styles;
mod worksheet;

use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

use crate::error::Result;
use crate::types::{StyleRef, Workbook};

use package::{get_sheet_info, parse_shared_strings, parse_theme, parse_workbook_relationships};
use styles::{parse_styles, resolve_num_fmt, resolve_style};
use worksheet::{parse_sheet, CellFormats};

/// Parse an XLSX package from bytes.
///
/// # Errors
/// `Zip` for a damaged container, `Xml` for malformed sheet or style parts.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = data.len()))]
pub fn read_workbook(data: &[u8]) -> Result<Workbook> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let relationships = parse_workbook_relationships(&mut archive);
    let theme = parse_theme(&mut archive, relationships.theme.as_deref());
    let shared_strings = parse_shared_strings(&mut archive, relationships.shared_strings.as_deref());

    let stylesheet = match archive.by_name(relationships.styles.as_deref().unwrap_or("xl/styles.xml")) {
        Ok(file) => parse_styles(std::io::BufReader::new(file))?,
        Err(_) => crate::types::StyleSheet::default(),
    };

    // Resolve each cellXfs entry once; cells share the resulting Arc.
    let styles: Vec<StyleRef> = (0..stylesheet.cell_xfs.len())
        .map(|i| StyleRef::new(resolve_style(i, &stylesheet, &theme)))
        .collect();
    let num_fmts: Vec<Option<String>> = (0..stylesheet.cell_xfs.len())
        .map(|i| resolve_num_fmt(i, &stylesheet))
        .collect();

    let formats = CellFormats {
        shared_strings: &shared_strings,
        styles: &styles,
        num_fmts: &num_fmts,
    };

    let sheet_infos = get_sheet_info(&mut archive, &relationships.worksheets)?;
    let mut workbook = Workbook::new();
    for info in &sheet_infos {
        let sheet = parse_sheet(&mut archive, info, &formats)?;
        tracing::debug!(
            sheet = %sheet.name,
            rows = sheet.rows.len(),
            cols = sheet.col_count(),
            "parsed sheet"
        );
        workbook.sheets.push(sheet);
    }

    Ok(workbook)
}

/// Read and parse an XLSX file from disk.
///
/// # Errors
/// `Io` when the file cannot be read, otherwise as [`read_workbook`].
pub fn read_workbook_file(path: impl AsRef<Path>) -> Result<Workbook> {
    let data = std::fs::read(path)?;
    read_workbook(&data)
}
