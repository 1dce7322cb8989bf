//! xlsxt - XLSX report templating
//!
//! Binds nested data to a spreadsheet template and renders the result as
//! XLSX, HTML or paginated PDF:
//! - `{{ Items.Name }}` expressions, repeated once per collection element
//! - `[v-merge]` / `[v-merge: N]` vertical merges, `[BR]` bold toggles
//! - Column widths scaled to A4, rows grown to fit wrapped text in PDF
//!
//! # Usage
//!
//! ```no_run
//! use serde::Serialize;
//! use xlsxt::XlsxTemplate;
//!
//! #[derive(Serialize)]
//! struct Order {
//!     items: Vec<String>,
//! }
//!
//! let mut template = XlsxTemplate::open("template.xlsx")?;
//! template.render(&Order { items: vec!["a".into(), "b".into()] })?;
//! template.save("result.xlsx")?;
//! template.set_font_dir("fonts");
//! template.save_pdf("result.pdf")?;
//! # Ok::<(), xlsxt::XlsxtError>(())
//! ```

pub mod cell_ref;
pub mod color;
pub mod config;
pub mod error;
pub mod layout;
pub mod reader;
pub mod template;
pub mod types;
pub mod writer;
pub mod xml_helpers;

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use config::ExportConfig;
pub use error::{Result, XlsxtError};
pub use template::shape::Shape;
pub use types::*;

/// Fill colour given to template styles that carry none.
const DEFAULT_FILL_COLOR: &str = "#FFFFFF";

/// A loaded template and, after [`XlsxTemplate::render`], its result.
#[derive(Debug, Clone, Default)]
pub struct XlsxTemplate {
    template: Option<Workbook>,
    result: Option<Workbook>,
    config: ExportConfig,
}

impl XlsxTemplate {
    /// Open a template file.
    ///
    /// # Errors
    /// `Io`, `Zip`, `Xml` or `Parse` when the package cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Load a template from the bytes of an XLSX package.
    ///
    /// # Errors
    /// `Zip`, `Xml` or `Parse` when the package cannot be read.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut workbook = reader::read_workbook(data)?;
        normalize_fills(&mut workbook);
        Ok(Self::from_workbook(workbook))
    }

    /// Wrap an already loaded workbook. Styles are used as given.
    pub fn from_workbook(workbook: Workbook) -> Self {
        Self {
            template: Some(workbook),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_font_dir(&mut self, dir: impl Into<PathBuf>) {
        self.config.font_dir = Some(dir.into());
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn template(&self) -> Option<&Workbook> {
        self.template.as_ref()
    }

    pub fn result(&self) -> Option<&Workbook> {
        self.result.as_ref()
    }

    /// Render the template against any serializable value.
    ///
    /// # Errors
    /// See [`XlsxTemplate::render_shape`]; `Data` when `data` cannot be
    /// serialized.
    pub fn render<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<()> {
        self.result = None;
        let shape = template::to_shape(data)?;
        self.render_shape(&shape)
    }

    /// Render the template against parsed JSON.
    ///
    /// JSON objects bind as records, so their keys are field names rather
    /// than collection entries.
    ///
    /// # Errors
    /// See [`XlsxTemplate::render_shape`].
    pub fn render_json(&mut self, data: serde_json::Value) -> Result<()> {
        self.render_shape(&Shape::from_json(data))
    }

    /// Render the template against an already converted value.
    ///
    /// On error no result is kept.
    ///
    /// # Errors
    /// `TemplateNotLoaded`, `SheetCreation` or `TemplateExpression`.
    pub fn render_shape(&mut self, data: &Shape) -> Result<()> {
        self.result = None;
        let template = self.template.as_ref().ok_or(XlsxtError::TemplateNotLoaded)?;
        self.result = Some(template::render_workbook(template, data)?);
        Ok(())
    }

    /// The result if rendered, otherwise the template.
    fn output(&self) -> Result<&Workbook> {
        self.result
            .as_ref()
            .or(self.template.as_ref())
            .ok_or(XlsxtError::TemplateNotLoaded)
    }

    fn rendered(&self) -> Result<&Workbook> {
        self.result.as_ref().ok_or(XlsxtError::TemplateNotLoaded)
    }

    /// Save the result, or the template when nothing has been rendered.
    ///
    /// # Errors
    /// `TemplateNotLoaded` for an empty handle, `Io`/`Zip` on write failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let workbook = self.output()?;
        let file = std::fs::File::create(path.as_ref())?;
        writer::write_workbook_to(workbook, std::io::BufWriter::new(file))
    }

    /// Write the result, or the template, to any seekable writer.
    ///
    /// # Errors
    /// `TemplateNotLoaded` for an empty handle, `Io`/`Zip` on write failure.
    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<()> {
        writer::write_workbook_to(self.output()?, writer)
    }

    /// # Errors
    /// `TemplateNotLoaded` before a successful render.
    pub fn to_html(&self) -> Result<String> {
        Ok(layout::html::to_html_with_margin(
            self.rendered()?,
            self.config.margin_mm,
        ))
    }

    /// # Errors
    /// `TemplateNotLoaded` before a successful render, `Io` on write failure.
    pub fn save_html(&self, path: impl AsRef<Path>) -> Result<()> {
        let html = self.to_html()?;
        std::fs::write(path.as_ref(), html)?;
        Ok(())
    }

    /// # Errors
    /// `TemplateNotLoaded` before a successful render, `FontResolution`
    /// for a missing font directory or file, `Pdf` from the backend.
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        layout::to_pdf(self.rendered()?, &self.config)
    }

    /// # Errors
    /// As [`XlsxTemplate::to_pdf`], plus `Io` on write failure.
    pub fn save_pdf(&self, path: impl AsRef<Path>) -> Result<()> {
        let pdf = self.to_pdf()?;
        std::fs::write(path.as_ref(), pdf)?;
        Ok(())
    }
}

/// Give every cell style without a fill colour a white one.
fn normalize_fills(workbook: &mut Workbook) {
    let mut replaced: Vec<(StyleRef, StyleRef)> = Vec::new();
    for sheet in &mut workbook.sheets {
        for cell in sheet.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
            if cell.style.fill_color.is_some() {
                continue;
            }
            let filled = match replaced.iter().find(|(src, _)| src.ptr_eq(&cell.style)) {
                Some((_, filled)) => filled.clone(),
                None => {
                    let filled = cell.style.derive(|s| Style {
                        fill_color: Some(DEFAULT_FILL_COLOR.to_string()),
                        ..s.clone()
                    });
                    replaced.push((cell.style.clone(), filled.clone()));
                    filled
                }
            };
            cell.style = filled;
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

    fn template() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Sheet1").unwrap();
        sheet.rows.push(Row {
            cells: vec![Cell::new("{{ Name }}")],
            ..Row::default()
        });
        sheet.normalize_shape();
        wb
    }

    #[test]
    fn empty_handle_reports_template_not_loaded() {
        let empty = XlsxTemplate::default();
        let mut buf = std::io::Cursor::new(Vec::new());
        let err = empty.write(&mut buf).unwrap_err();
        assert!(matches!(err, XlsxtError::TemplateNotLoaded));
        assert_eq!(err.to_string(), "Not load template xlsx file");
    }

    #[test]
    fn exports_need_a_rendered_result() {
        let t = XlsxTemplate::from_workbook(template());
        assert!(matches!(t.to_html(), Err(XlsxtError::TemplateNotLoaded)));
        assert!(matches!(t.to_pdf(), Err(XlsxtError::TemplateNotLoaded)));
        let mut buf = std::io::Cursor::new(Vec::new());
        t.write(&mut buf).unwrap();
        assert!(!buf.into_inner().is_empty());
    }

    #[test]
    fn failed_render_clears_the_previous_result() {
        let mut t = XlsxTemplate::from_workbook(template());
        t.render_json(serde_json::json!({"Name": "ok"})).unwrap();
        assert_eq!(t.result().unwrap().sheets[0].text(0, 0), "ok");

        t.template.as_mut().unwrap().sheets[0].rows[0].cells[0].text = "{{ broken + }}".into();
        assert!(t.render_json(serde_json::json!({})).is_err());
        assert!(t.result().is_none());
    }

    #[test]
    fn serializable_structs_bind_as_records() {
        #[derive(Serialize)]
        struct Data {
            #[serde(rename = "Name")]
            name: String,
        }
        let mut t = XlsxTemplate::from_workbook(template());
        t.render(&Data { name: "typed".into() }).unwrap();
        assert_eq!(t.result().unwrap().sheets[0].text(0, 0), "typed");
    }

    #[test]
    fn missing_fill_colours_become_white_and_stay_shared() {
        let mut wb = template();
        let shared = StyleRef::new(Style::default());
        wb.sheets[0].rows[0].cells.push(Cell {
            style: shared.clone(),
            ..Cell::default()
        });
        wb.sheets[0].rows[0].cells[0].style = shared.clone();
        normalize_fills(&mut wb);

        let cells = &wb.sheets[0].rows[0].cells;
        assert_eq!(cells[0].style.fill_color.as_deref(), Some("#FFFFFF"));
        assert!(cells[0].style.ptr_eq(&cells[1].style));
        assert!(shared.fill_color.is_none());
    }
}
