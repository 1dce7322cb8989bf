//! In-memory XLSX templates for integration tests.
//!
//! Builders write a real OOXML package (ZIP plus hand-written XML), so tests
//! exercise the reader exactly as a template saved by a spreadsheet editor
//! would.
//!
//! # Example
//!
//! ```rust
//! use fixtures::{SheetBuilder, StyleBuilder, XlsxBuilder};
//!
//! let xlsx = XlsxBuilder::new()
//!     .sheet(
//!         SheetBuilder::new("Invoice")
//!             .cell("A1", "{{ Title }}", Some(StyleBuilder::new().bold()))
//!             .cell("A2", "{{ Items.Name }}", None),
//!     )
//!     .build();
//!
//! let template = xlsxt::XlsxTemplate::from_bytes(&xlsx).unwrap();
//! ```

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic,
    clippy::cast_possible_truncation,
    clippy::cast_lossless
)]

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

// ============================================================================
// Style Builder
// ============================================================================

/// Builder for cell styles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleBuilder {
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,

    pub bg_color: Option<String>,
    pub pattern_type: Option<String>,

    pub border_top: Option<BorderSide>,
    pub border_right: Option<BorderSide>,
    pub border_bottom: Option<BorderSide>,
    pub border_left: Option<BorderSide>,

    pub align_horizontal: Option<String>,
    pub align_vertical: Option<String>,
    pub wrap_text: bool,

    pub number_format: Option<String>,
}

/// A border side definition.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderSide {
    pub style: String,
    pub color: Option<String>,
}

impl BorderSide {
    #[must_use]
    pub fn new(style: &str, color: Option<&str>) -> Self {
        Self {
            style: style.to_string(),
            color: color.map(normalize_color),
        }
    }
}

impl StyleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn font_name(mut self, name: &str) -> Self {
        self.font_name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Font colour as `RRGGBB` or `AARRGGBB`, with or without `#`.
    #[must_use]
    pub fn font_color(mut self, color: &str) -> Self {
        self.font_color = Some(normalize_color(color));
        self
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    #[must_use]
    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Solid background fill.
    #[must_use]
    pub fn bg_color(mut self, color: &str) -> Self {
        self.bg_color = Some(normalize_color(color));
        self.pattern_type.get_or_insert_with(|| "solid".to_string());
        self
    }

    /// Same border on all four sides.
    #[must_use]
    pub fn border_all(mut self, style: &str, color: Option<&str>) -> Self {
        let side = BorderSide::new(style, color);
        self.border_top = Some(side.clone());
        self.border_right = Some(side.clone());
        self.border_bottom = Some(side.clone());
        self.border_left = Some(side);
        self
    }

    #[must_use]
    pub fn border_bottom(mut self, style: &str, color: Option<&str>) -> Self {
        self.border_bottom = Some(BorderSide::new(style, color));
        self
    }

    #[must_use]
    pub fn align_horizontal(mut self, align: &str) -> Self {
        self.align_horizontal = Some(align.to_string());
        self
    }

    #[must_use]
    pub fn align_vertical(mut self, align: &str) -> Self {
        self.align_vertical = Some(align.to_string());
        self
    }

    #[must_use]
    pub fn wrap_text(mut self) -> Self {
        self.wrap_text = true;
        self
    }

    #[must_use]
    pub fn number_format(mut self, format: &str) -> Self {
        self.number_format = Some(format.to_string());
        self
    }
}

// ============================================================================
// Cell Value
// ============================================================================

/// A cell value as stored in the package.
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Shared string.
    String(String),
    Number(f64),
    Boolean(bool),
    /// Style only.
    Empty,
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

// ============================================================================
// Sheet Builder
// ============================================================================

#[derive(Debug, Clone)]
pub struct CellEntry {
    pub cell_ref: String,
    pub value: CellValue,
    pub style: Option<StyleBuilder>,
}

#[derive(Debug, Clone)]
pub struct ColumnWidth {
    pub min: u32,
    pub max: u32,
    pub width: f64,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct RowHeight {
    pub row: u32,
    pub height: f64,
    pub hidden: bool,
}

/// Builder for a single worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    pub name: String,
    pub cells: Vec<CellEntry>,
    pub merges: Vec<String>,
    pub col_widths: Vec<ColumnWidth>,
    pub row_heights: Vec<RowHeight>,
    pub landscape: bool,
}

impl SheetBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add a cell with a value and optional style.
    #[must_use]
    pub fn cell<V: Into<CellValue>>(
        mut self,
        cell_ref: &str,
        value: V,
        style: Option<StyleBuilder>,
    ) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: value.into(),
            style,
        });
        self
    }

    /// Add one row of text cells starting at column A.
    #[must_use]
    pub fn row(mut self, row: u32, texts: &[&str]) -> Self {
        for (i, text) in texts.iter().enumerate() {
            let cell_ref = format!("{}{row}", col_num_to_letter(i as u32 + 1));
            self = self.cell(&cell_ref, *text, None);
        }
        self
    }

    /// Add a merge range such as `"A1:B2"`.
    #[must_use]
    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_string());
        self
    }

    /// Column widths for the 1-based range `min..=max`.
    #[must_use]
    pub fn col_width(mut self, min: u32, max: u32, width: f64) -> Self {
        self.col_widths.push(ColumnWidth {
            min,
            max,
            width,
            hidden: false,
        });
        self
    }

    #[must_use]
    pub fn hide_cols(mut self, min: u32, max: u32) -> Self {
        self.col_widths.push(ColumnWidth {
            min,
            max,
            width: 8.43,
            hidden: true,
        });
        self
    }

    /// Height in points for the 1-based `row`.
    #[must_use]
    pub fn row_height(mut self, row: u32, height: f64) -> Self {
        self.row_heights.push(RowHeight {
            row,
            height,
            hidden: false,
        });
        self
    }

    #[must_use]
    pub fn hide_row(mut self, row: u32) -> Self {
        self.row_heights.push(RowHeight {
            row,
            height: 15.0,
            hidden: true,
        });
        self
    }

    #[must_use]
    pub fn landscape(mut self) -> Self {
        self.landscape = true;
        self
    }
}

// ============================================================================
// XLSX Builder
// ============================================================================

/// Builder for complete XLSX packages.
#[derive(Debug, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetBuilder>,
}

impl XlsxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// Build the package bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut styles = StylesCollector::new();
        let mut shared_strings: Vec<String> = Vec::new();
        for cell in self.sheets.iter().flat_map(|s| &s.cells) {
            if let Some(style) = &cell.style {
                styles.add_style(style);
            }
            if let CellValue::String(s) = &cell.value {
                if !shared_strings.contains(s) {
                    shared_strings.push(s.clone());
                }
            }
        }

        let mut part = |name: &str, body: String| {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        part(
            "[Content_Types].xml",
            generate_content_types(self.sheets.len()),
        );
        part("_rels/.rels", generate_rels());
        part(
            "xl/_rels/workbook.xml.rels",
            generate_workbook_rels(self.sheets.len()),
        );
        part("xl/workbook.xml", generate_workbook(&self.sheets));
        part("xl/styles.xml", styles.generate_styles_xml());
        part(
            "xl/sharedStrings.xml",
            generate_shared_strings(&shared_strings),
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            part(
                &format!("xl/worksheets/sheet{}.xml", i + 1),
                generate_sheet_xml(sheet, &shared_strings, &styles),
            );
        }

        zip.finish().expect("Failed to finish ZIP").into_inner()
    }
}

// ============================================================================
// Styles Collector
// ============================================================================

/// Deduplicates styles into the `fonts`/`fills`/`borders`/`cellXfs` tables.
#[derive(Debug, Default)]
struct StylesCollector {
    fonts: Vec<FontDef>,
    fills: Vec<FillDef>,
    borders: Vec<BorderDef>,
    num_fmts: Vec<(u32, String)>,
    cell_xfs: Vec<CellXfDef>,
    style_map: Vec<(StyleBuilder, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
struct FontDef {
    name: String,
    size: f64,
    color: Option<String>,
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct FillDef {
    pattern_type: String,
    fg_color: Option<String>,
}

type BorderDef = [Option<BorderSide>; 4];

#[derive(Debug, Clone)]
struct CellXfDef {
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    num_fmt_id: Option<u32>,
    alignment: Option<String>,
}

fn find_or_push<T: PartialEq>(items: &mut Vec<T>, item: T) -> usize {
    match items.iter().position(|existing| *existing == item) {
        Some(i) => i,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

impl StylesCollector {
    fn new() -> Self {
        let mut collector = Self::default();
        collector.fonts.push(FontDef {
            name: "Calibri".to_string(),
            size: 11.0,
            color: None,
            bold: false,
            italic: false,
            underline: false,
        });
        // The first two fills are reserved by the format.
        for pattern in ["none", "gray125"] {
            collector.fills.push(FillDef {
                pattern_type: pattern.to_string(),
                fg_color: None,
            });
        }
        collector.borders.push(Default::default());
        collector.cell_xfs.push(CellXfDef {
            font_id: 0,
            fill_id: 0,
            border_id: 0,
            num_fmt_id: None,
            alignment: None,
        });
        collector
    }

    fn add_style(&mut self, style: &StyleBuilder) -> u32 {
        if let Some(idx) = self.style_index(style) {
            return idx;
        }

        let font_id = find_or_push(
            &mut self.fonts,
            FontDef {
                name: style
                    .font_name
                    .clone()
                    .unwrap_or_else(|| "Calibri".to_string()),
                size: style.font_size.unwrap_or(11.0),
                color: style.font_color.clone(),
                bold: style.bold,
                italic: style.italic,
                underline: style.underline,
            },
        );
        let fill_id = match &style.pattern_type {
            None => 0,
            Some(pattern) => find_or_push(
                &mut self.fills,
                FillDef {
                    pattern_type: pattern.clone(),
                    fg_color: style.bg_color.clone(),
                },
            ),
        };
        let border_id = find_or_push(
            &mut self.borders,
            [
                style.border_left.clone(),
                style.border_right.clone(),
                style.border_top.clone(),
                style.border_bottom.clone(),
            ],
        );
        let num_fmt_id = style.number_format.as_ref().map(|format| {
            builtin_format_id(format).unwrap_or_else(|| {
                match self.num_fmts.iter().find(|(_, code)| code == format) {
                    Some((id, _)) => *id,
                    None => {
                        let id = 164 + self.num_fmts.len() as u32;
                        self.num_fmts.push((id, format.clone()));
                        id
                    }
                }
            })
        });

        let idx = self.cell_xfs.len() as u32;
        self.cell_xfs.push(CellXfDef {
            font_id,
            fill_id,
            border_id,
            num_fmt_id,
            alignment: alignment_xml(style),
        });
        self.style_map.push((style.clone(), idx));
        idx
    }

    fn style_index(&self, style: &StyleBuilder) -> Option<u32> {
        self.style_map
            .iter()
            .find(|(existing, _)| existing == style)
            .map(|(_, idx)| *idx)
    }

    fn generate_styles_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(
            r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if !self.num_fmts.is_empty() {
            let _ = write!(xml, r#"<numFmts count="{}">"#, self.num_fmts.len());
            for (id, code) in &self.num_fmts {
                let _ = write!(
                    xml,
                    r#"<numFmt numFmtId="{id}" formatCode="{}"/>"#,
                    escape_xml(code)
                );
            }
            xml.push_str("</numFmts>");
        }

        let _ = write!(xml, r#"<fonts count="{}">"#, self.fonts.len());
        for font in &self.fonts {
            xml.push_str("<font>");
            if font.bold {
                xml.push_str("<b/>");
            }
            if font.italic {
                xml.push_str("<i/>");
            }
            if font.underline {
                xml.push_str("<u/>");
            }
            let _ = write!(xml, r#"<sz val="{}"/>"#, font.size);
            if let Some(color) = &font.color {
                let _ = write!(xml, r#"<color rgb="{color}"/>"#);
            }
            let _ = write!(xml, r#"<name val="{}"/>"#, escape_xml(&font.name));
            xml.push_str("</font>");
        }
        xml.push_str("</fonts>");

        let _ = write!(xml, r#"<fills count="{}">"#, self.fills.len());
        for fill in &self.fills {
            let _ = write!(
                xml,
                r#"<fill><patternFill patternType="{}">"#,
                fill.pattern_type
            );
            if let Some(color) = &fill.fg_color {
                let _ = write!(xml, r#"<fgColor rgb="{color}"/>"#);
            }
            xml.push_str("</patternFill></fill>");
        }
        xml.push_str("</fills>");

        let _ = write!(xml, r#"<borders count="{}">"#, self.borders.len());
        for border in &self.borders {
            xml.push_str("<border>");
            for (name, side) in ["left", "right", "top", "bottom"].iter().zip(border) {
                xml.push_str(&format_border_side(name, side.as_ref()));
            }
            xml.push_str("<diagonal/></border>");
        }
        xml.push_str("</borders>");

        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);

        let _ = write!(xml, r#"<cellXfs count="{}">"#, self.cell_xfs.len());
        for xf in &self.cell_xfs {
            let _ = write!(
                xml,
                r#"<xf numFmtId="{}" fontId="{}" fillId="{}" borderId="{}" xfId="0""#,
                xf.num_fmt_id.unwrap_or(0),
                xf.font_id,
                xf.fill_id,
                xf.border_id
            );
            if xf.num_fmt_id.is_some() {
                xml.push_str(r#" applyNumberFormat="1""#);
            }
            if xf.font_id > 0 {
                xml.push_str(r#" applyFont="1""#);
            }
            if xf.fill_id > 0 {
                xml.push_str(r#" applyFill="1""#);
            }
            if xf.border_id > 0 {
                xml.push_str(r#" applyBorder="1""#);
            }
            match &xf.alignment {
                Some(alignment) => {
                    let _ = write!(xml, r#" applyAlignment="1">{alignment}</xf>"#);
                }
                None => xml.push_str("/>"),
            }
        }
        xml.push_str("</cellXfs>");

        xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
        xml.push_str("</styleSheet>");
        xml
    }
}

fn alignment_xml(style: &StyleBuilder) -> Option<String> {
    if style.align_horizontal.is_none() && style.align_vertical.is_none() && !style.wrap_text {
        return None;
    }
    let mut attrs = String::new();
    if let Some(h) = &style.align_horizontal {
        let _ = write!(attrs, r#" horizontal="{h}""#);
    }
    if let Some(v) = &style.align_vertical {
        let _ = write!(attrs, r#" vertical="{v}""#);
    }
    if style.wrap_text {
        attrs.push_str(r#" wrapText="1""#);
    }
    Some(format!("<alignment{attrs}/>"))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Normalize a colour to `AARRGGBB` without `#`.
fn normalize_color(color: &str) -> String {
    let color = color.trim_start_matches('#').to_uppercase();
    if color.len() == 8 {
        color
    } else {
        format!("FF{color}")
    }
}

fn builtin_format_id(format: &str) -> Option<u32> {
    match format {
        "General" => Some(0),
        "0" => Some(1),
        "0.00" => Some(2),
        "#,##0" => Some(3),
        "#,##0.00" => Some(4),
        "0%" => Some(9),
        "0.00%" => Some(10),
        "@" => Some(49),
        _ => None,
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn format_border_side(name: &str, side: Option<&BorderSide>) -> String {
    match side {
        Some(side) => {
            let mut xml = format!(r#"<{name} style="{}">"#, side.style);
            if let Some(c) = &side.color {
                let _ = write!(xml, r#"<color rgb="{c}"/>"#);
            }
            let _ = write!(xml, "</{name}>");
            xml
        }
        None => format!("<{name}/>"),
    }
}

fn generate_content_types(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

fn generate_rels() -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    xml.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#);
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        );
    }
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheet_count + 2
    );
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook(sheets: &[SheetBuilder]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(&sheet.name),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn generate_shared_strings(strings: &[String]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(
        xml,
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in strings {
        let _ = write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(s));
    }
    xml.push_str("</sst>");
    xml
}

/// Column number (1-based) to letters.
fn col_num_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// `"B12"` to 1-based `(col, row)`.
fn parse_cell_ref(cell_ref: &str) -> (u32, u32) {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    for c in cell_ref.chars() {
        if c.is_ascii_alphabetic() {
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        } else if let Some(d) = c.to_digit(10) {
            row = row * 10 + d;
        }
    }
    (col, row)
}

fn generate_sheet_xml(
    sheet: &SheetBuilder,
    shared_strings: &[String],
    styles: &StylesCollector,
) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if !sheet.col_widths.is_empty() {
        xml.push_str("<cols>");
        for col in &sheet.col_widths {
            let hidden = if col.hidden { r#" hidden="1""# } else { "" };
            let _ = write!(
                xml,
                r#"<col min="{}" max="{}" width="{}" customWidth="1"{hidden}/>"#,
                col.min, col.max, col.width
            );
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");

    let mut rows: BTreeMap<u32, Vec<&CellEntry>> = BTreeMap::new();
    for cell in &sheet.cells {
        let (_, row) = parse_cell_ref(&cell.cell_ref);
        rows.entry(row).or_default().push(cell);
    }
    // Rows that only carry a height still need an element.
    for rh in &sheet.row_heights {
        rows.entry(rh.row).or_default();
    }

    for (row_num, mut cells) in rows {
        cells.sort_by_key(|c| parse_cell_ref(&c.cell_ref).0);
        let _ = write!(xml, r#"<row r="{row_num}""#);
        if let Some(rh) = sheet.row_heights.iter().find(|rh| rh.row == row_num) {
            let _ = write!(xml, r#" ht="{}" customHeight="1""#, rh.height);
            if rh.hidden {
                xml.push_str(r#" hidden="1""#);
            }
        }
        xml.push('>');

        for cell in cells {
            let mut attrs = format!(r#"r="{}""#, cell.cell_ref);
            if let Some(idx) = cell.style.as_ref().and_then(|s| styles.style_index(s)) {
                let _ = write!(attrs, r#" s="{idx}""#);
            }
            match &cell.value {
                CellValue::String(s) => {
                    let idx = shared_strings.iter().position(|x| x == s).unwrap_or(0);
                    let _ = write!(xml, r#"<c {attrs} t="s"><v>{idx}</v></c>"#);
                }
                CellValue::Number(n) => {
                    let _ = write!(xml, r#"<c {attrs}><v>{n}</v></c>"#);
                }
                CellValue::Boolean(b) => {
                    let _ = write!(xml, r#"<c {attrs} t="b"><v>{}</v></c>"#, u8::from(*b));
                }
                CellValue::Empty => {
                    let _ = write!(xml, r#"<c {attrs}/>"#);
                }
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !sheet.merges.is_empty() {
        let _ = write!(xml, r#"<mergeCells count="{}">"#, sheet.merges.len());
        for range in &sheet.merges {
            let _ = write!(xml, r#"<mergeCell ref="{range}"/>"#);
        }
        xml.push_str("</mergeCells>");
    }

    if sheet.landscape {
        xml.push_str(r#"<pageSetup orientation="landscape"/>"#);
    }

    xml.push_str("</worksheet>");
    xml
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// A single sheet holding one text cell.
#[must_use]
pub fn xlsx_with_text(text: &str) -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("A1", text, None))
        .build()
}

/// The invoice-style template used across the render tests: a static
/// title row, then one row per `Items.SubItems` element.
#[must_use]
pub fn items_template() -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .col_width(1, 1, 20.0)
                .col_width(2, 3, 10.0)
                .cell(
                    "A1",
                    "Items: {{ Items_length }}",
                    Some(StyleBuilder::new().bold()),
                )
                .cell(
                    "A2",
                    "{{ Items.Name }}[v-merge]",
                    Some(StyleBuilder::new().border_all("thin", Some("000000"))),
                )
                .cell("B2", "{{ Items.SubItems.Name }}", None)
                .cell("C2", "{{ Items_SubItems_length }}", None),
        )
        .build()
}
