//! Rebuilds xl/styles.xml from the resolved styles used by a workbook.
//!
//! Fonts, fills, borders and number formats are deduplicated by their
//! serialized XML, so identical styles share a single `cellXfs` entry.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::color::to_argb;
use crate::reader::styles::BUILTIN_NUM_FMTS;
use crate::types::{Border, Style, DEFAULT_FONT_SIZE};
use crate::xml_helpers::xml_escape;

const FIRST_CUSTOM_NUM_FMT: u32 = 164;
const DEFAULT_FONT_NAME: &str = "Calibri";

#[derive(Default)]
struct Interner {
    items: Vec<String>,
    index: HashMap<String, usize>,
}

impl Interner {
    fn intern(&mut self, xml: String) -> usize {
        if let Some(&idx) = self.index.get(&xml) {
            return idx;
        }
        let idx = self.items.len();
        self.index.insert(xml.clone(), idx);
        self.items.push(xml);
        idx
    }
}

/// Collects styles while sheets are written and emits the stylesheet last.
pub(crate) struct StylesCollector {
    fonts: Interner,
    fills: Interner,
    borders: Interner,
    xfs: Interner,
    custom_num_fmts: Vec<(u32, String)>,
}

impl StylesCollector {
    pub(crate) fn new() -> Self {
        let mut collector = Self {
            fonts: Interner::default(),
            fills: Interner::default(),
            borders: Interner::default(),
            xfs: Interner::default(),
            custom_num_fmts: Vec::new(),
        };
        // Index 0 of every table is the workbook default; fills 0/1 are reserved.
        collector.style_index(&Style::default(), None);
        collector
            .fills
            .intern(r#"<fill><patternFill patternType="gray125"/></fill>"#.to_string());
        collector
    }

    /// `cellXfs` index for a style and number format, adding entries as needed.
    pub(crate) fn style_index(&mut self, style: &Style, num_fmt: Option<&str>) -> usize {
        let font_id = self.fonts.intern(font_xml(style));
        let fill_id = self.fills.intern(fill_xml(style));
        let border_id = self.borders.intern(border_xml(style));
        let num_fmt_id = num_fmt.map_or(0, |code| self.num_fmt_id(code));

        let mut xf = format!(
            r#"<xf numFmtId="{num_fmt_id}" fontId="{font_id}" fillId="{fill_id}" borderId="{border_id}" xfId="0""#
        );
        if num_fmt_id != 0 {
            xf.push_str(r#" applyNumberFormat="1""#);
        }
        if font_id != 0 {
            xf.push_str(r#" applyFont="1""#);
        }
        if fill_id != 0 {
            xf.push_str(r#" applyFill="1""#);
        }
        if border_id != 0 {
            xf.push_str(r#" applyBorder="1""#);
        }
        match alignment_xml(style) {
            Some(alignment) => {
                xf.push_str(r#" applyAlignment="1">"#);
                xf.push_str(&alignment);
                xf.push_str("</xf>");
            }
            None => xf.push_str("/>"),
        }
        self.xfs.intern(xf)
    }

    fn num_fmt_id(&mut self, code: &str) -> u32 {
        if let Some((id, _)) = BUILTIN_NUM_FMTS.iter().find(|(_, c)| *c == code) {
            return *id;
        }
        if let Some((id, _)) = self.custom_num_fmts.iter().find(|(_, c)| c == code) {
            return *id;
        }
        let next = self
            .custom_num_fmts
            .last()
            .map_or(FIRST_CUSTOM_NUM_FMT, |(id, _)| id + 1);
        self.custom_num_fmts.push((next, code.to_string()));
        next
    }

    /// Serialize the collected tables.
    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::with_capacity(2048);
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(
            r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if !self.custom_num_fmts.is_empty() {
            let _ = write!(out, r#"<numFmts count="{}">"#, self.custom_num_fmts.len());
            for (id, code) in &self.custom_num_fmts {
                let _ = write!(
                    out,
                    r#"<numFmt numFmtId="{id}" formatCode="{}"/>"#,
                    xml_escape(code)
                );
            }
            out.push_str("</numFmts>");
        }

        write_table(&mut out, "fonts", &self.fonts.items);
        write_table(&mut out, "fills", &self.fills.items);
        write_table(&mut out, "borders", &self.borders.items);
        out.push_str(
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
        );
        write_table(&mut out, "cellXfs", &self.xfs.items);
        out.push_str(
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
        );
        out.push_str("</styleSheet>");
        out
    }
}

fn write_table(out: &mut String, tag: &str, items: &[String]) {
    let _ = write!(out, r#"<{tag} count="{}">"#, items.len());
    for item in items {
        out.push_str(item);
    }
    let _ = write!(out, "</{tag}>");
}

fn font_xml(style: &Style) -> String {
    let mut out = String::from("<font>");
    if style.bold {
        out.push_str("<b/>");
    }
    if style.italic {
        out.push_str("<i/>");
    }
    if style.underline {
        out.push_str("<u/>");
    }
    if style.strikethrough {
        out.push_str("<strike/>");
    }
    let _ = write!(out, r#"<sz val="{}"/>"#, style.font_size.unwrap_or(DEFAULT_FONT_SIZE));
    if let Some(color) = &style.font_color {
        let _ = write!(out, r#"<color rgb="{}"/>"#, to_argb(color));
    }
    let _ = write!(
        out,
        r#"<name val="{}"/>"#,
        xml_escape(style.font_family.as_deref().unwrap_or(DEFAULT_FONT_NAME))
    );
    out.push_str("</font>");
    out
}

fn fill_xml(style: &Style) -> String {
    match (style.pattern_type.as_deref(), style.fill_color.as_deref()) {
        (None | Some("none"), _) => r#"<fill><patternFill patternType="none"/></fill>"#.to_string(),
        (Some(pattern), Some(color)) => format!(
            r#"<fill><patternFill patternType="{}"><fgColor rgb="{}"/><bgColor indexed="64"/></patternFill></fill>"#,
            xml_escape(pattern),
            to_argb(color)
        ),
        (Some(pattern), None) => format!(
            r#"<fill><patternFill patternType="{}"/></fill>"#,
            xml_escape(pattern)
        ),
    }
}

fn border_side_xml(out: &mut String, tag: &str, border: Option<&Border>) {
    match border {
        Some(b) => {
            let _ = write!(
                out,
                r#"<{tag} style="{}"><color rgb="{}"/></{tag}>"#,
                b.style.as_xml(),
                to_argb(&b.color)
            );
        }
        None => {
            let _ = write!(out, "<{tag}/>");
        }
    }
}

fn border_xml(style: &Style) -> String {
    let mut out = String::from("<border>");
    border_side_xml(&mut out, "left", style.border_left.as_ref());
    border_side_xml(&mut out, "right", style.border_right.as_ref());
    border_side_xml(&mut out, "top", style.border_top.as_ref());
    border_side_xml(&mut out, "bottom", style.border_bottom.as_ref());
    out.push_str("<diagonal/></border>");
    out
}

fn alignment_xml(style: &Style) -> Option<String> {
    if style.align_h.is_none() && style.align_v.is_none() && !style.wrap && style.indent.is_none()
    {
        return None;
    }
    let mut out = String::from("<alignment");
    if let Some(h) = style.align_h {
        let _ = write!(out, r#" horizontal="{}""#, h.as_xml());
    }
    if let Some(v) = style.align_v {
        let _ = write!(out, r#" vertical="{}""#, v.as_xml());
    }
    if style.wrap {
        out.push_str(r#" wrapText="1""#);
    }
    if let Some(indent) = style.indent {
        let _ = write!(out, r#" indent="{indent}""#);
    }
    out.push_str("/>");
    Some(out)
}
