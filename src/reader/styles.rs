//! Parsing of xl/styles.xml and resolution of `cellXfs` entries into
//! [`Style`] values.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::BufRead;

use crate::color::{normalize_hex, resolve_color};
use crate::error::Result;
use crate::types::{
    Border, BorderStyle, CellXf, HAlign, RawAlignment, RawBorder, RawBorderSide, RawFill,
    RawFont, Style, StyleSheet, Theme, VAlign,
};
use crate::xml_helpers::{attr_bool, attr_string, attr_u32, attr_val, parse_color_attrs};

/// Built-in number formats that templates commonly use.
pub(crate) const BUILTIN_NUM_FMTS: [(u32, &str); 22] = [
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (49, "@"),
];

pub(crate) fn builtin_num_fmt(id: u32) -> Option<&'static str> {
    BUILTIN_NUM_FMTS
        .iter()
        .find(|(fid, _)| *fid == id)
        .map(|(_, code)| *code)
}

/// Parse styles.xml content.
#[allow(clippy::too_many_lines)]
pub(crate) fn parse_styles<R: BufRead>(reader: R) -> Result<StyleSheet> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);

    let mut stylesheet = StyleSheet::default();
    let mut buf = Vec::new();

    let mut in_fonts = false;
    let mut in_fills = false;
    let mut in_borders = false;
    let mut in_cell_xfs = false;
    let mut in_cell_style_xfs = false;
    let mut in_num_fmts = false;
    let mut in_indexed_colors = false;
    let mut in_dxfs = false;

    let mut current_font: Option<RawFont> = None;
    let mut current_fill: Option<RawFill> = None;
    let mut current_border: Option<RawBorder> = None;
    let mut current_side: Option<String> = None;
    let mut current_xf: Option<CellXf> = None;
    let mut indexed_colors: Vec<String> = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(ref event @ (Event::Start(ref e) | Event::Empty(ref e))) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();
                let name_str = std::str::from_utf8(name.as_ref()).unwrap_or("");

                match name_str {
                    // Differential formats reuse font/fill/border element names.
                    "dxfs" => in_dxfs = !is_empty,
                    _ if in_dxfs => {}

                    "numFmts" => in_num_fmts = true,
                    "fonts" => in_fonts = true,
                    "fills" => in_fills = true,
                    "borders" => in_borders = true,
                    "cellXfs" => in_cell_xfs = true,
                    "cellStyleXfs" => in_cell_style_xfs = true,
                    "indexedColors" => in_indexed_colors = true,

                    "rgbColor" if in_indexed_colors => {
                        if let Some(color) = attr_string(e, b"rgb").and_then(|c| normalize_hex(&c))
                        {
                            indexed_colors.push(color);
                        }
                    }

                    "numFmt" if in_num_fmts => {
                        if let (Some(id), Some(code)) =
                            (attr_u32(e, b"numFmtId"), attr_string(e, b"formatCode"))
                        {
                            stylesheet.num_fmts.push((id, code));
                        }
                    }

                    "font" if in_fonts => {
                        if is_empty {
                            stylesheet.fonts.push(RawFont::default());
                        } else {
                            current_font = Some(RawFont::default());
                        }
                    }
                    "sz" => {
                        if let Some(font) = current_font.as_mut() {
                            font.size = attr_val(e).and_then(|s| s.parse().ok());
                        }
                    }
                    "name" | "rFont" => {
                        if let Some(font) = current_font.as_mut() {
                            font.name = attr_val(e);
                        }
                    }
                    "b" => {
                        if let Some(font) = current_font.as_mut() {
                            font.bold = attr_bool(e, b"val").unwrap_or(true);
                        }
                    }
                    "i" => {
                        if let Some(font) = current_font.as_mut() {
                            font.italic = attr_bool(e, b"val").unwrap_or(true);
                        }
                    }
                    "u" => {
                        if let Some(font) = current_font.as_mut() {
                            font.underline = attr_val(e).map_or(true, |v| v != "none");
                        }
                    }
                    "strike" => {
                        if let Some(font) = current_font.as_mut() {
                            font.strikethrough = attr_bool(e, b"val").unwrap_or(true);
                        }
                    }

                    "fill" if in_fills => {
                        if is_empty {
                            stylesheet.fills.push(RawFill::default());
                        } else {
                            current_fill = Some(RawFill::default());
                        }
                    }
                    "patternFill" => {
                        if let Some(fill) = current_fill.as_mut() {
                            fill.pattern_type = attr_string(e, b"patternType");
                        }
                    }
                    "fgColor" => {
                        if let Some(fill) = current_fill.as_mut() {
                            fill.fg_color = Some(parse_color_attrs(e));
                        }
                    }
                    "bgColor" => {
                        if let Some(fill) = current_fill.as_mut() {
                            fill.bg_color = Some(parse_color_attrs(e));
                        }
                    }

                    "border" if in_borders => {
                        if is_empty {
                            stylesheet.borders.push(RawBorder::default());
                        } else {
                            current_border = Some(RawBorder::default());
                        }
                    }
                    "left" | "right" | "top" | "bottom" | "start" | "end"
                        if current_border.is_some() =>
                    {
                        let side_name = match name_str {
                            "start" => "left",
                            "end" => "right",
                            other => other,
                        };
                        current_side = Some(side_name.to_string());
                        if let (Some(style), Some(border)) =
                            (attr_string(e, b"style"), current_border.as_mut())
                        {
                            let side = Some(RawBorderSide { style, color: None });
                            match side_name {
                                "left" => border.left = side,
                                "right" => border.right = side,
                                "top" => border.top = side,
                                _ => border.bottom = side,
                            }
                        }
                        if is_empty {
                            current_side = None;
                        }
                    }

                    "color" => {
                        let color = parse_color_attrs(e);
                        if let Some(font) = current_font.as_mut() {
                            font.color = Some(color);
                        } else if let (Some(border), Some(side)) =
                            (current_border.as_mut(), current_side.as_deref())
                        {
                            let target = match side {
                                "left" => border.left.as_mut(),
                                "right" => border.right.as_mut(),
                                "top" => border.top.as_mut(),
                                _ => border.bottom.as_mut(),
                            };
                            if let Some(target) = target {
                                target.color = Some(color);
                            }
                        }
                    }

                    "xf" if in_cell_xfs || in_cell_style_xfs => {
                        let defaults = CellXf::default();
                        let xf = CellXf {
                            font_id: attr_u32(e, b"fontId"),
                            fill_id: attr_u32(e, b"fillId"),
                            border_id: attr_u32(e, b"borderId"),
                            num_fmt_id: attr_u32(e, b"numFmtId"),
                            xf_id: attr_u32(e, b"xfId"),
                            apply_font: attr_bool(e, b"applyFont").unwrap_or(defaults.apply_font),
                            apply_fill: attr_bool(e, b"applyFill").unwrap_or(defaults.apply_fill),
                            apply_border: attr_bool(e, b"applyBorder")
                                .unwrap_or(defaults.apply_border),
                            apply_alignment: attr_bool(e, b"applyAlignment")
                                .unwrap_or(defaults.apply_alignment),
                            alignment: None,
                        };
                        if is_empty {
                            push_xf(&mut stylesheet, xf, in_cell_xfs);
                        } else {
                            current_xf = Some(xf);
                        }
                    }
                    "alignment" => {
                        if let Some(xf) = current_xf.as_mut() {
                            xf.alignment = Some(RawAlignment {
                                horizontal: attr_string(e, b"horizontal"),
                                vertical: attr_string(e, b"vertical"),
                                wrap_text: attr_bool(e, b"wrapText").unwrap_or(false),
                                indent: attr_u32(e, b"indent"),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"dxfs" => in_dxfs = false,
                    _ if in_dxfs => {}
                    b"numFmts" => in_num_fmts = false,
                    b"fonts" => in_fonts = false,
                    b"fills" => in_fills = false,
                    b"borders" => in_borders = false,
                    b"cellXfs" => in_cell_xfs = false,
                    b"cellStyleXfs" => in_cell_style_xfs = false,
                    b"indexedColors" => in_indexed_colors = false,
                    b"font" => {
                        if let Some(font) = current_font.take() {
                            stylesheet.fonts.push(font);
                        }
                    }
                    b"fill" => {
                        if let Some(fill) = current_fill.take() {
                            stylesheet.fills.push(fill);
                        }
                    }
                    b"border" => {
                        if let Some(border) = current_border.take() {
                            stylesheet.borders.push(border);
                        }
                    }
                    b"left" | b"right" | b"top" | b"bottom" | b"start" | b"end" => {
                        current_side = None;
                    }
                    b"xf" => {
                        if let Some(xf) = current_xf.take() {
                            push_xf(&mut stylesheet, xf, in_cell_xfs);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    if !indexed_colors.is_empty() {
        stylesheet.indexed_colors = Some(indexed_colors);
    }

    Ok(stylesheet)
}

fn push_xf(stylesheet: &mut StyleSheet, xf: CellXf, cell_xfs: bool) {
    if cell_xfs {
        stylesheet.cell_xfs.push(xf);
    } else {
        stylesheet.cell_style_xfs.push(xf);
    }
}

/// Resolve `cellXfs[idx]` (with its parent cell style) into a [`Style`].
pub(crate) fn resolve_style(idx: usize, stylesheet: &StyleSheet, theme: &Theme) -> Style {
    let Some(xf) = stylesheet.cell_xfs.get(idx) else {
        return Style::default();
    };
    let parent = xf
        .xf_id
        .and_then(|id| stylesheet.cell_style_xfs.get(id as usize));
    let theme_colors = &theme.colors;
    let indexed = stylesheet.indexed_colors.as_ref();

    let mut style = Style::default();

    let font_id = inherit(xf.apply_font, xf.font_id, parent.and_then(|p| p.font_id));
    if let Some(font) = font_id.and_then(|id| stylesheet.fonts.get(id as usize)) {
        style.font_family = font.name.clone().or_else(|| theme.minor_font.clone());
        style.font_size = font.size;
        style.font_color = font
            .color
            .as_ref()
            .and_then(|c| resolve_color(c, theme_colors, indexed));
        style.bold = font.bold;
        style.italic = font.italic;
        style.underline = font.underline;
        style.strikethrough = font.strikethrough;
    }

    let fill_id = inherit(xf.apply_fill, xf.fill_id, parent.and_then(|p| p.fill_id));
    if let Some(fill) = fill_id.and_then(|id| stylesheet.fills.get(id as usize)) {
        style.pattern_type = fill.pattern_type.clone();
        style.fill_color = fill
            .fg_color
            .as_ref()
            .and_then(|c| resolve_color(c, theme_colors, indexed));
    }

    let border_id = inherit(xf.apply_border, xf.border_id, parent.and_then(|p| p.border_id));
    if let Some(border) = border_id.and_then(|id| stylesheet.borders.get(id as usize)) {
        style.border_top = resolve_border(border.top.as_ref(), theme_colors, indexed);
        style.border_right = resolve_border(border.right.as_ref(), theme_colors, indexed);
        style.border_bottom = resolve_border(border.bottom.as_ref(), theme_colors, indexed);
        style.border_left = resolve_border(border.left.as_ref(), theme_colors, indexed);
    }

    let alignment = if xf.apply_alignment {
        xf.alignment.as_ref()
    } else {
        parent
            .and_then(|p| p.alignment.as_ref())
            .or(xf.alignment.as_ref())
    };
    if let Some(align) = alignment {
        style.align_h = align.horizontal.as_deref().and_then(HAlign::from_xml);
        style.align_v = align.vertical.as_deref().and_then(VAlign::from_xml);
        style.wrap = align.wrap_text;
        style.indent = align.indent;
    }

    style
}

/// Number format code for `cellXfs[idx]`, skipping "General".
pub(crate) fn resolve_num_fmt(idx: usize, stylesheet: &StyleSheet) -> Option<String> {
    let id = stylesheet.cell_xfs.get(idx)?.num_fmt_id?;
    if id == 0 {
        return None;
    }
    stylesheet
        .num_fmts
        .iter()
        .find(|(fid, _)| *fid == id)
        .map(|(_, code)| code.clone())
        .or_else(|| builtin_num_fmt(id).map(ToString::to_string))
}

fn inherit(apply: bool, own: Option<u32>, parent: Option<u32>) -> Option<u32> {
    if apply {
        own
    } else {
        parent.or(own)
    }
}

fn resolve_border(
    side: Option<&RawBorderSide>,
    theme_colors: &[String],
    indexed_colors: Option<&Vec<String>>,
) -> Option<Border> {
    let side = side?;
    let style = BorderStyle::from_xml(&side.style)?;
    let color = side
        .color
        .as_ref()
        .and_then(|c| resolve_color(c, theme_colors, indexed_colors))
        .unwrap_or_else(|| "#000000".to_string());
    Some(Border { style, color })
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
    use crate::color::DEFAULT_THEME_COLORS;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts>
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><i/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor theme="4"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/><diagonal/></border>
    <border><left style="thin"><color rgb="FF00FF00"/></left><right/><top style="double"/><bottom/></border>
  </borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="3">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0">
      <alignment horizontal="center" vertical="top" wrapText="1"/>
    </xf>
    <xf numFmtId="4" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="0"/>
  </cellXfs>
  <dxfs count="1"><dxf><font><b/></font><fill><patternFill><bgColor rgb="FFFFFF00"/></patternFill></fill></dxf></dxfs>
</styleSheet>"#;

    fn theme() -> Theme {
        Theme {
            colors: DEFAULT_THEME_COLORS.iter().map(ToString::to_string).collect(),
            minor_font: Some("Calibri".into()),
        }
    }

    #[test]
    fn parses_tables_and_ignores_dxfs() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        assert_eq!(sheet.fonts.len(), 2);
        assert_eq!(sheet.fills.len(), 3);
        assert_eq!(sheet.borders.len(), 2);
        assert_eq!(sheet.cell_xfs.len(), 3);
        assert_eq!(sheet.cell_style_xfs.len(), 1);
        assert_eq!(sheet.num_fmts, vec![(164, "0.000".to_string())]);
    }

    #[test]
    fn resolves_full_style() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let style = resolve_style(1, &sheet, &theme());
        assert_eq!(style.font_family.as_deref(), Some("Arial"));
        assert_eq!(style.font_size, Some(14.0));
        assert!(style.bold && style.italic);
        assert_eq!(style.font_color.as_deref(), Some("#FF0000"));
        assert_eq!(style.solid_fill(), Some("#4472C4"));
        let left = style.border_left.as_ref().unwrap();
        assert_eq!(left.style, BorderStyle::Thin);
        assert_eq!(left.color, "#00FF00");
        assert_eq!(style.border_top.as_ref().unwrap().style, BorderStyle::Double);
        assert!(style.border_right.is_none());
        assert_eq!(style.align_h, Some(HAlign::Center));
        assert_eq!(style.align_v, Some(VAlign::Top));
        assert!(style.wrap);
    }

    #[test]
    fn apply_flag_false_inherits_parent_font() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let style = resolve_style(2, &sheet, &theme());
        assert_eq!(style.font_family.as_deref(), Some("Calibri"));
        assert!(!style.bold);
    }

    #[test]
    fn number_formats_resolve_custom_then_builtin() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        assert_eq!(resolve_num_fmt(0, &sheet), None);
        assert_eq!(resolve_num_fmt(1, &sheet).as_deref(), Some("0.000"));
        assert_eq!(resolve_num_fmt(2, &sheet).as_deref(), Some("#,##0.00"));
    }
}
