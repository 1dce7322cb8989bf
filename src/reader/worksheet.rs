//! Worksheet parsing into the dense grid model.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::cell_ref::{parse_cell_range, parse_cell_ref_bytes};
use crate::error::Result;
use crate::types::{Cell, CellType, Column, Orientation, Row, Sheet, StyleRef};
use crate::xml_helpers::{attr_bool, attr_f64, attr_string, attr_u32};

use super::package::SheetInfo;

/// Per-workbook lookups shared by every sheet parse.
pub(super) struct CellFormats<'a> {
    pub shared_strings: &'a [String],
    /// `cellXfs` index -> resolved style.
    pub styles: &'a [StyleRef],
    /// `cellXfs` index -> number format code.
    pub num_fmts: &'a [Option<String>],
}

impl CellFormats<'_> {
    fn style(&self, idx: Option<u32>) -> StyleRef {
        idx.and_then(|i| self.styles.get(i as usize))
            .or_else(|| self.styles.first())
            .cloned()
            .unwrap_or_default()
    }

    fn num_fmt(&self, idx: Option<u32>) -> Option<String> {
        idx.and_then(|i| self.num_fmts.get(i as usize))
            .and_then(Clone::clone)
    }
}

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Copy, Clone)]
enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Default,
}

fn parse_cell_type_tag(value: &[u8]) -> CellTypeTag {
    match value {
        b"s" => CellTypeTag::Shared,
        b"b" => CellTypeTag::Bool,
        b"e" => CellTypeTag::Error,
        b"str" => CellTypeTag::Str,
        b"inlineStr" => CellTypeTag::Inline,
        _ => CellTypeTag::Default,
    }
}

fn resolve_cell_value(
    raw: Option<String>,
    tag: CellTypeTag,
    shared_strings: &[String],
) -> (String, CellType) {
    let raw = raw.unwrap_or_default();
    match tag {
        CellTypeTag::Shared => {
            let text = raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .cloned()
                .unwrap_or_default();
            (text, CellType::String)
        }
        CellTypeTag::Bool => {
            let text = if raw.trim() == "1" { "TRUE" } else { "FALSE" };
            (text.to_string(), CellType::Boolean)
        }
        CellTypeTag::Default if !raw.is_empty() => (raw, CellType::Number),
        CellTypeTag::Inline | CellTypeTag::Str | CellTypeTag::Error | CellTypeTag::Default => {
            (raw, CellType::String)
        }
    }
}

fn row_mut(sheet: &mut Sheet, row: usize) -> Option<&mut Row> {
    if sheet.rows.len() <= row {
        sheet.rows.resize_with(row + 1, Row::default);
    }
    sheet.rows.get_mut(row)
}

fn place_cell(sheet: &mut Sheet, row: usize, col: usize, cell: Cell) {
    if let Some(r) = row_mut(sheet, row) {
        if r.cells.len() <= col {
            r.cells.resize_with(col + 1, Cell::default);
        }
        if let Some(slot) = r.cells.get_mut(col) {
            *slot = cell;
        }
    }
}

/// Read the text payload of the element just opened, up to its end tag.
fn read_text<R: std::io::BufRead>(xml: &mut Reader<R>, end: &[u8]) -> String {
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_phonetic = false;
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Text(ref t)) if !in_phonetic => {
                if let Ok(text) = t.unescape() {
                    out.push_str(&text);
                }
            }
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"rPh" => in_phonetic = true,
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                if name.as_ref() == b"rPh" {
                    in_phonetic = false;
                } else if name.as_ref() == end {
                    break;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    out
}

/// Parse a single worksheet part.
#[allow(clippy::too_many_lines)]
pub(super) fn parse_sheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    info: &SheetInfo,
    formats: &CellFormats<'_>,
) -> Result<Sheet> {
    let file = archive.by_name(&info.path)?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut sheet = Sheet::new(&info.name);
    let mut buf = Vec::new();
    let mut current_row: usize = 0;
    let mut next_col: usize = 0;
    let mut merges: Vec<(u32, u32, u32, u32)> = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(ref event @ (Event::Start(_) | Event::Empty(_))) => {
                let (Event::Start(ref e) | Event::Empty(ref e)) = event else {
                    continue;
                };
                let is_start_event = matches!(event, Event::Start(_));

                match e.local_name().as_ref() {
                    b"sheetFormatPr" => {
                        if let Some(h) = attr_f64(e, b"defaultRowHeight") {
                            sheet.default_row_height = h;
                        }
                    }
                    b"col" => {
                        let min = attr_u32(e, b"min").unwrap_or(1).max(1);
                        let max = attr_u32(e, b"max").unwrap_or(min).clamp(min, 16_384);
                        let column = Column {
                            width: attr_f64(e, b"width").unwrap_or(crate::types::DEFAULT_COL_WIDTH),
                            hidden: attr_bool(e, b"hidden").unwrap_or(false),
                            style: attr_u32(e, b"style").map(|s| formats.style(Some(s))),
                        };
                        let last = max as usize;
                        if sheet.columns.len() < last {
                            sheet.columns.resize_with(last, Column::default);
                        }
                        for slot in sheet
                            .columns
                            .iter_mut()
                            .skip(min as usize - 1)
                            .take(last + 1 - min as usize)
                        {
                            *slot = column.clone();
                        }
                    }
                    b"row" => {
                        current_row = attr_u32(e, b"r")
                            .map_or(sheet.rows.len(), |r| (r as usize).saturating_sub(1));
                        next_col = 0;
                        let height = attr_f64(e, b"ht");
                        let hidden = attr_bool(e, b"hidden").unwrap_or(false);
                        if let Some(row) = row_mut(&mut sheet, current_row) {
                            row.height = height;
                            row.hidden = hidden;
                        }
                    }
                    b"c" => {
                        let mut col = next_col;
                        let mut tag = CellTypeTag::Default;
                        let mut style_idx: Option<u32> = None;

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"r" => {
                                    if let Some((c, _)) = parse_cell_ref_bytes(&attr.value) {
                                        col = c as usize;
                                    }
                                }
                                b"t" => tag = parse_cell_type_tag(&attr.value),
                                b"s" => {
                                    style_idx = std::str::from_utf8(&attr.value)
                                        .ok()
                                        .and_then(|s| s.parse().ok());
                                }
                                _ => {}
                            }
                        }
                        next_col = col + 1;

                        let mut value: Option<String> = None;
                        if is_start_event {
                            let mut cell_buf = Vec::new();
                            loop {
                                match xml.read_event_into(&mut cell_buf) {
                                    Ok(Event::Start(ref inner)) => match inner.local_name().as_ref()
                                    {
                                        b"v" => value = Some(read_text(&mut xml, b"v")),
                                        b"is" => value = Some(read_text(&mut xml, b"is")),
                                        b"f" => {
                                            read_text(&mut xml, b"f");
                                        }
                                        _ => {}
                                    },
                                    Ok(Event::End(ref inner))
                                        if inner.local_name().as_ref() == b"c" =>
                                    {
                                        break
                                    }
                                    Ok(Event::Eof) | Err(_) => break,
                                    _ => {}
                                }
                                cell_buf.clear();
                            }
                        }

                        let (text, cell_type) =
                            resolve_cell_value(value, tag, formats.shared_strings);
                        let cell = Cell {
                            text,
                            style: formats.style(style_idx),
                            cell_type,
                            num_fmt: formats.num_fmt(style_idx),
                            ..Cell::default()
                        };
                        place_cell(&mut sheet, current_row, col, cell);
                    }
                    b"mergeCell" => {
                        if let Some(range) = attr_string(e, b"ref").and_then(|r| parse_cell_range(&r))
                        {
                            merges.push(range);
                        }
                    }
                    b"pageSetup" => {
                        if attr_string(e, b"orientation").as_deref() == Some("landscape") {
                            sheet.orientation = Orientation::Landscape;
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

    sheet.normalize_shape();

    for (start_row, start_col, end_row, end_col) in merges {
        if let Some(cell) = sheet.cell_mut(start_row as usize, start_col as usize) {
            cell.hmerge = end_col - start_col;
            cell.vmerge = end_row - start_row;
        }
    }

    Ok(sheet)
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

    #[test]
    fn shared_string_lookup() {
        let strings = vec!["a".to_string(), "b".to_string()];
        let (text, ty) = resolve_cell_value(Some("1".into()), CellTypeTag::Shared, &strings);
        assert_eq!(text, "b");
        assert_eq!(ty, CellType::String);
        let (text, _) = resolve_cell_value(Some("7".into()), CellTypeTag::Shared, &strings);
        assert_eq!(text, "");
    }

    #[test]
    fn numbers_and_booleans_keep_their_type() {
        let (text, ty) = resolve_cell_value(Some("3.5".into()), CellTypeTag::Default, &[]);
        assert_eq!((text.as_str(), ty), ("3.5", CellType::Number));
        let (text, ty) = resolve_cell_value(Some("1".into()), CellTypeTag::Bool, &[]);
        assert_eq!((text.as_str(), ty), ("TRUE", CellType::Boolean));
        let (text, ty) = resolve_cell_value(None, CellTypeTag::Default, &[]);
        assert_eq!((text.as_str(), ty), ("", CellType::String));
    }
}
