//! Package-level parts: workbook relationships, sheet list, theme and the
//! shared string table.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::color::DEFAULT_THEME_COLORS;
use crate::error::Result;
use crate::types::Theme;
use crate::xml_helpers::{attr_string, attr_string_local};

/// Paths of the parts referenced from `xl/_rels/workbook.xml.rels`,
/// resolved against `xl/`.
#[derive(Default, Debug)]
pub(super) struct WorkbookRelationships {
    /// rId -> part path, e.g. "rId1" -> "xl/worksheets/sheet1.xml"
    pub worksheets: HashMap<String, String>,
    pub shared_strings: Option<String>,
    pub styles: Option<String>,
    pub theme: Option<String>,
}

/// Sheet name and part path from `xl/workbook.xml`.
#[derive(Debug, Clone)]
pub(super) struct SheetInfo {
    pub name: String,
    pub path: String,
}

pub(super) fn parse_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> WorkbookRelationships {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return rels;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let id = attr_string(e, b"Id").unwrap_or_default();
                    let target = attr_string(e, b"Target").unwrap_or_default();
                    let rel_type = attr_string(e, b"Type").unwrap_or_default();

                    let full_path = match target.strip_prefix('/') {
                        Some(stripped) => stripped.to_string(),
                        None => format!("xl/{target}"),
                    };

                    if rel_type.ends_with("/worksheet") && !id.is_empty() && !target.is_empty() {
                        rels.worksheets.insert(id, full_path);
                    } else if rel_type.ends_with("/sharedStrings") {
                        rels.shared_strings = Some(full_path);
                    } else if rel_type.ends_with("/styles") {
                        rels.styles = Some(full_path);
                    } else if rel_type.ends_with("/theme") {
                        rels.theme = Some(full_path);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Sheet list in workbook order.
pub(super) fn get_sheet_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<Vec<SheetInfo>> {
    let file = archive.by_name("xl/workbook.xml")?;

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let name = attr_string(e, b"name").unwrap_or_default();
                    let r_id = attr_string_local(e, b"id").unwrap_or_default();
                    if !name.is_empty() {
                        let path = relationships.get(&r_id).cloned().unwrap_or_else(|| {
                            format!("xl/worksheets/sheet{}.xml", sheets.len() + 1)
                        });
                        sheets.push(SheetInfo { name, path });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Theme color scheme and minor (body) font.
pub(super) fn parse_theme<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: Option<&str>,
) -> Theme {
    let mut theme = Theme {
        colors: DEFAULT_THEME_COLORS.iter().map(ToString::to_string).collect(),
        minor_font: None,
    };

    let Ok(file) = archive.by_name(path.unwrap_or("xl/theme/theme1.xml")) else {
        return theme;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    // Element names in theme index order.
    let color_elements = [
        "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5",
        "accent6", "hlink", "folHlink",
    ];
    let mut color_index: Option<usize> = None;
    let mut in_clr_scheme = false;
    let mut in_minor_font = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                match name {
                    "clrScheme" => in_clr_scheme = true,
                    "minorFont" => in_minor_font = true,
                    "srgbClr" | "sysClr" if in_clr_scheme => {
                        let val = attr_string(e, b"lastClr").or_else(|| attr_string(e, b"val"));
                        if let (Some(idx), Some(val)) = (color_index, val) {
                            if val.len() == 6 {
                                if let Some(slot) = theme.colors.get_mut(idx) {
                                    *slot = format!("#{}", val.to_ascii_uppercase());
                                }
                            }
                        }
                    }
                    "latin" if in_minor_font && theme.minor_font.is_none() => {
                        theme.minor_font = attr_string(e, b"typeface").filter(|t| !t.is_empty());
                    }
                    other if in_clr_scheme => {
                        if let Some(pos) = color_elements.iter().position(|&n| n == other) {
                            color_index = Some(pos);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"clrScheme" => in_clr_scheme = false,
                b"minorFont" => in_minor_font = false,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    theme
}

/// Shared string table; rich text runs are flattened to plain text.
pub(super) fn parse_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: Option<&str>,
) -> Vec<String> {
    let Ok(file) = archive.by_name(path.unwrap_or("xl/sharedStrings.xml")) else {
        return Vec::new();
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut strings = Vec::new();
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) if in_t => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    strings
}
