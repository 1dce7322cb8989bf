//! PDF export.
//!
//! Each sheet goes through two passes. Planning wraps every cell's text
//! against its scaled column width, grows rows until the text fits and
//! assigns rows to pages. Drawing then paints fills, text and borders with
//! printpdf. Planning is pure, so it is tested without font files.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

use printpdf::path::PaintMode;
use printpdf::{
    Color, IndirectFontRef, Line, LineDashPattern, Mm, PdfDocument, PdfLayerReference, Point,
    Rect, Rgb,
};

use crate::color::hex_to_rgb;
use crate::config::ExportConfig;
use crate::error::{Result, XlsxtError};
use crate::types::{BorderSide, BorderStyle, CellType, HAlign, Sheet, StyleRef, VAlign, Workbook};

use super::fonts::{wrap_text, FixedWidth, FontKey, FontStore, TextMeasure, TtfMeasure};
use super::page::{PageGeometry, PT_TO_MM};
use super::sheet_layout::SheetLayout;

const LAYER: &str = "cells";

/// Baseline position within a line box, as a fraction of its height.
const BASELINE_RATIO: f64 = 0.8;

/// Picks the measurer for a font face.
pub trait MeasureSource {
    fn measurer(&self, key: &FontKey) -> Option<&dyn TextMeasure>;
}

impl MeasureSource for HashMap<FontKey, TtfMeasure<'_>> {
    fn measurer(&self, key: &FontKey) -> Option<&dyn TextMeasure> {
        self.get(key).map(|m| m as &dyn TextMeasure)
    }
}

impl MeasureSource for FixedWidth {
    fn measurer(&self, _key: &FontKey) -> Option<&dyn TextMeasure> {
        Some(self)
    }
}

/// One drawn cell: a single cell or the origin of a merge.
#[derive(Debug, Clone)]
pub struct CellPlan {
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub width: f64,
    pub row_span: usize,
    pub style: StyleRef,
    pub numeric: bool,
    pub font: FontKey,
    pub size_pt: f64,
    pub lines: Vec<String>,
    /// Page-sized pieces of the cell box, top to bottom.
    pub fragments: Vec<Fragment>,
    /// Wrapped lines with their final page positions.
    pub placed: Vec<PlacedLine>,
}

/// A slice of a row placed on a page; `y` is measured down from the
/// printable top. Rows taller than the printable height are split into
/// several slices on consecutive pages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRow {
    pub row: usize,
    pub y: f64,
    pub height: f64,
}

/// The part of a cell box that lies on one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub page: usize,
    pub y: f64,
    pub height: f64,
}

/// One text line; `x` and `baseline` are relative to the printable area's
/// top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub page: usize,
    pub x: f64,
    pub baseline: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SheetPlan {
    pub page: PageGeometry,
    pub layout: SheetLayout,
    pub cells: Vec<CellPlan>,
    /// Rows per page; never empty, a sheet always gets at least one page.
    pub pages: Vec<Vec<PlacedRow>>,
    pub padding_mm: f64,
    pub line_spacing: f64,
}

/// Upper bound on grow-and-paginate passes for text that overflows its
/// fragments.
const MAX_LAYOUT_PASSES: usize = 8;

const EPSILON: f64 = 1e-9;

/// Slices of every placed row, keyed by row, each with its page index.
fn slices_by_row(pages: &[Vec<PlacedRow>]) -> HashMap<usize, Vec<(usize, PlacedRow)>> {
    let mut out: HashMap<usize, Vec<(usize, PlacedRow)>> = HashMap::new();
    for (p, rows) in pages.iter().enumerate() {
        for placed in rows {
            out.entry(placed.row).or_default().push((p, *placed));
        }
    }
    out
}

fn is_drawn(sheet: &Sheet, layout: &SheetLayout, row: usize, col: usize) -> bool {
    let row_visible = sheet.rows.get(row).is_some_and(|r| !r.hidden);
    let col_visible = sheet.columns.get(col).is_some_and(|c| !c.hidden);
    let cell_visible = sheet.cell(row, col).is_some_and(|c| !c.hidden);
    row_visible && col_visible && cell_visible && !layout.cell_rect(row, col).skip
}

/// Wrap, grow and paginate one sheet.
pub fn plan_sheet(sheet: &Sheet, config: &ExportConfig, source: &dyn MeasureSource) -> SheetPlan {
    let page = PageGeometry::new(sheet.orientation, config.margin_mm);
    let mut layout = SheetLayout::new(sheet, page.printable_width());
    let padding = config.cell_padding_mm;

    let mut cells = Vec::new();
    // (origin row, span, required height) for vertically merged cells.
    let mut merged_needs = Vec::new();

    for (r, row) in sheet.rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if !is_drawn(sheet, &layout, r, c) {
                continue;
            }
            let rect = layout.cell_rect(r, c);
            let row_span = layout.merge(r, c).map_or(1, |m| m.row_span);
            let font = FontKey::for_style(&cell.style, &config.default_font);
            let size_pt = cell.style.font_size.unwrap_or(config.default_font_size);

            let lines = if cell.text.is_empty() {
                Vec::new()
            } else {
                let available = (rect.width - 2.0 * padding).max(0.0);
                measure_lines(&cell.text, available, size_pt, &font, source)
            };

            if !lines.is_empty() {
                let needed = lines_height(lines.len(), size_pt, config.line_spacing) + padding;
                if row_span == 1 {
                    if let Some(h) = layout.row_heights.get_mut(r) {
                        *h = h.max(needed);
                    }
                } else {
                    merged_needs.push((r, row_span, needed));
                }
            }

            cells.push(CellPlan {
                row: r,
                col: c,
                x: rect.x,
                width: rect.width,
                row_span,
                style: cell.style.clone(),
                numeric: cell.cell_type == CellType::Number,
                font,
                size_pt,
                lines,
                fragments: Vec::new(),
                placed: Vec::new(),
            });
        }
    }

    for (r, span, needed) in merged_needs {
        let deficit = needed - layout.span_height(r, span);
        if deficit <= 0.0 {
            continue;
        }
        if let Some(h) = layout.row_heights.get_mut(last_visible_row(sheet, r, span)) {
            *h += deficit;
        }
    }

    let printable_height = page.printable_height();
    let mut pages = paginate(sheet, &layout, printable_height);
    // Text broken across pages loses at most a line per break; grow the
    // affected rows and paginate again until everything is placed.
    for pass in 1..=MAX_LAYOUT_PASSES {
        let slices = slices_by_row(&pages);
        let mut deficits: Vec<(usize, f64)> = Vec::new();
        for cell in &mut cells {
            cell.fragments = fragments(&slices, cell.row, cell.row_span);
            let dropped = place_lines(cell, padding, config.line_spacing, source);
            if dropped > 0 {
                let height = lines_height(dropped, cell.size_pt, config.line_spacing);
                deficits.push((last_visible_row(sheet, cell.row, cell.row_span), height));
                if pass == MAX_LAYOUT_PASSES {
                    tracing::warn!(
                        sheet = %sheet.name,
                        row = cell.row,
                        col = cell.col,
                        dropped,
                        "text does not fit its cell; lines were left out"
                    );
                }
            }
        }
        if deficits.is_empty() || pass == MAX_LAYOUT_PASSES {
            break;
        }
        for (r, extra) in deficits {
            if let Some(h) = layout.row_heights.get_mut(r) {
                *h += extra;
            }
        }
        pages = paginate(sheet, &layout, printable_height);
    }

    tracing::debug!(
        sheet = %sheet.name,
        cells = cells.len(),
        pages = pages.len(),
        "planned sheet"
    );

    SheetPlan {
        page,
        layout,
        cells,
        pages,
        padding_mm: padding,
        line_spacing: config.line_spacing,
    }
}

/// Last visible row of the span starting at `row`; growth lands there.
fn last_visible_row(sheet: &Sheet, row: usize, span: usize) -> usize {
    (row..row + span)
        .rev()
        .find(|r| sheet.rows.get(*r).is_some_and(|rr| !rr.hidden))
        .unwrap_or(row)
}

/// Group the slices of rows `row..row + span` into one fragment per page.
fn fragments(
    slices: &HashMap<usize, Vec<(usize, PlacedRow)>>,
    row: usize,
    span: usize,
) -> Vec<Fragment> {
    let mut out: Vec<Fragment> = Vec::new();
    for (page, slice) in (row..row + span).filter_map(|r| slices.get(&r)).flatten() {
        match out.last_mut() {
            Some(last) if last.page == *page => last.height += slice.height,
            _ => out.push(Fragment {
                page: *page,
                y: slice.y,
                height: slice.height,
            }),
        }
    }
    out
}

/// Position the wrapped lines of `cell` inside its fragments.
///
/// A cell on a single page honours its vertical alignment. Text that spans
/// several fragments flows from the top and moves to the next fragment when
/// a line would cross the page edge. Returns the number of lines that found
/// no room.
fn place_lines(
    cell: &mut CellPlan,
    padding: f64,
    line_spacing: f64,
    source: &dyn MeasureSource,
) -> usize {
    cell.placed.clear();
    if cell.lines.is_empty() {
        return 0;
    }
    let line_height = cell.size_pt * line_spacing * PT_TO_MM;
    let block = lines_height(cell.lines.len(), cell.size_pt, line_spacing);
    let measurer = source.measurer(&cell.font);

    let single = match cell.fragments.as_slice() {
        [only] if block + padding <= only.height + EPSILON => Some(*only),
        _ => None,
    };

    let mut positions: Vec<(usize, f64)> = Vec::with_capacity(cell.lines.len());
    let mut dropped = 0;
    if let Some(frag) = single {
        let first_top = match cell.style.align_v {
            Some(VAlign::Top) => padding / 2.0,
            Some(VAlign::Center | VAlign::Justify | VAlign::Distributed) => {
                (frag.height - block) / 2.0
            }
            Some(VAlign::Bottom) | None => frag.height - padding / 2.0 - block,
        };
        let mut top = frag.y + first_top;
        for _ in &cell.lines {
            positions.push((frag.page, top));
            top += line_height;
        }
    } else {
        let mut frags = cell.fragments.iter().peekable();
        let mut pos = padding / 2.0;
        for _ in &cell.lines {
            let mut placed = None;
            while let Some(frag) = frags.peek() {
                if pos + line_height <= frag.height + EPSILON {
                    placed = Some((frag.page, frag.y + pos));
                    pos += line_height;
                    break;
                }
                frags.next();
                pos = 0.0;
            }
            match placed {
                Some(p) => positions.push(p),
                None => dropped += 1,
            }
        }
    }

    let placed: Vec<PlacedLine> = cell
        .lines
        .iter()
        .zip(positions)
        .map(|(line, (page, top))| {
            let width = measurer
                .and_then(|m| m.width_mm(line, cell.size_pt))
                .unwrap_or(0.0);
            PlacedLine {
                page,
                x: line_x(cell, width, padding),
                baseline: top + line_height * BASELINE_RATIO,
                text: line.clone(),
            }
        })
        .collect();
    cell.placed = placed;
    dropped
}

/// Left edge of a line of `width` mm, relative to the printable area.
fn line_x(cell: &CellPlan, width: f64, padding: f64) -> f64 {
    let style = &cell.style;
    let indent = f64::from(style.indent.unwrap_or(0)) * 3.0;
    let align = match style.align_h {
        Some(HAlign::General) | None if cell.numeric => HAlign::Right,
        Some(align) => align,
        None => HAlign::Left,
    };
    match align {
        HAlign::Center | HAlign::CenterContinuous => cell.x + (cell.width - width) / 2.0,
        HAlign::Right => cell.x + cell.width - padding - width,
        _ => cell.x + padding + indent,
    }
}

fn lines_height(lines: usize, size_pt: f64, line_spacing: f64) -> f64 {
    let count = u32::try_from(lines).unwrap_or(u32::MAX);
    f64::from(count) * size_pt * line_spacing * PT_TO_MM
}

fn measure_lines(
    text: &str,
    width: f64,
    size_pt: f64,
    font: &FontKey,
    source: &dyn MeasureSource,
) -> Vec<String> {
    let wrapped = source
        .measurer(font)
        .and_then(|m| wrap_text(text, width, size_pt, m));
    match wrapped {
        Some(lines) => lines,
        None => {
            tracing::warn!(
                font = %font.file_name(),
                "text could not be measured; drawing it as a single line"
            );
            vec![text.replace('\n', " ")]
        }
    }
}

/// Assign visible rows to pages. A row taller than a page starts on a
/// fresh page and is split into page-sized slices.
fn paginate(sheet: &Sheet, layout: &SheetLayout, printable_height: f64) -> Vec<Vec<PlacedRow>> {
    let printable = printable_height.max(1.0);
    let mut pages: Vec<Vec<PlacedRow>> = vec![Vec::new()];
    let mut y = 0.0;

    for (r, row) in sheet.rows.iter().enumerate() {
        if row.hidden {
            continue;
        }
        let h = layout.row_height(r);
        let page_has_rows = pages.last().is_some_and(|p| !p.is_empty());
        if page_has_rows && y + h > printable + EPSILON {
            pages.push(Vec::new());
            y = 0.0;
        }
        let mut remaining = h;
        loop {
            let height = remaining.min(printable - y);
            if let Some(page) = pages.last_mut() {
                page.push(PlacedRow { row: r, y, height });
            }
            remaining -= height;
            if remaining <= EPSILON {
                y += height;
                break;
            }
            pages.push(Vec::new());
            y = 0.0;
        }
    }
    pages
}

/// Font faces needed to draw the visible text of `workbook`.
fn required_fonts(workbook: &Workbook, config: &ExportConfig) -> BTreeSet<FontKey> {
    let mut keys = BTreeSet::new();
    for sheet in &workbook.sheets {
        for row in sheet.rows.iter().filter(|row| !row.hidden) {
            for (c, cell) in row.cells.iter().enumerate() {
                let col_hidden = sheet.columns.get(c).is_some_and(|col| col.hidden);
                if col_hidden || cell.hidden || cell.text.is_empty() {
                    continue;
                }
                keys.insert(FontKey::for_style(&cell.style, &config.default_font));
            }
        }
    }
    keys
}

/// Render `workbook` as a paginated PDF document.
///
/// # Errors
/// `FontResolution` when no font directory is configured or a needed font
/// file is missing, `Pdf` when the document cannot be assembled.
pub fn to_pdf(workbook: &Workbook, config: &ExportConfig) -> Result<Vec<u8>> {
    let _span = tracing::info_span!("to_pdf", sheets = workbook.sheets.len()).entered();
    let workbook = &super::export_ready(workbook);

    let dir = config
        .font_dir
        .as_deref()
        .ok_or_else(|| XlsxtError::FontResolution("no font directory configured".into()))?;
    let mut store = FontStore::new(dir);
    let keys = required_fonts(workbook, config);
    for key in &keys {
        store.load(key)?;
    }

    let mut measurers: HashMap<FontKey, TtfMeasure<'_>> = HashMap::new();
    for key in &keys {
        match store.measurer(key) {
            Some(m) => {
                measurers.insert(key.clone(), m);
            }
            None => tracing::warn!(
                font = %store.path_for(key).display(),
                "font has no usable metrics"
            ),
        }
    }

    let plans: Vec<SheetPlan> = workbook
        .sheets
        .iter()
        .map(|sheet| plan_sheet(sheet, config, &measurers))
        .collect();

    draw(&plans, &store)
}

fn draw(plans: &[SheetPlan], store: &FontStore) -> Result<Vec<u8>> {
    let first = plans.first().map_or_else(PageGeometry::default, |p| p.page);
    let (doc, first_page, first_layer) =
        PdfDocument::new("xlsxt", mm(first.width_mm), mm(first.height_mm), LAYER);

    let mut fonts: HashMap<FontKey, IndirectFontRef> = HashMap::new();
    for cell in plans.iter().flat_map(|p| &p.cells) {
        if cell.lines.is_empty() || fonts.contains_key(&cell.font) {
            continue;
        }
        let bytes = store.bytes(&cell.font).ok_or_else(|| {
            XlsxtError::FontResolution(store.path_for(&cell.font).display().to_string())
        })?;
        let font = doc.add_external_font(Cursor::new(bytes))?;
        fonts.insert(cell.font.clone(), font);
    }

    let mut initial = Some((first_page, first_layer));
    for plan in plans {
        let layers: Vec<PdfLayerReference> = plan
            .pages
            .iter()
            .map(|_| {
                let (page, layer) = initial.take().unwrap_or_else(|| {
                    doc.add_page(mm(plan.page.width_mm), mm(plan.page.height_mm), LAYER)
                });
                doc.get_page(page).get_layer(layer)
            })
            .collect();
        draw_sheet(plan, &layers, &fonts);
    }

    doc.save_to_bytes().map_err(XlsxtError::from)
}

/// Page-space box of one fragment, in millimetres from the bottom-left
/// corner.
struct CellBox {
    page: usize,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl CellBox {
    fn new(plan: &SheetPlan, cell: &CellPlan, frag: &Fragment) -> Self {
        Self {
            page: frag.page,
            left: plan.page.margin_mm + cell.x,
            top: plan.page.height_mm - plan.page.margin_mm - frag.y,
            width: cell.width,
            height: frag.height,
        }
    }
}

fn draw_sheet(
    plan: &SheetPlan,
    layers: &[PdfLayerReference],
    fonts: &HashMap<FontKey, IndirectFontRef>,
) {
    let boxes: Vec<(&CellPlan, CellBox)> = plan
        .cells
        .iter()
        .flat_map(|cell| {
            cell.fragments
                .iter()
                .map(move |frag| (cell, CellBox::new(plan, cell, frag)))
        })
        .collect();

    for (cell, b) in &boxes {
        let fill = cell.style.solid_fill().and_then(rgb);
        let (Some(layer), Some(color)) = (layers.get(b.page), fill) else {
            continue;
        };
        layer.set_fill_color(color);
        layer.add_rect(
            Rect::new(mm(b.left), mm(b.top - b.height), mm(b.left + b.width), mm(b.top))
                .with_mode(PaintMode::Fill),
        );
    }

    for cell in &plan.cells {
        if let Some(font) = fonts.get(&cell.font) {
            draw_text(layers, font, plan, cell);
        }
    }

    for (cell, b) in &boxes {
        if let Some(layer) = layers.get(b.page) {
            draw_borders(layer, cell, b);
        }
    }
}

fn draw_text(
    layers: &[PdfLayerReference],
    font: &IndirectFontRef,
    plan: &SheetPlan,
    cell: &CellPlan,
) {
    let color = cell
        .style
        .font_color
        .as_deref()
        .and_then(rgb)
        .unwrap_or_else(|| Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    let left = plan.page.margin_mm;
    let top = plan.page.height_mm - plan.page.margin_mm;

    for line in &cell.placed {
        let Some(layer) = layers.get(line.page) else {
            continue;
        };
        layer.set_fill_color(color.clone());
        layer.use_text(
            line.text.as_str(),
            pt(cell.size_pt),
            mm(left + line.x),
            mm(top - line.baseline),
            font,
        );
    }
}

fn draw_borders(layer: &PdfLayerReference, cell: &CellPlan, b: &CellBox) {
    let (left, right) = (b.left, b.left + b.width);
    let (top, bottom) = (b.top, b.top - b.height);

    for (side, border) in cell.style.borders() {
        let Some(border) = border else {
            continue;
        };
        let ((x1, y1), (x2, y2)) = match side {
            BorderSide::Top => ((left, top), (right, top)),
            BorderSide::Right => ((right, top), (right, bottom)),
            BorderSide::Bottom => ((left, bottom), (right, bottom)),
            BorderSide::Left => ((left, top), (left, bottom)),
        };
        layer.set_outline_color(
            rgb(&border.color).unwrap_or_else(|| Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))),
        );
        layer.set_outline_thickness(pt(border.style.width_pt()));
        layer.set_line_dash_pattern(dash_pattern(border.style));
        layer.add_line(Line {
            points: vec![
                (Point::new(mm(x1), mm(y1)), false),
                (Point::new(mm(x2), mm(y2)), false),
            ],
            is_closed: false,
        });
    }
    layer.set_line_dash_pattern(LineDashPattern::default());
}

fn dash_pattern(style: BorderStyle) -> LineDashPattern {
    let (dash, gap) = match style {
        BorderStyle::Dotted | BorderStyle::Hair => (1, 1),
        BorderStyle::Dashed | BorderStyle::MediumDashed => (3, 2),
        BorderStyle::DashDot
        | BorderStyle::MediumDashDot
        | BorderStyle::DashDotDot
        | BorderStyle::MediumDashDotDot
        | BorderStyle::SlantDashDot => (4, 2),
        BorderStyle::Thin | BorderStyle::Medium | BorderStyle::Thick | BorderStyle::Double => {
            return LineDashPattern::default();
        }
    };
    LineDashPattern {
        dash_1: Some(dash),
        gap_1: Some(gap),
        ..LineDashPattern::default()
    }
}

fn rgb(hex: &str) -> Option<Color> {
    let (r, g, b) = hex_to_rgb(hex)?;
    Some(Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    )))
}

#[allow(clippy::cast_possible_truncation)]
fn mm(v: f64) -> Mm {
    Mm(v as f32)
}

#[allow(clippy::cast_possible_truncation)]
fn pt(v: f64) -> f32 {
    v as f32
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
    use crate::types::{Cell, Column, Row, Style};

    /// Half an em per character: at 10 pt, one character is ~1.76 mm.
    const MEASURE: FixedWidth = FixedWidth { em_ratio: 0.5 };

    struct Unmeasurable;

    impl MeasureSource for Unmeasurable {
        fn measurer(&self, _key: &FontKey) -> Option<&dyn TextMeasure> {
            None
        }
    }

    fn config() -> ExportConfig {
        ExportConfig {
            default_font_size: 10.0,
            ..ExportConfig::default()
        }
    }

    fn sheet(texts: &[&[&str]], widths: &[f64]) -> Sheet {
        let mut sheet = Sheet::new("S");
        sheet.columns = widths
            .iter()
            .map(|w| Column {
                width: *w,
                ..Column::default()
            })
            .collect();
        for row in texts {
            sheet.rows.push(Row {
                cells: row.iter().map(|t| Cell::new(*t)).collect(),
                ..Row::default()
            });
        }
        sheet.normalize_shape();
        sheet
    }

    #[test]
    fn short_text_keeps_the_row_height() {
        let s = sheet(&[&["ok"]], &[10.0]);
        let plan = plan_sheet(&s, &config(), &MEASURE);
        assert_eq!(plan.layout.row_height(0), s.row_height(0) * PT_TO_MM);
        assert_eq!(plan.cells[0].lines, ["ok"]);
    }

    #[test]
    fn overflowing_text_grows_the_row_by_line_count() {
        let long = "word ".repeat(60);
        let s = sheet(&[&[long.trim(), "x"]], &[10.0, 10.0]);
        let cfg = config();
        let plan = plan_sheet(&s, &cfg, &MEASURE);
        let lines = plan.cells[0].lines.len();
        assert!(lines > 1);
        let expected = lines_height(lines, 10.0, cfg.line_spacing) + cfg.cell_padding_mm;
        assert!((plan.layout.row_height(0) - expected).abs() < 1e-9);
        assert_eq!(plan.cells[0].lines.join(" "), long.trim());
    }

    #[test]
    fn merged_deficit_lands_on_the_last_row() {
        let long = "word ".repeat(60);
        let mut s = sheet(&[&[long.trim(), ""], &["", ""], &["", ""]], &[1.0, 9.0]);
        s.rows[0].cells[0].vmerge = 2;
        s.rows[1].cells[0].hidden = true;
        s.rows[2].cells[0].hidden = true;
        let base = s.row_height(0) * PT_TO_MM;
        let plan = plan_sheet(&s, &config(), &MEASURE);
        assert_eq!(plan.layout.row_height(0), base);
        assert_eq!(plan.layout.row_height(1), base);
        assert!(plan.layout.row_height(2) > base);
        let origins: Vec<&CellPlan> = plan.cells.iter().filter(|c| c.col == 0).collect();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].row_span, 3);
    }

    #[test]
    fn unmeasurable_text_falls_back_to_one_line() {
        let s = sheet(&[&["a b c d e f g h i j k l m n o p"]], &[1.0]);
        let plan = plan_sheet(&s, &config(), &Unmeasurable);
        assert_eq!(plan.cells[0].lines.len(), 1);
    }

    #[test]
    fn rows_break_onto_new_pages() {
        let rows: Vec<Vec<&str>> = (0..200).map(|_| vec!["r"]).collect();
        let refs: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        let s = sheet(&refs, &[10.0]);
        let plan = plan_sheet(&s, &config(), &MEASURE);
        assert!(plan.pages.len() > 1);

        let limit = plan.page.printable_height();
        for page in &plan.pages {
            assert_eq!(page[0].y, 0.0);
            let last = page.last().unwrap();
            assert_eq!(last.height, plan.layout.row_height(last.row));
            assert!(last.y + last.height <= limit + 1e-9);
        }
        let placed: usize = plan.pages.iter().map(Vec::len).sum();
        assert_eq!(placed, 200);
    }

    fn assert_lines_inside_pages(plan: &SheetPlan) {
        let limit = plan.page.printable_height();
        for cell in &plan.cells {
            for line in &cell.placed {
                assert!(line.page < plan.pages.len());
                assert!(
                    line.baseline > 0.0 && line.baseline <= limit + 1e-9,
                    "baseline {} outside 0..{limit}",
                    line.baseline
                );
            }
        }
    }

    #[test]
    fn row_taller_than_a_page_is_split_across_pages() {
        let long = "word ".repeat(3000);
        let s = sheet(&[&["before"], &[long.trim()], &["after"]], &[10.0]);
        let plan = plan_sheet(&s, &config(), &MEASURE);
        let limit = plan.page.printable_height();

        assert!(plan.layout.row_height(1) > limit);
        let slices: Vec<&PlacedRow> = plan.pages.iter().flatten().filter(|p| p.row == 1).collect();
        assert!(slices.len() > 1);
        assert_eq!(slices[0].y, 0.0, "tall row starts on a fresh page");
        let total: f64 = slices.iter().map(|p| p.height).sum();
        assert!((total - plan.layout.row_height(1)).abs() < 1e-6);

        let cell = plan.cells.iter().find(|c| c.row == 1).unwrap();
        assert_eq!(cell.placed.len(), cell.lines.len(), "no line is dropped");
        assert_eq!(cell.fragments.len(), slices.len());
        let pages: BTreeSet<usize> = cell.placed.iter().map(|l| l.page).collect();
        assert!(pages.len() > 1);
        assert_lines_inside_pages(&plan);

        // Reading order survives the split.
        let text: Vec<&str> = cell.placed.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(text.join(" "), long.trim());
    }

    #[test]
    fn merged_text_crossing_a_page_break_flows_onto_the_next_page() {
        let mut rows: Vec<Vec<String>> = (0..60).map(|_| vec![String::new()]).collect();
        rows[40][0] = "word ".repeat(600).trim().to_string();
        let refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let slices: Vec<&[&str]> = refs.iter().map(Vec::as_slice).collect();
        let mut s = sheet(&slices, &[10.0]);
        s.rows[40].cells[0].vmerge = 19;
        for r in 41..60 {
            s.rows[r].cells[0].hidden = true;
        }

        let plan = plan_sheet(&s, &config(), &MEASURE);
        let cell = plan.cells.iter().find(|c| c.row == 40).unwrap();
        assert!(cell.fragments.len() > 1);
        assert_eq!(cell.placed.len(), cell.lines.len());
        assert_lines_inside_pages(&plan);
    }

    #[test]
    fn single_page_text_honours_vertical_alignment() {
        let mut s = sheet(&[&["top"]], &[10.0]);
        s.rows[0].height = Some(60.0);
        s.rows[0].cells[0].style = s.rows[0].cells[0].style.derive(|st| Style {
            align_v: Some(VAlign::Top),
            ..st.clone()
        });
        let cfg = config();
        let plan = plan_sheet(&s, &cfg, &MEASURE);
        let line = &plan.cells[0].placed[0];
        let line_height = 10.0 * cfg.line_spacing * PT_TO_MM;
        let expected = cfg.cell_padding_mm / 2.0 + line_height * BASELINE_RATIO;
        assert!((line.baseline - expected).abs() < 1e-9);
        assert_eq!(line.x, cfg.cell_padding_mm);
    }

    #[test]
    fn empty_sheet_still_has_a_page() {
        let plan = plan_sheet(&Sheet::new("Empty"), &config(), &MEASURE);
        assert_eq!(plan.pages.len(), 1);
        assert!(plan.cells.is_empty());
    }

    #[test]
    fn hidden_rows_are_not_placed() {
        let mut s = sheet(&[&["a"], &["b"], &["c"]], &[10.0]);
        s.rows[1].hidden = true;
        let plan = plan_sheet(&s, &config(), &MEASURE);
        let rows: Vec<usize> = plan.pages[0].iter().map(|p| p.row).collect();
        assert_eq!(rows, [0, 2]);
    }

    #[test]
    fn missing_font_directory_is_an_error() {
        let mut wb = Workbook::new();
        wb.add_sheet("S").unwrap();
        assert!(matches!(
            to_pdf(&wb, &ExportConfig::default()),
            Err(XlsxtError::FontResolution(_))
        ));
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut wb = Workbook::new();
        wb.add_sheet("S").unwrap().rows.push(Row {
            cells: vec![Cell::new("text")],
            ..Row::default()
        });
        let cfg = ExportConfig::default().with_font_dir(dir.path());
        assert!(matches!(to_pdf(&wb, &cfg), Err(XlsxtError::FontResolution(_))));
    }
}
