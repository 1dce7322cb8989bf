//! Template rendering
//!
//! Binds data to a template workbook and produces a new result workbook.
//! Per sheet the pipeline is: flatten the bound data, expand each template
//! row, render every cell, then resolve merges and bold toggles.

pub mod cell;
pub mod engine;
pub mod expand;
pub mod flatten;
pub mod merge;
pub mod shape;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cell_ref::cell_name;
use crate::error::{Result, XlsxtError};
use crate::types::{Cell, Row, Sheet, Workbook};

use cell::{render_cell, Directives};
use engine::{BaseScope, Scope, TemplateEngine};
use expand::{expand, Binding};
use flatten::{flatten, FlatContext};
use merge::{apply_bold_toggles, materialize_merges, resolve_merges, DirectiveGrid};
use shape::{Scalar, Shape};

pub use shape::to_shape;

static NULL_SHAPE: Shape = Shape::Null;

/// Values carried by every context, visible to non-repeating rows.
fn shared_values(contexts: &[FlatContext]) -> BTreeMap<String, Scalar> {
    let Some((first, rest)) = contexts.split_first() else {
        return BTreeMap::new();
    };
    first
        .values
        .iter()
        .filter(|(k, v)| rest.iter().all(|ctx| ctx.get(k) == Some(*v)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Render `template` against `data` into a fresh workbook.
///
/// When `data` is a sequence, sheet `i` is bound to element `i`.
///
/// # Errors
/// `SheetCreation` for a sheet name the result workbook rejects and
/// `TemplateExpression` for a cell whose expression fails. Nothing is
/// returned on error.
pub fn render_workbook(template: &Workbook, data: &Shape) -> Result<Workbook> {
    let engine = TemplateEngine::new();
    let mut result = Workbook::new();

    for (sheet_index, template_sheet) in template.sheets.iter().enumerate() {
        let _span = tracing::info_span!("render_sheet", sheet = %template_sheet.name).entered();

        let root = data.element(sheet_index).unwrap_or_else(|| {
            tracing::warn!(
                sheet_index,
                "no data element for sheet; rendering against an empty object"
            );
            &NULL_SHAPE
        });

        let out = result.add_sheet(&template_sheet.name)?;
        render_sheet(&engine, template_sheet, root, out)?;
    }

    Ok(result)
}

fn render_sheet(
    engine: &TemplateEngine,
    template: &Sheet,
    root: &Shape,
    out: &mut Sheet,
) -> Result<()> {
    out.columns.clone_from(&template.columns);
    out.orientation = template.orientation;
    out.default_row_height = template.default_row_height;

    let contexts = flatten(root);
    let shared = Arc::new(shared_values(&contexts));
    let base = BaseScope::new(root);
    tracing::debug!(contexts = contexts.len(), "flattened bound data");

    let mut flags = DirectiveGrid::new();

    for (row_index, template_row) in template.rows.iter().enumerate() {
        for instance in expand(template_row, root, &contexts) {
            let scope = match instance.binding {
                Binding::Static(_) => Scope::new(&base, Arc::clone(&shared)),
                Binding::Flat(ctx) => Scope::new(&base, Arc::clone(&ctx.values)),
            };
            let (row, directives) =
                render_row(engine, &instance.row, &scope, &template.name, row_index)?;
            out.rows.push(row);
            flags.push_row(directives);
        }
    }

    out.normalize_shape();
    resolve_merges(out, &flags);
    apply_bold_toggles(out, &flags);
    materialize_merges(out);

    tracing::debug!(
        template_rows = template.rows.len(),
        rendered_rows = out.rows.len(),
        "sheet rendered"
    );
    Ok(())
}

fn render_row(
    engine: &TemplateEngine,
    row: &Row,
    scope: &Scope,
    sheet_name: &str,
    row_index: usize,
) -> Result<(Row, Vec<Directives>)> {
    let mut cells = Vec::with_capacity(row.cells.len());
    let mut directives = Vec::with_capacity(row.cells.len());

    for (col_index, template_cell) in row.cells.iter().enumerate() {
        let rendered = render_cell(engine, &template_cell.text, scope).map_err(|source| {
            XlsxtError::TemplateExpression {
                sheet: sheet_name.to_string(),
                cell: cell_name(
                    u32::try_from(row_index).unwrap_or(u32::MAX),
                    u32::try_from(col_index).unwrap_or(u32::MAX),
                ),
                source,
            }
        })?;

        let mut cell = Cell {
            text: rendered.text,
            ..template_cell.clone()
        };
        if let Some(span) = rendered.directives.merge_span {
            cell.vmerge = span;
        }
        cells.push(cell);
        directives.push(rendered.directives);
    }

    Ok((
        Row {
            height: row.height,
            hidden: row.hidden,
            cells,
        },
        directives,
    ))
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
    use crate::types::Style;
    use crate::types::StyleRef;

    fn template(rows: &[&[&str]]) -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("Sheet1").unwrap();
        for texts in rows {
            sheet.rows.push(Row {
                cells: texts.iter().map(|t| Cell::new(*t)).collect(),
                ..Row::default()
            });
        }
        sheet.normalize_shape();
        wb
    }

    #[test]
    fn shared_values_keep_only_common_entries() {
        let data = Shape::from_json(serde_json::json!({
            "Title": "T", "Items": [{"N": 1}, {"N": 2}]
        }));
        let shared = shared_values(&flatten(&data));
        assert_eq!(shared.get("Title"), Some(&Scalar::Str("T".into())));
        assert_eq!(shared.get("Items_length"), Some(&Scalar::UInt(2)));
        assert!(shared.get("Items_N").is_none());
    }

    #[test]
    fn static_rows_see_counters() {
        let wb = template(&[&["{{ Title }}: {{ Items_length }} items"]]);
        let data = Shape::from_json(serde_json::json!({
            "Title": "Order", "Items": [{"N": 1}, {"N": 2}]
        }));
        let out = render_workbook(&wb, &data).unwrap();
        assert_eq!(out.sheets[0].text(0, 0), "Order: 2 items");
    }

    #[test]
    fn explicit_merge_span_is_applied() {
        let wb = template(&[&["{{ A }}[v-merge: 1]"], &["below"]]);
        let data = Shape::from_json(serde_json::json!({"A": "x"}));
        let out = render_workbook(&wb, &data).unwrap();
        let sheet = &out.sheets[0];
        assert_eq!(sheet.rows[0].cells[0].vmerge, 1);
        assert_eq!(sheet.text(0, 0), "x");
        assert!(sheet.rows[1].cells[0].hidden);
    }

    #[test]
    fn template_is_left_untouched() {
        let mut wb = template(&[&["{{ A }}[BR]", "{{ B }}"]]);
        let style = StyleRef::new(Style::default());
        wb.sheets[0].rows[0].cells[1].style = style.clone();
        let before = wb.clone();
        let data = Shape::from_json(serde_json::json!({"A": "a", "B": "b"}));
        let out = render_workbook(&wb, &data).unwrap();
        assert!(out.sheets[0].rows[0].cells[1].style.bold);
        assert_eq!(wb.sheets[0].rows, before.sheets[0].rows);
        assert!(!style.bold);
    }

    #[test]
    fn malformed_expression_names_the_cell() {
        let wb = template(&[&["ok", "{{ broken + }}"]]);
        let err = render_workbook(&wb, &Shape::Null).unwrap_err();
        match err {
            XlsxtError::TemplateExpression { sheet, cell, .. } => {
                assert_eq!(sheet, "Sheet1");
                assert_eq!(cell, "B1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn sequence_root_binds_one_element_per_sheet() {
        let mut wb = template(&[&["{{ Name }}"]]);
        wb.add_sheet("Sheet2").unwrap().rows.push(Row {
            cells: vec![Cell::new("{{ Name }}")],
            ..Row::default()
        });
        let data = Shape::from_json(serde_json::json!([{"Name": "first"}, {"Name": "second"}]));
        let out = render_workbook(&wb, &data).unwrap();
        assert_eq!(out.sheets[0].text(0, 0), "first");
        assert_eq!(out.sheets[1].text(0, 0), "second");
    }
}
