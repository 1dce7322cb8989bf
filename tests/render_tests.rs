//! End-to-end rendering tests: fixture template in, result workbook out.
//!
//! Templates are written as real XLSX packages by the fixture builder and
//! loaded through `XlsxTemplate::from_bytes`, so every test also covers the
//! package reader.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;
mod fixtures;

use common::{assert_cell_text, column_texts, render, round_trip};
use fixtures::{
    items_template, xlsx_with_text, CellValue, SheetBuilder, StyleBuilder, XlsxBuilder,
};
use serde_json::json;
use test_case::test_case;
use xlsxt::{CellType, VAlign, XlsxTemplate, XlsxtError};

fn items_data() -> serde_json::Value {
    json!({
        "Items": [
            {"Name": "item1", "SubItems": [{"Name": "1"}, {"Name": "2"}]},
            {"Name": "item2", "SubItems": [{"Name": "1"}, {"Name": "2"}, {"Name": "3"}]}
        ]
    })
}

// ============================================================================
// ROW EXPANSION
// ============================================================================

#[test]
fn nested_collections_expand_to_one_row_per_leaf() {
    let t = render(&items_template(), items_data());
    let sheet = &t.result().unwrap().sheets[0];

    // Title row plus 2 + 3 sub-item rows.
    assert_eq!(sheet.rows.len(), 6);
    assert_cell_text(sheet, 0, 0, "Items: 2");
    assert_eq!(column_texts(sheet, 1)[1..], ["1", "2", "1", "2", "3"]);
    assert_eq!(column_texts(sheet, 2)[1..], ["2", "2", "3", "3", "3"]);
}

#[test]
fn repeated_group_names_merge_vertically() {
    let t = render(&items_template(), items_data());
    let sheet = &t.result().unwrap().sheets[0];

    common::assert_vmerge(sheet, 1, 0, 1);
    assert_cell_text(sheet, 1, 0, "item1");
    common::assert_vmerge(sheet, 3, 0, 2);
    assert_cell_text(sheet, 3, 0, "item2");
}

#[test]
fn cloned_rows_keep_template_styles() {
    let t = render(&items_template(), items_data());
    let sheet = &t.result().unwrap().sheets[0];

    assert!(sheet.rows[0].cells[0].style.bold);
    for row in 1..6 {
        let style = &sheet.rows[row].cells[0].style;
        assert!(style.border_bottom.is_some(), "row {row} lost its border");
    }
    assert_eq!(sheet.columns.len(), 3);
    assert_eq!(sheet.columns[0].width, 20.0);
}

#[test]
fn outer_collection_rows_repeat_once_per_element() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .row(1, &["{{ Items.Name }}", "{{ Items_SubItems_length }}"])
                .row(2, &["", "{{ Items.SubItems.Name }}"]),
        )
        .build();
    let t = render(&xlsx, items_data());
    let sheet = &t.result().unwrap().sheets[0];

    // One header row per item, then one detail row per sub-item.
    assert_eq!(sheet.rows.len(), 2 + 5);
    assert_eq!(column_texts(sheet, 0)[..2], ["item1", "item2"]);
    assert_eq!(column_texts(sheet, 1)[..2], ["2", "3"]);
    assert_eq!(column_texts(sheet, 1)[2..], ["1", "2", "1", "2", "3"]);
}

#[test_case(json!({"Items": []}), 1; "empty collection drops the repeating row")]
#[test_case(json!({"Items": [{"Name": "a", "SubItems": [{"Name": "x"}]}]}), 2; "single leaf")]
#[test_case(json!({}), 2; "missing collection renders the row once")]
fn repeating_row_count_follows_data(data: serde_json::Value, expected_rows: usize) {
    let t = render(&items_template(), data);
    assert_eq!(t.result().unwrap().sheets[0].rows.len(), expected_rows);
}

#[test]
fn rows_without_collection_references_render_once() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .row(1, &["{{ Customer.Name }}", "{{ Total }}"])
                .row(2, &["plain text"]),
        )
        .build();
    let t = render(
        &xlsx,
        json!({"Customer": {"Name": "ACME"}, "Total": 12.5, "Lines": [1, 2, 3]}),
    );
    let sheet = &t.result().unwrap().sheets[0];
    assert_eq!(sheet.rows.len(), 2);
    assert_cell_text(sheet, 0, 0, "ACME");
    assert_cell_text(sheet, 0, 1, "12.5");
    assert_cell_text(sheet, 1, 0, "plain text");
}

#[test]
fn unknown_fields_render_empty_without_error() {
    let t = render(&xlsx_with_text("[{{ Missing.Field }}]"), json!({"Other": 1}));
    assert_cell_text(&t.result().unwrap().sheets[0], 0, 0, "[]");
}

#[test]
fn sequence_root_binds_sheets_by_position() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("First").cell("A1", "{{ Name }}", None))
        .sheet(SheetBuilder::new("Second").cell("A1", "{{ Name }}", None))
        .build();
    let t = render(&xlsx, json!([{"Name": "one"}, {"Name": "two"}]));
    let wb = t.result().unwrap();
    assert_cell_text(&wb.sheets[0], 0, 0, "one");
    assert_cell_text(&wb.sheets[1], 0, 0, "two");
}

// ============================================================================
// DIRECTIVES
// ============================================================================

#[test]
fn bold_toggle_applies_to_the_rest_of_the_row() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").row(1, &["before", "[BR]marker", "after", ""]))
        .build();
    let t = render(&xlsx, json!({}));
    let sheet = &t.result().unwrap().sheets[0];

    assert_cell_text(sheet, 0, 1, "marker");
    common::assert_cell_bold(sheet, 0, 0, false);
    common::assert_cell_bold(sheet, 0, 1, false);
    common::assert_cell_bold(sheet, 0, 2, true);
    // Empty cells keep their style.
    common::assert_cell_bold(sheet, 0, 3, false);
}

#[test]
fn index_markers_are_stripped() {
    let t = render(&xlsx_with_text("{{ A }}[index: 1,2,3]"), json!({"A": "value"}));
    assert_cell_text(&t.result().unwrap().sheets[0], 0, 0, "value");
}

#[test]
fn empty_merge_candidates_never_merge() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("A1", "{{ Rows.Label }}[v-merge]", None))
        .build();
    let t = render(
        &xlsx,
        json!({"Rows": [{"Label": ""}, {"Label": ""}, {"Label": "x"}, {"Label": "x"}, {"Label": "x"}]}),
    );
    let sheet = &t.result().unwrap().sheets[0];
    assert_eq!(sheet.rows[0].cells[0].vmerge, 0);
    assert_eq!(sheet.rows[1].cells[0].vmerge, 0);
    common::assert_vmerge(sheet, 2, 0, 2);
}

#[test]
fn template_merges_survive_rendering() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", "{{ Title }}", None)
                .cell("B1", "absorbed", None)
                .merge("A1:B1"),
        )
        .build();
    let t = render(&xlsx, json!({"Title": "Report"}));
    let cells = &t.result().unwrap().sheets[0].rows[0].cells;
    assert_eq!(cells[0].hmerge, 1);
    assert_eq!(cells[0].text, "Report");
    assert!(cells[1].hidden);
    assert!(cells[1].text.is_empty());
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn malformed_expression_reports_the_template_cell() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Data").row(1, &["ok"]).row(2, &["", "{% if %}"]))
        .build();
    let mut t = XlsxTemplate::from_bytes(&xlsx).unwrap();
    match t.render_json(json!({})) {
        Err(XlsxtError::TemplateExpression { sheet, cell, .. }) => {
            assert_eq!(sheet, "Data");
            assert_eq!(cell, "B2");
        }
        other => panic!("expected a template expression error, got {other:?}"),
    }
    assert!(t.result().is_none());
}

#[test]
fn clashing_sheet_names_abort_the_render() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Data"))
        .sheet(SheetBuilder::new("DATA"))
        .build();
    let mut t = XlsxTemplate::from_bytes(&xlsx).unwrap();
    let err = t.render_json(json!({})).unwrap_err();
    assert!(matches!(err, XlsxtError::SheetCreation(_)), "got {err:?}");
    assert!(t.result().is_none());
}

#[test]
fn empty_handle_cannot_render_or_save() {
    let mut t = XlsxTemplate::default();
    assert!(matches!(
        t.render_json(json!({})),
        Err(XlsxtError::TemplateNotLoaded)
    ));
    let dir = tempfile::tempdir().unwrap();
    let err = t.save(dir.path().join("out.xlsx")).unwrap_err();
    assert_eq!(err.to_string(), "Not load template xlsx file");
}

#[test]
fn damaged_package_is_a_zip_error() {
    let err = XlsxTemplate::from_bytes(b"not a zip").unwrap_err();
    assert!(matches!(err, XlsxtError::Zip(_)), "got {err:?}");
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn saved_result_reads_back_with_merges_and_styles() {
    let t = render(&items_template(), items_data());
    let wb = round_trip(&t);
    let sheet = &wb.sheets[0];

    assert_eq!(sheet.rows.len(), 6);
    assert_cell_text(sheet, 4, 1, "2");
    assert_eq!(sheet.rows[3].cells[0].vmerge, 2);
    assert!(sheet.rows[0].cells[0].style.bold);
    assert_eq!(sheet.columns[0].width, 20.0);
}

#[test]
fn unrendered_template_is_saved_as_is() {
    let t = XlsxTemplate::from_bytes(&items_template()).unwrap();
    let wb = round_trip(&t);
    assert_eq!(wb.sheets[0].rows.len(), 2);
    assert_cell_text(&wb.sheets[0], 1, 1, "{{ Items.SubItems.Name }}");
}

#[test]
fn save_writes_a_file() {
    let t = render(&items_template(), items_data());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.xlsx");
    t.save(&path).unwrap();
    let reopened = XlsxTemplate::open(&path).unwrap();
    assert_eq!(reopened.template().unwrap().sheets[0].rows.len(), 6);
}

#[test]
fn template_formatting_survives_render_and_round_trip() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .row_height(1, 30.0)
                .cell(
                    "A1",
                    "[BR]{{ Label }}",
                    Some(
                        StyleBuilder::new()
                            .font_name("Arial")
                            .font_size(14.0)
                            .italic()
                            .underline(),
                    ),
                )
                .cell(
                    "B1",
                    "{{ Label }}",
                    Some(StyleBuilder::new().italic().align_vertical("top")),
                )
                .cell(
                    "C1",
                    12.5,
                    Some(StyleBuilder::new().number_format("#,##0.000")),
                )
                .cell("D1", true, None)
                .cell("E1", CellValue::Empty, Some(StyleBuilder::new().italic())),
        )
        .build();
    let t = render(&xlsx, json!({"Label": "note"}));
    let wb = round_trip(&t);
    let row = &wb.sheets[0].rows[0];

    assert_eq!(row.height, Some(30.0));

    let a1 = &row.cells[0];
    assert_eq!(a1.text, "note");
    assert_eq!(a1.style.font_family.as_deref(), Some("Arial"));
    assert_eq!(a1.style.font_size, Some(14.0));
    assert!(a1.style.italic && a1.style.underline && !a1.style.bold);

    // Bold is added on top of the cell's own formatting.
    let b1 = &row.cells[1];
    assert!(b1.style.bold && b1.style.italic);
    assert_eq!(b1.style.align_v, Some(VAlign::Top));

    let c1 = &row.cells[2];
    assert_eq!((c1.text.as_str(), c1.cell_type), ("12.5", CellType::Number));
    assert_eq!(c1.num_fmt.as_deref(), Some("#,##0.000"));
    assert!(c1.style.bold);

    let d1 = &row.cells[3];
    assert_eq!((d1.text.as_str(), d1.cell_type), ("TRUE", CellType::Boolean));

    let e1 = &row.cells[4];
    assert!(e1.text.is_empty());
    assert!(e1.style.italic && !e1.style.bold);
}

#[test]
fn missing_fills_are_normalised_to_white_on_load() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", "plain", None)
                .cell("B1", "filled", Some(StyleBuilder::new().bg_color("FFFF00"))),
        )
        .build();
    let t = XlsxTemplate::from_bytes(&xlsx).unwrap();
    let row = &t.template().unwrap().sheets[0].rows[0];
    assert_eq!(row.cells[0].style.fill_color.as_deref(), Some("#FFFFFF"));
    assert_eq!(row.cells[1].style.fill_color.as_deref(), Some("#FFFF00"));
}
