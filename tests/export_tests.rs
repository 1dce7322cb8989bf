//! HTML and PDF export of rendered templates.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;
mod fixtures;

use common::{font_dir, render};
use fixtures::{items_template, SheetBuilder, StyleBuilder, XlsxBuilder};
use serde_json::json;
use xlsxt::layout::{plan_sheet, FixedWidth};
use xlsxt::{ExportConfig, XlsxTemplate, XlsxtError};

fn items_data() -> serde_json::Value {
    json!({
        "Items": [
            {"Name": "item1", "SubItems": [{"Name": "1"}, {"Name": "2"}]},
            {"Name": "item2", "SubItems": [{"Name": "1"}, {"Name": "2"}, {"Name": "3"}]}
        ]
    })
}

fn long_text_template() -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Notes")
                .col_width(1, 1, 5.0)
                .col_width(2, 2, 45.0)
                .cell("A1", "{{ Note }}", Some(StyleBuilder::new().wrap_text()))
                .cell("B1", "short", None)
                .cell("A2", "next", None),
        )
        .build()
}

// ============================================================================
// HTML
// ============================================================================

#[test]
fn html_has_one_table_per_sheet_with_page_breaks() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("One").cell("A1", "{{ A }}", None))
        .sheet(SheetBuilder::new("Two").cell("A1", "{{ A }}", None))
        .build();
    let t = render(&xlsx, json!([{"A": "first"}, {"A": "second"}]));
    let html = t.to_html().unwrap();

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(html.matches("<table ").count(), 2);
    assert!(html.contains("page-break-before: always"));
    assert!(html.contains("data-sheet=\"One\""));
    assert!(html.contains(">second</td>"));
}

#[test]
fn html_rowspans_follow_resolved_merges() {
    let t = render(&items_template(), items_data());
    let html = t.to_html().unwrap();

    assert_eq!(html.matches("rowspan=\"2\"").count(), 1);
    assert_eq!(html.matches("rowspan=\"3\"").count(), 1);
    // Each group name is drawn once.
    assert_eq!(html.matches(">item1</td>").count(), 1);
    assert_eq!(html.matches(">item2</td>").count(), 1);
}

#[test]
fn html_export_is_idempotent() {
    let t = render(&items_template(), items_data());
    assert_eq!(t.to_html().unwrap(), t.to_html().unwrap());
}

#[test]
fn html_scales_columns_to_the_page_width() {
    let t = render(&items_template(), items_data());
    let html = t.to_html().unwrap();
    // 20 : 10 : 10 over 190 mm.
    assert!(html.contains("<col style=\"width: 95.00mm\"><col style=\"width: 47.50mm\">"));

    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Wide")
                .landscape()
                .col_width(1, 2, 10.0)
                .row(1, &["a", "b"]),
        )
        .build();
    let html = render(&xlsx, json!({})).to_html().unwrap();
    assert!(html.contains("<col style=\"width: 138.50mm\">"));
}

#[test]
fn html_skips_hidden_columns_and_rows() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .hide_cols(2, 2)
                .hide_row(2)
                .row(1, &["shown", "secret", "also shown"])
                .row(2, &["hidden row"]),
        )
        .build();
    let html = render(&xlsx, json!({})).to_html().unwrap();
    assert!(html.contains(">shown</td>"));
    assert!(html.contains(">also shown</td>"));
    assert!(!html.contains("secret"));
    assert!(!html.contains("hidden row"));
    assert_eq!(html.matches("<col ").count(), 2);
}

#[test]
fn html_carries_cell_styles() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell(
            "A1",
            "styled",
            Some(
                StyleBuilder::new()
                    .bold()
                    .font_color("FF0000")
                    .bg_color("FFFF00")
                    .border_all("medium", Some("000000"))
                    .align_horizontal("center"),
            ),
        ))
        .build();
    let html = render(&xlsx, json!({})).to_html().unwrap();
    for expected in [
        "font-weight: bold;",
        "color: #FF0000;",
        "background-color: #FFFF00;",
        "border-top: 1pt solid #000000;",
        "text-align: center;",
    ] {
        assert!(html.contains(expected), "missing `{expected}` in {html}");
    }
}

#[test]
fn html_is_written_to_disk() {
    let t = render(&items_template(), items_data());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.html");
    t.save_html(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), t.to_html().unwrap());
}

#[test]
fn exports_require_a_rendered_result() {
    let t = XlsxTemplate::from_bytes(&items_template()).unwrap();
    assert!(matches!(t.to_html(), Err(XlsxtError::TemplateNotLoaded)));
    assert!(matches!(t.to_pdf(), Err(XlsxtError::TemplateNotLoaded)));
}

// ============================================================================
// PDF LAYOUT
// ============================================================================

#[test]
fn long_text_grows_its_row_instead_of_truncating() {
    let short = render(&long_text_template(), json!({"Note": "hi"}));
    let long = render(
        &long_text_template(),
        json!({"Note": "a rather long note that cannot fit in such a narrow column"}),
    );
    let measure = FixedWidth { em_ratio: 0.5 };
    let config = ExportConfig::default();

    let short_plan = plan_sheet(&short.result().unwrap().sheets[0], &config, &measure);
    let long_plan = plan_sheet(&long.result().unwrap().sheets[0], &config, &measure);

    let lines = long_plan
        .cells
        .iter()
        .find(|c| c.row == 0 && c.col == 0)
        .unwrap()
        .lines
        .clone();
    assert!(lines.len() > 1);
    assert_eq!(
        lines.join(" "),
        "a rather long note that cannot fit in such a narrow column"
    );

    let short_height = short_plan.layout.row_heights[0];
    let long_height = long_plan.layout.row_heights[0];
    assert!(long_height > short_height);
    // The following row is unaffected.
    assert_eq!(
        short_plan.layout.row_heights[1],
        long_plan.layout.row_heights[1]
    );
}

#[test]
fn many_rows_paginate() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("A1", "{{ Rows.N }}", None))
        .build();
    let rows: Vec<_> = (0..300).map(|n| json!({ "N": n })).collect();
    let t = render(&xlsx, json!({ "Rows": rows }));
    let plan = plan_sheet(
        &t.result().unwrap().sheets[0],
        &ExportConfig::default(),
        &FixedWidth { em_ratio: 0.5 },
    );
    assert!(plan.pages.len() > 1);
    let placed: usize = plan.pages.iter().map(Vec::len).sum();
    assert_eq!(placed, 300);
}

// ============================================================================
// PDF EXPORT
// ============================================================================

#[test]
fn pdf_without_font_directory_fails() {
    let t = render(&items_template(), items_data());
    assert!(matches!(t.to_pdf(), Err(XlsxtError::FontResolution(_))));
}

#[test]
fn pdf_with_missing_variant_fails() {
    // The bold title needs CalibriBold.ttf.
    let Some(fonts) = font_dir(&["Calibri"]) else {
        return;
    };
    let mut t = render(&items_template(), items_data());
    t.set_font_dir(fonts.path());
    let err = t.to_pdf().unwrap_err();
    assert!(matches!(err, XlsxtError::FontResolution(_)), "got {err:?}");
    assert!(err.to_string().contains("CalibriBold.ttf"));
}

#[test]
fn pdf_is_produced_with_all_fonts_present() {
    let Some(fonts) = font_dir(&["Calibri", "CalibriBold"]) else {
        return;
    };
    let mut t = render(&items_template(), items_data());
    t.set_font_dir(fonts.path());
    let pdf = t.to_pdf().unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let path = fonts.path().join("out.pdf");
    t.save_pdf(&path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn pdf_export_leaves_the_result_reusable() {
    let Some(fonts) = font_dir(&["Calibri", "CalibriBold"]) else {
        return;
    };
    let config = ExportConfig::default().with_font_dir(fonts.path());
    let mut t = XlsxTemplate::from_bytes(&long_text_template())
        .unwrap()
        .with_config(config);
    t.render_json(json!({"Note": "word ".repeat(80)})).unwrap();

    let first = t.to_pdf().unwrap();
    let second = t.to_pdf().unwrap();
    assert!(first.starts_with(b"%PDF"));
    assert!(second.starts_with(b"%PDF"));
    assert_eq!(t.to_html().unwrap(), t.to_html().unwrap());
}
