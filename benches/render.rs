//! Benchmarks for template rendering and export.
//!
//! Run with: cargo bench
//!
//! Results are saved to `target/criterion/` with HTML reports.
#![allow(clippy::expect_used, clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use xlsxt::layout::{plan_sheet, FixedWidth};
use xlsxt::{Cell, ExportConfig, Row, Workbook, XlsxTemplate};

/// Title row plus one repeating row over `Items.SubItems`.
fn template() -> XlsxTemplate {
    let mut wb = Workbook::new();
    let sheet = wb.add_sheet("Sheet1").expect("valid sheet name");
    sheet.rows.push(Row {
        cells: vec![Cell::new("Items: {{ Items_length }}")],
        ..Row::default()
    });
    sheet.rows.push(Row {
        cells: vec![
            Cell::new("{{ Items.Name }}[v-merge]"),
            Cell::new("[BR]{{ Items.SubItems.Name }}"),
            Cell::new("{{ Items.SubItems.Note }}"),
            Cell::new("{{ Items_SubItems_length }}"),
        ],
        ..Row::default()
    });
    sheet.normalize_shape();
    XlsxTemplate::from_workbook(wb)
}

fn data(items: usize, sub_items: usize) -> serde_json::Value {
    let items: Vec<_> = (0..items)
        .map(|i| {
            let subs: Vec<_> = (0..sub_items)
                .map(|s| json!({"Name": format!("sub {s}"), "Note": "lorem ipsum dolor sit amet ".repeat(3)}))
                .collect();
            json!({"Name": format!("item {i}"), "SubItems": subs})
        })
        .collect();
    json!({ "Items": items })
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for items in [10, 100, 500] {
        let data = data(items, 5);
        group.throughput(Throughput::Elements((items * 5) as u64));
        group.bench_with_input(BenchmarkId::new("items_x5", items), &data, |b, data| {
            b.iter(|| {
                let mut t = template();
                t.render_json(black_box(data.clone())).expect("render");
                t
            });
        });
    }
    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut t = template();
    t.render_json(data(200, 5)).expect("render");
    let sheet = t.result().expect("rendered").sheets.first().cloned().expect("one sheet");
    let config = ExportConfig::default();
    let measure = FixedWidth { em_ratio: 0.5 };

    c.bench_function("to_html_1000_rows", |b| {
        b.iter(|| t.to_html().expect("html"));
    });
    c.bench_function("plan_pdf_1000_rows", |b| {
        b.iter(|| plan_sheet(black_box(&sheet), &config, &measure));
    });
    c.bench_function("write_xlsx_1000_rows", |b| {
        b.iter(|| {
            let mut buf = std::io::Cursor::new(Vec::new());
            t.write(&mut buf).expect("write");
            buf
        });
    });
}

criterion_group!(benches, bench_render, bench_export);
criterion_main!(benches);
