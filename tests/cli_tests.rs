//! Command-line rendering through the `xlsxt_cli` binary.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

mod common;
mod fixtures;

use std::path::Path;
use std::process::{Command, Output};

use common::assert_cell_text;
use fixtures::items_template;

fn xlsxt_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xlsxt_cli"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("XLSXT_FONT_DIR")
        .output()
        .expect("failed to run xlsxt_cli")
}

/// Template and data files in a fresh directory.
fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("template.xlsx"), items_template()).unwrap();
    std::fs::write(
        dir.path().join("data.json"),
        r#"{"Items": [
            {"Name": "item1", "SubItems": [{"Name": "1"}, {"Name": "2"}]},
            {"Name": "item2", "SubItems": [{"Name": "1"}, {"Name": "2"}, {"Name": "3"}]}
        ]}"#,
    )
    .unwrap();
    dir
}

fn arg(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

// ============================================================================
// SUCCESS
// ============================================================================

#[test]
fn render_writes_html_and_xlsx() {
    let dir = workspace();
    let d = dir.path();
    let out = xlsxt_cli(&[
        "render",
        "--template",
        &arg(d, "template.xlsx"),
        "--data",
        &arg(d, "data.json"),
        "--html",
        &arg(d, "out.html"),
        "--xlsx",
        &arg(d, "out.xlsx"),
    ]);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("Written:"));

    let html = std::fs::read_to_string(d.join("out.html")).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(">item2</td>"));

    let bytes = std::fs::read(d.join("out.xlsx")).unwrap();
    let wb = xlsxt::reader::read_workbook(&bytes).unwrap();
    assert_eq!(wb.sheets[0].rows.len(), 6);
    assert_cell_text(&wb.sheets[0], 0, 0, "Items: 2");
}

#[test]
fn render_without_outputs_says_so() {
    let dir = workspace();
    let d = dir.path();
    let out = xlsxt_cli(&[
        "render",
        "-t",
        &arg(d, "template.xlsx"),
        "-d",
        &arg(d, "data.json"),
    ]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Nothing to write"));
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn missing_data_file_fails_with_an_error() {
    let dir = workspace();
    let d = dir.path();
    let out = xlsxt_cli(&[
        "render",
        "-t",
        &arg(d, "template.xlsx"),
        "-d",
        &arg(d, "absent.json"),
        "--html",
        &arg(d, "out.html"),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error:"));
    assert!(!d.join("out.html").exists());
}

#[test]
fn pdf_without_fonts_fails() {
    let dir = workspace();
    let d = dir.path();
    let out = xlsxt_cli(&[
        "render",
        "-t",
        &arg(d, "template.xlsx"),
        "-d",
        &arg(d, "data.json"),
        "--pdf",
        &arg(d, "out.pdf"),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("font"));
}
