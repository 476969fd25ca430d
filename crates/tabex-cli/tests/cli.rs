//! Integration tests for the `tabex` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("tabex").unwrap()
}

/// Create a single-page PDF with a two-column table of plain text:
///
/// Item  | Qty
/// Apple | 3
/// Pear  | 7
fn pdf_with_table() -> Vec<u8> {
    use lopdf::{Object, Stream, dictionary};

    let mut doc = lopdf::Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let content = b"
        BT /F1 10 Tf 50 700 Td (Item) Tj ET
        BT /F1 10 Tf 200 700 Td (Qty) Tj ET
        BT /F1 10 Tf 50 680 Td (Apple) Tj ET
        BT /F1 10 Tf 200 680 Td (3) Tj ET
        BT /F1 10 Tf 50 660 Td (Pear) Tj ET
        BT /F1 10 Tf 200 660 Td (7) Tj ET
    ";
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Config file with built-in defaults, so a user config never leaks in.
fn default_config(dir: &Path) -> String {
    write_file(dir, "config.json", b"{}").display().to_string()
}

#[test]
fn extract_prints_json_records() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "table.pdf", &pdf_with_table());

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""headers":["Item","Qty"]"#))
        .stdout(predicate::str::contains(r#"{"Item":"Apple","Qty":"3"}"#))
        .stdout(predicate::str::contains(r#""confidence":0.85"#));
}

#[test]
fn extract_writes_csv_file() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "table.pdf", &pdf_with_table());
    let out = dir.path().join("table.csv");

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(&pdf)
        .args(["-f", "csv", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written to"));

    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "Item,Qty\nApple,3\nPear,7\n"
    );
}

#[test]
fn extract_html_format() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "table.pdf", &pdf_with_table());

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(&pdf)
        .args(["--format", "html"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<th>Item</th>"))
        .stdout(predicate::str::contains("<td>Pear</td>"));
}

#[test]
fn extract_show_confidence() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "table.pdf", &pdf_with_table());

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(&pdf)
        .args(["-f", "text", "--show-confidence"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extraction confidence: 85.0%"))
        .stdout(predicate::str::contains("2 columns, 2 rows"));
}

#[test]
fn extract_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(dir.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn extract_invalid_pdf_reports_error() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "broken.pdf", b"this is not a pdf");

    cmd()
        .args(["--config", &default_config(dir.path()), "extract"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("extraction failed"));
}

#[test]
fn extract_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let pdf = write_file(dir.path(), "table.pdf", &pdf_with_table());
    let config = write_file(
        dir.path(),
        "bad.json",
        br#"{"extraction": {"page_chunk_size": 0}}"#,
    );

    cmd()
        .arg("--config")
        .arg(&config)
        .arg("extract")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_chunk_size"));
}

#[test]
fn batch_continues_on_error_and_writes_summary() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_file(&input, "a.pdf", &pdf_with_table());
    write_file(&input, "b.pdf", &pdf_with_table());
    write_file(&input, "broken.pdf", b"garbage");
    write_file(&input, "notes.txt", b"ignored");

    cmd()
        .args(["--config", &default_config(dir.path()), "batch"])
        .arg(format!("{}/*", input.display()))
        .arg("-d")
        .arg(&output)
        .args(["--summary", "--continue-on-error", "-j", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files"))
        .stdout(predicate::str::contains("Failed files:"));

    let a = fs::read_to_string(output.join("a.json")).unwrap();
    assert!(a.contains(r#"{"Item":"Pear","Qty":"7"}"#));
    assert!(output.join("b.json").exists());
    assert!(!output.join("broken.json").exists());

    let summary = fs::read_to_string(output.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("filename,status,columns,rows,confidence"));
    assert!(lines[1].starts_with("a.pdf,success,2,2,0.85,"));
    assert!(lines[3].starts_with("broken.pdf,error,"));
}

#[test]
fn batch_stops_on_first_error_by_default() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "broken.pdf", b"garbage");

    cmd()
        .args(["--config", &default_config(dir.path()), "batch"])
        .arg(format!("{}/*.pdf", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.pdf"));
}

#[test]
fn batch_writes_next_to_inputs_without_output_dir() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "report.pdf", &pdf_with_table());

    cmd()
        .args(["--config", &default_config(dir.path()), "batch"])
        .arg(format!("{}/*.pdf", dir.path().display()))
        .args(["-f", "csv"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dir.path().join("report.csv")).unwrap(),
        "Item,Qty\nApple,3\nPear,7\n"
    );
}

#[test]
fn batch_without_matches_fails() {
    let dir = TempDir::new().unwrap();

    cmd()
        .args(["--config", &default_config(dir.path()), "batch"])
        .arg(format!("{}/*.pdf", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn config_init_get_set_roundtrip() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nested").join("config.json");
    let config = config.to_str().unwrap();

    cmd()
        .args(["--config", config, "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    cmd()
        .args(["--config", config, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    cmd()
        .args(["--config", config, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    cmd()
        .args(["--config", config, "config", "get", "extraction.page_chunk_size"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5\n"));

    cmd()
        .args(["--config", config, "config", "set", "reconstruct.row_tolerance", "8.5"])
        .assert()
        .success();

    cmd()
        .args(["--config", config, "config", "get", "reconstruct.row_tolerance"])
        .assert()
        .success()
        .stdout(predicate::str::diff("8.5\n"));

    cmd()
        .args(["--config", config, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""page_chunk_size": 5"#));
}

#[test]
fn config_set_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    let config = default_config(dir.path());

    cmd()
        .args(["--config", &config, "config", "set", "extraction.unknown", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    cmd()
        .args(["--config", &config, "config", "set", "extraction.page_chunk_size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_chunk_size"));

    cmd()
        .args(["--config", &config, "config", "set", "output.pretty_json", "maybe"])
        .assert()
        .failure();
}
