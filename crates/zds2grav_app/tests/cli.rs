use std::fs;
use std::io::{Cursor, Write};
use std::process::Command;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MANIFEST: &str = r#"{
    "version": 2,
    "type": "ARTICLE",
    "title": "Petit article",
    "slug": "petit-article",
    "children": [
        { "object": "extract", "title": "Unique", "slug": "unique", "text": "unique.md" }
    ]
}"#;

fn write_export(dir: &std::path::Path) -> std::path::PathBuf {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in [
        ("manifest.json", MANIFEST.as_bytes()),
        ("unique.md", b"Un seul paragraphe.".as_slice()),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    let path = dir.join("petit-article.zip");
    fs::write(&path, zip.finish().unwrap().into_inner()).unwrap();
    path
}

fn zds2grav() -> Command {
    Command::new(env!("CARGO_BIN_EXE_zds2grav"))
}

#[test]
fn converts_a_local_export_and_prints_the_root() {
    let temp = TempDir::new().unwrap();
    let archive = write_export(temp.path());
    let out = temp.path().join("pages");
    let settings = temp.path().join("settings.ron");
    fs::write(&settings, r#"(conversion: (default_author: "Equipe"))"#).unwrap();

    let output = zds2grav()
        .arg(&archive)
        .arg("--to")
        .arg(&out)
        .arg("--lang")
        .arg("fr")
        .arg("--config")
        .arg(&settings)
        .current_dir(temp.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let root = out.join("petit-article");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        root.display().to_string()
    );
    let page = fs::read_to_string(root.join("01.petit-article").join("item.fr.md")).unwrap();
    assert!(page.contains("name: Equipe"));
    assert!(page.contains("Un seul paragraphe."));
}

#[test]
fn missing_archive_exits_with_failure() {
    let temp = TempDir::new().unwrap();
    let output = zds2grav()
        .arg(temp.path().join("absent.zip"))
        .current_dir(temp.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[test]
fn malformed_settings_file_stops_before_converting() {
    let temp = TempDir::new().unwrap();
    let archive = write_export(temp.path());
    let settings = temp.path().join("settings.ron");
    fs::write(&settings, "(media_workers: )").unwrap();

    let output = zds2grav()
        .arg(&archive)
        .arg("--config")
        .arg(&settings)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("settings.ron"));
    assert!(!temp.path().join("petit-article").exists());
}
