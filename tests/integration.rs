use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use grantha::types::Document;

/// Copy a fixture directory into a fresh temp dir so tests can write freely.
fn fixture_copy(fixture: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let source = Path::new("tests/fixtures").join(fixture);
    for entry in walkdir::WalkDir::new(&source) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(&source).unwrap();
        let target = dir.path().join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
    return dir;
}

fn grantha(dir: &Path, args: &[&str]) -> Output {
    return Command::new(env!("CARGO_BIN_EXE_grantha")).current_dir(dir).args(args).output().unwrap();
}

fn stdout(output: &Output) -> String {
    return String::from_utf8_lossy(&output.stdout).into_owned();
}

fn stderr(output: &Output) -> String {
    return String::from_utf8_lossy(&output.stderr).into_owned();
}

fn read_document(path: &PathBuf) -> Document {
    return Document::from_json(&std::fs::read_to_string(path).unwrap()).unwrap();
}

#[test]
fn json2md_then_md2json_round_trips() {
    let dir = fixture_copy("library");

    let export = grantha(dir.path(), &["json2md", "-i", "isavasya.json", "-o", "isavasya.md", "--verify"]);
    assert!(export.status.success(), "json2md failed: {}", stderr(&export));
    let markup = std::fs::read_to_string(dir.path().join("isavasya.md")).unwrap();
    assert!(markup.starts_with("+++"), "{markup}");
    assert!(markup.contains("validation_hash"), "{markup}");

    let import = grantha(dir.path(), &["md2json", "-i", "isavasya.md", "-o", "back.json"]);
    assert!(import.status.success(), "md2json failed: {}", stderr(&import));

    let original = read_document(&dir.path().join("isavasya.json"));
    let back = read_document(&dir.path().join("back.json"));
    assert_eq!(back.id, original.id);
    pretty_assertions::assert_eq!(back.main, original.main);
    pretty_assertions::assert_eq!(back.commentaries, original.commentaries);
}

#[test]
fn multi_part_document_round_trips_with_source_parts() {
    let dir = fixture_copy("library");

    let export = grantha(dir.path(), &["json2md", "-i", "katha", "-o", "katha.md", "--verify"]);
    assert!(export.status.success(), "json2md failed: {}", stderr(&export));
    let markup = std::fs::read_to_string(dir.path().join("katha.md")).unwrap();
    assert!(markup.contains("<!-- source_part: adhyaya-1 -->"), "{markup}");
    assert!(markup.contains("<!-- source_part: part2 -->"), "{markup}");

    let import = grantha(dir.path(), &["md2json", "-i", "katha.md", "-o", "katha.json"]);
    assert!(import.status.success(), "md2json failed: {}", stderr(&import));

    let document = read_document(&dir.path().join("katha.json"));
    let refs: Vec<&str> = document.main.iter().map(|p| return p.reference.as_str()).collect();
    assert_eq!(refs, vec!["1.1.1", "1.1.2", "2.1.1"]);
    let parts: Vec<Option<&str>> = document.main.iter().map(|p| return p.source_part.as_deref()).collect();
    assert_eq!(parts, vec![Some("adhyaya-1"), Some("adhyaya-1"), Some("part2")]);
}

#[test]
fn unreadable_input_is_an_io_error_not_a_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("latin1.md"), [0x2b, 0x2b, 0x2b, 0x0a, 0xe9, 0xff, 0x0a]).unwrap();

    let import = grantha(dir.path(), &["md2json", "-i", "latin1.md", "-o", "out.json"]);
    assert!(!import.status.success(), "non-UTF-8 markup was accepted");
    let err = stderr(&import);
    assert!(err.contains("I/O"), "{err}");
    assert!(!err.contains("File Not Found"), "{err}");

    let missing = grantha(dir.path(), &["md2json", "-i", "absent.md", "-o", "out.json"]);
    assert!(stderr(&missing).contains("File Not Found"), "{}", stderr(&missing));
}

#[test]
fn edited_markup_is_rejected_and_nothing_is_written() {
    let dir = fixture_copy("library");
    let export = grantha(dir.path(), &["json2md", "-i", "isavasya.json", "-o", "isavasya.md"]);
    assert!(export.status.success(), "json2md failed: {}", stderr(&export));

    let path = dir.path().join("isavasya.md");
    let markup = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, markup.replacen("कर्माणि", "कर्माणी", 1)).unwrap();

    let import = grantha(dir.path(), &["md2json", "-i", "isavasya.md", "-o", "back.json", "--original", "isavasya.json"]);
    assert!(!import.status.success(), "edited markup was accepted");
    assert!(stderr(&import).contains("Round-Trip Hash Mismatch"), "{}", stderr(&import));
    assert!(!dir.path().join("back.json").exists(), "output written despite mismatch");
}

#[test]
fn verify_matches_exported_markup() {
    let dir = fixture_copy("library");
    let export = grantha(dir.path(), &["json2md", "-i", "isavasya.json", "-o", "isavasya.md", "--scripts", "devanagari"]);
    assert!(export.status.success(), "json2md failed: {}", stderr(&export));

    let verify = grantha(dir.path(), &["verify", "-j", "isavasya.json", "-m", "isavasya.md"]);
    assert!(verify.status.success(), "verify failed: {}", stderr(&verify));
    assert!(stdout(&verify).starts_with("OK"), "{}", stdout(&verify));
}

#[test]
fn check_passes_on_clean_library() {
    let dir = fixture_copy("library");
    let check = grantha(dir.path(), &["check"]);
    assert!(check.status.success(), "check failed: {}{}", stdout(&check), stderr(&check));
    assert!(stdout(&check).contains("All 2 documents clean"), "{}", stdout(&check));
}

#[test]
fn check_skips_markdown_without_frontmatter() {
    let dir = fixture_copy("library");
    std::fs::write(dir.path().join("README.md"), "# Library\n\nNotes for editors.\n").unwrap();
    let export = grantha(dir.path(), &["json2md", "-i", "isavasya.json", "-o", "isavasya.md"]);
    assert!(export.status.success(), "json2md failed: {}", stderr(&export));

    let check = grantha(dir.path(), &["check"]);
    assert!(check.status.success(), "check failed: {}{}", stdout(&check), stderr(&check));
    let out = stdout(&check);
    assert!(!out.contains("README.md"), "{out}");
    assert!(out.contains("OK      ./isavasya.md"), "{out}");
    assert!(out.contains("All 3 documents clean"), "{out}");
}

#[test]
fn check_isolates_a_broken_document() {
    let dir = fixture_copy("library");
    std::fs::write(dir.path().join("broken.json"), "{ \"grantha_id\": ").unwrap();

    let check = grantha(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(2));
    let out = stdout(&check);
    assert!(out.contains("FAILED  ./broken.json"), "{out}");
    assert!(out.contains("OK      ./isavasya.json"), "{out}");
    assert!(out.contains("OK      ./katha"), "{out}");
    assert!(out.contains("3 checked, 1 failed, 0 with issues"), "{out}");
}

#[test]
fn assemble_keeps_manifest_order() {
    let dir = fixture_copy("library");
    let assemble = grantha(dir.path(), &["assemble", "katha", "-o", "katha.json"]);
    assert!(assemble.status.success(), "assemble failed: {}", stderr(&assemble));

    let document = read_document(&dir.path().join("katha.json"));
    let refs: Vec<&str> = document.main.iter().map(|p| return p.reference.as_str()).collect();
    assert_eq!(refs, vec!["1.1.1", "1.1.2", "2.1.1"]);
    let parts: Vec<Option<&str>> = document.main.iter().map(|p| return p.source_part.as_deref()).collect();
    assert_eq!(parts, vec![Some("adhyaya-1"), Some("adhyaya-1"), Some("part2")]);
}

#[test]
fn assemble_fails_whole_on_missing_part() {
    let dir = fixture_copy("library");
    std::fs::remove_file(dir.path().join("katha/part2.json")).unwrap();

    let assemble = grantha(dir.path(), &["assemble", "katha", "-o", "katha.json"]);
    assert!(!assemble.status.success(), "assembly succeeded without part2");
    assert!(stderr(&assemble).contains("part2.json"), "{}", stderr(&assemble));
    assert!(!dir.path().join("katha.json").exists());
}

#[test]
fn resolve_lists_resolved_and_unknown_citations() {
    let dir = fixture_copy("resolve");
    let resolve = grantha(dir.path(), &["resolve", "notes.txt", "--abbreviations", "abbreviations.json"]);
    assert!(resolve.status.success(), "resolve failed: {}", stderr(&resolve));

    let out = stdout(&resolve);
    assert!(out.contains("chandogya-upanishad:6.2.1"), "{out}");
    assert!(out.contains("katha-upanishad:1.3.14"), "{out}");
    assert!(out.contains("UNRESOLVED"), "{out}");
    assert!(out.contains("3 citations, 1 unresolved"), "{out}");
}

#[test]
fn abbrev_add_list_remove() {
    let dir = tempfile::tempdir().unwrap();

    let add = grantha(dir.path(), &["abbrev", "add", "katha-upanishad", "क.उ."]);
    assert!(add.status.success(), "add failed: {}", stderr(&add));
    let config = std::fs::read_to_string(dir.path().join(".grantha.toml")).unwrap();
    assert!(config.contains("katha-upanishad"), "{config}");

    let list = grantha(dir.path(), &["abbrev", "list"]);
    assert!(stdout(&list).contains("katha-upanishad -> क.उ."), "{}", stdout(&list));

    let remove = grantha(dir.path(), &["abbrev", "remove", "katha-upanishad"]);
    assert!(remove.status.success(), "remove failed: {}", stderr(&remove));

    let again = grantha(dir.path(), &["abbrev", "remove", "katha-upanishad"]);
    assert!(!again.status.success(), "removing twice succeeded");
    assert!(stderr(&again).contains("Unknown Abbreviation Target"), "{}", stderr(&again));
}
