//! CLI commands: conversion, verification, batch checks, assembly,
//! citation listing, and commentary splitting.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::assembler::{self, MANIFEST_FILE};
use crate::classifier::{self, NoteClassifier};
use crate::config::Config;
use crate::diagnostics;
use crate::error;
use crate::export::{self, CommentarySelection, ExportOptions};
use crate::frontmatter;
use crate::import;
use crate::integrity::{self, Issue};
use crate::library::DocumentCache;
use crate::resolver::Resolver;
use crate::roundtrip::{self, Outcome};
use crate::scanner::{self, Citation, Site};
use crate::types::{Document, Reference, Resolution, Script};

/// Result of checking one batch input.
enum CheckResult {
    /// Parsed or loaded, but integrity checks found problems.
    Issues(Vec<Issue>),
    /// Clean.
    Ok,
}

/// Convert a JSON document (or multi-part directory) to markup.
///
/// Empty `scripts` falls back to the config's default scripts, then to every
/// script. With `verify`, the markup is parsed back and validated before it
/// is written.
///
/// # Errors
///
/// Returns loading, serialization, or (with `verify`) round-trip errors.
/// Nothing is written on error.
pub fn json2md(
    input: &Path,
    output: &Path,
    scripts: &[Script],
    commentaries: CommentarySelection,
    verify: bool,
) -> Result<(), error::Error> {
    let config = Config::load(Path::new("."))?;
    let document = load_document(input)?;

    let chosen: BTreeSet<Script> = if !scripts.is_empty() {
        scripts.iter().copied().collect()
    } else if !config.scripts.is_empty() {
        config.scripts.iter().copied().collect()
    } else {
        Script::ALL.into_iter().collect()
    };
    let options = ExportOptions { commentaries, scripts: chosen };

    let markup = export::serialize(&document, &options)?;
    if verify {
        import::convert(&markup, Some(&document))?;
        tracing::info!(document = %document.id, "export verified");
    }
    std::fs::write(output, &markup)?;
    println!("Wrote {} ({} passages)", output.display(), document.main.len());
    return Ok(());
}

/// Convert markup back to JSON, validating the round trip first.
///
/// # Errors
///
/// Returns parse errors, or `Error::RoundTripHashMismatch` when the markup
/// no longer matches its stored hash. Nothing is written on error.
pub fn md2json(input: &Path, output: &Path, original: Option<&Path>) -> Result<(), error::Error> {
    let markup = read(input)?;
    let reference = original.map(load_document).transpose()?;
    let document = import::convert(&markup, reference.as_ref())?;
    std::fs::write(output, document.to_json_pretty()?)?;
    println!("Wrote {} ({} passages)", output.display(), document.main.len());
    return Ok(());
}

/// Check that a JSON document still matches markup exported from it.
///
/// # Errors
///
/// Returns loading and parse errors. A mismatch is reported as
/// `Error::RoundTripHashMismatch`.
pub fn verify(json: &Path, markup_path: &Path) -> Result<ExitCode, error::Error> {
    let document = load_document(json)?;
    let markup = read(markup_path)?;
    return match roundtrip::verify(&document, &markup)? {
        Outcome::Passed => {
            println!("OK      {} matches {}", markup_path.display(), json.display());
            Ok(ExitCode::SUCCESS)
        },
        Outcome::Failed { actual, hint } => {
            let (header, _, _) = frontmatter::split(&markup)?;
            Err(error::Error::RoundTripHashMismatch {
                actual: actual.prefixed(),
                document: document.id,
                expected: header.validation_hash,
                hint,
            })
        },
    };
}

/// Batch check everything under `path`: markup files are parsed and
/// validated, JSON documents and multi-part directories get integrity
/// checks. One broken document never stops the others.
///
/// Exit code: 0 when everything is clean, 2 when any document failed or has
/// integrity issues.
///
/// # Errors
///
/// Returns errors from config loading only; per-document failures are
/// reported and counted.
pub fn check(path: &Path) -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;
    let skip = config.abbreviation_map.as_ref().map(|p| return root.join(p));
    let mut checked = 0_u32;
    let mut failed = 0_u32;
    let mut with_issues = 0_u32;

    for target in batch_targets(path, &config, skip.as_deref()) {
        checked = checked.saturating_add(1);
        match check_target(&target) {
            Ok(CheckResult::Ok) => println!("OK      {}", target.display()),
            Ok(CheckResult::Issues(issues)) => {
                with_issues = with_issues.saturating_add(1);
                println!("ISSUES  {} ({})", target.display(), issues.len());
                diagnostics::print_markdown(&diagnostics::render_issues(&target.display().to_string(), &issues));
            },
            Err(e) => {
                failed = failed.saturating_add(1);
                println!("FAILED  {}", target.display());
                diagnostics::print_error(&e);
            },
        }
    }

    println!();
    if failed > 0 || with_issues > 0 {
        println!("{checked} checked, {failed} failed, {with_issues} with issues");
        return Ok(ExitCode::from(2));
    }
    println!("All {checked} documents clean");
    return Ok(ExitCode::SUCCESS);
}

/// Merge a multi-part directory into one JSON document.
///
/// # Errors
///
/// Returns manifest errors or `Error::PartLoad`. Nothing is written on error.
pub fn assemble(dir: &Path, output: &Path) -> Result<(), error::Error> {
    let document = assembler::assemble_dir(dir)?;
    std::fs::write(output, document.to_json_pretty()?)?;
    println!("Wrote {} ({} passages)", output.display(), document.main.len());
    return Ok(());
}

/// List every citation in a JSON document or text file with its resolution.
///
/// # Errors
///
/// Returns file, config, or abbreviation map errors. Unresolved citations
/// are listed, never errors.
pub fn resolve(file: &Path, abbreviations: Option<&Path>, library: Option<&Path>) -> Result<ExitCode, error::Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;
    let map = config.load_abbreviations(&root, abbreviations)?;
    let mut resolver = Resolver::new(map.index());
    for id in map.0.keys() {
        resolver.add_available(id.clone());
    }

    let library_root = library.map(Path::to_path_buf).or_else(|| return config.library.as_ref().map(|l| return root.join(l)));
    if let Some(library_root) = library_root {
        register_library(&mut resolver, &library_root);
    }

    let found: Vec<(Option<Site>, Citation)> = if is_json(file) || file.is_dir() {
        let document = load_document(file)?;
        resolver.add_document(&document);
        scanner::scan_document(&document).into_iter().map(|(site, citation)| return (Some(site), citation)).collect()
    } else {
        scanner::extract(&read(file)?).into_iter().map(|citation| return (None, citation)).collect()
    };

    let mut unresolved = 0_u32;
    for (site, citation) in &found {
        let reference = resolver.resolve(citation);
        if !reference.is_resolved() {
            unresolved = unresolved.saturating_add(1);
        }
        print_reference(site.as_ref(), &reference);
    }
    println!();
    println!("{} citations, {unresolved} unresolved", found.len());
    return Ok(ExitCode::SUCCESS);
}

/// Split raw commentary text into prefatory notes and body.
///
/// # Errors
///
/// Returns loading or writing errors.
pub fn split_commentary(input: &Path, output: &Path, classifier: &dyn NoteClassifier) -> Result<(), error::Error> {
    let mut document = load_document(input)?;
    let created = classifier::split_document(&mut document, classifier);
    std::fs::write(output, document.to_json_pretty()?)?;
    println!("Wrote {} ({created} notes split out)", output.display());
    return Ok(());
}

/// Files and multi-part directories under `path` that batch commands visit.
/// Part files and manifests are reached through their directory.
fn batch_targets(path: &Path, config: &Config, skip: Option<&Path>) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut targets = Vec::new();
    let mut walker = walkdir::WalkDir::new(path).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        let entry_path = entry.path();
        let relative = entry_path.strip_prefix(".").unwrap_or(entry_path);
        if !config.should_scan(&relative.to_string_lossy()) {
            continue;
        }
        if entry.file_type().is_dir() {
            if entry_path.join(MANIFEST_FILE).is_file() {
                targets.push(entry_path.to_path_buf());
                walker.skip_current_dir();
            }
            continue;
        }
        let is_markup = entry_path.extension().is_some_and(|ext| return ext == "md") && has_frontmatter(entry_path);
        let is_skipped = skip.is_some_and(|s| return s == entry_path || s == relative);
        if is_markup || (is_json(entry_path) && !is_skipped) {
            targets.push(entry_path.to_path_buf());
        }
    }
    return targets;
}

/// Check one markup file, JSON document, or multi-part directory.
///
/// # Errors
///
/// Returns the parse, validation, or load error for this target.
fn check_target(target: &Path) -> Result<CheckResult, error::Error> {
    let issues = if target.is_dir() {
        let manifest = assembler::Manifest::load(target)?;
        let mut issues = integrity::check_manifest(target, &manifest);
        let document = assembler::assemble(&manifest, &assembler::FsPartLoader { root: target.to_path_buf() })?;
        issues.extend(integrity::check(&document));
        issues.extend(integrity::check_parts(&document));
        issues
    } else if is_json(target) {
        integrity::check(&load_document(target)?)
    } else {
        let document = import::convert(&read(target)?, None)?;
        integrity::check(&document)
    };
    if issues.is_empty() {
        return Ok(CheckResult::Ok);
    }
    return Ok(CheckResult::Issues(issues));
}

/// True when the file opens with a `+++` header. Other markdown, such as a
/// README, is not a converted document.
fn has_frontmatter(path: &Path) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else { return true };
    let found = text.lines().find(|l| return !l.trim().is_empty()).is_some_and(|l| return l.trim() == "+++");
    if !found {
        tracing::debug!(path = %path.display(), "markdown without frontmatter skipped");
    }
    return found;
}

/// True for `*.json` paths.
fn is_json(path: &Path) -> bool {
    return path.extension().is_some_and(|ext| return ext.eq_ignore_ascii_case("json"));
}

/// Load a single-file JSON document or assemble a multi-part directory.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, `Error::Json`, or assembly errors.
fn load_document(path: &Path) -> Result<Document, error::Error> {
    if path.is_dir() {
        return assembler::assemble_dir(path);
    }
    return Document::from_json(&read(path)?);
}

/// One output line per citation.
fn print_reference(site: Option<&Site>, reference: &Reference) {
    let status = match &reference.resolution {
        Resolution::Resolved if reference.in_library => "RESOLVED".to_string(),
        Resolution::Resolved => "EXTERNAL".to_string(),
        Resolution::Unresolved(reason) => format!("UNRESOLVED ({reason})"),
    };
    let location = site.map_or_else(String::new, |s| return format!("  [{}:{}]", s.list, s.reference));
    println!("{status:<10}  {}  {}{location}", reference.canonical_id(), reference.raw_text);
}

/// Read a UTF-8 input file.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file does not exist, and
/// `Error::Io` for anything else, including text that is not UTF-8.
fn read(path: &Path) -> Result<String, error::Error> {
    return std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            return error::Error::FileNotFound { path: path.to_path_buf() };
        }
        return error::Error::Io(e);
    });
}

/// Make every library document known to the resolver. Documents that fail
/// to load still count as available.
fn register_library(resolver: &mut Resolver, library_root: &Path) {
    let mut cache = DocumentCache::new(library_root);
    for id in cache.available_ids() {
        match cache.get(&id) {
            Ok(document) => resolver.add_document(&document),
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "library document failed to load");
                resolver.add_available(id);
            },
        }
    }
}
