use std::fmt::Write as _;

use crate::error::Error;
use crate::integrity::Issue;

/// ANSI bold.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    print_markdown(&render_error(e));
}

/// Print markdown to stderr with headings in bold.
pub fn print_markdown(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened, where, and how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::MalformedMarkup { line, reason } => render_malformed_markup(*line, reason),
        Error::StructureInconsistency { document, reason, reference } => {
            render_structure_inconsistency(document, reference, reason)
        },
        Error::RoundTripHashMismatch { actual, document, expected, hint } => {
            render_hash_mismatch(document, expected, actual, hint)
        },
        Error::PartLoad { part, reason } => render_part_load(part, reason),
        Error::UnknownAbbreviationTarget { document } => render_unknown_abbreviation_target(document),
        Error::ConfigParse { path, reason } => render_config_parse(&path.display().to_string(), reason),
        _ => render_generic(e),
    };
}

/// Render integrity issues for one document as a markdown block.
pub fn render_issues(document: &str, issues: &[Issue]) -> String {
    let mut out = format!("# Integrity: {document}\n\n");
    for issue in issues {
        let _ = writeln!(out, "- `{}` {}: {}", issue.kind, issue.location, issue.message);
    }
    return out;
}

/// Variants with no specific advice.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),
        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),
        Error::Json(e) => format!(
            "\
# Error: Invalid JSON

{e}

## Fix

Check the document against the grantha JSON shape: `grantha_id`,
`canonical_title`, `structure_levels`, `passages`, `commentaries`.
"
        ),
        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}
"
        ),
        Error::TomlSer(e) => format!(
            "\
# Error: TOML Serialization

{e}
"
        ),
        Error::Watch(e) => format!(
            "\
# Error: Watcher

{e}
"
        ),
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// `.grantha.toml` could not be edited.
fn render_config_parse(path: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Config Parse Failed

Could not edit `{path}`: {reason}

## Fix

Make `[abbreviations]` a table of document ids to arrays:

    [abbreviations]
    katha-upanishad = [\"क.उ.\"]
"
    );
}

/// Reconstruction lost or altered content.
fn render_hash_mismatch(document: &str, expected: &str, actual: &str, hint: &str) -> String {
    return format!(
        "\
# Error: Round-Trip Hash Mismatch

`{document}` does not reconstruct to the content it was exported from.
No JSON was written.

- stored:        `{expected}`
- reconstructed: `{actual}`

## Where

{hint}

## Fix

Compare the listed refs in the markup with the source JSON. If the edit was
intended, re-export the JSON with `grantha json2md` to refresh the stored hash.
"
    );
}

/// Markup syntax problem.
fn render_malformed_markup(line: usize, reason: &str) -> String {
    let location = if line == 0 { "in the frontmatter".to_string() } else { format!("at line {line}") };
    return format!(
        "\
# Error: Malformed Markup

Parse failed {location}: {reason}

## Fix

Every `<!-- sanskrit:<script> -->`, `<!-- english -->`, and note block needs
its closing marker, and the file must start with a `+++` frontmatter block.
"
    );
}

/// A part listed in the manifest could not be loaded.
fn render_part_load(part: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Part Load Failed

`{part}`: {reason}

Assembly is all-or-nothing; no document was produced.

## Fix

Check that `{part}` exists next to `metadata.json` and holds valid part JSON,
or remove it from the manifest's `parts` list.
"
    );
}

/// Heading tree or ref depth is wrong.
fn render_structure_inconsistency(document: &str, reference: &str, reason: &str) -> String {
    let mut out = format!(
        "\
# Error: Structure Inconsistency

`{document}`: {reason}
"
    );
    if !reference.is_empty() {
        let _ = write!(out, "\n## Offending ref\n\n    {reference}\n");
    }
    out.push_str(
        "\
\n## Fix

Heading depth must increase one level at a time, each heading's ref must
extend its parent's ref, and main passage refs need one segment per
structure level.
",
    );
    return out;
}

/// `abbrev remove` named a document with no overrides.
fn render_unknown_abbreviation_target(document: &str) -> String {
    return format!(
        "\
# Error: Unknown Abbreviation Target

`{document}` has no abbreviations in `.grantha.toml`.

## Fix

List the configured abbreviations:

    grantha abbrev list
"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::IssueKind;

    #[test]
    fn hash_mismatch_names_document_and_hint() {
        let md = render_error(&Error::RoundTripHashMismatch {
            actual: "sha256:bb".to_string(),
            document: "isavasya".to_string(),
            expected: "sha256:aa".to_string(),
            hint: "changed: main:3".to_string(),
        });
        assert!(md.starts_with("# Error: Round-Trip Hash Mismatch"));
        assert!(md.contains("`isavasya`"));
        assert!(md.contains("changed: main:3"));
        assert!(md.contains("## Fix"));
    }

    #[test]
    fn malformed_markup_reports_line() {
        let md = render_error(&Error::MalformedMarkup { line: 21, reason: "unterminated fence".to_string() });
        assert!(md.contains("at line 21: unterminated fence"), "{md}");
    }

    #[test]
    fn issues_render_as_list() {
        let issues = vec![Issue {
            kind: IssueKind::OrphanCommentary,
            location: "commentary/c:9.9".to_string(),
            message: "no passage with this ref".to_string(),
        }];
        let md = render_issues("katha", &issues);
        assert!(md.contains("- `orphan-commentary` commentary/c:9.9: no passage with this ref"), "{md}");
    }
}
