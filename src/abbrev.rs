use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::error;

// ── CLI commands ──────────────────────────────────────────────────────

/// List local abbreviation overrides, sorted by document id.
///
/// # Errors
///
/// Returns errors from config loading.
pub fn cmd_list(root: &Path) -> Result<(), error::Error> {
    let config = Config::load(root)?;

    if config.abbreviations.is_empty() {
        println!("No abbreviations configured.");
        return Ok(());
    }

    for (document, abbreviations) in &config.abbreviations {
        println!("{document} -> {}", abbreviations.join(", "));
    }
    return Ok(());
}

/// Add an abbreviation for a document to the config file.
///
/// # Errors
///
/// Returns errors from config reading or writing.
pub fn cmd_add(root: &Path, document: &str, abbreviation: &str) -> Result<(), error::Error> {
    if add_to_config(root, document, abbreviation)? {
        println!("Added abbreviation: {abbreviation} -> {document}");
    } else {
        println!("Abbreviation already configured: {abbreviation} -> {document}");
    }
    return Ok(());
}

/// Remove one abbreviation, or every abbreviation, of a document.
///
/// # Errors
///
/// Returns `Error::UnknownAbbreviationTarget` if the document has no
/// configured abbreviations, or errors from config reading or writing.
pub fn cmd_remove(root: &Path, document: &str, abbreviation: Option<&str>) -> Result<(), error::Error> {
    remove_from_config(root, document, abbreviation)?;
    match abbreviation {
        Some(abbreviation) => println!("Removed abbreviation: {abbreviation} -> {document}"),
        None => println!("Removed all abbreviations for {document}"),
    }
    return Ok(());
}

// ── Config file editing ───────────────────────────────────────────────

/// Parse a `.grantha.toml` into a format-preserving document.
/// Returns an empty document if the file doesn't exist.
///
/// # Errors
///
/// Returns `Error::Io` on read failure or `Error::ConfigParse` on parse failure.
fn read_config_doc(root: &Path) -> Result<(PathBuf, toml_edit::DocumentMut), error::Error> {
    let config_path = root.join(config::CONFIG_FILE);
    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(error::Error::Io(e)),
    };

    let doc: toml_edit::DocumentMut = content.parse().map_err(|e: toml_edit::TomlError| {
        return error::Error::ConfigParse { path: config_path.clone(), reason: e.to_string() };
    })?;

    return Ok((config_path, doc));
}

/// Append an abbreviation to the document's array in `[abbreviations]`,
/// creating the table and array as needed. Returns false if it was
/// already present.
///
/// # Errors
///
/// Returns `Error::ConfigParse` if the config can't be parsed or the entry
/// is not an array, or `Error::Io` if writing fails.
fn add_to_config(root: &Path, document: &str, abbreviation: &str) -> Result<bool, error::Error> {
    let (config_path, mut doc) = read_config_doc(root)?;

    let table = doc
        .entry("abbreviations")
        .or_insert_with(|| return toml_edit::Item::Table(toml_edit::Table::new()))
        .as_table_mut()
        .ok_or_else(|| {
            return error::Error::ConfigParse {
                path: config_path.clone(),
                reason: "`abbreviations` must be a table".to_string(),
            };
        })?;

    let array = table
        .entry(document)
        .or_insert_with(|| return toml_edit::value(toml_edit::Array::new()))
        .as_array_mut()
        .ok_or_else(|| {
            return error::Error::ConfigParse {
                path: config_path.clone(),
                reason: format!("`abbreviations.{document}` must be an array"),
            };
        })?;

    if array.iter().any(|v| return v.as_str() == Some(abbreviation)) {
        return Ok(false);
    }
    array.push(abbreviation);

    std::fs::write(&config_path, doc.to_string())?;
    return Ok(true);
}

/// Remove a document's abbreviation (or its whole entry) from
/// `[abbreviations]`.
///
/// # Errors
///
/// Returns `Error::UnknownAbbreviationTarget` if the document or the named
/// abbreviation isn't found.
fn remove_from_config(root: &Path, document: &str, abbreviation: Option<&str>) -> Result<(), error::Error> {
    let (config_path, mut doc) = read_config_doc(root)?;
    let unknown = || return error::Error::UnknownAbbreviationTarget { document: document.to_string() };

    let table = doc.get_mut("abbreviations").and_then(toml_edit::Item::as_table_mut).ok_or_else(unknown)?;

    match abbreviation {
        None => {
            table.remove(document).ok_or_else(unknown)?;
        },
        Some(abbreviation) => {
            let array = table.get_mut(document).and_then(toml_edit::Item::as_array_mut).ok_or_else(unknown)?;
            let position = array.iter().position(|v| return v.as_str() == Some(abbreviation)).ok_or_else(unknown)?;
            array.remove(position);
            if array.is_empty() {
                table.remove(document);
            }
        },
    }

    std::fs::write(&config_path, doc.to_string())?;
    return Ok(());
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_round_trips_through_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::CONFIG_FILE);
        std::fs::write(&path, "# library settings\nscripts = [\"devanagari\"]\n").unwrap();

        assert!(add_to_config(dir.path(), "katha-upanishad", "क.उ.").unwrap());
        assert!(add_to_config(dir.path(), "katha-upanishad", "Ka.U.").unwrap());
        assert!(!add_to_config(dir.path(), "katha-upanishad", "क.उ.").unwrap());

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.abbreviations["katha-upanishad"], vec!["क.उ.", "Ka.U."]);

        remove_from_config(dir.path(), "katha-upanishad", Some("Ka.U.")).unwrap();
        remove_from_config(dir.path(), "katha-upanishad", None).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# library settings\n"), "{written}");
        assert!(Config::load(dir.path()).unwrap().abbreviations.is_empty());
    }

    #[test]
    fn removing_unknown_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = remove_from_config(dir.path(), "missing", None).unwrap_err();
        assert!(matches!(err, error::Error::UnknownAbbreviationTarget { .. }));
    }
}
