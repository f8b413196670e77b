use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::abbreviations::AbbreviationMap;
use crate::error::Error;
use crate::types::Script;

/// Name of the project config file at the working root.
pub const CONFIG_FILE: &str = ".grantha.toml";

/// Project configuration loaded from `.grantha.toml`.
/// Include/exclude patterns are path prefixes applied to batch inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Global abbreviation map JSON, relative to the root.
    pub abbreviation_map: Option<PathBuf>,
    /// Local abbreviation overrides: document id to abbreviations.
    pub abbreviations: BTreeMap<String, Vec<String>>,
    /// Path prefixes excluded from batch commands.
    exclude: Vec<String>,
    /// Path prefixes batch commands are limited to. Empty means everything.
    include: Vec<String>,
    /// Library root, relative to the root.
    pub library: Option<PathBuf>,
    /// Default scripts for export. Empty means every script.
    pub scripts: Vec<Script>,
}

/// Raw TOML structure for `.grantha.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GranthaTomlConfig {
    /// `abbreviation_map = "..."`.
    abbreviation_map: Option<PathBuf>,
    /// `[abbreviations]` table.
    #[serde(default)]
    abbreviations: BTreeMap<String, Vec<String>>,
    /// `exclude = [...]`.
    #[serde(default)]
    exclude: Vec<String>,
    /// `include = [...]`.
    #[serde(default)]
    include: Vec<String>,
    /// `library = "..."`.
    library: Option<PathBuf>,
    /// `scripts = [...]`.
    #[serde(default)]
    scripts: Vec<Script>,
}

impl Config {
    /// Load config from `.grantha.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist. Returns an error if the
    /// file exists but is malformed; a written config never silently falls
    /// back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: GranthaTomlConfig = toml::from_str(&content)?;
        return Ok(Self {
            abbreviation_map: raw.abbreviation_map,
            abbreviations: raw.abbreviations,
            exclude: raw.exclude,
            include: raw.include,
            library: raw.library,
            scripts: raw.scripts,
        });
    }

    /// Global abbreviation map with the local overrides merged in. Without a
    /// configured map file, only the overrides are used.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` or `Error::Json` if the configured map
    /// file is missing or malformed.
    pub fn load_abbreviations(&self, root: &Path, explicit: Option<&Path>) -> Result<AbbreviationMap, Error> {
        let configured = self.abbreviation_map.as_ref().map(|p| return root.join(p));
        let mut map = match explicit.map(Path::to_path_buf).or(configured) {
            Some(path) => AbbreviationMap::load(&path)?,
            None => AbbreviationMap::default(),
        };
        map.merge_overrides(&self.abbreviations);
        return Ok(map);
    }

    /// Check whether a path relative to the root takes part in batch runs.
    ///
    /// A path is included if no include patterns are set, or if it starts
    /// with at least one include pattern. An included path is then excluded
    /// if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.should_scan("anything/at/all.md"));
    }

    #[test]
    fn reads_every_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
scripts = ["devanagari", "roman"]
include = ["library/"]
exclude = ["library/drafts/"]
abbreviation_map = "data/abbreviations.json"
library = "library"

[abbreviations]
katha-upanishad = ["क.उ."]
"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.scripts, vec![Script::Devanagari, Script::Roman]);
        assert_eq!(config.library.as_deref(), Some(Path::new("library")));
        assert_eq!(config.abbreviations["katha-upanishad"], vec!["क.उ."]);
        assert!(config.should_scan("library/isavasya.md"));
        assert!(!config.should_scan("library/drafts/isavasya.md"));
        assert!(!config.should_scan("notes/isavasya.md"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "scripts = [\"klingon\"]\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn overrides_resolve_without_a_map_file() {
        let config = Config {
            abbreviations: BTreeMap::from([("katha-upanishad".to_string(), vec!["क.उ.".to_string()])]),
            ..Config::default()
        };
        let map = config.load_abbreviations(Path::new("."), None).unwrap();
        assert_eq!(map.index().lookup("क.उ."), crate::abbreviations::Lookup::Found("katha-upanishad".to_string()));
    }
}
