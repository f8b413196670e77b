/// Core domain types: documents, passages, commentaries, hashes, citations.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Per-script text keyed by script, iterated in the fixed script order.
pub type ScriptText = BTreeMap<Script, String>;

/// A commentary attached to a document. Commentary passages address main
/// passages by ref; the link is soft and only checked by integrity checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commentary {
    /// Commentator display names, keyed by script or transliteration name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commentator: BTreeMap<String, String>,
    /// Fields this crate does not interpret, preserved across conversions.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Stable commentary id, e.g. `vedanta-desika`.
    #[serde(rename = "commentary_id", alias = "id")]
    pub id: String,
    /// Commentary passages in document order.
    #[serde(default)]
    pub passages: Vec<CommentaryPassage>,
    /// Commentary title.
    #[serde(rename = "commentary_title", alias = "title", default, skip_serializing_if = "String::is_empty")]
    pub title: String,
}

/// One commentary block attached to a passage ref.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryPassage {
    /// Main commentary text.
    #[serde(default)]
    pub content: Content,
    /// Introductory notes rendered before the main commentary text.
    #[serde(rename = "prefatory_material", default, skip_serializing_if = "Vec::is_empty")]
    pub prefatory_notes: Vec<PrefatoryNote>,
    /// Target passage ref. May be a range such as `6.3.24-30`.
    #[serde(rename = "ref")]
    pub reference: PassageRef,
    /// Part file this passage was read from, for multi-part documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_part: Option<String>,
}

/// Textual content of a passage: Sanskrit in one or more scripts plus English.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// English commentary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    /// English translation of a verse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_translation: Option<String>,
    /// Sanskrit text per script.
    #[serde(default, deserialize_with = "deserialize_script_text", skip_serializing_if = "BTreeMap::is_empty")]
    pub sanskrit: ScriptText,
}

impl Content {
    /// True when no script and no English field carries text.
    pub fn is_empty(&self) -> bool {
        return self.sanskrit.values().all(|s| return s.is_empty())
            && self.english.as_deref().is_none_or(str::is_empty)
            && self.english_translation.as_deref().is_none_or(str::is_empty);
    }

    /// Total character count across all fields. Used for diff hints.
    pub fn char_len(&self) -> usize {
        let sanskrit: usize = self.sanskrit.values().map(|s| return s.chars().count()).sum();
        let english = self.english.as_deref().map_or(0, |s| return s.chars().count());
        let translation =
            self.english_translation.as_deref().map_or(0, |s| return s.chars().count());
        return sanskrit.saturating_add(english).saturating_add(translation);
    }
}

/// SHA-256 digest of normalized document content. 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(
    /// The hex-encoded SHA-256 digest string.
    pub String,
);

impl ContentHash {
    /// Parse the `sha256:<hex>` form stored in frontmatter. A bare hex digest
    /// is accepted as well.
    pub fn parse_prefixed(raw: &str) -> Self {
        let hex = raw.trim().strip_prefix("sha256:").unwrap_or_else(|| return raw.trim());
        return Self(hex.to_ascii_lowercase());
    }

    /// Render with the `sha256:` prefix used in frontmatter.
    pub fn prefixed(&self) -> String {
        return format!("sha256:{}", self.0);
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// A full grantha: structure definition, passages, and commentaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Alternative names for the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Commentaries in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commentaries: Vec<Commentary>,
    /// Concluding material after the last structural section.
    #[serde(rename = "concluding_material", alias = "concludingMaterial", default, skip_serializing_if = "Vec::is_empty")]
    pub concluding: Vec<Passage>,
    /// Fields this crate does not interpret, preserved across conversions.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Canonical document id, e.g. `chandogya-upanishad`.
    #[serde(rename = "grantha_id", alias = "id")]
    pub id: String,
    /// Language of the text, e.g. `sanskrit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Main passages addressed by full-depth refs.
    #[serde(rename = "passages", default)]
    pub main: Vec<Passage>,
    /// Prefatory material before the first structural section.
    #[serde(rename = "prefatory_material", alias = "prefatoryMaterial", default, skip_serializing_if = "Vec::is_empty")]
    pub prefatory: Vec<Passage>,
    /// Named aliases for structural ref segments.
    #[serde(alias = "structuralAliases", default, skip_serializing_if = "Vec::is_empty")]
    pub structural_aliases: Vec<StructuralAlias>,
    /// Structure tree roots. Almost always a single root.
    #[serde(alias = "structureLevels", default)]
    pub structure_levels: Vec<StructureLevel>,
    /// Kind of text, e.g. `upanishad`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<String>,
    /// Canonical title.
    #[serde(rename = "canonical_title", alias = "title", default)]
    pub title: String,
}

impl Document {
    /// Parse a document from its JSON form and stamp passage kinds by list.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the JSON does not match the document shape.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut document: Self = serde_json::from_str(json)?;
        document.assign_kinds();
        return Ok(document);
    }

    /// Set each passage's kind from the list it lives in.
    pub fn assign_kinds(&mut self) {
        for passage in &mut self.prefatory {
            passage.kind = PassageKind::Prefatory;
        }
        for passage in &mut self.main {
            passage.kind = PassageKind::Main;
        }
        for passage in &mut self.concluding {
            passage.kind = PassageKind::Concluding;
        }
    }

    /// Ids of every commentary, in declaration order.
    pub fn commentary_ids(&self) -> Vec<String> {
        return self.commentaries.iter().map(|c| return c.id.clone()).collect();
    }

    /// Serialize to pretty JSON with non-ASCII text kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        return Ok(out);
    }
}

/// A text passage: main verse, or prefatory/concluding material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    #[serde(default)]
    pub content: Content,
    /// Which document list the passage belongs to.
    #[serde(rename = "passage_type", default)]
    pub kind: PassageKind,
    /// Display label, required for prefatory and concluding material.
    #[serde(default, deserialize_with = "deserialize_optional_script_text", skip_serializing_if = "Option::is_none")]
    pub label: Option<ScriptText>,
    /// Hierarchical ref, e.g. `3.1.1`, or `0.1` for prefatory material.
    #[serde(rename = "ref")]
    pub reference: PassageRef,
    /// Part file this passage was read from, for multi-part documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_part: Option<String>,
}

/// Which list of a document a passage belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassageKind {
    /// Material after the last structural section.
    Concluding,
    /// A passage addressed by a full-depth structural ref.
    #[default]
    Main,
    /// Material before the first structural section.
    Prefatory,
}

/// Dot-separated hierarchical ref such as `3.1.1`. The raw string is kept so
/// malformed refs survive a round trip and can be reported, not coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassageRef(
    /// The raw ref text.
    pub String,
);

impl PassageRef {
    /// Wrap a raw ref string.
    pub fn new(raw: impl Into<String>) -> Self {
        return Self(raw.into());
    }

    /// Borrow the raw ref text.
    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// Number of dot-separated segments, whether or not they are numeric.
    pub fn segment_count(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        return self.0.split('.').count();
    }

    /// Parse every segment as a non-negative integer. `None` if any segment
    /// is empty or non-numeric (ranges included).
    pub fn segments(&self) -> Option<Vec<u32>> {
        if self.0.is_empty() {
            return None;
        }
        return self.0.split('.').map(|s| return s.parse::<u32>().ok()).collect();
    }

    /// Numeric key for ordering. A range suffix (`24-30`) orders by its start;
    /// unparseable segments order last.
    pub fn sort_key(&self) -> Vec<u32> {
        return self
            .0
            .split('.')
            .map(|s| {
                let start = s.split('-').next().unwrap_or(s);
                return start.parse::<u32>().unwrap_or(u32::MAX);
            })
            .collect();
    }
}

impl fmt::Display for PassageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// An introductory note inside a commentary passage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefatoryNote {
    /// Note text.
    #[serde(default)]
    pub content: Content,
    /// Display label of the note.
    #[serde(default)]
    pub label: String,
    /// Free-form note type, e.g. `commentary_intro`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub note_type: String,
}

/// A resolved (or unresolvable) citation found in passage or commentary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Text to show for the citation.
    pub display_text: String,
    /// Canonical document id, or the raw abbreviation when unknown.
    pub document_id: String,
    /// Whether the target document is part of the loaded library.
    pub in_library: bool,
    /// Normalized structural path.
    pub path: PassageRef,
    /// The citation exactly as it appeared in the source text.
    pub raw_text: String,
    /// Whether resolution succeeded, and why not if it didn't.
    pub resolution: Resolution,
}

impl Reference {
    /// Canonical `documentId:ref` form.
    pub fn canonical_id(&self) -> String {
        return format!("{}:{}", self.document_id, self.path);
    }

    /// True when the citation resolved to a library passage path.
    pub fn is_resolved(&self) -> bool {
        return matches!(self.resolution, Resolution::Resolved);
    }
}

/// Outcome of resolving one citation. Unresolved is a soft state consumed by
/// the presentation layer as an inert, external citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Abbreviation and every path segment resolved.
    Resolved,
    /// The citation is external or malformed.
    Unresolved(UnresolvedReason),
}

/// Script a Sanskrit text is written in. Declaration order is the fixed
/// script order used for hashing and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// देवनागरी.
    Devanagari,
    /// ಕನ್ನಡ.
    Kannada,
    /// IAST romanization.
    Roman,
}

impl Script {
    /// Every known script in fixed order.
    pub const ALL: [Self; 3] = [Self::Devanagari, Self::Kannada, Self::Roman];

    /// Lowercase name used in markup fences and JSON keys.
    pub const fn name(self) -> &'static str {
        return match self {
            Self::Devanagari => "devanagari",
            Self::Kannada => "kannada",
            Self::Roman => "roman",
        };
    }

    /// Parse a comma-separated list such as `devanagari,roman`.
    ///
    /// # Errors
    ///
    /// Returns the first unknown script name.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, String> {
        let mut scripts = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| return !s.is_empty()) {
            let script: Self = name.parse()?;
            if !scripts.contains(&script) {
                scripts.push(script);
            }
        }
        scripts.sort();
        return Ok(scripts);
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.name());
    }
}

impl FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return Self::ALL
            .into_iter()
            .find(|script| return script.name() == s)
            .ok_or_else(|| {
                return format!("unknown script `{s}` (expected devanagari, kannada, or roman)");
            });
    }
}

/// A named alias for a numeric ref segment at one structure level, e.g.
/// `shiksha` standing for valli `1` of the Taittiriya.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralAlias {
    /// Alias text as it appears in citations.
    pub alias: String,
    /// Numeric segment the alias stands for.
    #[serde(alias = "canonicalValue")]
    pub canonical_value: u32,
    /// `StructureLevel.key` the alias belongs to.
    pub level: String,
}

/// One level of a document's structure tree.
#[allow(clippy::arbitrary_source_item_ordering, reason = "TOML needs plain keys before nested tables")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureLevel {
    /// Machine key, e.g. `Adhyaya`.
    pub key: String,
    /// Display name per script.
    #[serde(rename = "scriptNames", alias = "script_names", alias = "displayNames", default, deserialize_with = "deserialize_script_text", skip_serializing_if = "BTreeMap::is_empty")]
    pub script_names: ScriptText,
    /// Nested levels. Empty for the leaf level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StructureLevel>,
}

impl StructureLevel {
    /// A leaf level with no display names.
    pub fn leaf(key: impl Into<String>) -> Self {
        return Self { key: key.into(), script_names: ScriptText::new(), children: Vec::new() };
    }

    /// Build a single-chain tree from keys, outermost first.
    pub fn chain<S: AsRef<str>>(keys: &[S]) -> Vec<Self> {
        let mut built: Option<Self> = None;
        for key in keys.iter().rev() {
            let mut level = Self::leaf(key.as_ref());
            if let Some(child) = built.take() {
                level.children.push(child);
            }
            built = Some(level);
        }
        return built.into_iter().collect();
    }
}

/// Why a citation could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The alias exists, but not at the level its position requires.
    AliasAtWrongLevel {
        /// The alias text.
        alias: String,
        /// Level the segment position requires.
        expected: String,
        /// Level the alias is defined at.
        found: String,
    },
    /// The abbreviation is claimed by more than one document.
    AmbiguousAbbreviation {
        /// Document ids that claim the abbreviation.
        candidates: Vec<String>,
    },
    /// The alias is defined at more than one structure level.
    AmbiguousAlias {
        /// The alias text.
        alias: String,
        /// Level keys the alias appears at.
        levels: Vec<String>,
    },
    /// The citation payload has no structural path.
    EmptyPath,
    /// The path has more segments than the document structure is deep.
    OutOfRange {
        /// Depth of the target document's structure.
        depth: usize,
        /// Number of segments in the citation.
        segments: usize,
    },
    /// No document claims the abbreviation.
    UnknownAbbreviation,
    /// A non-numeric segment has no alias definition.
    UnknownAlias {
        /// The segment text.
        alias: String,
    },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Self::AliasAtWrongLevel { alias, expected, found } => {
                write!(f, "alias `{alias}` belongs to level {found}, expected {expected}")
            },
            Self::AmbiguousAbbreviation { candidates } => {
                write!(f, "abbreviation claimed by {}", candidates.join(", "))
            },
            Self::AmbiguousAlias { alias, levels } => {
                write!(f, "alias `{alias}` defined at levels {}", levels.join(", "))
            },
            Self::EmptyPath => f.write_str("no structural path"),
            Self::OutOfRange { depth, segments } => {
                write!(f, "{segments} segments for a structure {depth} deep")
            },
            Self::UnknownAbbreviation => f.write_str("unknown abbreviation"),
            Self::UnknownAlias { alias } => write!(f, "unknown alias `{alias}`"),
        };
    }
}

/// Deserialize per-script text, skipping `null` values and warning about
/// script keys this crate does not know.
fn deserialize_script_text<'de, D>(deserializer: D) -> Result<ScriptText, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<String>>> = Option::deserialize(deserializer)?;
    let mut text = ScriptText::new();
    for (name, value) in raw.unwrap_or_default() {
        let Some(value) = value else { continue };
        match name.parse::<Script>() {
            Ok(script) => {
                text.insert(script, value);
            },
            Err(_) => tracing::warn!(script = %name, "ignoring text in unsupported script"),
        }
    }
    return Ok(text);
}

/// Optional variant of [`deserialize_script_text`]; an all-null map becomes `None`.
fn deserialize_optional_script_text<'de, D>(deserializer: D) -> Result<Option<ScriptText>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = deserialize_script_text(deserializer)?;
    if text.is_empty() {
        return Ok(None);
    }
    return Ok(Some(text));
}
