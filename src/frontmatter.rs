//! The `+++`-fenced TOML header at the top of every markup file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Commentary, Document, Script, StructuralAlias, StructureLevel};

/// Fence line that opens and closes the header.
pub const FENCE: &str = "+++";

/// Commentary fields carried in the header so a commentary survives a round
/// trip even when it has no passages in the markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryMeta {
    /// Stable commentary id.
    pub commentary_id: String,
    /// Commentary title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commentary_title: String,
    /// Commentator names per script.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commentator: BTreeMap<String, String>,
    /// Uninterpreted commentary fields, JSON-encoded since TOML has no null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_json: Option<String>,
}

impl CommentaryMeta {
    /// Header entry for a commentary, dropping its passages.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the extra fields cannot be encoded.
    pub fn from_commentary(commentary: &Commentary) -> Result<Self, Error> {
        return Ok(Self {
            commentary_id: commentary.id.clone(),
            commentary_title: commentary.title.clone(),
            commentator: commentary.commentator.clone(),
            extra_json: encode_extra(&commentary.extra)?,
        });
    }

    /// Empty commentary carrying this header entry's metadata.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `extra_json` is not a JSON object.
    pub fn to_commentary(&self) -> Result<Commentary, Error> {
        return Ok(Commentary {
            commentator: self.commentator.clone(),
            extra: decode_extra(self.extra_json.as_deref())?,
            id: self.commentary_id.clone(),
            passages: Vec::new(),
            title: self.commentary_title.clone(),
        });
    }
}

/// Markup header: document metadata, export scope, and the validation hash.
#[allow(clippy::arbitrary_source_item_ordering, reason = "field order is the rendered key order")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmatter {
    /// Canonical document id.
    pub grantha_id: String,
    /// Canonical title.
    #[serde(default)]
    pub canonical_title: String,
    /// Alternative document names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Kind of text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<String>,
    /// Language of the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Scripts rendered in the body.
    #[serde(default)]
    pub scripts: Vec<Script>,
    /// Commentary ids rendered in the body. Empty when the commentary layer
    /// was omitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commentaries: Vec<String>,
    /// `sha256:<hex>` of the source document under the export scope.
    pub validation_hash: String,
    /// Uninterpreted document fields, JSON-encoded since TOML has no null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_json: Option<String>,
    /// Structural alias table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_aliases: Vec<StructuralAlias>,
    /// Declared structure tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure_levels: Vec<StructureLevel>,
    /// Metadata of every commentary in the body, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commentaries_metadata: Vec<CommentaryMeta>,
}

impl Frontmatter {
    /// Document with this header's metadata and no passages.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if an `extra_json` field is not a JSON object.
    pub fn to_document(&self) -> Result<Document, Error> {
        let commentaries = self
            .commentaries_metadata
            .iter()
            .map(CommentaryMeta::to_commentary)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Document {
            aliases: self.aliases.clone(),
            commentaries,
            extra: decode_extra(self.extra_json.as_deref())?,
            id: self.grantha_id.clone(),
            language: self.language.clone(),
            structural_aliases: self.structural_aliases.clone(),
            structure_levels: self.structure_levels.clone(),
            text_type: self.text_type.clone(),
            title: self.canonical_title.clone(),
            ..Document::default()
        });
    }
}

/// Header for a document under a given export scope.
///
/// # Errors
///
/// Returns `Error::Json` if extra fields cannot be encoded.
pub fn for_document(
    document: &Document,
    scripts: Vec<Script>,
    commentaries: Vec<String>,
    validation_hash: String,
) -> Result<Frontmatter, Error> {
    let commentaries_metadata = document
        .commentaries
        .iter()
        .filter(|c| return commentaries.contains(&c.id))
        .map(CommentaryMeta::from_commentary)
        .collect::<Result<Vec<_>, _>>()?;
    return Ok(Frontmatter {
        grantha_id: document.id.clone(),
        canonical_title: document.title.clone(),
        aliases: document.aliases.clone(),
        text_type: document.text_type.clone(),
        language: document.language.clone(),
        scripts,
        commentaries,
        validation_hash,
        extra_json: encode_extra(&document.extra)?,
        structural_aliases: document.structural_aliases.clone(),
        structure_levels: document.structure_levels.clone(),
        commentaries_metadata,
    });
}

/// Render the header including both fences and a trailing newline.
///
/// # Errors
///
/// Returns `Error::TomlSer` if the header cannot be encoded.
pub fn render(frontmatter: &Frontmatter) -> Result<String, Error> {
    let body = toml::to_string(frontmatter)?;
    return Ok(format!("{FENCE}\n{body}{FENCE}\n"));
}

/// Split markup into its parsed header, the body text, and the one-based
/// line number the body starts on.
///
/// # Errors
///
/// Returns `Error::MalformedMarkup` if the header is absent, never closed,
/// or not valid TOML of the expected shape.
pub fn split(markup: &str) -> Result<(Frontmatter, &str, usize), Error> {
    let rest = markup.trim_start_matches('\u{feff}');
    let mut offset = 0_usize;
    let mut opened = false;
    let mut header_start = 0_usize;

    for (index, line) in rest.split_inclusive('\n').enumerate() {
        let end = offset.saturating_add(line.len());
        let trimmed = line.trim();
        if !opened {
            if trimmed.is_empty() {
                offset = end;
                continue;
            }
            if trimmed != FENCE {
                return Err(Error::MalformedMarkup {
                    line: index.saturating_add(1),
                    reason: format!("expected `{FENCE}` frontmatter fence"),
                });
            }
            opened = true;
            header_start = end;
        } else if trimmed == FENCE {
            let header = rest.get(header_start..offset).unwrap_or_default();
            let parsed: Frontmatter = toml::from_str(header).map_err(|e| {
                let first_line = line_of(rest, header_start);
                let line = e
                    .span()
                    .map_or(first_line, |span| return first_line.saturating_add(line_of(header, span.start)).saturating_sub(1));
                return Error::MalformedMarkup { line, reason: format!("frontmatter: {}", e.message()) };
            })?;
            let body = rest.get(end..).unwrap_or_default();
            return Ok((parsed, body, index.saturating_add(2)));
        }
        offset = end;
    }

    return Err(Error::MalformedMarkup {
        line: 1,
        reason: if opened { format!("frontmatter never closed with `{FENCE}`") } else { "missing frontmatter".to_string() },
    });
}

/// Decode a JSON-encoded extra-field object.
///
/// # Errors
///
/// Returns `Error::Json` if the text is not a JSON object.
fn decode_extra(raw: Option<&str>) -> Result<BTreeMap<String, serde_json::Value>, Error> {
    return match raw {
        Some(json) => Ok(serde_json::from_str(json)?),
        None => Ok(BTreeMap::new()),
    };
}

/// Encode extra fields as compact JSON, or `None` when there are none.
///
/// # Errors
///
/// Returns `Error::Json` if encoding fails.
fn encode_extra(extra: &BTreeMap<String, serde_json::Value>) -> Result<Option<String>, Error> {
    if extra.is_empty() {
        return Ok(None);
    }
    return Ok(Some(serde_json::to_string(extra)?));
}

/// One-based line number of byte `offset` in `text`.
fn line_of(text: &str, offset: usize) -> usize {
    let before = text.get(..offset).unwrap_or(text);
    return before.matches('\n').count().saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_splits_header() {
        let mut document = Document { id: "katha".to_string(), title: "कठोपनिषत्".to_string(), ..Document::default() };
        document.structure_levels = StructureLevel::chain(&["Adhyaya", "Valli", "Mantra"]);
        document.extra.insert("variants_available".to_string(), serde_json::json!(null));
        let header = for_document(&document, vec![Script::Devanagari], Vec::new(), "sha256:00".to_string()).unwrap();

        let markup = format!("{}\n# Mantra 1\n", render(&header).unwrap());
        let (parsed, body, body_line) = split(&markup).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(body, "\n# Mantra 1\n");
        assert!(body_line > 3);

        let restored = parsed.to_document().unwrap();
        assert_eq!(restored.structure_levels, document.structure_levels);
        assert_eq!(restored.extra, document.extra);
    }

    #[test]
    fn missing_header_is_malformed() {
        let err = split("# Mantra 1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { line: 1, .. }));
    }

    #[test]
    fn toml_error_reports_the_offending_line() {
        let markup = "\n+++\nvalidation_hash = \"sha256:00\"\ngrantha_id = \"x\" \"y\"\n+++\n";
        let err = split(markup).unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { line: 4, .. }), "{err}");
    }

    #[test]
    fn unclosed_header_is_malformed() {
        let err = split("+++\ngrantha_id = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }
}
