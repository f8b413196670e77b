//! Markup vocabulary shared by the serializer and the parser: heading forms,
//! content fences, and metadata comments.

use serde::{Deserialize, Serialize};

use crate::types::{Script, ScriptText};

/// Heading prefix of a commentary section.
pub const COMMENTARY_HEADING: &str = "Commentary:";

/// Heading prefix of a concluding passage.
pub const CONCLUDING_HEADING: &str = "Concluding:";

/// Heading prefix of a prefatory passage.
pub const PREFATORY_HEADING: &str = "Prefatory:";

/// Payload of `<!-- commentary: {...} -->`, placed before each commentary heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryMarker {
    /// Commentary the following section belongs to.
    pub commentary_id: String,
}

/// Which content field a fenced block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    /// `english`: commentary English.
    English,
    /// `english_translation`: verse translation.
    EnglishTranslation,
    /// `sanskrit:<script>`.
    Sanskrit(Script),
}

impl FenceKind {
    /// Parse a fence tag such as `sanskrit:roman`.
    ///
    /// # Errors
    ///
    /// Returns a description when the tag names an unknown script or field.
    pub fn parse(tag: &str) -> Result<Self, String> {
        if let Some(script) = tag.strip_prefix("sanskrit:") {
            return Ok(Self::Sanskrit(script.trim().parse()?));
        }
        return match tag {
            "english" => Ok(Self::English),
            "english_translation" => Ok(Self::EnglishTranslation),
            other => Err(format!("unknown content block `{other}`")),
        };
    }

    /// The tag written inside the fence comments.
    pub fn tag(self) -> String {
        return match self {
            Self::English => "english".to_string(),
            Self::EnglishTranslation => "english_translation".to_string(),
            Self::Sanskrit(script) => format!("sanskrit:{script}"),
        };
    }
}

/// A body line, classified without context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty or whitespace-only.
    Blank,
    /// `<!-- commentary: {...} -->` with its JSON payload.
    CommentaryMarker(&'a str),
    /// Any other HTML comment.
    Comment,
    /// `<!-- /tag -->` with its tag.
    FenceClose(&'a str),
    /// `<!-- tag -->` where the tag names a content field.
    FenceOpen(&'a str),
    /// A `#` heading with its depth and text after the markers.
    Heading {
        /// Count of leading `#`.
        depth: usize,
        /// Heading text, trimmed.
        text: &'a str,
    },
    /// `<!-- /note -->`.
    NoteClose,
    /// `<!-- note: {...} -->` with its JSON payload.
    NoteOpen(&'a str),
    /// `<!-- source_part: name -->`.
    SourcePart(&'a str),
    /// Anything else.
    Text,
}

/// Payload of `<!-- note: {...} -->`, opening a commentary prefatory note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMarker {
    /// Note label.
    #[serde(default)]
    pub label: String,
    /// Note type.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub note_type: String,
}

/// Classify one body line outside a content fence.
pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(inner) = trimmed.strip_prefix("<!--").and_then(|s| return s.strip_suffix("-->")) {
        return classify_comment(inner.trim());
    }
    let hashes = trimmed.chars().take_while(|c| return *c == '#').count();
    if hashes > 0 {
        let rest = trimmed.get(hashes..).unwrap_or_default();
        if rest.starts_with(' ') || rest.is_empty() {
            return Line::Heading { depth: hashes, text: rest.trim() };
        }
    }
    return Line::Text;
}

/// Render a label as `(devanagari: "...", roman: "...")` restricted to
/// `scripts`. Empty when no selected script has a label.
pub fn format_label(label: &ScriptText, scripts: &[Script]) -> String {
    let parts: Vec<String> = label
        .iter()
        .filter(|(script, _)| return scripts.contains(script))
        .map(|(script, text)| {
            let quoted = serde_json::to_string(text).unwrap_or_else(|_| return format!("\"{text}\""));
            return format!("{script}: {quoted}");
        })
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    return format!("({})", parts.join(", "));
}

/// Parse the inside of a label produced by [`format_label`], without the
/// surrounding parentheses.
///
/// # Errors
///
/// Returns a description of the first malformed entry.
pub fn parse_label(inner: &str) -> Result<ScriptText, String> {
    let mut label = ScriptText::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let (name, after) = rest.split_once(':').ok_or_else(|| return format!("expected `script: \"text\"` in `{rest}`"))?;
        let script: Script = name.trim().parse()?;
        let after = after.trim_start();
        let mut stream = serde_json::Deserializer::from_str(after).into_iter::<String>();
        let text = match stream.next() {
            Some(Ok(text)) => text,
            _ => return Err(format!("expected a quoted label for {script}")),
        };
        label.insert(script, text);
        rest = after.get(stream.byte_offset()..).unwrap_or_default().trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    return Ok(label);
}

/// Split heading text into its head and the inside of a trailing
/// `(script: "...")` label. The label part is empty when there is none.
pub fn split_label(text: &str) -> (&str, &str) {
    if !text.ends_with(')') {
        return (text, "");
    }
    let Some((head, label)) = text.split_once(" (") else { return (text, "") };
    return (head.trim_end(), label.strip_suffix(')').unwrap_or(label));
}

/// Classify the inside of an HTML comment.
fn classify_comment(inner: &str) -> Line<'_> {
    if let Some(payload) = inner.strip_prefix("commentary:") {
        return Line::CommentaryMarker(payload.trim());
    }
    if let Some(payload) = inner.strip_prefix("note:") {
        return Line::NoteOpen(payload.trim());
    }
    if inner == "/note" {
        return Line::NoteClose;
    }
    if let Some(part) = inner.strip_prefix("source_part:") {
        return Line::SourcePart(part.trim());
    }
    if let Some(tag) = inner.strip_prefix('/') {
        return Line::FenceClose(tag.trim());
    }
    if FenceKind::parse(inner).is_ok() || inner.starts_with("sanskrit:") {
        return Line::FenceOpen(inner);
    }
    return Line::Comment;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_body_lines() {
        assert_eq!(classify("### Mantra 3.1.1"), Line::Heading { depth: 3, text: "Mantra 3.1.1" });
        assert_eq!(classify("<!-- sanskrit:roman -->"), Line::FenceOpen("sanskrit:roman"));
        assert_eq!(classify("  <!-- /english -->"), Line::FenceClose("english"));
        assert_eq!(classify("<!-- note: {\"label\":\"x\"} -->"), Line::NoteOpen("{\"label\":\"x\"}"));
        assert_eq!(classify("<!-- editor: check this -->"), Line::Comment);
        assert_eq!(classify("#hashtag"), Line::Text);
    }

    #[test]
    fn labels_survive_quotes_and_commas() {
        let mut label = ScriptText::new();
        label.insert(Script::Devanagari, "शान्तिपाठः".to_string());
        label.insert(Script::Roman, "śānti, \"pāṭhaḥ\"".to_string());
        let rendered = format_label(&label, &Script::ALL);
        let inner = rendered.strip_prefix('(').and_then(|s| return s.strip_suffix(')')).unwrap();
        assert_eq!(parse_label(inner).unwrap(), label);
    }

    #[test]
    fn label_is_restricted_to_selected_scripts() {
        let mut label = ScriptText::new();
        label.insert(Script::Roman, "śānti".to_string());
        assert_eq!(format_label(&label, &[Script::Devanagari]), "");
    }

    #[test]
    fn splits_trailing_label_from_heading() {
        assert_eq!(split_label("Mantra 3.1.1 (devanagari: \"प्रथमः (१)\")"), ("Mantra 3.1.1", "devanagari: \"प्रथमः (१)\""));
        assert_eq!(split_label("Mantra 3.1.1"), ("Mantra 3.1.1", ""));
        assert_eq!(split_label("0.1 (roman: \"śānti\")"), ("0.1", "roman: \"śānti\""));
    }
}
