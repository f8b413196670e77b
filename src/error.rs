/// Crate-level error types for grantha conversion and validation.
use std::path::PathBuf;

/// All errors in grantha carry enough context to locate the problem without a
/// debugger: the document id, the offending ref, or the markup line.
///
/// Unresolved citations are deliberately absent: they are data
/// (`Resolution::Unresolved`), not failures.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `.grantha.toml` exists but its structure is wrong for the requested edit.
    #[error("config parse failed: {}: {reason}", path.display())]
    ConfigParse {
        /// Config file that failed to parse.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A referenced input file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// Frontmatter is absent or unparseable, a fence is never closed, or a
    /// metadata comment carries invalid JSON.
    #[error("malformed markup at line {line}: {reason}")]
    MalformedMarkup {
        /// One-based line number in the markup file (0 when not line-specific).
        line: usize,
        /// Description of what was expected.
        reason: String,
    },

    /// A part file named in a multi-part manifest could not be loaded.
    #[error("part `{part}` could not be loaded: {reason}")]
    PartLoad {
        /// Part file name as listed in the manifest.
        part: String,
        /// Description of the load failure.
        reason: String,
    },

    /// The reconstructed document hashes differently from the hash stored at
    /// export time.
    #[error("round-trip hash mismatch for `{document}`: expected {expected}, got {actual}")]
    RoundTripHashMismatch {
        /// Recomputed hash of the reconstructed document.
        actual: String,
        /// Document id.
        document: String,
        /// Hash stored in the markup frontmatter.
        expected: String,
        /// Structural diff summary to help locate the loss.
        hint: String,
    },

    /// Heading nesting does not form a valid tree, or a ref has the wrong
    /// number of segments for the document structure.
    #[error("structure inconsistency in `{document}` at `{reference}`: {reason}")]
    StructureInconsistency {
        /// Document id.
        document: String,
        /// Description of the inconsistency.
        reason: String,
        /// Offending ref or heading text.
        reference: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),

    /// An abbreviation edit named a document that has no abbreviations configured.
    #[error("no abbreviations configured for `{document}`")]
    UnknownAbbreviationTarget {
        /// Document id that was not found.
        document: String,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch: {0}")]
    Watch(
        /// The wrapped notify error.
        #[from]
        notify::Error,
    ),
}
