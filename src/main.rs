use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use grantha::classifier::{BoldMarkerClassifier, ExplicitMarkerClassifier, NoteClassifier};
use grantha::export::CommentarySelection;
use grantha::types::Script;
use grantha::{abbrev, commands, diagnostics, error, watch};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "GRANTHA_LOG";

/// Top-level arguments.
#[derive(Parser)]
#[command(name = "grantha", about = "Lossless grantha JSON <-> markdown conversion and citation resolution")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Abbreviation override subcommands.
#[derive(Subcommand)]
enum AbbrevCommand {
    /// Add a local abbreviation for a document
    Add {
        /// Abbreviation as it appears in citations
        #[arg(index = 2)]
        abbreviation: String,
        /// Canonical document id
        #[arg(index = 1)]
        document: String,
    },
    /// List local abbreviation overrides
    List,
    /// Remove one abbreviation, or all of a document's abbreviations
    Remove {
        /// Abbreviation to remove; omit to remove every one
        #[arg(index = 2)]
        abbreviation: Option<String>,
        /// Canonical document id
        #[arg(index = 1)]
        document: String,
    },
}

/// Commentary note classifier selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassifierKind {
    /// A wholly bold first line opens a note
    Bold,
    /// `<!-- note: label -->` opens a note
    Explicit,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Manage local abbreviation overrides in .grantha.toml
    Abbrev {
        /// Abbreviation action.
        #[command(subcommand)]
        action: AbbrevCommand,
    },
    /// Merge a multi-part document directory into one JSON file
    Assemble {
        /// Directory containing metadata.json and part files
        dir: PathBuf,
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate every document under a path
    Check {
        /// File or directory to check
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Convert a JSON document to markdown
    Json2md {
        /// Export every commentary (default)
        #[arg(long, conflicts_with_all = ["commentaries", "no_commentaries"])]
        all_commentaries: bool,
        /// Export only these commentary ids
        #[arg(long, value_delimiter = ',')]
        commentaries: Vec<String>,
        /// JSON file or multi-part directory
        #[arg(short, long)]
        input: PathBuf,
        /// Export no commentaries
        #[arg(long, conflicts_with = "commentaries")]
        no_commentaries: bool,
        /// Output markdown file
        #[arg(short, long)]
        output: PathBuf,
        /// Comma-separated scripts: devanagari, kannada, roman
        #[arg(long, value_delimiter = ',')]
        scripts: Vec<Script>,
        /// Parse the markup back and validate it before writing
        #[arg(long)]
        verify: bool,
    },
    /// Convert markdown back to JSON, validating the round trip
    Md2json {
        /// Input markdown file
        #[arg(short, long)]
        input: PathBuf,
        /// Source JSON, used to locate differences on failure
        #[arg(long)]
        original: Option<PathBuf>,
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the citations in a document and how they resolve
    Resolve {
        /// Abbreviation map JSON (overrides the configured one)
        #[arg(long)]
        abbreviations: Option<PathBuf>,
        /// JSON document, multi-part directory, or plain text file
        file: PathBuf,
        /// Library root (overrides the configured one)
        #[arg(long)]
        library: Option<PathBuf>,
    },
    /// Split raw commentary text into prefatory notes and body
    SplitCommentary {
        /// How notes are recognized
        #[arg(long, value_enum, default_value = "explicit")]
        classifier: ClassifierKind,
        /// Input JSON document
        #[arg(short, long)]
        input: PathBuf,
        /// Output JSON document
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Check that a JSON document still matches exported markdown
    Verify {
        /// JSON document
        #[arg(short, long)]
        json: PathBuf,
        /// Markdown exported from it
        #[arg(short, long)]
        markup: PathBuf,
    },
    /// Run check, then re-run it whenever documents change
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Report a command failure and map it to the failure exit code.
fn fail(e: &error::Error) -> ExitCode {
    diagnostics::print_error(e);
    return ExitCode::FAILURE;
}

/// Install the stderr tracing subscriber. `GRANTHA_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "grantha=warn",
        1 => "grantha=info",
        _ => "grantha=debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_err| return EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Abbrev { action } => run_abbrev(&action).map(|()| return ExitCode::SUCCESS),
        Commands::Assemble { dir, output } => commands::assemble(&dir, &output).map(|()| return ExitCode::SUCCESS),
        Commands::Check { path } => commands::check(&path),
        Commands::Json2md { all_commentaries: _, commentaries, input, no_commentaries, output, scripts, verify } => {
            commands::json2md(&input, &output, &scripts, selection(commentaries, no_commentaries), verify)
                .map(|()| return ExitCode::SUCCESS)
        },
        Commands::Md2json { input, original, output } => {
            commands::md2json(&input, &output, original.as_deref()).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Resolve { abbreviations, file, library } => {
            commands::resolve(&file, abbreviations.as_deref(), library.as_deref())
        },
        Commands::SplitCommentary { classifier, input, output } => {
            let classifier: &dyn NoteClassifier = match classifier {
                ClassifierKind::Bold => &BoldMarkerClassifier,
                ClassifierKind::Explicit => &ExplicitMarkerClassifier,
            };
            commands::split_commentary(&input, &output, classifier).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Verify { json, markup } => commands::verify(&json, &markup),
        Commands::Watch { path } => watch::run(&path),
    };

    return result.unwrap_or_else(|e| return fail(&e));
}

/// Dispatch an `abbrev` subcommand against the working root.
///
/// # Errors
///
/// Returns errors from config reading or writing.
fn run_abbrev(action: &AbbrevCommand) -> Result<(), error::Error> {
    let root = Path::new(".");
    return match action {
        AbbrevCommand::Add { abbreviation, document } => abbrev::cmd_add(root, document, abbreviation),
        AbbrevCommand::List => abbrev::cmd_list(root),
        AbbrevCommand::Remove { abbreviation, document } => abbrev::cmd_remove(root, document, abbreviation.as_deref()),
    };
}

/// Commentary selection from the export flags. No flag selects all.
fn selection(commentaries: Vec<String>, none: bool) -> CommentarySelection {
    if none {
        return CommentarySelection::None;
    }
    if commentaries.is_empty() {
        return CommentarySelection::All;
    }
    return CommentarySelection::Only(commentaries.into_iter().collect::<BTreeSet<_>>());
}
