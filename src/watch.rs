//! File watcher: runs `check` on startup, then re-runs when documents change.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands;
use crate::diagnostics;
use crate::error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Create a filesystem watcher that signals document changes on the given
/// channel. Only markup, JSON, and config files count.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<()>) -> Result<notify::RecommendedWatcher, error::Error> {
    let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
            && event.paths.iter().any(|p| return is_relevant(p))
        {
            let _ = tx.send(());
        }
    })?;
    return Ok(watcher);
}

/// True for files whose change can alter a check result.
fn is_relevant(path: &Path) -> bool {
    return path.extension().is_some_and(|ext| return ext == "md" || ext == "json" || ext == "toml");
}

/// Entry point for the watch command.
///
/// Runs an initial check, then watches `path` recursively and re-checks on
/// changes. Returns the exit code of the last check when the watcher stops.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be set up.
pub fn run(path: &Path) -> Result<ExitCode, error::Error> {
    let target = if path.as_os_str().is_empty() { PathBuf::from(".") } else { path.to_path_buf() };

    eprintln!("watch: initial check");
    let mut last_code = run_check(&target);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    watcher.watch(&target, RecursiveMode::Recursive)?;

    eprintln!("watch: monitoring {}, press Ctrl+C to stop", target.display());
    tracing::info!(path = %target.display(), "watching");

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(&target);
    }

    return Ok(last_code);
}

/// Run check once and print the result. Returns the exit code from check.
fn run_check(path: &Path) -> ExitCode {
    return match commands::check(path) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_document_files_trigger_a_recheck() {
        assert!(is_relevant(Path::new("library/isavasya.md")));
        assert!(is_relevant(Path::new("library/katha/part1.json")));
        assert!(is_relevant(Path::new(".grantha.toml")));
        assert!(!is_relevant(Path::new("library/.isavasya.md.swp")));
        assert!(!is_relevant(Path::new("target/debug/grantha")));
    }
}
