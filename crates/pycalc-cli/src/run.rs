//! Run command implementation for pycalc CLI.
//!
//! Evaluates a whole file as one selection, delivering output as it arrives.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use pycalc_core::{SessionBackend, SessionManager, StallAction, Utf8Codec, commands};
use tokio::time::MissedTickBehavior;

use crate::colors;
use crate::settings::Settings;
use crate::terminal::{AutoTerminate, TerminalEditor, ToastNotifier};

/// Evaluate `path` and wait for everything it prints.
pub async fn execute(path: &Path, settings: Settings, backend: Arc<dyn SessionBackend>) -> anyhow::Result<()> {
    let start = Instant::now();
    let source = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;

    let tick_interval = settings.config.tick_interval();
    let mut toasts = ToastNotifier::new(settings.config.notification);
    let mut editor = TerminalEditor::new();
    let mut prompt = AutoTerminate;

    if source.trim().is_empty() {
        eprintln!("{}{} is empty.{}", colors::YELLOW, path.display(), colors::RESET);
        return Ok(());
    }

    let mut session = SessionManager::new(backend, settings.config);
    session.start()?;

    // A trailing terminator keeps the selection from inserting one on stdout.
    let mut source = source;
    if !source.ends_with('\n') {
        source.push('\n');
    }
    editor.select(&source);
    commands::evaluate_selection(&mut editor, &Utf8Codec, &session)?;

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let report = session.tick(&mut editor, &Utf8Codec, &mut toasts, &mut prompt);

        if report.fault.is_some() {
            anyhow::bail!("{} was not evaluated", path.display());
        }
        if let StallAction::Restart { elapsed } = report.stall {
            anyhow::bail!("{} still running after {:.1}s; terminated", path.display(), elapsed.as_secs_f64());
        }
        if session.is_idle() {
            break;
        }
    }
    session.shutdown();

    if toasts.shown() > 0 {
        anyhow::bail!("{} raised an error", path.display());
    }

    tracing::info!(elapsed = ?start.elapsed(), "Run complete");
    eprintln!(
        "{}Completed{} {} in {:.2}s",
        colors::GREEN,
        colors::RESET,
        path.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
