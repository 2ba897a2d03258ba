//! pycalc CLI - evaluate Python snippets from a terminal buffer.

mod colors;
mod enabled;
mod repl;
mod run;
mod settings;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use pycalc_core::{PythonBackend, ScriptedBackend, SessionBackend};

#[derive(Parser)]
#[command(name = "pycalc")]
#[command(about = "Evaluate Python snippets in a persistent session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the stall threshold, in seconds
    #[arg(long, global = true)]
    stall_timeout: Option<u64>,

    /// Interpreter backing the session
    #[arg(long, global = true, value_enum, default_value_t = Backend::Python)]
    backend: Backend,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate lines typed on standard input
    Repl,

    /// Evaluate a file as one selection
    Run {
        /// Path to the Python source
        file: PathBuf,
    },

    /// Show or set line-triggered evaluation
    Enabled {
        /// New state; prints the current one when omitted
        #[arg(value_enum)]
        state: Option<Switch>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Embedded CPython
    Python,
    /// Deterministic mini-language, no Python needed
    Scripted,
}

impl Backend {
    fn build(self) -> Arc<dyn SessionBackend> {
        match self {
            Self::Python => Arc::new(PythonBackend::new()),
            Self::Scripted => Arc::new(ScriptedBackend::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format pycalc-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<pycalc_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    let settings = settings::Settings::load(cli.config.as_deref(), cli.stall_timeout)
        .map_err(|e| format_error(e.into()))?;

    match cli.command {
        Commands::Repl => {
            repl::execute(settings, cli.backend.build()).await.map_err(format_error)?;
        }

        Commands::Run { file } => {
            run::execute(&file, settings, cli.backend.build()).await.map_err(format_error)?;
        }

        Commands::Enabled { state } => {
            enabled::execute(&settings, state.map(|s| s == Switch::On)).map_err(format_error)?;
        }
    }

    Ok(())
}
