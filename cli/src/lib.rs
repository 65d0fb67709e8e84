//! `resumebot`: ask questions about a resume from the terminal.

pub mod error;

use std::io;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use resumebot_core::Answer;
use resumebot_core::BlockingOrchestrator;
use resumebot_core::IngestReport;
use resumebot_core::RagConfig;
use resumebot_core::RetrievalOrchestrator;
use resumebot_persistence::CompressionLevel;
use resumebot_persistence::IndexSnapshot;
use resumebot_persistence::SnapshotStore;
use resumebot_persistence::index_fingerprint;
use tracing::info;
use tracing::warn;

pub use error::CliError;
pub use error::Result;
pub use error::exit_code;

#[derive(Parser, Debug)]
#[command(name = "resumebot", version, about = "Answer questions about a resume")]
pub struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML settings file; environment variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Resume to index instead of RESUME_PATH
    #[arg(short, long, global = true)]
    pub document: Option<PathBuf>,

    /// Reuse and refresh a saved index at this path
    #[arg(short, long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Snapshot compression: fast, balanced, maximum, or a zstd level 1-22
    #[arg(long, global = true, default_value = "balanced")]
    pub snapshot_level: CompressionLevel,

    /// Print answers as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the chunks each answer was generated from
    #[arg(long, global = true)]
    pub sources: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer a single question and exit
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Read questions from stdin, one per line (the default)
    Repl,
    /// Build the index, write the snapshot if one is configured, and exit
    Index,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFormat {
    pub json: bool,
    pub sources: bool,
}

impl Cli {
    pub const fn output_format(&self) -> OutputFormat {
        OutputFormat {
            json: self.json,
            sources: self.sources,
        }
    }

    /// Lowest level shown when `RUST_LOG` is unset.
    pub const fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        RagConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(document) = &cli.document {
        config.resume_path = document.clone();
    }
    let document = read_document(&config.resume_path)?;

    let orchestrator = Arc::new(
        RetrievalOrchestrator::from_config(config).context("failed to build orchestrator")?,
    );
    let blocking = BlockingOrchestrator::new(orchestrator).context("failed to start runtime")?;
    let snapshot = cli
        .snapshot
        .as_ref()
        .map(|path| SnapshotStore::with_level(path, cli.snapshot_level));
    let report = prepare_index(&blocking, &document, snapshot.as_ref())
        .context("failed to index document")?;

    let format = cli.output_format();
    let stdout = io::stdout();
    match cli.command.unwrap_or(Command::Repl) {
        Command::Ask { question } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                return Err(CliError::EmptyQuestion.into());
            }
            let answer = blocking.ask(&question).context("failed to answer")?;
            print_answer(&mut stdout.lock(), &answer, format)?;
        }
        Command::Repl => repl(&blocking, io::stdin().lock(), stdout.lock(), format)?,
        Command::Index => {
            let mut out = stdout.lock();
            writeln!(
                out,
                "indexed {} chunks ({} dimensions{})",
                report.chunks,
                report.dimensions,
                if report.restored { ", from snapshot" } else { "" }
            )?;
        }
    }
    Ok(())
}

pub fn read_document(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::DocumentUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(CliError::EmptyDocument(path.to_path_buf()));
    }
    Ok(text)
}

/// Restore the index from `snapshot` when it was built from this exact
/// document and settings; otherwise embed the document and save a fresh
/// snapshot. An unreadable or unwritable snapshot only costs a re-embed.
pub fn prepare_index(
    orchestrator: &BlockingOrchestrator,
    document: &str,
    snapshot: Option<&SnapshotStore>,
) -> Result<IngestReport> {
    let Some(store) = snapshot else {
        return Ok(orchestrator.ingest(document)?);
    };

    let fingerprint = index_fingerprint(orchestrator.orchestrator().config(), document);
    match store.load_matching(&fingerprint) {
        Ok(Some(saved)) => {
            info!(path = %store.path().display(), "restoring index from snapshot");
            return Ok(orchestrator.ingest_prepared(saved.entries)?);
        }
        Ok(None) => {}
        Err(err) => warn!(path = %store.path().display(), "ignoring unreadable snapshot: {err}"),
    }

    let report = orchestrator.ingest(document)?;
    let entries = orchestrator.orchestrator().snapshot_entries()?;
    if let Err(err) = store.save(&IndexSnapshot::new(fingerprint, entries)) {
        warn!(path = %store.path().display(), "failed to save snapshot: {err}");
    }
    Ok(report)
}

pub fn print_answer<W: Write>(
    out: &mut W,
    answer: &Answer,
    format: OutputFormat,
) -> io::Result<()> {
    if format.json {
        serde_json::to_writer_pretty(&mut *out, answer)?;
        return writeln!(out);
    }
    writeln!(out, "{}", answer.text.trim_end())?;
    if format.sources {
        if answer.from_cache {
            writeln!(out, "  (cached answer)")?;
        }
        for source in &answer.sources {
            writeln!(out, "  [chunk {} | score {:.3}]", source.id, source.score)?;
        }
    }
    Ok(())
}

/// Answer each non-empty line of `input` until EOF or `exit`/`quit`.
/// A failed question is reported and the loop continues.
pub fn repl<R: BufRead, W: Write>(
    orchestrator: &BlockingOrchestrator,
    input: R,
    mut output: W,
    format: OutputFormat,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        match orchestrator.ask(question) {
            Ok(answer) => print_answer(&mut output, &answer, format)?,
            Err(err) => writeln!(output, "error [{}]: {err}", err.error_code().as_str())?,
        }
        output.flush()?;
    }
    Ok(())
}
