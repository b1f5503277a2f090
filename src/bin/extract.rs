//! Thin demo CLI over `ci_extract`. Not part of the library's public
//! contract — a convenience for running the engine against a captured log
//! file from a terminal.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ci_extract::{ComprehensiveErrorGroup, Extractor};

/// Extract structured errors from a CI log.
#[derive(Parser)]
#[command(name = "ci-extract")]
#[command(about = "Parse CI tool output into structured diagnostics")]
#[command(version)]
struct Cli {
    /// Log file to read; defaults to stdin.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Base path for relativizing file paths in the grouped view.
    #[arg(long)]
    base_path: Option<PathBuf>,

    /// Lines of source context to attach around each error (0 disables snippets).
    #[arg(long, default_value = "0")]
    context_lines: i64,

    /// Emit the full `ComprehensiveErrorGroup` as JSON instead of one line per error.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let mut extractor = Extractor::new();
    let mut errors = extractor.extract(&input);
    ci_extract::apply_severity(&mut errors);

    if cli.context_lines > 0 {
        let base = cli.base_path.clone().unwrap_or_else(|| PathBuf::from("."));
        ci_extract::extract_snippets_for_errors(&mut errors, &base, cli.context_lines);
    }

    if cli.json {
        let group = ComprehensiveErrorGroup::build(&errors, cli.base_path.as_deref());
        println!("{}", serde_json::to_string_pretty(&group.for_orchestrator())?);
    } else {
        for err in &errors {
            println!(
                "{}:{}:{}: {} [{}/{}] {}",
                if err.file.is_empty() { "<no-file>" } else { &err.file },
                err.line,
                err.column,
                err.severity.as_str(),
                err.category.as_str(),
                err.source,
                err.message,
            );
        }
    }

    Ok(())
}
