//! Command-line interface for the `protscore` crate.
//!
//! Subcommands are implemented in separate files (modules) under `src/bin/protscore/`:
//! - `score_cmd.rs`
//! - `align_cmd.rs`
//! - `merge_cmd.rs`
//!
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name="protscore", version=env!("CARGO_PKG_VERSION"), about="Alignment-based protein metrics and metric table merging", disable_help_subcommand=true)]
struct Cli {
    /// More log output (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action=clap::ArgAction::Count, global=true)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global=true, conflicts_with="verbose")]
    quiet: bool,
    /// Worker threads for alignments (0 = all cores).
    #[arg(long, default_value_t=0, global=true)]
    threads: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score targets against references and merge external metric tables.
    Score(score_cmd::ScoreCmd),
    /// Global alignment of two sequences with a human-readable report.
    Align(align_cmd::AlignCmd),
    /// Merge several metric tables into one.
    Merge(merge_cmd::MergeCmd),
}

#[path = "protscore/alignment_args.rs"] mod alignment_args;
#[path = "protscore/score_cmd.rs"] mod score_cmd;
#[path = "protscore/align_cmd.rs"] mod align_cmd;
#[path = "protscore/merge_cmd.rs"] mod merge_cmd;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to build thread pool")?;
    }

    match cli.command {
        Command::Score(cmd) => score_cmd::run(cmd),
        Command::Align(cmd) => align_cmd::run(cmd),
        Command::Merge(cmd) => merge_cmd::run(cmd),
    }
}
