//! CLI subcommand implementation. Use via `protscore score`.
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use protscore::*;

use crate::alignment_args::{table_format, AlignmentArgs};

/// Options for the `score` subcommand.
#[derive(Debug, Args)]
pub struct ScoreCmd {
    /// Target FASTA files or directories of FASTA files.
    #[arg(long, value_name="PATHS", num_args=1.., required=true)]
    pub targets: Vec<PathBuf>,
    /// Reference FASTA files or directories. Without references the
    /// alignment metrics are left out.
    #[arg(long, value_name="PATHS", num_args=1..)]
    pub references: Vec<PathBuf>,
    /// Metric tables from external scorers, merged before the alignment metrics.
    #[arg(long, value_name="FILES", num_args=1..)]
    pub metrics: Vec<PathBuf>,
    #[command(flatten)]
    pub alignment: AlignmentArgs,
    /// Do not compute identity to the closest reference.
    #[arg(long)]
    pub no_identity: bool,
    /// Do not compute the mean substitution score of mutated positions.
    #[arg(long)]
    pub no_mutation_score: bool,
    /// Add a `closest_reference` column with the chosen reference id.
    #[arg(long)]
    pub report_closest: bool,
    /// Missing-value marker for the output table (and metric inputs).
    #[arg(long, default_value="")]
    pub na_rep: String,
    /// Output table (`.tsv` for tab-delimited).
    #[arg(long, default_value="calculated_metrics.csv")]
    pub outfile: PathBuf,
    /// Write the combined, cleaned target sequences here (FASTA).
    #[arg(long, value_name="FILE")]
    pub outseq: Option<PathBuf>,
    /// Write the combined, cleaned reference sequences here (FASTA).
    #[arg(long, value_name="FILE")]
    pub outref: Option<PathBuf>,
}

pub fn run(cmd: ScoreCmd) -> Result<()> {
    // Everything that can be rejected is checked before any scoring.
    let mut config = cmd.alignment.load()?;
    if cmd.no_identity { config.compute_identity = false; }
    if cmd.no_mutation_score { config.compute_mutation_score = false; }
    if cmd.report_closest { config.report_closest_reference = true; }
    let out_format = table_format(&cmd.outfile, &cmd.na_rep);
    out_format.validate()?;
    let external: Vec<CsvMetricsProducer> = cmd.metrics.iter()
        .map(|path| CsvMetricsProducer::new(path, table_format(path, &cmd.na_rep)))
        .collect();
    for producer in &external {
        producer.check_input().with_context(|| format!("metrics table {}", producer.name()))?;
    }

    let targets = SequenceStore::from_paths(SequenceRole::Target, &cmd.targets)
        .context("load target sequences")?;
    let references = if cmd.references.is_empty() {
        SequenceStore::new(SequenceRole::Reference)
    } else {
        SequenceStore::from_paths(SequenceRole::Reference, &cmd.references)
            .context("load reference sequences")?
    };
    if references.is_empty() {
        warn!("no reference sequences given: alignment metrics will be omitted");
    }

    for (store, path) in [(&targets, &cmd.outseq), (&references, &cmd.outref)] {
        if let Some(path) = path {
            let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
            store.write_fasta(BufWriter::new(f))
                .with_context(|| format!("write {} sequences to {}", store.role(), path.display()))?;
        }
    }

    let mut table = ResultsTable::new();
    for producer in &external {
        table.merge_producer(producer).with_context(|| format!("read metrics {}", producer.name()))?;
    }
    for id in table.proteins() {
        if targets.get(id).is_none() {
            warn!("external metrics mention '{id}', which is not a target sequence");
        }
    }

    if config.any_enabled() {
        let metrics = AlignmentMetrics::new(&targets, &references, &config)?;
        table.merge_producer(&metrics)?;
    }

    table.write_csv_path(&cmd.outfile, &out_format)
        .with_context(|| format!("write {}", cmd.outfile.display()))?;
    info!("wrote {} proteins x {} metrics to {}", table.len(), table.columns().len(), cmd.outfile.display());
    if table.overwrites() > 0 {
        warn!("{} metric values were overwritten; check for duplicate protein ids across producers", table.overwrites());
    }
    Ok(())
}
