//! CLI for `protscore merge` (combine metric tables).
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use log::info;
use protscore::*;

use crate::alignment_args::table_format;

/// Options for the `merge` subcommand.
#[derive(Debug, Args)]
pub struct MergeCmd {
    /// Metric tables to merge, in order. Later tables overwrite earlier
    /// values for the same protein and metric.
    #[arg(long, value_name="FILES", num_args=1.., required=true)]
    pub inputs: Vec<PathBuf>,
    /// Missing-value marker used when reading and writing.
    #[arg(long, default_value="")]
    pub na_rep: String,
    /// Merged output table (`.tsv` for tab-delimited).
    #[arg(long, default_value="merged_metrics.csv")]
    pub outfile: PathBuf,
}

pub fn run(cmd: MergeCmd) -> Result<()> {
    let inputs: Vec<CsvMetricsProducer> = cmd.inputs.iter()
        .map(|path| CsvMetricsProducer::new(path, table_format(path, &cmd.na_rep)))
        .collect();
    for producer in &inputs {
        producer.check_input().with_context(|| format!("metrics table {}", producer.name()))?;
    }
    let out_format = table_format(&cmd.outfile, &cmd.na_rep);
    out_format.validate()?;

    let mut table = ResultsTable::new();
    for producer in &inputs {
        table.merge_producer(producer).with_context(|| format!("read metrics {}", producer.name()))?;
    }
    if table.overwrites() > 0 {
        log::warn!("{} values were overwritten while merging", table.overwrites());
    }
    table.write_csv_path(&cmd.outfile, &out_format)
        .with_context(|| format!("write {}", cmd.outfile.display()))?;
    info!("wrote {} proteins x {} metrics to {}", table.len(), table.columns().len(), cmd.outfile.display());
    Ok(())
}
