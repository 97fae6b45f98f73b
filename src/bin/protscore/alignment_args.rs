//! Options shared by the subcommands that align sequences.
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::Args;
use protscore::*;

/// Alignment options. Anything given here overrides `--config`.
#[derive(Debug, Args)]
pub struct AlignmentArgs {
    /// JSON configuration file (see `AlignmentMetricsConfig`).
    #[arg(long, value_name="FILE")]
    pub config: Option<PathBuf>,
    /// Substitution matrix preset: BLOSUM62 or BLOSUM45.
    #[arg(long, value_name="NAME")]
    pub matrix: Option<String>,
    /// NCBI-format substitution matrix file (overrides --matrix).
    #[arg(long, value_name="FILE")]
    pub matrix_file: Option<PathBuf>,
    /// Gap open penalty (default 10).
    #[arg(long, allow_negative_numbers=true)]
    pub gap_open: Option<i32>,
    /// Gap extension penalty (default 2).
    #[arg(long, allow_negative_numbers=true)]
    pub gap_extend: Option<i32>,
}

impl AlignmentArgs {
    /// Configuration file (or defaults) with command-line overrides, validated.
    pub fn load(&self) -> Result<AlignmentMetricsConfig> {
        let mut config = match &self.config {
            Some(path) => AlignmentMetricsConfig::from_json_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => AlignmentMetricsConfig::default(),
        };
        if let Some(name) = &self.matrix {
            config.substitution_matrix = name.parse()?;
        }
        if let Some(path) = &self.matrix_file {
            config.matrix_file = Some(path.clone());
        }
        if let Some(v) = self.gap_open { config.gap_open = v; }
        if let Some(v) = self.gap_extend { config.gap_extend = v; }
        config.validate()?;
        Ok(config)
    }
}

/// Tab-delimited for `.tsv`/`.tab` paths, comma otherwise.
pub fn table_format(path: &Path, missing: &str) -> TableFormat {
    let tsv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("tsv") || e.eq_ignore_ascii_case("tab"))
        .unwrap_or(false);
    let base = if tsv { TableFormat::tsv() } else { TableFormat::default() };
    TableFormat { missing: missing.to_string(), ..base }
}
