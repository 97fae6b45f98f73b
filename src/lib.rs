//! # protscore
//!
//! Per-protein quality metrics for batches of designed protein sequences,
//! merged into one table.
//!
//! The crate computes the **alignment-based** metrics itself and merges them
//! with metrics produced elsewhere (structure predictors, language models)
//! that arrive as `protein -> value` tables.
//!
//! ## Pipeline
//! 1. [`SequenceStore`]: targets and references, loaded once from FASTA.
//! 2. [`SubstitutionMatrix`]: BLOSUM62 / BLOSUM45 or an NCBI-format file.
//! 3. [`needle`]: global alignment with affine gaps (Gotoh).
//! 4. [`AlignmentMetrics`]: identity to the closest reference and mean
//!    substitution score at mutated positions, per target.
//! 5. [`ResultsTable`]: protein -> metric -> value, exported as CSV/TSV.
//!
//! ### Example
//! ```rust,no_run
//! use protscore::*;
//! let targets = SequenceStore::from_paths(SequenceRole::Target, &["target_seqs/".into()])?;
//! let references = SequenceStore::from_paths(SequenceRole::Reference, &["reference_seqs/".into()])?;
//! let config = AlignmentMetricsConfig::default();
//!
//! let mut table = ResultsTable::new();
//! table.merge_producer(&CsvMetricsProducer::new("plddt.csv", TableFormat::default()))?;
//! table.merge_producer(&AlignmentMetrics::new(&targets, &references, &config)?)?;
//! table.write_csv_path("calculated_metrics.csv".as_ref(), &TableFormat::default())?;
//! # Ok::<(), protscore::ScoringError>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod common;
pub mod config;
pub mod matrix;
pub mod metrics;
pub mod needle;
pub mod results;
pub mod store;

pub use common::{equals_case_insensitive, parse_fasta, FastaRecord, ScoringError};
pub use config::AlignmentMetricsConfig;
pub use matrix::{MatrixPreset, SubstitutionMatrix, NCBI_ALPHABET};
pub use metrics::{
    mutated_positions, AlignmentMetrics, ClosestReference, MutatedPosition, SkippedPair, TargetReport,
    CLOSEST_REFERENCE_METRIC, IDENTITY_METRIC, MUTATION_SCORE_METRIC, NO_MUTATIONS, STATUS_METRIC,
};
pub use needle::{needle, AlignOp, NeedleAlignment, NeedleParams};
pub use results::{
    CsvMetricsProducer, MetricProducer, MetricRecord, MetricValue, ResultsTable, TableExport, TableFormat,
    TEXT_ESCAPE,
};
pub use store::{SequenceRole, SequenceStore};
