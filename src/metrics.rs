//! Alignment-based metrics: identity to the closest reference and the mean
//! substitution score of mutated positions.
//!
//! For every target the deriver runs a global alignment ([`needle`]) against
//! every reference and then:
//!
//! 1. **identity_to_closest_reference**: identical pair columns divided by
//!    the target length, maximised over references. Ties go to the
//!    lexically smallest reference id.
//! 2. **substitution_score_mean_mutated**: over the alignment with that
//!    closest reference, the mean matrix score of pair columns whose
//!    residues differ (gap columns never count). A target identical to its
//!    closest reference has no mutated positions and gets the text value
//!    [`NO_MUTATIONS`] instead of a number.
//!
//! With an empty reference set neither metric is recorded for any target.
//!
//! A pair that cannot be aligned (unknown residue, empty sequence) is
//! skipped. The target then gets an `alignment_status` cell describing the
//! skipped pairs, and its metrics are computed from the remaining references.
//!
//! Targets are processed on the rayon pool; workers only return values, and
//! the table is written from the calling thread in target order.
//!
//! ### Example
//! ```rust,no_run
//! use protscore::*;
//! let targets = SequenceStore::from_paths(SequenceRole::Target, &["targets.fasta".into()]).unwrap();
//! let refs = SequenceStore::from_paths(SequenceRole::Reference, &["refs.fasta".into()]).unwrap();
//! let metrics = AlignmentMetrics::new(&targets, &refs, &AlignmentMetricsConfig::default()).unwrap();
//! let mut table = ResultsTable::new();
//! table.merge_producer(&metrics).unwrap();
//! ```
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::common::{equals_case_insensitive, FastaRecord, ScoringError};
use crate::config::AlignmentMetricsConfig;
use crate::needle::{needle, NeedleAlignment, NeedleParams};
use crate::results::{MetricProducer, MetricRecord, MetricValue};
use crate::store::SequenceStore;

pub const IDENTITY_METRIC: &str = "identity_to_closest_reference";
pub const MUTATION_SCORE_METRIC: &str = "substitution_score_mean_mutated";
pub const CLOSEST_REFERENCE_METRIC: &str = "closest_reference";
pub const STATUS_METRIC: &str = "alignment_status";

/// Value of [`MUTATION_SCORE_METRIC`] when the target has no mutated positions.
pub const NO_MUTATIONS: &str = "no_mutations";

/// A pair column whose residues differ.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutatedPosition {
    /// 0-based position in the target.
    pub target_pos: usize,
    /// 0-based position in the reference.
    pub reference_pos: usize,
    pub target_residue: char,
    pub reference_residue: char,
    /// Substitution matrix score of the pair.
    pub score: i32,
}

/// The reference a target is closest to, and what differs.
#[derive(Clone, Debug)]
pub struct ClosestReference {
    pub reference_id: String,
    /// Identical pair columns.
    pub identities: usize,
    /// `identities / target length`.
    pub identity: f64,
    pub alignment_score: i64,
    pub mutated: Vec<MutatedPosition>,
}

impl ClosestReference {
    /// Mean score over mutated positions; `None` when there are none.
    pub fn mean_mutated_score(&self) -> Option<f64> {
        if self.mutated.is_empty() {
            return None;
        }
        let total: i64 = self.mutated.iter().map(|m| m.score as i64).sum();
        Some(total as f64 / self.mutated.len() as f64)
    }
}

/// A (target, reference) pair that could not be aligned.
#[derive(Debug)]
pub struct SkippedPair {
    pub reference_id: String,
    pub error: ScoringError,
}

/// Everything derived for one target.
#[derive(Debug)]
pub struct TargetReport {
    pub target_id: String,
    /// `None` when there are no references or every pair was skipped.
    pub closest: Option<ClosestReference>,
    pub skipped: Vec<SkippedPair>,
    /// References the target was compared against.
    pub references_total: usize,
}

impl TargetReport {
    /// Text for the `alignment_status` cell, if any pair was skipped.
    pub fn status(&self) -> Option<String> {
        if self.skipped.is_empty() {
            return None;
        }
        let details = self
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.reference_id, s.error))
            .collect::<Vec<_>>()
            .join("; ");
        Some(format!(
            "skipped {} of {} references ({details})",
            self.skipped.len(),
            self.references_total
        ))
    }
}

/// Mutated positions of an alignment of `target` (A) against `reference` (B).
pub fn mutated_positions(
    target: &str,
    reference: &str,
    aln: &NeedleAlignment,
    params: &NeedleParams,
) -> Result<Vec<MutatedPosition>, ScoringError> {
    let (t, r) = (target.as_bytes(), reference.as_bytes());
    let mut out = Vec::new();
    for (i, j) in aln.aligned_pairs() {
        let (x, y) = (t[i] as char, r[j] as char);
        if equals_case_insensitive(x, y) {
            continue;
        }
        out.push(MutatedPosition {
            target_pos: i,
            reference_pos: j,
            target_residue: x,
            reference_residue: y,
            score: params.matrix.score(t[i], r[j])?,
        });
    }
    Ok(out)
}

/// Producer for the alignment-based metrics of a target set against a
/// reference set.
pub struct AlignmentMetrics<'a> {
    targets: &'a SequenceStore,
    references: &'a SequenceStore,
    params: NeedleParams,
    compute_identity: bool,
    compute_mutation_score: bool,
    report_closest_reference: bool,
}

impl<'a> AlignmentMetrics<'a> {
    /// Validate `config` and load its matrix.
    pub fn new(
        targets: &'a SequenceStore,
        references: &'a SequenceStore,
        config: &AlignmentMetricsConfig,
    ) -> Result<Self, ScoringError> {
        Ok(Self {
            targets,
            references,
            params: config.needle_params()?,
            compute_identity: config.compute_identity,
            compute_mutation_score: config.compute_mutation_score,
            report_closest_reference: config.report_closest_reference,
        })
    }

    /// Both standard metrics enabled, explicit aligner parameters.
    pub fn with_params(
        targets: &'a SequenceStore,
        references: &'a SequenceStore,
        params: NeedleParams,
    ) -> Result<Self, ScoringError> {
        params.validate()?;
        Ok(Self {
            targets,
            references,
            params,
            compute_identity: true,
            compute_mutation_score: true,
            report_closest_reference: false,
        })
    }

    pub fn params(&self) -> &NeedleParams {
        &self.params
    }

    fn enabled(&self) -> bool {
        self.compute_identity || self.compute_mutation_score || self.report_closest_reference
    }

    /// Align one target against every reference and pick the closest one.
    ///
    /// Pair-local failures are collected in [`TargetReport::skipped`]; any
    /// other error aborts.
    pub fn analyze_target(&self, target: &FastaRecord) -> Result<TargetReport, ScoringError> {
        let mut best: Option<(ClosestReference, NeedleAlignment, &FastaRecord)> = None;
        let mut skipped = Vec::new();

        for reference in self.references.iter() {
            let aln = match needle(&target.seq, &reference.seq, &self.params) {
                Ok(aln) => aln,
                Err(e) if e.is_pair_local() => {
                    warn!("skipping {} vs {}: {e}", target.id, reference.id);
                    skipped.push(SkippedPair { reference_id: reference.id.clone(), error: e });
                    continue;
                }
                Err(e) => return Err(e),
            };
            let better = match &best {
                None => true,
                // Same denominator for every reference, so compare counts.
                Some((cur, _, _)) => {
                    aln.identities > cur.identities
                        || (aln.identities == cur.identities && reference.id < cur.reference_id)
                }
            };
            if better {
                let closest = ClosestReference {
                    reference_id: reference.id.clone(),
                    identities: aln.identities,
                    identity: aln.identities as f64 / target.seq.len() as f64,
                    alignment_score: aln.score,
                    mutated: Vec::new(),
                };
                best = Some((closest, aln, reference));
            }
        }

        let closest = match best {
            Some((mut closest, aln, reference)) => {
                closest.mutated = mutated_positions(&target.seq, &reference.seq, &aln, &self.params)?;
                debug!(
                    "{}: closest {} identity {:.4} ({} mutated)",
                    target.id, closest.reference_id, closest.identity, closest.mutated.len()
                );
                Some(closest)
            }
            None => None,
        };

        Ok(TargetReport {
            target_id: target.id.clone(),
            closest,
            skipped,
            references_total: self.references.len(),
        })
    }

    /// Reports for all targets, in target order.
    pub fn analyze(&self) -> Result<Vec<TargetReport>, ScoringError> {
        if self.references.is_empty() || !self.enabled() {
            return Ok(Vec::new());
        }
        info!(
            "aligning {} targets against {} references ({}, gap open {}, extend {})",
            self.targets.len(),
            self.references.len(),
            self.params.matrix.name(),
            self.params.gap_open,
            self.params.gap_extend
        );
        self.targets
            .records()
            .par_iter()
            .map(|t| self.analyze_target(t))
            .collect()
    }

    /// Turn reports into table triples according to the enabled metrics.
    pub fn to_records(&self, reports: &[TargetReport]) -> Vec<MetricRecord> {
        let mut out = Vec::new();
        for report in reports {
            if let Some(closest) = &report.closest {
                if self.compute_identity {
                    out.push(MetricRecord::new(&report.target_id, IDENTITY_METRIC, closest.identity));
                }
                if self.compute_mutation_score {
                    let value = match closest.mean_mutated_score() {
                        Some(mean) => MetricValue::Float(mean),
                        None => MetricValue::Text(NO_MUTATIONS.to_string()),
                    };
                    out.push(MetricRecord::new(&report.target_id, MUTATION_SCORE_METRIC, value));
                }
                if self.report_closest_reference {
                    out.push(MetricRecord::new(
                        &report.target_id,
                        CLOSEST_REFERENCE_METRIC,
                        closest.reference_id.as_str(),
                    ));
                }
            }
            if let Some(status) = report.status() {
                out.push(MetricRecord::new(&report.target_id, STATUS_METRIC, status));
            }
        }
        out
    }
}

impl MetricProducer for AlignmentMetrics<'_> {
    fn name(&self) -> &str {
        "alignment metrics"
    }

    fn produce(&self) -> Result<Vec<MetricRecord>, ScoringError> {
        if self.references.is_empty() {
            info!("no reference sequences: alignment metrics are not recorded");
        }
        let reports = self.analyze()?;
        Ok(self.to_records(&reports))
    }
}
