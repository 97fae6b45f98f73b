//! Configuration for the alignment-based metrics.
//!
//! The configuration is a fixed, validated structure. It can be read from a
//! JSON file:
//!
//! ```json
//! {
//!   "substitution_matrix": "BLOSUM62",
//!   "gap_open": 10,
//!   "gap_extend": 2,
//!   "compute_identity": true,
//!   "compute_mutation_score": true
//! }
//! ```
//!
//! Omitted fields take their defaults; unknown fields, unknown matrix names
//! and negative penalties are rejected when the file is loaded, before any
//! sequence is read.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::ScoringError;
use crate::matrix::{MatrixPreset, SubstitutionMatrix};
use crate::needle::NeedleParams;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignmentMetricsConfig {
    /// Compiled-in matrix, used unless `matrix_file` is set.
    pub substitution_matrix: MatrixPreset,
    /// NCBI-layout matrix file overriding `substitution_matrix`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_file: Option<PathBuf>,
    pub gap_open: i32,
    pub gap_extend: i32,
    /// Record `identity_to_closest_reference`.
    pub compute_identity: bool,
    /// Record `substitution_score_mean_mutated`.
    pub compute_mutation_score: bool,
    /// Also record the id of the closest reference as `closest_reference`.
    pub report_closest_reference: bool,
}

impl Default for AlignmentMetricsConfig {
    fn default() -> Self {
        Self {
            substitution_matrix: MatrixPreset::Blosum62,
            matrix_file: None,
            gap_open: 10,
            gap_extend: 2,
            compute_identity: true,
            compute_mutation_score: true,
            report_closest_reference: false,
        }
    }
}

impl AlignmentMetricsConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ScoringError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ScoringError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScoringError::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.gap_open < 0 {
            return Err(ScoringError::InvalidConfig(format!("gap_open must be >= 0, got {}", self.gap_open)));
        }
        if self.gap_extend < 0 {
            return Err(ScoringError::InvalidConfig(format!("gap_extend must be >= 0, got {}", self.gap_extend)));
        }
        if let Some(path) = &self.matrix_file {
            if !path.is_file() {
                return Err(ScoringError::InvalidConfig(format!("matrix file {} not found", path.display())));
            }
        }
        Ok(())
    }

    /// `true` if at least one alignment metric is enabled.
    pub fn any_enabled(&self) -> bool {
        self.compute_identity || self.compute_mutation_score || self.report_closest_reference
    }

    /// Load the configured substitution matrix.
    pub fn matrix(&self) -> Result<SubstitutionMatrix, ScoringError> {
        match &self.matrix_file {
            Some(path) => SubstitutionMatrix::from_file(path),
            None => Ok(SubstitutionMatrix::preset(self.substitution_matrix)),
        }
    }

    /// Aligner parameters for this configuration.
    pub fn needle_params(&self) -> Result<NeedleParams, ScoringError> {
        self.validate()?;
        Ok(NeedleParams {
            matrix: self.matrix()?,
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_pipeline() {
        let c = AlignmentMetricsConfig::from_json_str("{}").unwrap();
        assert_eq!(c, AlignmentMetricsConfig::default());
        assert_eq!(c.substitution_matrix, MatrixPreset::Blosum62);
        assert_eq!((c.gap_open, c.gap_extend), (10, 2));
        assert!(c.compute_identity && c.compute_mutation_score);
        assert_eq!(c.needle_params().unwrap().matrix.name(), "BLOSUM62");
    }

    #[test]
    fn fields_are_read_and_validated() {
        let c = AlignmentMetricsConfig::from_json_str(
            r#"{"substitution_matrix":"BLOSUM45","gap_open":11,"gap_extend":1,"compute_identity":false}"#,
        )
        .unwrap();
        assert_eq!(c.substitution_matrix, MatrixPreset::Blosum45);
        assert!(!c.compute_identity);
        assert!(c.compute_mutation_score);

        assert!(matches!(
            AlignmentMetricsConfig::from_json_str(r#"{"gap_open":-1}"#),
            Err(ScoringError::InvalidConfig(_))
        ));
        assert!(AlignmentMetricsConfig::from_json_str(r#"{"substitution_matrix":"PAM999"}"#).is_err());
        assert!(AlignmentMetricsConfig::from_json_str(r#"{"gapopen":3}"#).is_err());
    }

    #[test]
    fn matrix_file_overrides_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TOY.mat");
        std::fs::write(&path, "  A C\nA 2 -1\nC -1 3\n").unwrap();
        let c = AlignmentMetricsConfig { matrix_file: Some(path), ..Default::default() };
        let m = c.matrix().unwrap();
        assert_eq!(m.name(), "TOY");
        assert_eq!(m.score(b'C', b'C').unwrap(), 3);

        let gone = AlignmentMetricsConfig { matrix_file: Some(dir.path().join("gone.mat")), ..Default::default() };
        assert!(matches!(gone.validate(), Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn serialises_back_to_json() {
        let c = AlignmentMetricsConfig::default();
        let text = serde_json::to_string(&c).unwrap();
        assert!(text.contains("\"substitution_matrix\":\"BLOSUM62\""));
        assert_eq!(AlignmentMetricsConfig::from_json_str(&text).unwrap(), c);
    }
}
