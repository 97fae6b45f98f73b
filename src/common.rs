//! Common helpers shared by the scoring pipeline: the crate error type and a
//! strict FASTA reader.
//!
//! ## FASTA
//! Records are a `>` header line followed by one or more (possibly wrapped)
//! residue lines. Aligned input is accepted and "unaligned" on the way in:
//! `-` and `.` are dropped and residues are uppercased. Any other symbol
//! outside `A-Z` / `*` is a [`ScoringError::Parse`].
//!
//! ## Examples
//! ```rust,no_run
//! use protscore::parse_fasta;
//! let recs = parse_fasta(">p1 some description\nMKV-LT\nAA\n>p2\nmvlt\n", "inline").unwrap();
//! assert_eq!(recs.len(), 2);
//! assert_eq!(recs[0].seq, "MKVLTAA");
//! assert_eq!(recs[1].seq, "MVLT");
//! ```
//!
use std::path::PathBuf;

/// Errors that can be returned by the scoring pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ScoringError {
    /// Malformed FASTA input. Fatal: nothing downstream can run on it.
    #[error("{source_name}:{line}: {message}")]
    Parse { source_name: String, line: usize, message: String },
    /// A residue the selected substitution matrix has no row for.
    #[error("residue '{residue}' is not in the {matrix} alphabet")]
    UnknownResidue { residue: char, matrix: String },
    /// One of the sequences handed to the aligner has zero length.
    #[error("cannot align an empty sequence")]
    EmptySequence,
    /// An input path given for a sequence role does not exist.
    #[error("input path does not exist: {}", .0.display())]
    MissingInputDirectory(PathBuf),
    /// An input directory (or path list) contributed no files.
    #[error("no input files found in {}", .0.display())]
    NoFilesFound(PathBuf),
    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Substitution matrix name that is not a compiled-in preset (PFASUM15
    /// included); such tables are loaded with `matrix_file`.
    #[error("unknown substitution matrix '{0}': built-in presets are BLOSUM62 and BLOSUM45, load any other NCBI-format table with matrix_file (--matrix-file)")]
    UnknownMatrix(String),
    /// Substitution matrix text that is not square, symmetric or parseable.
    #[error("invalid substitution matrix: {0}")]
    InvalidMatrix(String),
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ScoringError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScoringError::Io { path: path.into(), source }
    }

    /// `true` for the per-pair failures that the metric deriver skips and
    /// records instead of aborting the run.
    pub fn is_pair_local(&self) -> bool {
        matches!(self, ScoringError::UnknownResidue { .. } | ScoringError::EmptySequence)
    }
}

/// A single FASTA sequence (identifier and cleaned, uppercase residues).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastaRecord {
    /// Identifier from the FASTA header (first word after '>').
    pub id: String,
    /// Residues, uppercase, gap symbols removed. Never empty.
    pub seq: String,
}

/// Parse FASTA text into records, failing on the first malformed record.
///
/// `source_name` is only used in error messages (usually the file path).
///
/// ## Errors
/// - sequence data before the first header
/// - a header with no name
/// - a header with no residues before the next header / end of input
/// - a symbol that is not a letter, `*`, or a gap character
pub fn parse_fasta(text: &str, source_name: &str) -> Result<Vec<FastaRecord>, ScoringError> {
    let parse_err = |line: usize, message: String| ScoringError::Parse {
        source_name: source_name.to_string(),
        line,
        message,
    };

    let mut out: Vec<FastaRecord> = vec![];
    // (id, header line, residues)
    let mut current: Option<(String, usize, String)> = None;

    let finish = |rec: (String, usize, String)| -> Result<FastaRecord, ScoringError> {
        let (id, line, seq) = rec;
        if seq.is_empty() {
            return Err(parse_err(line, format!("record '{id}' has no sequence")));
        }
        Ok(FastaRecord { id, seq })
    };

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('>') {
            if let Some(rec) = current.take() {
                out.push(finish(rec)?);
            }
            let id = rest.split_whitespace().next().unwrap_or("").to_string();
            if id.is_empty() {
                return Err(parse_err(lineno, "header without a name".to_string()));
            }
            current = Some((id, lineno, String::new()));
            continue;
        }
        let Some((_, _, seq)) = current.as_mut() else {
            return Err(parse_err(lineno, "sequence data before the first '>' header".to_string()));
        };
        for ch in line.chars() {
            match ch {
                '-' | '.' => {}
                c if c.is_whitespace() => {}
                c if c.is_ascii_alphabetic() => seq.push(c.to_ascii_uppercase()),
                '*' => seq.push('*'),
                c => return Err(parse_err(lineno, format!("invalid residue symbol '{c}'"))),
            }
        }
    }
    if let Some(rec) = current.take() {
        out.push(finish(rec)?);
    }
    Ok(out)
}

/// Case-insensitive equality used when counting identities.
pub fn equals_case_insensitive(a: char, b: char) -> bool {
    a.to_ascii_uppercase() == b.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_and_aligned_records_are_cleaned() {
        let recs = parse_fasta(">a desc\nmk-v\nL.T\n\n>b\nMVLT*\n", "t").unwrap();
        assert_eq!(recs, vec![
            FastaRecord { id: "a".into(), seq: "MKVLT".into() },
            FastaRecord { id: "b".into(), seq: "MVLT*".into() },
        ]);
    }

    #[test]
    fn name_without_sequence_is_a_parse_error() {
        let err = parse_fasta(">a\n>b\nMK\n", "t").unwrap_err();
        match err {
            ScoringError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(parse_fasta(">only\n", "t"), Err(ScoringError::Parse { .. })));
        assert!(matches!(parse_fasta(">a\n---\n", "t"), Err(ScoringError::Parse { .. })));
    }

    #[test]
    fn bad_symbols_and_orphan_lines_fail() {
        assert!(matches!(parse_fasta(">a\nMK1V\n", "t"), Err(ScoringError::Parse { line: 2, .. })));
        assert!(matches!(parse_fasta("MKV\n>a\nMK\n", "t"), Err(ScoringError::Parse { line: 1, .. })));
        assert!(matches!(parse_fasta(">\nMK\n", "t"), Err(ScoringError::Parse { .. })));
    }

    #[test]
    fn empty_text_has_no_records() {
        assert!(parse_fasta("", "t").unwrap().is_empty());
        assert!(parse_fasta("; comment only\n", "t").unwrap().is_empty());
    }

    #[test]
    fn pair_local_errors() {
        assert!(ScoringError::EmptySequence.is_pair_local());
        assert!(ScoringError::UnknownResidue { residue: 'U', matrix: "BLOSUM62".into() }.is_pair_local());
        assert!(!ScoringError::NoFilesFound(PathBuf::from("x")).is_pair_local());
    }
}
