//! Amino-acid substitution matrices.
//!
//! Two presets are compiled in, both as 24x24 NCBI tables over
//! `ARNDCQEGHILKMFPSTWYVBZX*`:
//!
//! - [`MatrixPreset::Blosum62`] (default)
//! - [`MatrixPreset::Blosum45`]
//!
//! Any other square, symmetric table in the NCBI text layout (the format used
//! by BLAST, EMBOSS and most matrix distributions) can be loaded with
//! [`SubstitutionMatrix::from_ncbi_text`] / [`SubstitutionMatrix::from_file`].
//!
//! Lookups are case-insensitive. A residue outside the table's alphabet is a
//! [`ScoringError::UnknownResidue`], never a silent default score.
//!
//! ### Example
//! ```rust,no_run
//! use protscore::{MatrixPreset, SubstitutionMatrix};
//! let m = SubstitutionMatrix::preset(MatrixPreset::Blosum62);
//! assert_eq!(m.score(b'W', b'W').unwrap(), 11);
//! assert_eq!(m.score(b'l', b'I').unwrap(), 2);
//! assert!(m.score(b'U', b'A').is_err());
//! ```
//!
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::ScoringError;

/// Row/column order of the compiled-in NCBI tables.
pub const NCBI_ALPHABET: &[u8; 24] = b"ARNDCQEGHILKMFPSTWYVBZX*";

const NO_INDEX: u8 = u8::MAX;

/// Named, compiled-in substitution matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatrixPreset {
    #[default]
    Blosum62,
    Blosum45,
}

impl MatrixPreset {
    pub const ALL: [MatrixPreset; 2] = [MatrixPreset::Blosum62, MatrixPreset::Blosum45];

    pub fn name(self) -> &'static str {
        match self {
            MatrixPreset::Blosum62 => "BLOSUM62",
            MatrixPreset::Blosum45 => "BLOSUM45",
        }
    }

    fn table(self) -> &'static [i32; 24 * 24] {
        match self {
            MatrixPreset::Blosum62 => &BLOSUM62,
            MatrixPreset::Blosum45 => &BLOSUM45,
        }
    }
}

impl fmt::Display for MatrixPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatrixPreset {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatrixPreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScoringError::UnknownMatrix(s.to_string()))
    }
}

impl TryFrom<String> for MatrixPreset {
    type Error = ScoringError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MatrixPreset> for String {
    fn from(p: MatrixPreset) -> Self {
        p.name().to_string()
    }
}

/// A square, symmetric residue-pair score table.
#[derive(Clone)]
pub struct SubstitutionMatrix {
    name: String,
    alphabet: Vec<u8>,
    /// Byte -> row index, `NO_INDEX` when absent. Filled for both cases.
    lookup: [u8; 256],
    scores: Vec<i32>,
}

impl fmt::Debug for SubstitutionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstitutionMatrix")
            .field("name", &self.name)
            .field("alphabet", &String::from_utf8_lossy(&self.alphabet))
            .finish()
    }
}

impl SubstitutionMatrix {
    /// Build one of the compiled-in tables.
    pub fn preset(preset: MatrixPreset) -> Self {
        Self::from_parts(preset.name().to_string(), NCBI_ALPHABET.to_vec(), preset.table().to_vec())
    }

    fn from_parts(name: String, alphabet: Vec<u8>, scores: Vec<i32>) -> Self {
        let mut lookup = [NO_INDEX; 256];
        for (i, &sym) in alphabet.iter().enumerate() {
            lookup[sym.to_ascii_uppercase() as usize] = i as u8;
            lookup[sym.to_ascii_lowercase() as usize] = i as u8;
        }
        Self { name, alphabet, lookup, scores }
    }

    /// Parse a matrix in NCBI text layout:
    ///
    /// ```text
    /// # comment lines
    ///    A  R  N ...
    /// A  4 -1 -2 ...
    /// R -1  5  0 ...
    /// ```
    ///
    /// Rows may appear in any order but every header symbol needs exactly one
    /// row, and the table must be symmetric.
    pub fn from_ncbi_text(name: &str, text: &str) -> Result<Self, ScoringError> {
        let invalid = |msg: String| ScoringError::InvalidMatrix(format!("{name}: {msg}"));
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header = lines.next().ok_or_else(|| invalid("no header line".to_string()))?;
        let mut alphabet = Vec::new();
        for tok in header.split_whitespace() {
            let &[sym] = tok.as_bytes() else {
                return Err(invalid(format!("header symbol '{tok}' is not a single character")));
            };
            let sym = sym.to_ascii_uppercase();
            if alphabet.contains(&sym) {
                return Err(invalid(format!("duplicate header symbol '{}'", sym as char)));
            }
            alphabet.push(sym);
        }
        if alphabet.len() > NO_INDEX as usize {
            return Err(invalid("alphabet too large".to_string()));
        }
        let n = alphabet.len();
        if n == 0 {
            return Err(invalid("empty header line".to_string()));
        }

        let mut scores = vec![0i32; n * n];
        let mut seen = vec![false; n];
        for line in lines {
            let mut toks = line.split_whitespace();
            let row_tok = toks.next().unwrap_or_default();
            let row_sym = match row_tok.as_bytes() {
                &[s] => s.to_ascii_uppercase(),
                _ => return Err(invalid(format!("row label '{row_tok}' is not a single character"))),
            };
            let Some(row) = alphabet.iter().position(|&s| s == row_sym) else {
                return Err(invalid(format!("row '{}' is not in the header", row_sym as char)));
            };
            if std::mem::replace(&mut seen[row], true) {
                return Err(invalid(format!("row '{}' appears twice", row_sym as char)));
            }
            let values = toks
                .map(|t| t.parse::<i32>().map_err(|_| invalid(format!("row '{}': bad score '{t}'", row_sym as char))))
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() != n {
                return Err(invalid(format!(
                    "row '{}' has {} scores, expected {n}", row_sym as char, values.len()
                )));
            }
            scores[row * n..(row + 1) * n].copy_from_slice(&values);
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(invalid(format!("missing row for '{}'", alphabet[missing] as char)));
        }

        let matrix = Self::from_parts(name.to_string(), alphabet, scores);
        if let Some((a, b)) = matrix.first_asymmetry() {
            return Err(invalid(format!("score({a},{b}) != score({b},{a})")));
        }
        Ok(matrix)
    }

    /// Read an NCBI-layout matrix file; the file stem becomes the name.
    pub fn from_file(path: &Path) -> Result<Self, ScoringError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScoringError::io(path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_ncbi_text(&name, &text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbols covered by the table, in row order (uppercase).
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn contains(&self, residue: u8) -> bool {
        self.lookup[residue as usize] != NO_INDEX
    }

    /// Row index of `residue`, or `UnknownResidue`.
    pub fn index_of(&self, residue: u8) -> Result<usize, ScoringError> {
        match self.lookup[residue as usize] {
            NO_INDEX => Err(ScoringError::UnknownResidue {
                residue: residue as char,
                matrix: self.name.clone(),
            }),
            i => Ok(i as usize),
        }
    }

    /// Score of the residue pair `(a, b)`.
    pub fn score(&self, a: u8, b: u8) -> Result<i32, ScoringError> {
        Ok(self.score_at(self.index_of(a)?, self.index_of(b)?))
    }

    #[inline]
    pub(crate) fn score_at(&self, ia: usize, ib: usize) -> i32 {
        self.scores[ia * self.alphabet.len() + ib]
    }

    /// Map a sequence to row indices, failing on the first unknown residue.
    pub(crate) fn encode(&self, seq: &[u8]) -> Result<Vec<usize>, ScoringError> {
        seq.iter().map(|&r| self.index_of(r)).collect()
    }

    fn first_asymmetry(&self) -> Option<(char, char)> {
        let n = self.alphabet.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.score_at(i, j) != self.score_at(j, i) {
                    return Some((self.alphabet[i] as char, self.alphabet[j] as char));
                }
            }
        }
        None
    }
}

// NCBI reference tables. Row/column order: A R N D C Q E G H I L K M F P S T W Y V B Z X *

#[rustfmt::skip]
const BLOSUM62: [i32; 24 * 24] = [
//   A   R   N   D   C   Q   E   G   H   I   L   K   M   F   P   S   T   W   Y   V   B   Z   X   *
     4, -1, -2, -2,  0, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -3, -2,  0, -2, -1,  0, -4, // A
    -1,  5,  0, -2, -3,  1,  0, -2,  0, -3, -2,  2, -1, -3, -2, -1, -1, -3, -2, -3, -1,  0, -1, -4, // R
    -2,  0,  6,  1, -3,  0,  0,  0,  1, -3, -3,  0, -2, -3, -2,  1,  0, -4, -2, -3,  3,  0, -1, -4, // N
    -2, -2,  1,  6, -3,  0,  2, -1, -1, -3, -4, -1, -3, -3, -1,  0, -1, -4, -3, -3,  4,  1, -1, -4, // D
     0, -3, -3, -3,  9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -3, -2, -4, // C
    -1,  1,  0,  0, -3,  5,  2, -2,  0, -3, -2,  1,  0, -3, -1,  0, -1, -2, -1, -2,  0,  3, -1, -4, // Q
    -1,  0,  0,  2, -4,  2,  5, -2,  0, -3, -3,  1, -2, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, -4, // E
     0, -2,  0, -1, -3, -2, -2,  6, -2, -4, -4, -2, -3, -3, -2,  0, -2, -2, -3, -3, -1, -2, -1, -4, // G
    -2,  0,  1, -1, -3,  0,  0, -2,  8, -3, -3, -1, -2, -1, -2, -1, -2, -2,  2, -3,  0,  0, -1, -4, // H
    -1, -3, -3, -3, -1, -3, -3, -4, -3,  4,  2, -3,  1,  0, -3, -2, -1, -3, -1,  3, -3, -3, -1, -4, // I
    -1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4, -2,  2,  0, -3, -2, -1, -2, -1,  1, -4, -3, -1, -4, // L
    -1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5, -1, -3, -1,  0, -1, -3, -2, -2,  0,  1, -1, -4, // K
    -1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,  0, -2, -1, -1, -1, -1,  1, -3, -1, -1, -4, // M
    -2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6, -4, -2, -2,  1,  3, -1, -3, -3, -1, -4, // F
    -1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7, -1, -1, -4, -3, -2, -2, -1, -2, -4, // P
     1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,  1, -3, -2, -2,  0,  0,  0, -4, // S
     0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5, -2, -2,  0, -1, -1,  0, -4, // T
    -3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,  2, -3, -4, -3, -2, -4, // W
    -2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7, -1, -3, -2, -1, -4, // Y
     0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4, -3, -2, -1, -4, // V
    -2, -1,  3,  4, -3,  0,  1, -1,  0, -3, -4,  0, -3, -3, -2,  0, -1, -4, -3, -3,  4,  1, -1, -4, // B
    -1,  0,  0,  1, -3,  3,  4, -2,  0, -3, -3,  1, -1, -3, -1,  0, -1, -3, -2, -2,  1,  4, -1, -4, // Z
     0, -1, -1, -1, -2, -1, -1, -1, -1, -1, -1, -1, -1, -1, -2,  0,  0, -2, -1, -1, -1, -1, -1, -4, // X
    -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4,  1, // *
];

#[rustfmt::skip]
const BLOSUM45: [i32; 24 * 24] = [
//   A   R   N   D   C   Q   E   G   H   I   L   K   M   F   P   S   T   W   Y   V   B   Z   X   *
     5, -2, -1, -2, -1, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -2, -2,  0, -1, -1,  0, -5, // A
    -2,  7,  0, -1, -3,  1,  0, -2,  0, -3, -2,  3, -1, -2, -2, -1, -1, -2, -1, -2, -1,  0, -1, -5, // R
    -1,  0,  6,  2, -2,  0,  0,  0,  1, -2, -3,  0, -2, -2, -2,  1,  0, -4, -2, -3,  4,  0, -1, -5, // N
    -2, -1,  2,  7, -3,  0,  2, -1,  0, -4, -3,  0, -3, -4, -1,  0, -1, -4, -2, -3,  5,  1, -1, -5, // D
    -1, -3, -2, -3, 12, -3, -3, -3, -3, -3, -2, -3, -2, -2, -4, -1, -1, -5, -3, -1, -2, -3, -2, -5, // C
    -1,  1,  0,  0, -3,  6,  2, -2,  1, -2, -2,  1,  0, -4, -1,  0, -1, -2, -1, -3,  0,  4, -1, -5, // Q
    -1,  0,  0,  2, -3,  2,  6, -2,  0, -3, -2,  1, -2, -3,  0,  0, -1, -3, -2, -3,  1,  4, -1, -5, // E
     0, -2,  0, -1, -3, -2, -2,  7, -2, -4, -3, -2, -2, -3, -2,  0, -2, -2, -3, -3, -1, -2, -1, -5, // G
    -2,  0,  1,  0, -3,  1,  0, -2, 10, -3, -2, -1,  0, -2, -2, -1, -2, -3,  2, -3,  0,  0, -1, -5, // H
    -1, -3, -2, -4, -3, -2, -3, -4, -3,  5,  2, -3,  2,  0, -2, -2, -1, -2,  0,  3, -3, -3, -1, -5, // I
    -1, -2, -3, -3, -2, -2, -2, -3, -2,  2,  5, -3,  2,  1, -3, -3, -1, -2,  0,  1, -3, -2, -1, -5, // L
    -1,  3,  0,  0, -3,  1,  1, -2, -1, -3, -3,  5, -1, -3, -1, -1, -1, -2, -1, -2,  0,  1, -1, -5, // K
    -1, -1, -2, -3, -2,  0, -2, -2,  0,  2,  2, -1,  6,  0, -2, -2, -1, -2,  0,  1, -2, -1, -1, -5, // M
    -2, -2, -2, -4, -2, -4, -3, -3, -2,  0,  1, -3,  0,  8, -3, -2, -1,  1,  3,  0, -3, -3, -1, -5, // F
    -1, -2, -2, -1, -4, -1,  0, -2, -2, -2, -3, -1, -2, -3,  9, -1, -1, -3, -3, -3, -2, -1, -1, -5, // P
     1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -3, -1, -2, -2, -1,  4,  2, -4, -2, -1,  0,  0,  0, -5, // S
     0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -1, -1,  2,  5, -3, -1,  0,  0, -1,  0, -5, // T
    -2, -2, -4, -4, -5, -2, -3, -2, -3, -2, -2, -2, -2,  1, -3, -4, -3, 15,  3, -3, -4, -2, -2, -5, // W
    -2, -1, -2, -2, -3, -1, -2, -3,  2,  0,  0, -1,  0,  3, -3, -2, -1,  3,  8, -1, -2, -2, -1, -5, // Y
     0, -2, -3, -3, -1, -3, -3, -3, -3,  3,  1, -2,  1,  0, -3, -1,  0, -3, -1,  5, -3, -3, -1, -5, // V
    -1, -1,  4,  5, -2,  0,  1, -1,  0, -3, -3,  0, -2, -3, -2,  0,  0, -4, -2, -3,  4,  2, -1, -5, // B
    -1,  0,  0,  1, -3,  4,  4, -2,  0, -3, -2,  1, -1, -3, -1,  0, -1, -2, -2, -3,  2,  4, -1, -5, // Z
     0, -1, -1, -1, -2, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,  0,  0, -2, -1, -1, -1, -1, -1, -5, // X
    -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5, -5,  1, // *
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_symmetric() {
        for p in MatrixPreset::ALL {
            let m = SubstitutionMatrix::preset(p);
            assert_eq!(m.first_asymmetry(), None, "{p}");
            for &a in m.alphabet() {
                for &b in m.alphabet() {
                    assert_eq!(m.score(a, b).unwrap(), m.score(b, a).unwrap());
                }
            }
        }
    }

    #[test]
    fn presets_are_distinct_tables() {
        let b62 = SubstitutionMatrix::preset(MatrixPreset::Blosum62);
        let b45 = SubstitutionMatrix::preset(MatrixPreset::Blosum45);
        assert_eq!(b62.score(b'A', b'A').unwrap(), 4);
        assert_eq!(b45.score(b'A', b'A').unwrap(), 5);
        assert_eq!(b62.score(b'W', b'W').unwrap(), 11);
        assert_eq!(b45.score(b'W', b'W').unwrap(), 15);
        assert_eq!(b62.score(b'T', b'S').unwrap(), 1);
        assert_eq!(b62.score(b'*', b'*').unwrap(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive_and_strict() {
        let m = SubstitutionMatrix::preset(MatrixPreset::Blosum62);
        assert_eq!(m.score(b'k', b'R').unwrap(), 2);
        match m.score(b'A', b'U') {
            Err(ScoringError::UnknownResidue { residue, matrix }) => {
                assert_eq!(residue, 'U');
                assert_eq!(matrix, "BLOSUM62");
            }
            other => panic!("expected UnknownResidue, got {other:?}"),
        }
        assert!(m.score(b'-', b'A').is_err());
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("blosum62".parse::<MatrixPreset>().unwrap(), MatrixPreset::Blosum62);
        assert_eq!(" BLOSUM45 ".parse::<MatrixPreset>().unwrap(), MatrixPreset::Blosum45);
        assert!(matches!("PAM30".parse::<MatrixPreset>(), Err(ScoringError::UnknownMatrix(_))));
        let json = serde_json::to_string(&MatrixPreset::Blosum45).unwrap();
        assert_eq!(json, "\"BLOSUM45\"");
        assert!(serde_json::from_str::<MatrixPreset>("\"PFASUM99\"").is_err());
    }

    #[test]
    fn pfasum_name_points_to_matrix_file() {
        let err = "PFASUM15".parse::<MatrixPreset>().unwrap_err();
        assert!(matches!(&err, ScoringError::UnknownMatrix(name) if name == "PFASUM15"));
        assert!(err.to_string().contains("matrix_file"), "{err}");
        let err = serde_json::from_str::<MatrixPreset>("\"PFASUM15\"").unwrap_err();
        assert!(err.to_string().contains("matrix_file"), "{err}");
    }

    #[test]
    fn ncbi_text_round_trip() {
        let text = "# toy\n   A  B\nB -1  3\nA  5 -1\n";
        let m = SubstitutionMatrix::from_ncbi_text("TOY", text).unwrap();
        assert_eq!(m.name(), "TOY");
        assert_eq!(m.alphabet(), b"AB");
        assert_eq!(m.score(b'a', b'b').unwrap(), -1);
        assert_eq!(m.score(b'B', b'B').unwrap(), 3);
        assert!(m.contains(b'A') && !m.contains(b'C'));
    }

    #[test]
    fn ncbi_text_rejects_malformed_tables() {
        let asym = "  A B\nA 1 2\nB 3 1\n";
        assert!(matches!(SubstitutionMatrix::from_ncbi_text("x", asym), Err(ScoringError::InvalidMatrix(_))));
        let short = "  A B\nA 1 2\n";
        assert!(SubstitutionMatrix::from_ncbi_text("x", short).is_err());
        let ragged = "  A B\nA 1\nB 1 1\n";
        assert!(SubstitutionMatrix::from_ncbi_text("x", ragged).is_err());
        let junk = "  A B\nA 1 x\nB x 1\n";
        assert!(SubstitutionMatrix::from_ncbi_text("x", junk).is_err());
        assert!(SubstitutionMatrix::from_ncbi_text("x", "# nothing\n").is_err());
    }
}
