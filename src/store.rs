//! In-memory sequence collections for the two input roles.
//!
//! A [`SequenceStore`] is built once from one or more FASTA sources and is
//! never mutated afterwards. Targets and references go through the same
//! loader, parameterised by [`SequenceRole`], so the two roles cannot be
//! mixed up by construction.
//!
//! Input paths can be files or directories. A directory contributes every
//! regular file directly inside it, in file-name order. Duplicate identifiers
//! within one role keep the position of the first record and the residues of
//! the last one read; each duplicate is logged as a warning.
//!
//! ### Example
//! ```rust,no_run
//! use protscore::{SequenceRole, SequenceStore};
//! let targets = SequenceStore::from_paths(SequenceRole::Target, &["designs/".into()]).unwrap();
//! for rec in targets.iter() {
//!     println!("{}\t{}", rec.id, rec.seq.len());
//! }
//! ```
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::common::{parse_fasta, FastaRecord, ScoringError};

/// Which side of the comparison a store feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequenceRole {
    Target,
    Reference,
}

impl fmt::Display for SequenceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SequenceRole::Target => "target",
            SequenceRole::Reference => "reference",
        })
    }
}

/// Ordered, de-duplicated collection of FASTA records for one role.
#[derive(Clone, Debug)]
pub struct SequenceStore {
    role: SequenceRole,
    records: Vec<FastaRecord>,
    index: HashMap<String, usize>,
}

impl SequenceStore {
    pub fn new(role: SequenceRole) -> Self {
        Self { role, records: Vec::new(), index: HashMap::new() }
    }

    /// Build a store from already parsed records (applies the duplicate policy).
    pub fn from_records(role: SequenceRole, records: impl IntoIterator<Item = FastaRecord>) -> Self {
        let mut store = Self::new(role);
        for rec in records {
            store.insert(rec);
        }
        store
    }

    /// Build a store from FASTA files and/or directories of FASTA files.
    ///
    /// ## Errors
    /// - [`ScoringError::MissingInputDirectory`] if a path does not exist
    /// - [`ScoringError::NoFilesFound`] if `paths` is empty or a directory has no files
    /// - [`ScoringError::Parse`] for the first malformed record
    pub fn from_paths(role: SequenceRole, paths: &[PathBuf]) -> Result<Self, ScoringError> {
        let files = collect_input_files(paths)?;
        let mut store = Self::new(role);
        for file in &files {
            let text = std::fs::read_to_string(file).map_err(|e| ScoringError::io(file, e))?;
            let records = parse_fasta(&text, &file.display().to_string())?;
            debug!("{role}: {} records from {}", records.len(), file.display());
            for rec in records {
                store.insert(rec);
            }
        }
        info!("loaded {} {role} sequences from {} file(s)", store.len(), files.len());
        Ok(store)
    }

    fn insert(&mut self, rec: FastaRecord) {
        match self.index.get(&rec.id) {
            Some(&pos) => {
                warn!("duplicate {} identifier '{}': keeping the last record read", self.role, rec.id);
                self.records[pos] = rec;
            }
            None => {
                self.index.insert(rec.id.clone(), self.records.len());
                self.records.push(rec);
            }
        }
    }

    pub fn role(&self) -> SequenceRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FastaRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Records in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, FastaRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[FastaRecord] {
        &self.records
    }

    /// Write the store as FASTA, one sequence line per record.
    pub fn write_fasta<W: std::io::Write>(&self, mut w: W) -> std::io::Result<()> {
        for r in &self.records {
            writeln!(w, ">{}", r.id)?;
            writeln!(w, "{}", r.seq)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SequenceStore {
    type Item = &'a FastaRecord;
    type IntoIter = std::slice::Iter<'a, FastaRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Expand directories into their regular files (sorted by name).
fn collect_input_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ScoringError> {
    if paths.is_empty() {
        return Err(ScoringError::NoFilesFound(PathBuf::from(".")));
    }
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(ScoringError::MissingInputDirectory(path.clone()));
        }
        if path.is_dir() {
            let mut found = dir_files(path)?;
            if found.is_empty() {
                return Err(ScoringError::NoFilesFound(path.clone()));
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn dir_files(dir: &Path) -> Result<Vec<PathBuf>, ScoringError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ScoringError::io(dir, e))? {
        let entry = entry.map_err(|e| ScoringError::io(dir, e))?;
        let path = entry.path();
        let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_file() && !is_hidden {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn rec(id: &str, seq: &str) -> FastaRecord {
        FastaRecord { id: id.into(), seq: seq.into() }
    }

    #[test]
    fn duplicates_keep_first_position_and_last_sequence() {
        let store = SequenceStore::from_records(
            SequenceRole::Target,
            [rec("a", "MK"), rec("b", "MV"), rec("a", "MKK")],
        );
        assert_eq!(store.len(), 2);
        let ids: Vec<_> = store.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(store.get("a").unwrap().seq, "MKK");
    }

    #[test]
    fn directory_files_are_read_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.fasta"), ">y\nMV\n>x\nMA\n").unwrap();
        fs::write(dir.path().join("a.fasta"), ">x\nMK\n").unwrap();
        fs::write(dir.path().join(".hidden"), "not fasta").unwrap();
        let store = SequenceStore::from_paths(SequenceRole::Reference, &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(store.role(), SequenceRole::Reference);
        let got: Vec<_> = store.iter().map(|r| (r.id.as_str(), r.seq.as_str())).collect();
        assert_eq!(got, [("x", "MA"), ("y", "MV")]);
    }

    #[test]
    fn missing_and_empty_inputs_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            SequenceStore::from_paths(SequenceRole::Target, &[missing]),
            Err(ScoringError::MissingInputDirectory(_))
        ));
        assert!(matches!(
            SequenceStore::from_paths(SequenceRole::Target, &[dir.path().to_path_buf()]),
            Err(ScoringError::NoFilesFound(_))
        ));
        assert!(matches!(SequenceStore::from_paths(SequenceRole::Target, &[]), Err(ScoringError::NoFilesFound(_))));
    }

    #[test]
    fn parse_errors_abort_loading() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("bad.fa");
        fs::write(&f, ">ok\nMK\n>broken\n").unwrap();
        assert!(matches!(SequenceStore::from_paths(SequenceRole::Target, &[f]), Err(ScoringError::Parse { .. })));
    }

    #[test]
    fn fasta_output_round_trips() {
        let store = SequenceStore::from_records(SequenceRole::Target, [rec("a", "MK"), rec("b", "MV")]);
        let mut buf = Vec::new();
        store.write_fasta(&mut buf).unwrap();
        let back = parse_fasta(std::str::from_utf8(&buf).unwrap(), "buf").unwrap();
        assert_eq!(back, store.records());
    }
}
