//! Per-protein metric table shared by every metric producer.
//!
//! [`ResultsTable`] maps protein identifier -> metric name -> [`MetricValue`].
//! It is an explicit object handed to each producer in turn; there is no
//! internal locking, producers run one after the other.
//!
//! ### Merge contract
//! - `record` on an existing `(protein, metric)` overwrites the old value
//!   (last writer wins) and logs a warning, since it usually means two
//!   producers emitted the same protein/metric.
//! - Rows are proteins in first-seen order; columns are metric names in
//!   first-recorded order. Nothing is sorted.
//! - The table is sparse: a protein without a metric has no cell, and the
//!   export writes the missing marker there, never `0`.
//! - Text that would read back as a number or as the missing marker is
//!   written with a leading [`TEXT_ESCAPE`], which the reader strips.
//!
//! ### Example
//! ```rust,no_run
//! use protscore::{MetricValue, ResultsTable};
//! let mut t = ResultsTable::new();
//! t.record("p1", "plddt", MetricValue::Float(87.5));
//! t.record("p2", "esm_1v", MetricValue::Float(-1.25));
//! let mut out = Vec::new();
//! t.write_csv(&mut out, &Default::default()).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), ",plddt,esm_1v\np1,87.5,\np2,,-1.25\n");
//! ```
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::common::ScoringError;

/// Prefix of an exported text cell that must not be read as a number.
pub const TEXT_ESCAPE: char = '\'';

/// A scalar metric attached to one protein.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Float(_) => None,
            MetricValue::Text(s) => Some(s),
        }
    }

    /// Exported cell text. Text that would be read back as something else
    /// (a float, the `missing` marker, or an escaped cell) gets [`TEXT_ESCAPE`].
    pub fn to_cell(&self, missing: &str) -> String {
        match self {
            MetricValue::Float(v) => v.to_string(),
            MetricValue::Text(s) => {
                if s == missing || s.starts_with(TEXT_ESCAPE) || s.trim().parse::<f64>().is_ok() {
                    format!("{TEXT_ESCAPE}{s}")
                } else {
                    s.clone()
                }
            }
        }
    }

    /// Inverse of [`to_cell`](Self::to_cell): an escaped cell is text, a cell
    /// that parses as `f64` is a float, anything else is text.
    pub fn parse_cell(cell: &str) -> MetricValue {
        if let Some(text) = cell.strip_prefix(TEXT_ESCAPE) {
            return MetricValue::Text(text.to_string());
        }
        match cell.trim().parse::<f64>() {
            Ok(v) => MetricValue::Float(v),
            Err(_) => MetricValue::Text(cell.to_string()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Shortest representation that parses back to the same f64.
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

/// One `(protein, metric, value)` triple emitted by a producer.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub protein_id: String,
    pub metric: String,
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn new(protein_id: impl Into<String>, metric: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self { protein_id: protein_id.into(), metric: metric.into(), value: value.into() }
    }
}

/// Anything that computes metrics for a set of proteins.
///
/// External scorers (structure predictors, language models, ...) only need to
/// return protein ids consistent with the sequence inputs; covering a subset
/// of proteins is fine.
pub trait MetricProducer {
    /// Short label used in log messages.
    fn name(&self) -> &str;

    /// Compute every triple this producer contributes.
    fn produce(&self) -> Result<Vec<MetricRecord>, ScoringError>;
}

/// CSV/TSV layout options for export and import.
#[derive(Clone, Debug)]
pub struct TableFormat {
    /// Field delimiter (`,` by default, `\t` for TSV).
    pub delimiter: u8,
    /// Cell text for a missing metric. Must not be a valid number or start
    /// with [`TEXT_ESCAPE`].
    pub missing: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self { delimiter: b',', missing: String::new() }
    }
}

impl TableFormat {
    pub fn tsv() -> Self {
        Self { delimiter: b'\t', ..Default::default() }
    }

    /// The marker has to stay distinguishable from every real value.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.missing.trim().parse::<f64>().is_ok() {
            return Err(ScoringError::InvalidConfig(format!(
                "missing-value marker '{}' would read back as a number", self.missing
            )));
        }
        if self.missing.starts_with(TEXT_ESCAPE) {
            return Err(ScoringError::InvalidConfig(format!(
                "missing-value marker '{}' starts with the text escape {TEXT_ESCAPE}", self.missing
            )));
        }
        Ok(())
    }
}

/// Dense view of the table: header plus one row per protein.
#[derive(Clone, Debug, PartialEq)]
pub struct TableExport {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<Option<MetricValue>>)>,
}

/// Protein -> metric -> value, insertion ordered on both axes.
#[derive(Clone, Debug, Default)]
pub struct ResultsTable {
    proteins: Vec<String>,
    protein_index: HashMap<String, usize>,
    columns: Vec<String>,
    column_set: HashSet<String>,
    cells: Vec<HashMap<String, MetricValue>>,
    overwrites: usize,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `metric` for `protein_id`, returning the value it replaced.
    pub fn record(
        &mut self,
        protein_id: &str,
        metric: &str,
        value: impl Into<MetricValue>,
    ) -> Option<MetricValue> {
        let value = value.into();
        let row = match self.protein_index.get(protein_id) {
            Some(&row) => row,
            None => {
                let row = self.proteins.len();
                self.proteins.push(protein_id.to_string());
                self.protein_index.insert(protein_id.to_string(), row);
                self.cells.push(HashMap::new());
                row
            }
        };
        if self.column_set.insert(metric.to_string()) {
            self.columns.push(metric.to_string());
        }
        let previous = self.cells[row].insert(metric.to_string(), value);
        if let Some(old) = &previous {
            self.overwrites += 1;
            warn!("overwriting {metric} for '{protein_id}' (previous value {old})");
        }
        previous
    }

    pub fn record_metric(&mut self, rec: MetricRecord) -> Option<MetricValue> {
        self.record(&rec.protein_id, &rec.metric, rec.value)
    }

    /// Record one metric for many proteins, e.g. the mapping an external scorer returns.
    pub fn record_all<I, K, V>(&mut self, metric: &str, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<MetricValue>,
    {
        for (protein, value) in values {
            self.record(protein.as_ref(), metric, value);
        }
    }

    /// Run `producer` and record everything it returns, in order.
    pub fn merge_producer(&mut self, producer: &dyn MetricProducer) -> Result<usize, ScoringError> {
        let records = producer.produce()?;
        let n = records.len();
        for rec in records {
            self.record_metric(rec);
        }
        info!("{}: recorded {n} metric values", producer.name());
        Ok(n)
    }

    pub fn get(&self, protein_id: &str, metric: &str) -> Option<&MetricValue> {
        let row = *self.protein_index.get(protein_id)?;
        self.cells[row].get(metric)
    }

    /// Protein ids in first-seen order.
    pub fn proteins(&self) -> &[String] {
        &self.proteins
    }

    /// Metric names in first-recorded order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    /// How many `record` calls replaced an existing value.
    pub fn overwrites(&self) -> usize {
        self.overwrites
    }

    /// Every recorded triple, row by row then column by column.
    pub fn triples(&self) -> Vec<MetricRecord> {
        let mut out = Vec::new();
        for (row, protein) in self.proteins.iter().enumerate() {
            for col in &self.columns {
                if let Some(v) = self.cells[row].get(col) {
                    out.push(MetricRecord::new(protein.clone(), col.clone(), v.clone()));
                }
            }
        }
        out
    }

    /// Dense rows over the union of all metric names.
    pub fn export(&self) -> TableExport {
        let rows = self
            .proteins
            .iter()
            .zip(&self.cells)
            .map(|(protein, cells)| {
                let values = self.columns.iter().map(|c| cells.get(c).cloned()).collect();
                (protein.clone(), values)
            })
            .collect();
        TableExport { columns: self.columns.clone(), rows }
    }

    /// Write the table as delimited text. The first header cell (protein
    /// id column) is empty.
    pub fn write_csv<W: Write>(&self, w: W, format: &TableFormat) -> Result<(), ScoringError> {
        format.validate()?;
        let mut wtr = csv::WriterBuilder::new().delimiter(format.delimiter).from_writer(w);
        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(String::new());
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;
        for (protein, cells) in self.export().rows {
            let mut row = Vec::with_capacity(cells.len() + 1);
            row.push(protein);
            row.extend(cells.into_iter().map(|c| match c {
                Some(v) => v.to_cell(&format.missing),
                None => format.missing.clone(),
            }));
            wtr.write_record(&row)?;
        }
        wtr.flush().map_err(|e| ScoringError::Csv(e.into()))?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path, format: &TableFormat) -> Result<(), ScoringError> {
        let f = std::fs::File::create(path).map_err(|e| ScoringError::io(path, e))?;
        self.write_csv(std::io::BufWriter::new(f), format)
    }

    /// Read a table written by [`write_csv`](Self::write_csv) (or by any tool
    /// using the same layout). The first column is the protein id; cells
    /// equal to the missing marker are left out.
    pub fn read_csv<R: Read>(r: R, format: &TableFormat) -> Result<Self, ScoringError> {
        let mut table = ResultsTable::new();
        for rec in read_triples(r, format)? {
            table.record_metric(rec);
        }
        Ok(table)
    }
}

fn read_triples<R: Read>(r: R, format: &TableFormat) -> Result<Vec<MetricRecord>, ScoringError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(true)
        .from_reader(r);
    let columns: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_string).collect();
    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let Some(protein) = row.get(0) else { continue };
        for (col, cell) in columns.iter().zip(row.iter().skip(1)) {
            if cell == format.missing {
                continue;
            }
            out.push(MetricRecord::new(protein, col.as_str(), MetricValue::parse_cell(cell)));
        }
    }
    Ok(out)
}

/// Metrics computed by an external tool and saved as a table.
#[derive(Clone, Debug)]
pub struct CsvMetricsProducer {
    path: PathBuf,
    label: String,
    format: TableFormat,
}

impl CsvMetricsProducer {
    pub fn new(path: impl Into<PathBuf>, format: TableFormat) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label, format }
    }

    /// Fail early if the table is not there or its format is unusable.
    pub fn check_input(&self) -> Result<(), ScoringError> {
        self.format.validate()?;
        if !self.path.is_file() {
            return Err(ScoringError::MissingInputDirectory(self.path.clone()));
        }
        Ok(())
    }
}

impl MetricProducer for CsvMetricsProducer {
    fn name(&self) -> &str {
        &self.label
    }

    fn produce(&self) -> Result<Vec<MetricRecord>, ScoringError> {
        self.check_input()?;
        let f = std::fs::File::open(&self.path).map_err(|e| ScoringError::io(&self.path, e))?;
        read_triples(std::io::BufReader::new(f), &self.format)
    }
}
