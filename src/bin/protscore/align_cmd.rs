use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Args;
use protscore::*;

use crate::alignment_args::AlignmentArgs;

/// Options for the `align` subcommand.
#[derive(Debug, Args)]
pub struct AlignCmd {
    /// Target FASTA file (first record used).
    #[arg(long, value_name="FILE")]
    pub asequence: PathBuf,
    /// Reference FASTA file (first record used).
    #[arg(long, value_name="FILE")]
    pub bsequence: PathBuf,
    #[command(flatten)]
    pub alignment: AlignmentArgs,
    /// Output file for a human-readable alignment.
    #[arg(long, default_value="needle.txt")]
    pub outfile: PathBuf,
}

pub fn run(cmd: AlignCmd) -> Result<()> {
    let params = cmd.alignment.load()?.needle_params()?;

    // Read first record from each FASTA
    let read_first = |path: &PathBuf| -> Result<FastaRecord> {
        let mut s = String::new();
        File::open(path).with_context(|| format!("open FASTA: {}", path.display()))?.read_to_string(&mut s)?;
        let recs = parse_fasta(&s, &path.display().to_string())?;
        recs.into_iter().next().ok_or_else(|| anyhow::anyhow!("no FASTA records in {}", path.display()))
    };
    let a = read_first(&cmd.asequence)?;
    let b = read_first(&cmd.bsequence)?;

    let aln = needle(&a.seq, &b.seq, &params)?;
    let mutated = mutated_positions(&a.seq, &b.seq, &aln, &params)?;
    let identity = aln.identities as f64 / a.seq.len() as f64;

    let mut f = File::create(&cmd.outfile).with_context(|| format!("create {}", cmd.outfile.display()))?;
    writeln!(f, "# protscore global alignment")?;
    writeln!(f, "# A: {} (len {})", a.id, a.seq.len())?;
    writeln!(f, "# B: {} (len {})", b.id, b.seq.len())?;
    writeln!(f, "# Matrix: {}  Gap open: {}  Gap extend: {}", params.matrix.name(), params.gap_open, params.gap_extend)?;
    writeln!(f, "Score: {}", aln.score)?;
    writeln!(f, "Identity: {}/{} ({:.2}%)   Gaps: {:.2}%", aln.identities, aln.len(), aln.pct_identity, aln.pct_gaps)?;
    writeln!(f, "Identity to B over A length: {:.4}", identity)?;
    writeln!(f, "CIGAR: {}", aln.cigar)?;
    if mutated.is_empty() {
        writeln!(f, "Mutated positions: none")?;
    } else {
        let mean = mutated.iter().map(|m| m.score as f64).sum::<f64>() / mutated.len() as f64;
        writeln!(f, "Mutated positions: {}  mean substitution score: {:.4}", mutated.len(), mean)?;
        for m in &mutated {
            writeln!(f, "  {}{}{} ({})", m.reference_residue, m.target_pos + 1, m.target_residue, m.score)?;
        }
    }
    writeln!(f)?;
    // Blocked alignment printing (60 cols)
    let a_chars: Vec<char> = aln.align_a.chars().collect();
    let b_chars: Vec<char> = aln.align_b.chars().collect();
    let mut i = 0usize;
    while i < a_chars.len() {
        let end = (i + 60).min(a_chars.len());
        let a_block: String = a_chars[i..end].iter().collect();
        let b_block: String = b_chars[i..end].iter().collect();
        let mid: String = a_chars[i..end].iter().zip(b_chars[i..end].iter()).map(|(x, y)| {
            if *x == '-' || *y == '-' { ' ' } else if x.eq_ignore_ascii_case(y) { '|' } else { '.' }
        }).collect();
        writeln!(f, "A {}", a_block)?;
        writeln!(f, "  {}", mid)?;
        writeln!(f, "B {}", b_block)?;
        writeln!(f)?;
        i = end;
    }
    Ok(())
}
