//! The sink boundary: the driver hands finished match records to a
//! `MatchSink`; serialization details live entirely on this side.

use std::io::Write;

use anyhow::Result;

/// One reported local alignment, fully scored and annotated.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub query_name: String,
    pub subject_name: String,
    /// True (frame-collapsed) ids.
    pub query_idx: u32,
    pub subject_idx: u32,
    /// 1..3 / -1..-3 for translated searches, 0 otherwise.
    pub query_frame: i8,
    pub subject_frame: i8,
    /// Percent identity over the alignment columns.
    pub identity: f64,
    pub align_len: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    /// 1-based, inclusive, in frame coordinates.
    pub q_start: usize,
    pub q_end: usize,
    pub s_start: usize,
    pub s_end: usize,
    pub raw_score: i32,
    pub bit_score: f64,
    pub e_value: f64,
    /// Lowest common ancestor over the query's hits, when taxonomy is on.
    pub taxon: Option<u32>,
}

/// Where finished matches go. Implementations own buffering and format.
pub trait MatchSink: Send {
    fn write_match(&mut self, record: &MatchRecord) -> Result<()>;

    /// Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// BLAST tabular (outfmt 6) with an optional trailing taxid column.
pub struct TabularSink<W: Write + Send> {
    out: W,
    with_taxid: bool,
}

impl<W: Write + Send> TabularSink<W> {
    pub fn new(out: W, with_taxid: bool) -> Self {
        Self { out, with_taxid }
    }
}

impl<W: Write + Send> MatchSink for TabularSink<W> {
    fn write_match(&mut self, r: &MatchRecord) -> Result<()> {
        write!(
            self.out,
            "{}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1e}\t{:.1}",
            r.query_name,
            r.subject_name,
            r.identity,
            r.align_len,
            r.mismatches,
            r.gap_opens,
            r.q_start,
            r.q_end,
            r.s_start,
            r.s_end,
            r.e_value,
            r.bit_score
        )?;
        if self.with_taxid {
            match r.taxon {
                Some(t) => write!(self.out, "\t{t}")?,
                None => write!(self.out, "\t-")?,
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Minimal pairwise-style report: one stanza per match.
pub struct PairwiseSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> PairwiseSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> MatchSink for PairwiseSink<W> {
    fn write_match(&mut self, r: &MatchRecord) -> Result<()> {
        writeln!(self.out, "Query= {}", r.query_name)?;
        writeln!(self.out, "> {}", r.subject_name)?;
        writeln!(
            self.out,
            " Score = {:.1} bits ({}),  Expect = {:.1e}",
            r.bit_score, r.raw_score, r.e_value
        )?;
        writeln!(
            self.out,
            " Identities = {}/{} ({:.0}%),  Gaps = {}",
            r.align_len - r.mismatches - gap_columns(r),
            r.align_len,
            r.identity,
            gap_columns(r)
        )?;
        writeln!(
            self.out,
            " Query {}..{}  Sbjct {}..{}  Frames {}/{}",
            r.q_start, r.q_end, r.s_start, r.s_end, r.query_frame, r.subject_frame
        )?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

fn gap_columns(r: &MatchRecord) -> usize {
    let aligned = (r.q_end + 1 - r.q_start) + (r.s_end + 1 - r.s_start);
    (2 * r.align_len).saturating_sub(aligned)
}

/// Collects records in memory; handy for tests and for the LCA pass.
#[derive(Default)]
pub struct VecSink {
    pub records: Vec<MatchRecord>,
}

impl MatchSink for VecSink {
    fn write_match(&mut self, record: &MatchRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
