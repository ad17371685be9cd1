//! Seed lookup backends over the reduced subject text.
//!
//! All three backends answer the same question: where does this exact
//! seed occur in the database? The SA backend binary-searches the suffix
//! array directly; the FM backend runs backward search over the BWT of
//! the concatenated text; the bidirectional variant carries a second FM
//! index over the mirrored text.

use std::cmp::Ordering;

use crate::alphabet::SequenceSet;
use crate::config::{DbIndexType, SortAlgorithm};
use crate::error::SearchError;

use super::sa_build::{build_suffix_array, SaEntry, SaProgress};

/// Occurrence-table checkpoint spacing for the FM backends.
const OCC_SAMPLE: usize = 32;

/// One raw seed occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    pub subj_id: u32,
    pub subj_offset: u32,
    pub qry_offset: u32,
    pub length: u32,
}

/// Suffix-array backend: the SA plus the text it indexes.
#[derive(Debug)]
pub struct SaIndex {
    text: SequenceSet,
    sa: Vec<SaEntry>,
}

impl SaIndex {
    fn build(text: SequenceSet, ord_size: usize, algo: SortAlgorithm, progress: &SaProgress) -> Self {
        let sa = build_suffix_array(&text, ord_size, algo, progress);
        Self { text, sa }
    }

    fn cmp_suffix_to_pattern(&self, e: SaEntry, pattern: &[u8]) -> Ordering {
        let s = &self.text.seq(e.0 as usize)[e.1 as usize..];
        let clipped = &s[..pattern.len().min(s.len())];
        clipped.cmp(pattern)
    }

    fn find(&self, pattern: &[u8], qry_offset: u32, out: &mut Vec<SeedHit>) {
        let lo = self
            .sa
            .partition_point(|&e| self.cmp_suffix_to_pattern(e, pattern) == Ordering::Less);
        let hi = lo
            + self.sa[lo..]
                .partition_point(|&e| self.cmp_suffix_to_pattern(e, pattern) == Ordering::Equal);
        for &(seq, off) in &self.sa[lo..hi] {
            // a clipped-equal suffix shorter than the pattern compares
            // Less, so everything in range really contains the seed
            out.push(SeedHit {
                subj_id: seq,
                subj_offset: off,
                qry_offset,
                length: pattern.len() as u32,
            });
        }
    }
}

/// FM backend over the sentinel-joined concatenation of all subjects.
#[derive(Debug)]
pub struct FmIndex {
    /// Concatenated text; each sequence is followed by the sentinel rank.
    bwt: Vec<u8>,
    sa: Vec<u32>,
    /// `c_table[s]` = number of text symbols lexicographically below `s`.
    c_table: Vec<u32>,
    /// Checkpointed symbol counts, one row per `OCC_SAMPLE` positions.
    occ: Vec<Vec<u32>>,
    /// Start offset of every sequence inside the concatenation.
    starts: Vec<u32>,
    sentinel: u8,
}

impl FmIndex {
    fn build(text: &SequenceSet, ord_size: usize) -> Result<Self, SearchError> {
        if ord_size >= u8::MAX as usize {
            return Err(SearchError::Index(format!(
                "alphabet with {ord_size} ranks cannot carry an FM sentinel"
            )));
        }
        let sentinel = ord_size as u8;
        let symbols = ord_size + 1;

        let mut concat = Vec::with_capacity(text.total_len() + text.len());
        let mut starts = Vec::with_capacity(text.len());
        for seq in text.iter() {
            starts.push(concat.len() as u32);
            concat.extend_from_slice(seq);
            concat.push(sentinel);
        }
        let n = concat.len();
        if n == 0 {
            return Err(SearchError::Index("empty subject database".into()));
        }

        // plain suffix sort of the concatenation; sentinels make every
        // suffix distinct enough for lookup purposes
        let mut sa: Vec<u32> = (0..n as u32).collect();
        sa.sort_unstable_by(|&a, &b| concat[a as usize..].cmp(&concat[b as usize..]));

        let mut bwt = Vec::with_capacity(n);
        for &pos in &sa {
            let p = pos as usize;
            bwt.push(if p == 0 { concat[n - 1] } else { concat[p - 1] });
        }

        let mut counts = vec![0u32; symbols];
        let mut occ = Vec::with_capacity(n / OCC_SAMPLE + 1);
        for (i, &c) in bwt.iter().enumerate() {
            if i % OCC_SAMPLE == 0 {
                occ.push(counts.clone());
            }
            counts[c as usize] += 1;
        }

        let mut c_table = vec![0u32; symbols + 1];
        for s in 0..symbols {
            c_table[s + 1] = c_table[s] + counts[s];
        }

        Ok(Self {
            bwt,
            sa,
            c_table,
            occ,
            starts,
            sentinel,
        })
    }

    /// Occurrences of `sym` in `bwt[..i]`.
    fn rank(&self, sym: u8, i: usize) -> u32 {
        // i == bwt.len() can land one block past the last checkpoint
        let block = (i / OCC_SAMPLE).min(self.occ.len() - 1);
        let mut r = self.occ[block][sym as usize];
        for &c in &self.bwt[block * OCC_SAMPLE..i] {
            if c == sym {
                r += 1;
            }
        }
        r
    }

    /// Backward search; returns the half-open SA interval of the pattern.
    fn interval(&self, pattern: &[u8]) -> Option<(usize, usize)> {
        let mut lo = 0usize;
        let mut hi = self.bwt.len();
        for &c in pattern.iter().rev() {
            if c >= self.sentinel {
                return None;
            }
            lo = self.c_table[c as usize] as usize + self.rank(c, lo) as usize;
            hi = self.c_table[c as usize] as usize + self.rank(c, hi) as usize;
            if lo >= hi {
                return None;
            }
        }
        Some((lo, hi))
    }

    fn locate(&self, text_pos: u32) -> (u32, u32) {
        let seq = self.starts.partition_point(|&s| s <= text_pos) - 1;
        (seq as u32, text_pos - self.starts[seq])
    }

    fn find(&self, pattern: &[u8], qry_offset: u32, out: &mut Vec<SeedHit>) {
        if let Some((lo, hi)) = self.interval(pattern) {
            for &pos in &self.sa[lo..hi] {
                let (subj_id, subj_offset) = self.locate(pos);
                out.push(SeedHit {
                    subj_id,
                    subj_offset,
                    qry_offset,
                    length: pattern.len() as u32,
                });
            }
        }
    }
}

/// The backend actually consumed by the search core.
#[derive(Debug)]
pub enum SeedIndex {
    Sa(SaIndex),
    Fm(FmIndex),
    /// Forward index plus an index of the per-sequence mirrored text.
    BiFm { fwd: FmIndex, rev: FmIndex },
}

impl SeedIndex {
    /// Build the configured backend over the (reduced) subject set.
    pub fn build(
        text: SequenceSet,
        ord_size: usize,
        index_type: DbIndexType,
        algo: SortAlgorithm,
        progress: &SaProgress,
    ) -> Result<Self, SearchError> {
        if text.is_empty() {
            return Err(SearchError::Index("subject database is empty".into()));
        }
        Ok(match index_type {
            DbIndexType::Sa => SeedIndex::Sa(SaIndex::build(text, ord_size, algo, progress)),
            DbIndexType::Fm => SeedIndex::Fm(FmIndex::build(&text, ord_size)?),
            DbIndexType::BiFm => {
                let mirrored = SequenceSet::new(
                    text.iter()
                        .map(|s| s.iter().rev().copied().collect())
                        .collect(),
                );
                SeedIndex::BiFm {
                    fwd: FmIndex::build(&text, ord_size)?,
                    rev: FmIndex::build(&mirrored, ord_size)?,
                }
            }
        })
    }

    /// All exact occurrences of `pattern`, appended to `out` as
    /// (subject-id, subject-offset, query-offset, length) tuples.
    pub fn find_seeds(&self, pattern: &[u8], qry_offset: u32, out: &mut Vec<SeedHit>) {
        if pattern.is_empty() {
            return;
        }
        match self {
            SeedIndex::Sa(sa) => sa.find(pattern, qry_offset, out),
            SeedIndex::Fm(fm) => fm.find(pattern, qry_offset, out),
            SeedIndex::BiFm { fwd, .. } => fwd.find(pattern, qry_offset, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(seqs: &[&[u8]]) -> SequenceSet {
        SequenceSet::new(seqs.iter().map(|s| s.to_vec()).collect())
    }

    fn build(index_type: DbIndexType, seqs: &[&[u8]]) -> SeedIndex {
        SeedIndex::build(
            set(seqs),
            5,
            index_type,
            SortAlgorithm::DefaultParallel,
            &SaProgress::default(),
        )
        .unwrap()
    }

    fn sorted_hits(index: &SeedIndex, pattern: &[u8]) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        index.find_seeds(pattern, 0, &mut out);
        let mut hits: Vec<(u32, u32)> = out.iter().map(|h| (h.subj_id, h.subj_offset)).collect();
        hits.sort_unstable();
        hits
    }

    // ranks: A=0 C=1 G=2 T=3
    const S0: &[u8] = &[0, 1, 2, 3, 0, 1, 2, 3]; // ACGTACGT
    const S1: &[u8] = &[2, 3, 0, 1, 2, 3, 3, 3]; // GTACGTTT

    #[test]
    fn sa_backend_finds_all_occurrences() {
        let idx = build(DbIndexType::Sa, &[S0, S1]);
        assert_eq!(
            sorted_hits(&idx, &[0, 1, 2]), // ACG
            vec![(0, 0), (0, 4), (1, 2)]
        );
        assert_eq!(sorted_hits(&idx, &[3, 3, 3]), vec![(1, 5)]);
        assert!(sorted_hits(&idx, &[1, 1, 1]).is_empty());
    }

    #[test]
    fn fm_backend_matches_sa_backend() {
        let sa = build(DbIndexType::Sa, &[S0, S1]);
        let fm = build(DbIndexType::Fm, &[S0, S1]);
        for pattern in [&[0u8, 1, 2][..], &[2, 3][..], &[3, 3][..], &[0, 0][..]] {
            assert_eq!(
                sorted_hits(&sa, pattern),
                sorted_hits(&fm, pattern),
                "backends disagree on {pattern:?}"
            );
        }
    }

    #[test]
    fn bifm_forward_side_answers_lookups() {
        let bi = build(DbIndexType::BiFm, &[S0, S1]);
        let sa = build(DbIndexType::Sa, &[S0, S1]);
        assert_eq!(sorted_hits(&bi, &[0, 1, 2]), sorted_hits(&sa, &[0, 1, 2]));
    }

    #[test]
    fn seeds_never_span_sequence_boundaries() {
        // S0 ends T, S1 starts G; TG must not be reported
        let fm = build(DbIndexType::Fm, &[S0, S1]);
        assert!(sorted_hits(&fm, &[3, 2]).is_empty());
    }

    #[test]
    fn empty_database_is_an_index_error() {
        let err = SeedIndex::build(
            SequenceSet::default(),
            5,
            DbIndexType::Sa,
            SortAlgorithm::DefaultParallel,
            &SaProgress::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::Index(_)));
    }

    #[test]
    fn hit_records_query_offset_and_length() {
        let idx = build(DbIndexType::Sa, &[S0]);
        let mut out = Vec::new();
        idx.find_seeds(&[0, 1, 2, 3], 7, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|h| h.qry_offset == 7 && h.length == 4));
    }
}
