//! Worker-local seed match store and the hyper-sort that prepares it for
//! extension.
//!
//! The hyper-sort runs in three steps: a plain lexicographic sort, one
//! sweep that cuts the array into (true query, subject group) intervals,
//! and a stable reorder of the intervals by descending size through a
//! scratch buffer. Densest intervals come first, so the duplicate and
//! abundance heuristics see the hottest work early and extension stays on
//! warm subject data.

use std::cmp::Ordering;

/// One seed hit, ids frame-expanded.
///
/// Invariants: `length > 0`, `qry_start + length` within the query frame,
/// `subj_start + length` within the subject frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedMatch {
    pub qry_id: u32,
    pub subj_id: u32,
    pub qry_start: u32,
    pub subj_start: u32,
    pub length: u32,
}

impl SeedMatch {
    pub fn true_qry_id(&self, q_num_frames: u32) -> u32 {
        self.qry_id / q_num_frames
    }

    pub fn subject_group(&self, s_num_frames: u32) -> u32 {
        self.subj_id / s_num_frames
    }

    /// Diagonal of the seed inside its (query frame, subject frame) pair.
    pub fn diagonal(&self) -> i64 {
        self.subj_start as i64 - self.qry_start as i64
    }
}

impl Ord for SeedMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.qry_id, self.subj_id, self.qry_start, self.subj_start).cmp(&(
            other.qry_id,
            other.subj_id,
            other.qry_start,
            other.subj_start,
        ))
    }
}

impl PartialOrd for SeedMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A maximal run of sorted matches sharing true query id and subject
/// group. Transient; only meaningful against the array it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortInterval {
    pub true_qry_id: u32,
    pub begin: usize,
    pub end: usize,
}

impl SortInterval {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// Sort, group and reorder the match array; returns the intervals in
/// their final positions.
///
/// `scratch` is reused across blocks and grows to the live array size.
/// Idempotent: a second application leaves the array unchanged.
pub fn hyper_sort(
    matches: &mut Vec<SeedMatch>,
    scratch: &mut Vec<SeedMatch>,
    q_num_frames: u32,
    s_num_frames: u32,
) -> Vec<SortInterval> {
    if matches.is_empty() {
        return Vec::new();
    }

    matches.sort_unstable();

    let mut intervals: Vec<SortInterval> = Vec::new();
    for i in 1..=matches.len() {
        let cut = i == matches.len()
            || matches[i - 1].qry_id != matches[i].qry_id
            || matches[i - 1].subject_group(s_num_frames) != matches[i].subject_group(s_num_frames);
        if cut {
            let begin = intervals.last().map(|iv| iv.end).unwrap_or(0);
            intervals.push(SortInterval {
                true_qry_id: matches[i - 1].true_qry_id(q_num_frames),
                begin,
                end: i,
            });
        }
    }

    // size ties keep their lexicographic order
    intervals.sort_by(|a, b| b.len().cmp(&a.len()));

    scratch.clear();
    scratch.reserve(matches.len());
    let mut rebuilt = Vec::with_capacity(intervals.len());
    for iv in &intervals {
        let begin = scratch.len();
        scratch.extend_from_slice(&matches[iv.begin..iv.end]);
        rebuilt.push(SortInterval {
            true_qry_id: iv.true_qry_id,
            begin,
            end: scratch.len(),
        });
    }
    std::mem::swap(matches, scratch);
    rebuilt
}

/// Symmetric Hamming distance over two equal-length windows.
pub fn quick_hamming(s1: &[u8], s2: &[u8]) -> u64 {
    assert_eq!(s1.len(), s2.len());
    s1.iter().zip(s2).filter(|(a, b)| a != b).count() as u64
}

/// Collapse same-diagonal sibling seeds of one interval.
///
/// Two seeds on the same diagonal whose gap is at most one seed length
/// merge into a single longer seed when the bridged residues agree on at
/// least half their positions. Input must be sorted (it is, inside an
/// interval).
pub fn merge_sibling_seeds(seeds: &[SeedMatch], query: &[u8], subject: &[u8]) -> Vec<SeedMatch> {
    let mut merged: Vec<SeedMatch> = Vec::with_capacity(seeds.len());
    for &seed in seeds {
        if let Some(prev) = merged.last_mut() {
            let same_pair = prev.qry_id == seed.qry_id && prev.subj_id == seed.subj_id;
            if same_pair && prev.diagonal() == seed.diagonal() {
                let prev_end = (prev.qry_start + prev.length) as usize;
                // overlapping seeds have an empty bridge
                let gap = (seed.qry_start as usize).saturating_sub(prev_end);
                if gap <= seed.length as usize {
                    let s_from = (prev.subj_start + prev.length) as usize;
                    let bridge_ok = gap == 0
                        || quick_hamming(
                            &query[prev_end..prev_end + gap],
                            &subject[s_from..s_from + gap],
                        ) * 2
                            <= gap as u64;
                    if bridge_ok {
                        let new_end = seed.qry_start + seed.length;
                        if new_end > prev.qry_start + prev.length {
                            prev.length = new_end - prev.qry_start;
                        }
                        continue;
                    }
                }
            }
        }
        merged.push(seed);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(qry_id: u32, subj_id: u32, qry_start: u32, subj_start: u32) -> SeedMatch {
        SeedMatch {
            qry_id,
            subj_id,
            qry_start,
            subj_start,
            length: 4,
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut v = vec![m(1, 0, 0, 0), m(0, 1, 0, 0), m(0, 0, 5, 0), m(0, 0, 0, 9)];
        v.sort_unstable();
        assert_eq!(v[0], m(0, 0, 0, 9));
        assert_eq!(v[1], m(0, 0, 5, 0));
        assert_eq!(v[2], m(0, 1, 0, 0));
        assert_eq!(v[3], m(1, 0, 0, 0));
    }

    #[test]
    fn empty_input_early_returns() {
        let mut matches = Vec::new();
        let mut scratch = Vec::new();
        assert!(hyper_sort(&mut matches, &mut scratch, 1, 1).is_empty());
        assert!(matches.is_empty());
    }

    #[test]
    fn grouping_follows_query_and_subject_group() {
        // (qryId, subjId) pairs from the reference scenario
        let mut matches = vec![m(0, 0, 0, 0), m(0, 0, 1, 0), m(0, 1, 0, 0), m(1, 2, 0, 0),
                               m(1, 2, 1, 0), m(1, 2, 2, 0)];
        let mut scratch = Vec::new();
        let ivs = hyper_sort(&mut matches, &mut scratch, 1, 1);
        // subjId 0 and 1 are distinct groups with sNumFrames = 1
        assert_eq!(ivs.len(), 3);
        let sizes: Vec<usize> = ivs.iter().map(|iv| iv.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        assert_eq!(ivs[0].true_qry_id, 1);
    }

    #[test]
    fn subject_frames_share_a_group() {
        // with two frames per subject, subjIds 0 and 1 collapse into one
        // group and the two queries yield one size-3 interval each; the
        // size tie keeps them in lexicographic order
        let mut matches = vec![m(0, 0, 0, 0), m(0, 0, 1, 0), m(0, 1, 0, 0), m(1, 2, 0, 0),
                               m(1, 2, 1, 0), m(1, 2, 2, 0)];
        let snapshot = {
            let mut s = matches.clone();
            s.sort_unstable();
            s
        };
        let mut scratch = Vec::new();
        let ivs = hyper_sort(&mut matches, &mut scratch, 1, 2);
        assert_eq!(ivs.len(), 2);
        assert_eq!((ivs[0].true_qry_id, ivs[0].begin, ivs[0].end), (0, 0, 3));
        assert_eq!((ivs[1].true_qry_id, ivs[1].begin, ivs[1].end), (1, 3, 6));
        assert_eq!(matches, snapshot);
    }

    #[test]
    fn size_ties_are_stable() {
        let mut matches = vec![m(0, 0, 0, 0), m(0, 0, 1, 0), m(0, 0, 2, 0),
                               m(1, 2, 0, 0), m(1, 2, 1, 0), m(1, 2, 2, 0)];
        let snapshot = {
            let mut s = matches.clone();
            s.sort_unstable();
            s
        };
        let mut scratch = Vec::new();
        let ivs = hyper_sort(&mut matches, &mut scratch, 1, 1);
        // two intervals of size three: order unchanged
        assert_eq!(ivs.len(), 2);
        assert_eq!(ivs[0].true_qry_id, 0);
        assert_eq!(matches, snapshot);
    }

    #[test]
    fn intervals_tile_the_array() {
        let mut matches = vec![
            m(0, 0, 0, 0), m(0, 3, 0, 0), m(0, 3, 1, 0), m(2, 1, 0, 0),
            m(2, 1, 2, 0), m(2, 1, 3, 0), m(2, 5, 0, 0),
        ];
        let mut scratch = Vec::new();
        let ivs = hyper_sort(&mut matches, &mut scratch, 1, 1);
        let mut covered = 0;
        for iv in &ivs {
            assert_eq!(iv.begin, covered);
            covered = iv.end;
            let inner = &matches[iv.begin..iv.end];
            assert!(inner.windows(2).all(|w| w[0] <= w[1]));
        }
        assert_eq!(covered, matches.len());
        // descending sizes
        assert!(ivs.windows(2).all(|w| w[0].len() >= w[1].len()));
    }

    #[test]
    fn hyper_sort_is_idempotent() {
        let mut matches = vec![
            m(0, 0, 3, 1), m(0, 0, 0, 0), m(1, 2, 0, 0), m(1, 2, 1, 0),
            m(0, 1, 0, 0), m(3, 0, 0, 0),
        ];
        let mut scratch = Vec::new();
        let first_ivs = hyper_sort(&mut matches, &mut scratch, 1, 1);
        let after_first = matches.clone();
        let second_ivs = hyper_sort(&mut matches, &mut scratch, 1, 1);
        assert_eq!(matches, after_first);
        assert_eq!(first_ivs, second_ivs);
    }

    #[test]
    fn frame_collapse_arithmetic() {
        let seed = m(13, 37, 0, 0);
        assert_eq!(seed.true_qry_id(6), 2);
        assert_eq!(seed.subject_group(6), 6);
        assert_eq!(m(13, 38, 0, 0).subject_group(6), 6);
        assert_eq!(m(13, 42, 0, 0).subject_group(6), 7);
    }

    #[test]
    fn hamming_properties() {
        assert_eq!(quick_hamming(b"ACGT", b"ACGT"), 0);
        assert_eq!(quick_hamming(b"ACGT", b"ACGA"), 1);
        assert_eq!(quick_hamming(b"ACGT", b"TGCA"), quick_hamming(b"TGCA", b"ACGT"));
    }

    #[test]
    #[should_panic]
    fn hamming_rejects_unequal_lengths() {
        quick_hamming(b"ACG", b"ACGT");
    }

    #[test]
    fn sibling_seeds_merge_on_clean_bridge() {
        //            0123456789
        let query = b"AAAACGGGGT";
        let subject = b"AAAACGGGGT";
        let a = SeedMatch { qry_id: 0, subj_id: 0, qry_start: 0, subj_start: 0, length: 4 };
        let b = SeedMatch { qry_id: 0, subj_id: 0, qry_start: 6, subj_start: 6, length: 4 };
        let merged = merge_sibling_seeds(&[a, b], query, subject);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].qry_start, 0);
        assert_eq!(merged[0].length, 10);
    }

    #[test]
    fn different_diagonals_do_not_merge() {
        let query = b"AAAACGGGGTTT";
        let subject = b"AAAACGGGGTTT";
        let a = SeedMatch { qry_id: 0, subj_id: 0, qry_start: 0, subj_start: 0, length: 4 };
        let b = SeedMatch { qry_id: 0, subj_id: 0, qry_start: 6, subj_start: 7, length: 4 };
        assert_eq!(merge_sibling_seeds(&[a, b], query, subject).len(), 2);
    }
}
