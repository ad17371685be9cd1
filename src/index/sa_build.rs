//! Two-phase bucketed parallel suffix-array construction over a string
//! set.
//!
//! Phase 1 fills the array with the identity permutation and sorts it by a
//! q-gram comparator that only looks at a short prefix of every suffix;
//! the prefix depth depends on the alphabet size. A single scan then cuts
//! the array into equal-prefix buckets. Phase 2 refines each bucket
//! independently with a full suffix comparator that skips the already
//! sorted prefix; buckets are handed to worker threads one at a time.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rayon::prelude::*;

use crate::alphabet::SequenceSet;
use crate::config::SortAlgorithm;

/// One suffix of the string set: (sequence id, offset).
pub type SaEntry = (u32, u32);

/// Build progress observable from another thread.
///
/// The refinement loop bumps `done` once per bucket; `percent()` yields
/// the same `100 * i / |dir|` series a progress callback would have seen,
/// without any branching inside the comparators.
#[derive(Debug, Default)]
pub struct SaProgress {
    done: AtomicU64,
    total: AtomicU64,
}

impl SaProgress {
    pub fn percent(&self) -> u64 {
        let total = self.total.load(AtomicOrdering::Relaxed);
        if total == 0 {
            return 0;
        }
        100 * self.done.load(AtomicOrdering::Relaxed) / total
    }

    fn start(&self, total: u64) {
        self.total.store(total, AtomicOrdering::Relaxed);
        self.done.store(0, AtomicOrdering::Relaxed);
    }

    fn bump(&self) {
        self.done.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn finish(&self) {
        self.done
            .store(self.total.load(AtomicOrdering::Relaxed), AtomicOrdering::Relaxed);
    }
}

/// Prefix depth of the first sort phase, chosen from the alphabet size.
fn initial_sort_depth(ord_size: usize) -> usize {
    if ord_size <= 5 {
        10
    } else if ord_size < 10 {
        3
    } else {
        2
    }
}

#[inline]
fn suffix(text: &SequenceSet, e: SaEntry) -> &[u8] {
    &text.seq(e.0 as usize)[e.1 as usize..]
}

/// Prefix of a suffix, end-clipped at the sequence boundary.
#[inline]
fn clipped_prefix(text: &SequenceSet, e: SaEntry, depth: usize) -> &[u8] {
    let s = suffix(text, e);
    &s[..depth.min(s.len())]
}

/// Compare two suffixes by their first `depth` symbols only; a proper
/// prefix sorts first, content ties beyond the depth are left unresolved.
fn qgram_cmp(text: &SequenceSet, a: SaEntry, b: SaEntry, depth: usize) -> Ordering {
    clipped_prefix(text, a, depth).cmp(clipped_prefix(text, b, depth))
}

/// Full suffix comparison after skipping `skip` already-equal symbols.
///
/// Walks the shorter suffix to its end; a proper prefix compares less and
/// suffixes with identical content order by descending sequence id.
fn suffix_cmp(text: &SequenceSet, a: SaEntry, b: SaEntry, skip: usize) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let sa = suffix(text, a);
    let sb = suffix(text, b);
    let ta = &sa[skip.min(sa.len())..];
    let tb = &sb[skip.min(sb.len())..];
    match ta.cmp(tb) {
        Ordering::Equal => b.0.cmp(&a.0), // higher seq-id first
        ord => ord,
    }
}

fn phase1_sort(sa: &mut [SaEntry], text: &SequenceSet, depth: usize, algo: SortAlgorithm) {
    let cmp = |a: &SaEntry, b: &SaEntry| qgram_cmp(text, *a, *b, depth);
    match algo {
        // rayon's stable sort is a parallel merge sort, its unstable sort
        // a parallel pattern-defeating quicksort
        SortAlgorithm::MultiwayMergesort => sa.par_sort_by(cmp),
        SortAlgorithm::Quicksort | SortAlgorithm::DefaultParallel => sa.par_sort_unstable_by(cmp),
    }
}

/// Build the suffix array of `text`: a permutation of all (seq, offset)
/// pairs ordering the referenced suffixes lexicographically, proper
/// prefixes first, equal content broken by descending sequence id.
///
/// `ord_size` is the rank count of the text's alphabet. Construction is
/// infallible for well-formed input; it allocates one entry per residue
/// plus the bucket directory.
pub fn build_suffix_array(
    text: &SequenceSet,
    ord_size: usize,
    algo: SortAlgorithm,
    progress: &SaProgress,
) -> Vec<SaEntry> {
    let n = text.total_len();
    let depth = initial_sort_depth(ord_size);

    // identity permutation in (seq, offset) order
    let mut sa: Vec<SaEntry> = Vec::with_capacity(n);
    for (j, seq) in text.iter().enumerate() {
        for i in 0..seq.len() {
            sa.push((j as u32, i as u32));
        }
    }

    phase1_sort(&mut sa, text, depth, algo);

    // bucket directory: one cut wherever the clipped prefix changes
    let mut dir: Vec<usize> = Vec::new();
    dir.push(0);
    for j in 1..sa.len() {
        if clipped_prefix(text, sa[j], depth) != clipped_prefix(text, sa[j - 1], depth) {
            dir.push(j);
        }
    }
    dir.push(sa.len());

    progress.start(dir.len() as u64);

    // carve the array into disjoint bucket slices for the refinement pass
    let mut slices: Vec<&mut [SaEntry]> = Vec::with_capacity(dir.len() - 1);
    let mut rest = sa.as_mut_slice();
    for w in dir.windows(2) {
        let (bucket, tail) = std::mem::take(&mut rest).split_at_mut(w[1] - w[0]);
        slices.push(bucket);
        rest = tail;
    }

    // bucket grain of one: buckets differ wildly in size, so let the pool
    // steal them individually; each bucket sorts sequentially
    slices
        .into_par_iter()
        .with_max_len(1)
        .for_each(|bucket| {
            if bucket.len() > 1 {
                bucket.sort_unstable_by(|a, b| suffix_cmp(text, *a, *b, depth));
            }
            progress.bump();
        });

    progress.finish();
    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(seqs: &[&[u8]]) -> SequenceSet {
        SequenceSet::new(seqs.iter().map(|s| s.to_vec()).collect())
    }

    fn build(text: &SequenceSet, ord_size: usize) -> Vec<SaEntry> {
        build_suffix_array(
            text,
            ord_size,
            SortAlgorithm::DefaultParallel,
            &SaProgress::default(),
        )
    }

    #[test]
    fn depth_follows_alphabet_size() {
        assert_eq!(initial_sort_depth(5), 10);
        assert_eq!(initial_sort_depth(9), 3);
        assert_eq!(initial_sort_depth(10), 2);
        assert_eq!(initial_sort_depth(27), 2);
    }

    #[test]
    fn banana_reference_order() {
        let text = set(&[b"banana$"]);
        let sa = build(&text, 256);
        let offsets: Vec<u32> = sa.iter().map(|e| e.1).collect();
        assert_eq!(offsets, vec![6, 5, 3, 1, 0, 4, 2]);
    }

    #[test]
    fn output_is_a_permutation_in_suffix_order() {
        let text = set(&[b"ACGTACGTAC", b"CGTACG", b"TTTT"]);
        let sa = build(&text, 256);
        assert_eq!(sa.len(), text.total_len());

        let mut seen = std::collections::HashSet::new();
        for &e in &sa {
            assert!(seen.insert(e));
            assert!((e.1 as usize) < text.seq(e.0 as usize).len());
        }
        for w in sa.windows(2) {
            assert_ne!(
                suffix_cmp(&text, w[1], w[0], 0),
                Ordering::Less,
                "adjacent suffixes out of order: {:?} {:?}",
                w[0],
                w[1]
            );
        }
    }

    #[test]
    fn equal_suffixes_order_by_descending_seq_id() {
        // identical sequences: every suffix of seq 1 equals the matching
        // suffix of seq 0 and must come first
        let text = set(&[b"ACAC", b"ACAC"]);
        let sa = build(&text, 256);
        for pair in sa.chunks(2) {
            assert_eq!(pair[0].1, pair[1].1);
            assert!(pair[0].0 > pair[1].0);
        }
    }

    #[test]
    fn proper_prefix_sorts_first() {
        let text = set(&[b"AB", b"ABAB"]);
        let sa = build(&text, 256);
        // suffix "AB" (either string) must precede "ABAB"
        let pos_short = sa.iter().position(|&e| e == (0, 0)).unwrap();
        let pos_long = sa.iter().position(|&e| e == (1, 0)).unwrap();
        assert!(pos_short < pos_long);
    }

    #[test]
    fn construction_is_deterministic() {
        let text = set(&[b"GATTACA", b"TACAGAT", b"AAAA"]);
        let a = build(&text, 5);
        let b = build(&text, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn all_sort_algorithms_agree() {
        let text = set(&[b"MISSISSIPPI", b"SIPPIS"]);
        let p = SaProgress::default();
        let q = build_suffix_array(&text, 256, SortAlgorithm::Quicksort, &p);
        let m = build_suffix_array(&text, 256, SortAlgorithm::MultiwayMergesort, &p);
        let d = build_suffix_array(&text, 256, SortAlgorithm::DefaultParallel, &p);
        assert_eq!(q, m);
        assert_eq!(m, d);
    }

    #[test]
    fn progress_reaches_total() {
        let text = set(&[b"ACGTACGT"]);
        let p = SaProgress::default();
        build_suffix_array(&text, 5, SortAlgorithm::DefaultParallel, &p);
        assert_eq!(p.percent(), 100);
    }
}
