//! Seed-anchored banded local Smith-Waterman with affine or linear gaps
//! and full traceback.
//!
//! The DP is restricted to diagonals `lower_diag ..= upper_diag` (diagonal
//! of cell (i, j) is `j - i`). Free end gaps on both sequences and both
//! ends come with locality: any in-band cell may start or end the
//! alignment.

use rustc_hash::FxHashMap;

use super::scoring::ScoringScheme;

/// Band value meaning "no band at all".
pub const UNBANDED: i32 = i32::MAX;

const NEG_INF: i32 = i32::MIN / 2;

/// Resolve the adaptive band width for a sequence length.
///
/// * `-1` — unbanded
/// * `-2` — `floor(sqrt(len))`, memoized per length
/// * `-3` — `ceil(log2(len))`, memoized per length
/// * `>= 0` — constant
///
/// The memo is worker-local; the band option never changes mid-search, so
/// one table serves both adaptive policies.
pub fn band_width(band: i32, seq_len: usize, memo: &mut FxHashMap<usize, i32>) -> i32 {
    match band {
        -3 | -2 => *memo.entry(seq_len).or_insert_with(|| {
            if band == -3 {
                (seq_len as f64).log2().ceil() as i32
            } else {
                (seq_len as f64).sqrt().floor() as i32
            }
        }),
        -1 => UNBANDED,
        _ => band,
    }
}

/// One column of the emitted alignment, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Match,
    Mismatch,
    /// Subject residue aligned against a gap in the query.
    GapInQuery,
    /// Query residue aligned against a gap in the subject.
    GapInSubject,
}

/// Result of one banded extension. Coordinates are 0-based, ends
/// exclusive, relative to the slices handed to the kernel.
#[derive(Debug, Clone, Default)]
pub struct AlignOutcome {
    pub score: i32,
    pub q_start: usize,
    pub q_end: usize,
    pub s_start: usize,
    pub s_end: usize,
    pub ops: Vec<EditOp>,
}

impl AlignOutcome {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn matches(&self) -> usize {
        self.ops.iter().filter(|&&o| o == EditOp::Match).count()
    }

    pub fn mismatches(&self) -> usize {
        self.ops.iter().filter(|&&o| o == EditOp::Mismatch).count()
    }

    pub fn align_len(&self) -> usize {
        self.ops.len()
    }

    /// Gap runs; adjacent runs of different orientation count separately.
    pub fn gap_opens(&self) -> usize {
        let mut opens = 0;
        let mut prev = None;
        for &op in &self.ops {
            if matches!(op, EditOp::GapInQuery | EditOp::GapInSubject) && prev != Some(op) {
                opens += 1;
            }
            prev = Some(op);
        }
        opens
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Dir {
    Stop,
    Diag,
    Up,
    Left,
}

/// Banded local alignment of `query` (row 0) against `subject` (row 1).
///
/// With `band == UNBANDED` callers pass `lower_diag = -(query.len())` and
/// `upper_diag = subject.len()`. The returned score is never negative; a
/// zero score is the empty alignment. On backtrack ties gaps win over the
/// diagonal, vertical before horizontal, which left-aligns gap runs.
pub fn banded_local_align(
    query: &[u8],
    subject: &[u8],
    scheme: &ScoringScheme,
    lower_diag: i64,
    upper_diag: i64,
    linear_gaps: bool,
) -> AlignOutcome {
    let qlen = query.len();
    let slen = subject.len();
    if qlen == 0 || slen == 0 || lower_diag > upper_diag {
        return AlignOutcome::default();
    }

    let ge = scheme.gap_extend();
    let open_cost = if linear_gaps {
        ge
    } else {
        scheme.gap_open() + ge
    };

    let cols = slen + 1;
    let mut h_prev = vec![0i32; cols];
    let mut h_curr = vec![NEG_INF; cols];
    let mut e = vec![NEG_INF; cols];
    let mut dirs = vec![Dir::Stop as u8; (qlen + 1) * cols];

    let mut best = (0i32, 0usize, 0usize);

    for i in 1..=qlen {
        h_curr.fill(NEG_INF);
        h_curr[0] = 0;
        let mut f = NEG_INF;

        let j_lo = (i as i64 + lower_diag).max(1) as usize;
        let j_hi = (i as i64 + upper_diag).min(slen as i64);
        if j_hi < j_lo as i64 {
            std::mem::swap(&mut h_prev, &mut h_curr);
            continue;
        }

        for j in j_lo..=(j_hi as usize) {
            // h_prev carries 0 on the boundary row/column, NEG_INF on
            // out-of-band cells, so no extra gating is needed here
            let m = h_prev[j - 1].saturating_add(scheme.score(query[i - 1], subject[j - 1]));

            let up = if linear_gaps {
                h_prev[j].saturating_add(ge)
            } else {
                e[j] = (h_prev[j].saturating_add(open_cost)).max(e[j].saturating_add(ge));
                e[j]
            };
            let left = if linear_gaps {
                h_curr[j - 1].saturating_add(ge)
            } else {
                f = (h_curr[j - 1].saturating_add(open_cost)).max(f.saturating_add(ge));
                f
            };

            let score = m.max(up).max(left).max(0);
            h_curr[j] = score;

            let dir = if score == 0 {
                Dir::Stop
            } else if score == up {
                Dir::Up
            } else if score == left {
                Dir::Left
            } else {
                Dir::Diag
            };
            dirs[i * cols + j] = dir as u8;

            if score > best.0 {
                best = (score, i, j);
            }
        }
        std::mem::swap(&mut h_prev, &mut h_curr);
    }

    let (score, mut i, mut j) = best;
    if score == 0 {
        return AlignOutcome::default();
    }

    let (q_end, s_end) = (i, j);
    let mut ops = Vec::new();
    while i > 0 && j > 0 {
        match dirs[i * cols + j] {
            d if d == Dir::Diag as u8 => {
                ops.push(if query[i - 1] == subject[j - 1] {
                    EditOp::Match
                } else {
                    EditOp::Mismatch
                });
                i -= 1;
                j -= 1;
            }
            d if d == Dir::Up as u8 => {
                ops.push(EditOp::GapInSubject);
                i -= 1;
            }
            d if d == Dir::Left as u8 => {
                ops.push(EditOp::GapInQuery);
                j -= 1;
            }
            _ => break,
        }
    }
    ops.reverse();

    AlignOutcome {
        score,
        q_start: i,
        q_end,
        s_start: j,
        s_end,
        ops,
    }
}
