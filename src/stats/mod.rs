//! Karlin-Altschul statistics: parameter tables, bit scores, E-values and
//! the per-worker length-adjustment cache.

pub mod length_adjustment;

pub use length_adjustment::compute_length_adjustment;

use rustc_hash::FxHashMap;

/// Karlin-Altschul parameters for one scoring scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KarlinParams {
    pub lambda: f64,
    pub k: f64,
    pub h: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// (gap_open, gap_extend, lambda, K, H, alpha, beta) rows lifted from the
/// published BLAST parameter tables. Gap costs are stored as magnitudes.
struct ParamRow {
    gap_open: i32,
    gap_extend: i32,
    lambda: f64,
    k: f64,
    h: f64,
    alpha: f64,
    beta: f64,
}

impl ParamRow {
    const fn new(
        gap_open: i32,
        gap_extend: i32,
        lambda: f64,
        k: f64,
        h: f64,
        alpha: f64,
        beta: f64,
    ) -> Self {
        Self {
            gap_open,
            gap_extend,
            lambda,
            k,
            h,
            alpha,
            beta,
        }
    }

    fn params(&self) -> KarlinParams {
        KarlinParams {
            lambda: self.lambda,
            k: self.k,
            h: self.h,
            alpha: self.alpha,
            beta: self.beta,
        }
    }
}

/// BLOSUM62 rows; the (0,0) row holds the ungapped values.
const BLOSUM62_ROWS: &[ParamRow] = &[
    ParamRow::new(0, 0, 0.3176, 0.134, 0.4012, 0.7916, -3.2),
    ParamRow::new(11, 1, 0.267, 0.041, 0.14, 1.9, -30.0),
    ParamRow::new(10, 1, 0.243, 0.024, 0.10, 2.5, -38.0),
    ParamRow::new(12, 1, 0.283, 0.059, 0.19, 1.5, -21.0),
    ParamRow::new(9, 2, 0.286, 0.058, 0.19, 1.5, -19.0),
    ParamRow::new(8, 2, 0.270, 0.035, 0.12, 2.1, -28.0),
];

/// reward=1, penalty=-2 nucleotide rows.
const NUCL_1_2_ROWS: &[ParamRow] = &[
    ParamRow::new(0, 0, 1.28, 0.46, 0.85, 1.5, -2.0),
    ParamRow::new(2, 2, 1.19, 0.34, 0.66, 1.8, -3.0),
    ParamRow::new(3, 2, 1.25, 0.42, 0.80, 1.6, -2.0),
];

/// reward=1, penalty=-3 nucleotide rows.
const NUCL_1_3_ROWS: &[ParamRow] = &[
    ParamRow::new(0, 0, 1.374, 0.711, 1.31, 1.05, 0.0),
    ParamRow::new(2, 2, 1.37, 0.70, 1.2, 1.1, 0.0),
    ParamRow::new(2, 1, 1.34, 0.60, 1.1, 1.2, -1.0),
    ParamRow::new(1, 1, 1.21, 0.34, 0.71, 1.7, -2.0),
];

fn closest_row(rows: &[ParamRow], gap_open: i32, gap_extend: i32) -> KarlinParams {
    let go = gap_open.abs();
    let ge = gap_extend.abs();
    if go == 0 && ge == 0 {
        return rows[0].params();
    }
    rows.iter()
        .skip(1)
        .min_by_key(|r| (r.gap_open - go).abs() * 4 + (r.gap_extend - ge).abs())
        .unwrap_or(&rows[0])
        .params()
}

/// Gapped (or, with zero costs, ungapped) parameters for a protein search
/// scored with BLOSUM62.
pub fn protein_params(gap_open: i32, gap_extend: i32) -> KarlinParams {
    closest_row(BLOSUM62_ROWS, gap_open, gap_extend)
}

/// Parameters for a nucleotide search with the given reward/penalty pair.
pub fn nucl_params(reward: i32, penalty: i32, gap_open: i32, gap_extend: i32) -> KarlinParams {
    let rows = match (reward, penalty) {
        (1, -3) => NUCL_1_3_ROWS,
        _ => NUCL_1_2_ROWS,
    };
    closest_row(rows, gap_open, gap_extend)
}

/// S' = (lambda * S - ln K) / ln 2
pub fn bit_score(raw_score: i32, params: &KarlinParams) -> f64 {
    (params.lambda * raw_score as f64 - params.k.ln()) / std::f64::consts::LN_2
}

/// E = m * n * K * exp(-lambda * S)
pub fn e_value_for_space(raw_score: i32, m: f64, n: f64, params: &KarlinParams) -> f64 {
    m * n * params.k * (-params.lambda * raw_score as f64).exp()
}

/// Per-worker statistics context.
///
/// Owns the length-adjustment cache so no two workers ever share mutable
/// state; identical query lengths are recomputed at most once per worker.
#[derive(Debug, Clone)]
pub struct StatsContext {
    pub params: KarlinParams,
    pub db_total_len: u64,
    pub db_num_seqs: u64,
    /// 3 when the query is translated, 1 otherwise.
    pub query_len_divisor: u64,
    adjustments: FxHashMap<u64, u64>,
}

impl StatsContext {
    pub fn new(
        params: KarlinParams,
        db_total_len: u64,
        db_num_seqs: u64,
        query_is_translated: bool,
    ) -> Self {
        Self {
            params,
            db_total_len,
            db_num_seqs,
            query_len_divisor: if query_is_translated { 3 } else { 1 },
            adjustments: FxHashMap::default(),
        }
    }

    /// Length adjustment for a physical query length, memoized on the
    /// post-translation length.
    pub fn length_adjustment(&mut self, query_len: u64) -> u64 {
        let ql = query_len / self.query_len_divisor;
        let params = self.params;
        let db_len = self.db_total_len;
        let db_seqs = self.db_num_seqs;
        *self
            .adjustments
            .entry(ql)
            .or_insert_with(|| compute_length_adjustment(ql, db_len, db_seqs, &params))
    }

    /// E-value of a raw score for a query of the given physical length.
    pub fn e_value(&mut self, raw_score: i32, query_len: u64) -> f64 {
        let ql = query_len / self.query_len_divisor;
        let adj = self.length_adjustment(query_len);
        let m = ql.saturating_sub(adj).max(1) as f64;
        let n = self.db_total_len.saturating_sub(adj).max(1) as f64;
        e_value_for_space(raw_score, m, n, &self.params)
    }

    pub fn bit_score(&self, raw_score: i32) -> f64 {
        bit_score(raw_score, &self.params)
    }

    /// Cache entries computed so far (used by tests and diagnostics).
    pub fn cached_adjustments(&self) -> usize {
        self.adjustments.len()
    }
}
