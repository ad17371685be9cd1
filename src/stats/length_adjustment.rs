//! Iterative length-adjustment fixpoint.
//!
//! Alignments cannot run past sequence boundaries, so the effective search
//! space is smaller than `query_len * db_len`. The correction is the fixed
//! point of
//!
//! ```text
//! ell = alpha/lambda * (ln K + ln((m - ell) * (n - N * ell))) + beta
//! ```
//!
//! found by a bounded bisection-like iteration. The result is a pure
//! function of its inputs; two invocations agree bitwise.

use super::KarlinParams;

const MAX_ITERATIONS: u32 = 20;

/// Compute the length adjustment for a query of (post-translation) length
/// `query_len` against a database of `db_num_seqs` sequences totalling
/// `db_len` residues.
pub fn compute_length_adjustment(
    query_len: u64,
    db_len: u64,
    db_num_seqs: u64,
    params: &KarlinParams,
) -> u64 {
    let m = query_len as f64;
    let n = db_len as f64;
    let nseq = (db_num_seqs.max(1)) as f64;

    if m <= 0.0 || n <= 0.0 || params.k <= 0.0 || params.lambda <= 0.0 {
        return 0;
    }

    let log_k = params.k.ln();
    let alpha_d_lambda = params.alpha / params.lambda;
    let beta = params.beta;

    // Largest admissible ell keeps K * (m - ell) * (n - N*ell) above
    // max(m, n); solve the quadratic via the numerically stable root.
    let a = nseq;
    let mb = m * nseq + n;
    let c = n * m - m.max(n) / params.k;
    if c < 0.0 {
        return 0;
    }
    let disc = mb * mb - 4.0 * a * c;
    if disc < 0.0 {
        return 0;
    }

    let mut ell_min = 0.0_f64;
    let mut ell_max = 2.0 * c / (mb + disc.sqrt());
    let mut ell_next = 0.0_f64;
    let mut converged = false;

    for i in 1..=MAX_ITERATIONS {
        let ell = ell_next;
        let ss = (m - ell) * (n - nseq * ell);
        let ell_bar = alpha_d_lambda * (log_k + ss.ln()) + beta;

        if ell_bar >= ell {
            ell_min = ell;
            if ell_bar - ell_min <= 1.0 {
                converged = true;
                break;
            }
            if ell_min == ell_max {
                break;
            }
        } else {
            ell_max = ell;
        }

        ell_next = if ell_min <= ell_bar && ell_bar <= ell_max {
            ell_bar
        } else if i == 1 {
            ell_max
        } else {
            (ell_min + ell_max) / 2.0
        };
    }

    let mut adjustment = ell_min.max(0.0) as u64;
    if converged {
        // floor(ell_min) usually equals floor of the true fixed point;
        // check whether ceil(ell_min) is still below it.
        let ell_ceil = ell_min.ceil();
        if ell_ceil <= ell_max {
            let ss = (m - ell_ceil) * (n - nseq * ell_ceil);
            if alpha_d_lambda * (log_k + ss.ln()) + beta >= ell_ceil {
                adjustment = ell_ceil as u64;
            }
        }
    }
    adjustment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::protein_params;

    #[test]
    fn adjustment_stays_inside_query() {
        let p = protein_params(-11, -1);
        let adj = compute_length_adjustment(100, 10_000, 10, &p);
        assert!(adj < 100);
    }

    #[test]
    fn zero_inputs_yield_zero() {
        let p = protein_params(-11, -1);
        assert_eq!(compute_length_adjustment(0, 10_000, 10, &p), 0);
        assert_eq!(compute_length_adjustment(100, 0, 10, &p), 0);
    }

    #[test]
    fn larger_database_larger_adjustment() {
        let p = protein_params(-11, -1);
        let small = compute_length_adjustment(200, 100_000, 100, &p);
        let large = compute_length_adjustment(200, 100_000_000, 100, &p);
        assert!(large >= small);
    }

    #[test]
    fn negative_beta_shrinks_adjustment() {
        let base = protein_params(-11, -1);
        let zero_beta = KarlinParams { beta: 0.0, ..base };
        let with_beta = compute_length_adjustment(100, 10_000, 10, &base);
        let without = compute_length_adjustment(100, 10_000, 10, &zero_beta);
        assert!(with_beta <= without);
    }
}
