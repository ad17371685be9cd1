//! Runtime search configuration.
//!
//! The whole compile-time dispatch surface of classic aligners (index type
//! x alphabets x program x gap model) is collapsed into this one struct;
//! the driver reads it at run time and only the DP kernel is specialized.

use crate::alphabet::{Alphabet, BlastProgram, GeneticCode};
use crate::error::SearchError;

/// Index backend consumed by the seed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbIndexType {
    Sa,
    Fm,
    BiFm,
}

/// Sort algorithm for the first suffix-array phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAlgorithm {
    Quicksort,
    MultiwayMergesort,
    DefaultParallel,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub program: BlastProgram,
    pub db_index_type: DbIndexType,
    pub subj_orig_alphabet: Alphabet,
    pub trans_alphabet: Alphabet,
    pub reduced_alphabet: Alphabet,
    pub qry_orig_alphabet: Alphabet,
    /// Genetic code for query translation; 0 means "same as the index".
    pub genetic_code: u8,
    /// Genetic code the index was built with.
    pub genetic_code_index: u8,
    /// Band policy: -1 unbanded, -2 sqrt, -3 log2, >=0 constant width.
    pub band: i32,
    /// Match reward / mismatch penalty; nucleotide modes only.
    pub reward: i32,
    pub penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    /// Use the linear-gap kernel when `gap_open == 0`.
    pub linear_gaps: bool,
    pub filter_putative_abundant: bool,
    pub filter_putative_duplicates: bool,
    pub merge_putative_siblings: bool,
    pub e_value_threshold: f64,
    /// 0 silent .. 3 chatty.
    pub verbosity: u8,
    /// Exact-seed length used for index lookups.
    pub seed_length: usize,
    /// 0 means one thread per logical CPU.
    pub num_threads: usize,
    pub sort_algorithm: SortAlgorithm,
    /// Key/value pairs exported to the process environment before the
    /// search starts (library tuning knobs).
    pub env: Vec<(String, String)>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            program: BlastProgram::Unknown,
            db_index_type: DbIndexType::Sa,
            subj_orig_alphabet: Alphabet::AminoAcid,
            trans_alphabet: Alphabet::AminoAcid,
            reduced_alphabet: Alphabet::Murphy10,
            qry_orig_alphabet: Alphabet::Dna4, // Dna4 = detect from input
            genetic_code: 0,
            genetic_code_index: GeneticCode::CANONICAL,
            band: -3,
            reward: 1,
            penalty: -2,
            gap_open: -11,
            gap_extend: -1,
            linear_gaps: false,
            filter_putative_abundant: true,
            filter_putative_duplicates: true,
            merge_putative_siblings: true,
            e_value_threshold: 1e-1,
            verbosity: 1,
            seed_length: 10,
            num_threads: 0,
            sort_algorithm: SortAlgorithm::DefaultParallel,
            env: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// Resolve derived options and reject incompatible combinations.
    ///
    /// Must run before any work; every error here is a `Config` kind.
    pub fn validate(&mut self) -> Result<(), SearchError> {
        if self.genetic_code == 0 {
            self.genetic_code = if self.genetic_code_index == 0 {
                GeneticCode::CANONICAL
            } else {
                self.genetic_code_index
            };
        } else if self.genetic_code != self.genetic_code_index {
            eprintln!(
                "WARNING: the genetic code used when creating the index ({}) is not the \
                 one selected for the query sequences ({}).",
                self.genetic_code_index, self.genetic_code
            );
        }

        if self.program == BlastProgram::Blastn && !self.reduced_alphabet.is_nucleotide() {
            return Err(SearchError::Config(
                "attempting a nucleotide search on a protein index".into(),
            ));
        }

        if self.seed_length == 0 {
            return Err(SearchError::Config("seed length must be positive".into()));
        }
        if self.gap_open > 0 || self.gap_extend >= 0 {
            return Err(SearchError::Config(
                "gap costs must be non-positive (open) and negative (extend)".into(),
            ));
        }
        if !(self.e_value_threshold > 0.0) {
            return Err(SearchError::Config(
                "E-value threshold must be positive".into(),
            ));
        }

        if self.program == BlastProgram::Unknown && self.qry_orig_alphabet != Alphabet::Dna4 {
            self.program = BlastProgram::auto_detect(
                self.qry_orig_alphabet,
                self.subj_orig_alphabet,
                self.trans_alphabet,
            )?;
        }
        Ok(())
    }

    /// Resolve the program once the query alphabet has been sniffed from
    /// the input (the `Dna4` placeholder case).
    pub fn resolve_program_with_query(&mut self, qry: Alphabet) -> Result<(), SearchError> {
        self.qry_orig_alphabet = qry;
        if self.program == BlastProgram::Unknown {
            self.program =
                BlastProgram::auto_detect(qry, self.subj_orig_alphabet, self.trans_alphabet)?;
        }
        Ok(())
    }

    /// Any of the filter/merge heuristics forces the hyper-sort pass.
    pub fn needs_hyper_sort(&self) -> bool {
        self.filter_putative_abundant
            || self.filter_putative_duplicates
            || self.merge_putative_siblings
    }

    /// Export the configured tuning variables. Failures are reported but
    /// non-fatal: a knob that does not stick only costs performance.
    pub fn apply_env(&self) {
        for (k, v) in &self.env {
            if !set_env(k, v) && self.verbosity >= 1 {
                eprintln!("WARNING: could not set environment variable {k}");
            }
        }
    }
}

/// Portable environment setter used for library parallelism knobs.
pub fn set_env(key: &str, value: &str) -> bool {
    if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
        return false;
    }
    std::env::set_var(key, value);
    std::env::var(key).map(|v| v == value).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blastn_on_protein_index_is_rejected() {
        let mut cfg = SearchConfig {
            program: BlastProgram::Blastn,
            reduced_alphabet: Alphabet::Murphy10,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SearchError::Config(_))
        ));
    }

    #[test]
    fn genetic_code_zero_inherits_index_code() {
        let mut cfg = SearchConfig {
            genetic_code: 0,
            genetic_code_index: 11,
            qry_orig_alphabet: Alphabet::Dna5,
            subj_orig_alphabet: Alphabet::Dna5,
            trans_alphabet: Alphabet::AminoAcid,
            reduced_alphabet: Alphabet::Murphy10,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.genetic_code, 11);
        assert_eq!(cfg.program, BlastProgram::Tblastx);
    }

    #[test]
    fn set_env_round_trips() {
        assert!(set_env("SABRE_TEST_KNOB", "4"));
        assert_eq!(std::env::var("SABRE_TEST_KNOB").unwrap(), "4");
        assert!(!set_env("BAD=KEY", "x"));
    }
}
