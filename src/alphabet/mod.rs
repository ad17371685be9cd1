//! Alphabets, reductions and BLAST program modes.
//!
//! Sequences are held as rank-encoded byte vectors: every residue is the
//! ordinal value of its symbol in the owning alphabet. The suffix-array
//! builder, the seed index and the aligner all operate on ranks, never on
//! ASCII.

pub mod translation;

pub use translation::{generate_frames, GeneticCode, TranslatedFrame};

use crate::error::SearchError;

/// The alphabets the engine understands.
///
/// `Dna4` is only valid as a query alphabet and means "detect from the
/// first sequence"; it is never used to encode residues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    Dna4,
    Dna5,
    /// Dna5 with `N` folded onto `A`, for seed lookup on nucleotide data.
    Dna5Reduced,
    AminoAcid,
    /// Murphy's 10-letter amino acid clustering.
    Murphy10,
}

impl Alphabet {
    pub fn name(self) -> &'static str {
        match self {
            Alphabet::Dna4 => "dna4",
            Alphabet::Dna5 => "dna5",
            Alphabet::Dna5Reduced => "dna5-reduced",
            Alphabet::AminoAcid => "aminoacid",
            Alphabet::Murphy10 => "murphy10",
        }
    }

    /// Number of distinct ranks.
    pub fn ord_size(self) -> usize {
        match self {
            Alphabet::Dna4 => 4,
            Alphabet::Dna5 => 5,
            Alphabet::Dna5Reduced => 4,
            Alphabet::AminoAcid => 27,
            Alphabet::Murphy10 => 10,
        }
    }

    pub fn is_nucleotide(self) -> bool {
        matches!(self, Alphabet::Dna4 | Alphabet::Dna5 | Alphabet::Dna5Reduced)
    }

    /// Rank a single ASCII symbol, or reject it.
    pub fn encode(self, c: u8) -> Option<u8> {
        match self {
            Alphabet::Dna4 => match c.to_ascii_uppercase() {
                b'A' => Some(0),
                b'C' => Some(1),
                b'G' => Some(2),
                b'T' | b'U' => Some(3),
                _ => None,
            },
            Alphabet::Dna5 => match c.to_ascii_uppercase() {
                b'A' => Some(0),
                b'C' => Some(1),
                b'G' => Some(2),
                b'T' | b'U' => Some(3),
                b'N' => Some(4),
                _ => None,
            },
            Alphabet::Dna5Reduced => Alphabet::Dna5.encode(c).map(|r| if r == 4 { 0 } else { r }),
            Alphabet::AminoAcid => aa_rank(c),
            Alphabet::Murphy10 => aa_rank(c).map(murphy10_reduce),
        }
    }

    /// Rank an entire sequence; the first offending symbol aborts.
    pub fn encode_seq(self, seq: &[u8]) -> Result<Vec<u8>, SearchError> {
        if seq.is_empty() {
            return Err(SearchError::Query("empty sequence".into()));
        }
        seq.iter()
            .enumerate()
            .map(|(i, &c)| {
                self.encode(c).ok_or_else(|| {
                    SearchError::Query(format!(
                        "symbol '{}' at position {} is not in alphabet {}",
                        c as char,
                        i,
                        self.name()
                    ))
                })
            })
            .collect()
    }

    /// Reduce a rank of the super-alphabet into this alphabet.
    ///
    /// `Murphy10` reduces from `AminoAcid`, `Dna5Reduced` from `Dna5`; the
    /// unreduced alphabets are their own (identity) reduction.
    pub fn reduce(self, rank: u8) -> u8 {
        match self {
            Alphabet::Murphy10 => murphy10_reduce(rank),
            Alphabet::Dna5Reduced => {
                if rank == 4 {
                    0
                } else {
                    rank
                }
            }
            _ => rank,
        }
    }
}

/// Amino acid ranks follow the alphabetic order A..Z with the three
/// ambiguity letters and stop at the tail: A..Y = 0..19 over the canonical
/// twenty, then B, Z, X, J, U, O, * = 20..26.
fn aa_rank(c: u8) -> Option<u8> {
    const ORDER: &[u8; 27] = b"ACDEFGHIKLMNPQRSTVWYBZXJUO*";
    let c = c.to_ascii_uppercase();
    ORDER.iter().position(|&a| a == c).map(|p| p as u8)
}

/// Murphy's 10-group clustering of the canonical amino acids:
/// {LVIM} {C} {A} {G} {ST} {P} {FYW} {EDNQ} {KR} {H}.
/// Ambiguity ranks fold onto the group of their most common resolution.
fn murphy10_reduce(rank: u8) -> u8 {
    const MAP: [u8; 27] = [
        0, // A
        1, // C
        2, // D -> {EDNQ}
        2, // E
        3, // F -> {FYW}
        4, // G
        5, // H
        6, // I -> {LVIM}
        7, // K -> {KR}
        6, // L
        6, // M
        2, // N
        8, // P
        2, // Q
        7, // R
        9, // S -> {ST}
        9, // T
        6, // V
        3, // W
        3, // Y
        2, // B -> N/D group
        2, // Z -> E/Q group
        0, // X -> A (arbitrary but fixed)
        6, // J -> L/I group
        1, // U -> C
        7, // O -> K
        0, // * -> A
    ];
    MAP[rank as usize]
}

/// BLAST search mode. Governs which sequences get translated and how
/// physical (frame-expanded) ids map back to true sequence ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlastProgram {
    Blastn,
    Blastp,
    Blastx,
    Tblastn,
    Tblastx,
    Unknown,
}

impl BlastProgram {
    /// Frames per query sequence.
    pub fn q_num_frames(self) -> u32 {
        match self {
            BlastProgram::Blastx | BlastProgram::Tblastx => 6,
            _ => 1,
        }
    }

    /// Frames per subject sequence.
    pub fn s_num_frames(self) -> u32 {
        match self {
            BlastProgram::Tblastn | BlastProgram::Tblastx => 6,
            _ => 1,
        }
    }

    pub fn q_is_translated(self) -> bool {
        self.q_num_frames() == 6
    }

    pub fn s_is_translated(self) -> bool {
        self.s_num_frames() == 6
    }

    /// Resolve `Unknown` from the query alphabet and the index alphabets.
    ///
    /// `trans` is the alphabet the index stores after translation; it
    /// equals `subj_orig` when the subjects were not translated.
    pub fn auto_detect(
        qry: Alphabet,
        subj_orig: Alphabet,
        trans: Alphabet,
    ) -> Result<BlastProgram, SearchError> {
        if trans.is_nucleotide() && !qry.is_nucleotide() {
            return Err(SearchError::Config(
                "query file is protein, but the index is nucleotide; recreate the index \
                 from protein data"
                    .into(),
            ));
        }
        Ok(if trans.is_nucleotide() && qry.is_nucleotide() {
            BlastProgram::Blastn
        } else if qry.is_nucleotide() {
            // query gets translated
            if subj_orig == trans {
                BlastProgram::Blastx
            } else {
                BlastProgram::Tblastx
            }
        } else if subj_orig == trans {
            BlastProgram::Blastp
        } else {
            BlastProgram::Tblastn
        })
    }
}

/// A set of rank-encoded sequences addressed by (sequence id, offset).
/// Read-only after load; lives for one search invocation.
#[derive(Debug, Clone, Default)]
pub struct SequenceSet {
    seqs: Vec<Vec<u8>>,
}

impl SequenceSet {
    pub fn new(seqs: Vec<Vec<u8>>) -> Self {
        Self { seqs }
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn seq(&self, id: usize) -> &[u8] {
        &self.seqs[id]
    }

    pub fn total_len(&self) -> usize {
        self.seqs.iter().map(|s| s.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.seqs.iter().map(|s| s.as_slice())
    }

    pub fn push(&mut self, seq: Vec<u8>) {
        self.seqs.push(seq);
    }
}
