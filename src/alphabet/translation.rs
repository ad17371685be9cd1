//! Codon translation and six-frame generation.
//!
//! Works on rank-encoded Dna5 input (A=0 C=1 G=2 T=3 N=4) and emits
//! rank-encoded amino acid frames, stop codons included.

use super::Alphabet;

/// Rank of 'X' in the amino acid alphabet; codons touching an N translate
/// to it.
const AA_X: u8 = 22;

/// NCBI translation tables are laid out in TCAG codon order.
const TABLE_CANONICAL: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const TABLE_MOLD_MITO: &[u8; 64] =
    b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const TABLE_BACTERIAL: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

/// A codon translation table identified by its NCBI genetic-code id.
#[derive(Debug, Clone, Copy)]
pub struct GeneticCode {
    pub id: u8,
    table: &'static [u8; 64],
}

impl GeneticCode {
    pub const CANONICAL: u8 = 1;

    /// Look up a table by NCBI id; unrecognized ids fall back to the
    /// canonical code (the caller decides whether to warn).
    pub fn from_id(id: u8) -> Self {
        let table = match id {
            4 => TABLE_MOLD_MITO,
            11 => TABLE_BACTERIAL,
            _ => TABLE_CANONICAL,
        };
        let id = match id {
            4 | 11 => id,
            _ => Self::CANONICAL,
        };
        GeneticCode { id, table }
    }

    /// Translate one rank-encoded codon to an amino acid rank.
    pub fn translate_codon(&self, codon: [u8; 3]) -> u8 {
        // Dna5 rank -> TCAG table index; N has no index.
        const TCAG: [u8; 4] = [2, 1, 3, 0];
        if codon.iter().any(|&b| b > 3) {
            return AA_X;
        }
        let idx = TCAG[codon[0] as usize] as usize * 16
            + TCAG[codon[1] as usize] as usize * 4
            + TCAG[codon[2] as usize] as usize;
        Alphabet::AminoAcid.encode(self.table[idx]).unwrap_or(AA_X)
    }
}

/// One translated reading frame of a nucleotide sequence.
#[derive(Debug, Clone)]
pub struct TranslatedFrame {
    /// 1..3 forward, -1..-3 reverse.
    pub frame: i8,
    /// Rank-encoded amino acids, stop codons included.
    pub ranks: Vec<u8>,
    /// Length of the nucleotide sequence the frame came from.
    pub orig_len: usize,
}

fn complement(rank: u8) -> u8 {
    match rank {
        0 => 3,
        1 => 2,
        2 => 1,
        3 => 0,
        other => other,
    }
}

fn translate_from(seq: &[u8], code: &GeneticCode) -> Vec<u8> {
    seq.chunks_exact(3)
        .map(|c| code.translate_codon([c[0], c[1], c[2]]))
        .collect()
}

/// All six reading frames of a rank-encoded Dna5 sequence.
///
/// Frames too short to hold a codon come out empty rather than being
/// dropped, so frame ids stay aligned with `BlastProgram::q_num_frames`.
pub fn generate_frames(seq: &[u8], code: &GeneticCode) -> Vec<TranslatedFrame> {
    let rev: Vec<u8> = seq.iter().rev().map(|&r| complement(r)).collect();
    let mut frames = Vec::with_capacity(6);
    for shift in 0..3usize {
        let ranks = if shift < seq.len() {
            translate_from(&seq[shift..], code)
        } else {
            Vec::new()
        };
        frames.push(TranslatedFrame {
            frame: shift as i8 + 1,
            ranks,
            orig_len: seq.len(),
        });
    }
    for shift in 0..3usize {
        let ranks = if shift < rev.len() {
            translate_from(&rev[shift..], code)
        } else {
            Vec::new()
        };
        frames.push(TranslatedFrame {
            frame: -(shift as i8 + 1),
            ranks,
            orig_len: seq.len(),
        });
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;

    fn enc(s: &[u8]) -> Vec<u8> {
        Alphabet::Dna5.encode_seq(s).unwrap()
    }

    #[test]
    fn canonical_start_codon() {
        let code = GeneticCode::from_id(1);
        let atg = enc(b"ATG");
        let m = code.translate_codon([atg[0], atg[1], atg[2]]);
        assert_eq!(m, Alphabet::AminoAcid.encode(b'M').unwrap());
    }

    #[test]
    fn stop_codon_translates_to_stop() {
        let code = GeneticCode::from_id(1);
        let taa = enc(b"TAA");
        let stop = code.translate_codon([taa[0], taa[1], taa[2]]);
        assert_eq!(stop, Alphabet::AminoAcid.encode(b'*').unwrap());
    }

    #[test]
    fn table_four_reassigns_tga() {
        let tga = enc(b"TGA");
        let canonical = GeneticCode::from_id(1).translate_codon([tga[0], tga[1], tga[2]]);
        let mito = GeneticCode::from_id(4).translate_codon([tga[0], tga[1], tga[2]]);
        assert_eq!(canonical, Alphabet::AminoAcid.encode(b'*').unwrap());
        assert_eq!(mito, Alphabet::AminoAcid.encode(b'W').unwrap());
    }

    #[test]
    fn ambiguous_codon_is_x() {
        let code = GeneticCode::from_id(1);
        let ang = enc(b"ANG");
        assert_eq!(
            code.translate_codon([ang[0], ang[1], ang[2]]),
            Alphabet::AminoAcid.encode(b'X').unwrap()
        );
    }

    #[test]
    fn six_frames_always_present() {
        let code = GeneticCode::from_id(1);
        let frames = generate_frames(&enc(b"AT"), &code);
        assert_eq!(frames.len(), 6);
        assert!(frames.iter().all(|f| f.ranks.is_empty()));
    }

    #[test]
    fn frame_lengths_shrink_with_shift() {
        let code = GeneticCode::from_id(1);
        // 10 nt: frame 1 -> 3 aa, frame 2 -> 3 aa, frame 3 -> 2 aa
        let frames = generate_frames(&enc(b"ATGGCCATTG"), &code);
        assert_eq!(frames[0].ranks.len(), 3);
        assert_eq!(frames[1].ranks.len(), 3);
        assert_eq!(frames[2].ranks.len(), 2);
        assert_eq!(frames[3].frame, -1);
    }

    #[test]
    fn reverse_frame_is_translated_revcomp() {
        let code = GeneticCode::from_id(1);
        // revcomp(CAT) = ATG -> M
        let frames = generate_frames(&enc(b"CAT"), &code);
        let minus1 = frames.iter().find(|f| f.frame == -1).unwrap();
        assert_eq!(minus1.ranks, vec![Alphabet::AminoAcid.encode(b'M').unwrap()]);
    }
}
