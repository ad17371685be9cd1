use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bio::io::fasta;
use clap::{Parser, Subcommand, ValueEnum};

use sabre::alphabet::{Alphabet, BlastProgram, SequenceSet};
use sabre::config::{DbIndexType, SearchConfig, SortAlgorithm};
use sabre::index::SaProgress;
use sabre::report::{MatchSink, PairwiseSink, TabularSink};
use sabre::search::{build_database, run_search, QuerySet};

#[derive(Parser)]
#[command(name = "sabre")]
#[command(version)]
#[command(about = "Suffix-array based local aligner for biological sequences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search queries against a subject database
    Search(SearchArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgramArg {
    Auto,
    Blastn,
    Blastp,
    Blastx,
    Tblastn,
    Tblastx,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexArg {
    Sa,
    Fm,
    Bifm,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Query FASTA file
    #[arg(short, long)]
    query: PathBuf,

    /// Subject FASTA file
    #[arg(short, long)]
    subject: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// BLAST mode; auto-detected from the input alphabets by default
    #[arg(short, long, value_enum, default_value_t = ProgramArg::Auto)]
    program: ProgramArg,

    /// Index backend
    #[arg(long, value_enum, default_value_t = IndexArg::Sa)]
    index_type: IndexArg,

    /// Band policy: -1 unbanded, -2 sqrt, -3 log2, >=0 constant
    #[arg(long, default_value_t = -3, allow_hyphen_values = true)]
    band: i32,

    #[arg(long, default_value_t = -11, allow_hyphen_values = true)]
    gap_open: i32,

    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    gap_extend: i32,

    /// E-value cutoff
    #[arg(short, long, default_value_t = 0.1)]
    evalue: f64,

    /// Exact seed length
    #[arg(long, default_value_t = 10)]
    seed_length: usize,

    /// Worker threads (0 = all cores)
    #[arg(short = 't', long, default_value_t = 0)]
    num_threads: usize,

    /// Emit pairwise stanzas instead of the tabular format
    #[arg(long)]
    pairwise: bool,

    /// 0 silent, 1 progress, 2 diagnostics, 3 chatty
    #[arg(short, long, default_value_t = 1)]
    verbosity: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => search(args),
    }
}

fn looks_like_dna(seq: &[u8]) -> bool {
    seq.iter()
        .all(|c| matches!(c.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U' | b'N'))
}

fn read_fasta(path: &PathBuf) -> Result<(Vec<String>, Vec<Vec<u8>>)> {
    let reader = fasta::Reader::from_file(path)
        .with_context(|| format!("could not open {}", path.display()))?;
    let mut names = Vec::new();
    let mut seqs = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        names.push(record.id().to_string());
        seqs.push(record.seq().to_vec());
    }
    if names.is_empty() {
        bail!("{} holds no sequences", path.display());
    }
    Ok((names, seqs))
}

fn encode_all(raw: &[Vec<u8>], alphabet: Alphabet) -> Result<SequenceSet> {
    let mut set = SequenceSet::default();
    for seq in raw {
        set.push(alphabet.encode_seq(seq)?);
    }
    Ok(set)
}

fn search(args: SearchArgs) -> Result<()> {
    let (query_names, query_raw) = read_fasta(&args.query)?;
    let (subject_names, subject_raw) = read_fasta(&args.subject)?;

    let query_is_dna = query_raw.iter().all(|s| looks_like_dna(s));
    let subject_is_dna = subject_raw.iter().all(|s| looks_like_dna(s));

    let program = match args.program {
        ProgramArg::Auto => BlastProgram::Unknown,
        ProgramArg::Blastn => BlastProgram::Blastn,
        ProgramArg::Blastp => BlastProgram::Blastp,
        ProgramArg::Blastx => BlastProgram::Blastx,
        ProgramArg::Tblastn => BlastProgram::Tblastn,
        ProgramArg::Tblastx => BlastProgram::Tblastx,
    };

    // declared-protein input that looks like nucleic acid is suspicious
    // but not fatal
    if matches!(program, BlastProgram::Blastp | BlastProgram::Tblastn) && query_is_dna {
        eprintln!(
            "WARNING: the query sequences look like nucleic acid, but amino acid input \
             is expected for this mode."
        );
    }

    let qry_alphabet = if query_is_dna {
        Alphabet::Dna5
    } else {
        Alphabet::AminoAcid
    };
    let subj_alphabet = if subject_is_dna {
        Alphabet::Dna5
    } else {
        Alphabet::AminoAcid
    };

    let mut cfg = SearchConfig {
        program,
        db_index_type: match args.index_type {
            IndexArg::Sa => DbIndexType::Sa,
            IndexArg::Fm => DbIndexType::Fm,
            IndexArg::Bifm => DbIndexType::BiFm,
        },
        subj_orig_alphabet: subj_alphabet,
        band: args.band,
        gap_open: args.gap_open,
        gap_extend: args.gap_extend,
        linear_gaps: args.gap_open == 0,
        e_value_threshold: args.evalue,
        verbosity: args.verbosity,
        seed_length: args.seed_length,
        num_threads: args.num_threads,
        sort_algorithm: SortAlgorithm::DefaultParallel,
        ..Default::default()
    };

    // the index-side alphabets follow the mode
    cfg.trans_alphabet = if subject_is_dna && !cfg.program.s_is_translated() {
        Alphabet::Dna5
    } else {
        Alphabet::AminoAcid
    };
    cfg.reduced_alphabet = if cfg.trans_alphabet == Alphabet::Dna5 {
        Alphabet::Dna5
    } else {
        Alphabet::Murphy10
    };
    cfg.resolve_program_with_query(qry_alphabet)?;
    // resolving the program can change the translation target
    if cfg.program.s_is_translated() || !subject_is_dna {
        cfg.trans_alphabet = Alphabet::AminoAcid;
        cfg.reduced_alphabet = Alphabet::Murphy10;
    }
    cfg.validate()?;

    if cfg.verbosity >= 2 {
        eprintln!(
            "program {:?}, index {:?}, {} queries, {} subjects",
            cfg.program,
            cfg.db_index_type,
            query_names.len(),
            subject_names.len()
        );
    }

    let queries = QuerySet {
        names: query_names,
        seqs: encode_all(&query_raw, cfg.qry_orig_alphabet)?,
    };
    let subjects = encode_all(&subject_raw, cfg.subj_orig_alphabet)?;

    if cfg.verbosity >= 1 {
        eprintln!("Building index...");
    }
    let progress = SaProgress::default();
    let db = build_database(subject_names, &subjects, Vec::new(), &cfg, &progress)?;

    let mut sink: Box<dyn MatchSink> = {
        let out: Box<dyn io::Write + Send> = match &args.out {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("could not create {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout())),
        };
        if args.pairwise {
            Box::new(PairwiseSink::new(out))
        } else {
            Box::new(TabularSink::new(out, false))
        }
    };

    let stats = run_search(&cfg, &queries, &db, None, sink.as_mut())?;

    if cfg.verbosity >= 1 {
        eprintln!(
            "{} matches reported from {} queries.",
            stats.reported, stats.queries
        );
    }
    Ok(())
}
