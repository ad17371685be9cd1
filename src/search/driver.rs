//! The search driver: partitions queries into blocks, fans the blocks out
//! to a worker pool, and funnels finished matches to the sink.
//!
//! Workers share the index, the subject frames and the scoring scheme
//! immutably; everything mutable (seed buffer, hyper-sort scratch, band
//! memo, length-adjustment cache) lives in a per-worker context. The
//! global statistics object and the output buffers are only touched under
//! a mutex, once per block.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::align::{band_width, banded_local_align, ScoringScheme, UNBANDED};
use crate::alphabet::{generate_frames, BlastProgram, GeneticCode, SequenceSet};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::index::{SaProgress, SeedHit, SeedIndex};
use crate::report::{MatchRecord, MatchSink};
use crate::stats::StatsContext;
use crate::taxonomy::Taxonomy;

use super::matches::{hyper_sort, merge_sibling_seeds, SeedMatch, SortInterval};

/// Intervals fatter than this are putatively abundant; the excess seeds
/// are dropped before extension when the abundance filter is on.
const MAX_SEEDS_PER_GROUP: usize = 128;

/// Aggregated search counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub blocks: u64,
    pub queries: u64,
    pub seeds: u64,
    pub extensions: u64,
    pub reported: u64,
    pub rejected_by_evalue: u64,
    pub skipped_duplicates: u64,
    pub skipped_abundant: u64,
}

impl std::ops::AddAssign for SearchStats {
    fn add_assign(&mut self, o: Self) {
        self.blocks += o.blocks;
        self.queries += o.queries;
        self.seeds += o.seeds;
        self.extensions += o.extensions;
        self.reported += o.reported;
        self.rejected_by_evalue += o.rejected_by_evalue;
        self.skipped_duplicates += o.skipped_duplicates;
        self.skipped_abundant += o.skipped_abundant;
    }
}

/// The query side of a search: names plus rank-encoded sequences in the
/// original query alphabet.
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    pub names: Vec<String>,
    pub seqs: SequenceSet,
}

/// The subject side: the seed index over reduced frames, the translated
/// frames for extension, and per-subject names and taxids.
#[derive(Debug)]
pub struct Database {
    pub names: Vec<String>,
    pub index: SeedIndex,
    /// Frame-expanded extension text (`s_num_frames` entries per subject).
    pub frames: SequenceSet,
    /// Per physical subject; empty when taxonomy is off.
    pub tax_ids: Vec<u32>,
}

/// Translate/reduce the subject set per the configuration and build the
/// seed index over it.
pub fn build_database(
    names: Vec<String>,
    orig: &SequenceSet,
    tax_ids: Vec<u32>,
    cfg: &SearchConfig,
    progress: &SaProgress,
) -> Result<Database, SearchError> {
    if orig.is_empty() {
        return Err(SearchError::Index("subject database is empty".into()));
    }

    let frames = if cfg.program.s_is_translated() {
        let code = GeneticCode::from_id(cfg.genetic_code_index);
        let mut out = SequenceSet::default();
        for seq in orig.iter() {
            for frame in generate_frames(seq, &code) {
                out.push(frame.ranks);
            }
        }
        out
    } else {
        orig.clone()
    };

    let reduced = SequenceSet::new(
        frames
            .iter()
            .map(|s| s.iter().map(|&r| cfg.reduced_alphabet.reduce(r)).collect())
            .collect(),
    );

    let index = SeedIndex::build(
        reduced,
        cfg.reduced_alphabet.ord_size(),
        cfg.db_index_type,
        cfg.sort_algorithm,
        progress,
    )?;

    Ok(Database {
        names,
        index,
        frames,
        tax_ids,
    })
}

fn scoring_scheme(cfg: &SearchConfig) -> ScoringScheme {
    if cfg.program == BlastProgram::Blastn {
        ScoringScheme::Nucleotide {
            reward: cfg.reward,
            penalty: cfg.penalty,
            gap_open: cfg.gap_open,
            gap_extend: cfg.gap_extend,
        }
    } else {
        ScoringScheme::Blosum62 {
            gap_open: cfg.gap_open,
            gap_extend: cfg.gap_extend,
        }
    }
}

struct WorkerContext {
    matches: Vec<SeedMatch>,
    scratch: Vec<SeedMatch>,
    hits: Vec<SeedHit>,
    band_memo: FxHashMap<usize, i32>,
    stats_ctx: StatsContext,
}

impl WorkerContext {
    fn new(cfg: &SearchConfig, scheme: &ScoringScheme, db: &Database) -> Self {
        Self {
            matches: Vec::new(),
            scratch: Vec::new(),
            hits: Vec::new(),
            band_memo: FxHashMap::default(),
            stats_ctx: StatsContext::new(
                scheme.karlin_params(),
                db.frames.total_len() as u64,
                db.names.len() as u64,
                cfg.program.q_is_translated(),
            ),
        }
    }
}

fn frame_label(frame_idx: u32, num_frames: u32) -> i8 {
    if num_frames == 1 {
        0
    } else if frame_idx < 3 {
        frame_idx as i8 + 1
    } else {
        -(frame_idx as i8 - 2)
    }
}

/// Run the full search and hand every surviving match to `sink`.
///
/// Output order follows block completion, not input order; within one
/// worker the hyper-sort order is preserved.
pub fn run_search(
    cfg: &SearchConfig,
    queries: &QuerySet,
    db: &Database,
    taxonomy: Option<&Taxonomy>,
    sink: &mut dyn MatchSink,
) -> Result<SearchStats> {
    if cfg.program == BlastProgram::Unknown {
        return Err(SearchError::Config(
            "BLAST program still unresolved; validate the configuration first".into(),
        )
        .into());
    }
    cfg.apply_env();

    let n_queries = queries.seqs.len();
    if n_queries == 0 {
        return Ok(SearchStats::default());
    }

    let threads = if cfg.num_threads == 0 {
        num_cpus::get()
    } else {
        cfg.num_threads
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("failed to build thread pool")?;

    // tens to hundreds of queries per block, enough blocks to keep the
    // pool busy with dynamic scheduling
    let block_size = (n_queries / (threads * 4).max(1)).clamp(1, 256);
    let n_blocks = n_queries.div_ceil(block_size);

    let bar = if cfg.verbosity >= 1 {
        let b = ProgressBar::new(n_blocks as u64);
        b.set_style(
            ProgressStyle::with_template("{bar:50} {pos}/{len} blocks")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        b
    } else {
        ProgressBar::hidden()
    };

    let scheme = scoring_scheme(cfg);
    let global_stats = Mutex::new(SearchStats::default());
    let out_buffers: Mutex<Vec<Vec<MatchRecord>>> = Mutex::new(Vec::new());
    let cancel = AtomicBool::new(false);
    let first_error: Mutex<Option<SearchError>> = Mutex::new(None);
    let blocks_done = AtomicU64::new(0);

    pool.install(|| {
        (0..n_blocks).into_par_iter().for_each_init(
            || WorkerContext::new(cfg, &scheme, db),
            |ctx, b| {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let range = b * block_size..((b + 1) * block_size).min(n_queries);
                match process_block(ctx, range, cfg, &scheme, queries, db) {
                    Ok((block_stats, records)) => {
                        *global_stats.lock().unwrap() += block_stats;
                        out_buffers.lock().unwrap().push(records);
                    }
                    Err(e) => {
                        cancel.store(true, Ordering::Relaxed);
                        first_error.lock().unwrap().get_or_insert(e);
                    }
                }
                let done = blocks_done.fetch_add(1, Ordering::Relaxed) + 1;
                // progress is observed from worker 0 only; the others
                // just bump the counter
                if rayon::current_thread_index() == Some(0) {
                    bar.set_position(done);
                }
            },
        )
    });

    if let Some(err) = first_error.lock().unwrap().take() {
        bar.abandon();
        if matches!(err, SearchError::OutOfMemory(_)) {
            eprintln!(
                "ERROR: ran out of memory. Split the query file into smaller segments \
                 or search against a smaller database."
            );
        }
        return Err(err.into());
    }

    bar.finish_and_clear();

    let mut buffers = out_buffers.into_inner().unwrap();

    // taxonomic post-processing: one LCA per query over all its hits
    if let Some(tax) = taxonomy {
        if !db.tax_ids.is_empty() {
            let mut per_query: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
            for rec in buffers.iter().flatten() {
                per_query
                    .entry(rec.query_idx)
                    .or_default()
                    .push(db.tax_ids[rec.subject_idx as usize]);
            }
            let mut lca_by_query: FxHashMap<u32, u32> = FxHashMap::default();
            for (q, ids) in per_query {
                if let Some(l) = tax.lca_of_set(ids.iter().copied())? {
                    lca_by_query.insert(q, l);
                }
            }
            for rec in buffers.iter_mut().flatten() {
                rec.taxon = lca_by_query.get(&rec.query_idx).copied();
            }
        }
    }

    for rec in buffers.iter().flatten() {
        sink.write_match(rec)?;
    }
    sink.finish()?;

    let stats = *global_stats.lock().unwrap();
    if cfg.verbosity >= 2 {
        eprintln!(
            "search done: {} queries in {} blocks, {} seeds, {} extensions, {} matches \
             reported, {} rejected by E-value",
            stats.queries,
            stats.blocks,
            stats.seeds,
            stats.extensions,
            stats.reported,
            stats.rejected_by_evalue
        );
    }
    Ok(stats)
}

/// The per-block pipeline: translate/reduce, seed, hyper-sort, extend,
/// score, threshold.
fn process_block(
    ctx: &mut WorkerContext,
    block: Range<usize>,
    cfg: &SearchConfig,
    scheme: &ScoringScheme,
    queries: &QuerySet,
    db: &Database,
) -> Result<(SearchStats, Vec<MatchRecord>), SearchError> {
    let mut stats = SearchStats {
        blocks: 1,
        queries: (block.end - block.start) as u64,
        ..Default::default()
    };

    let q_num_frames = cfg.program.q_num_frames();
    let s_num_frames = cfg.program.s_num_frames();
    let block_start = block.start;
    let code = GeneticCode::from_id(cfg.genetic_code);

    // 1. translate and reduce the block's queries
    let mut frames: Vec<Vec<u8>> = Vec::with_capacity(block.len() * q_num_frames as usize);
    for q_idx in block.clone() {
        let seq = queries.seqs.seq(q_idx);
        if seq.is_empty() {
            return Err(SearchError::Query(format!(
                "query '{}' is empty",
                queries.names[q_idx]
            )));
        }
        if cfg.program.q_is_translated() {
            for frame in generate_frames(seq, &code) {
                frames.push(frame.ranks);
            }
        } else {
            frames.push(seq.to_vec());
        }
    }
    let reduced: Vec<Vec<u8>> = frames
        .iter()
        .map(|f| f.iter().map(|&r| cfg.reduced_alphabet.reduce(r)).collect())
        .collect();

    // 2. enumerate seeds into the worker-local match array
    ctx.matches.clear();
    let seed_len = cfg.seed_length;
    for (local, red) in reduced.iter().enumerate() {
        let qry_id = (block_start * q_num_frames as usize + local) as u32;
        if red.len() < seed_len {
            continue;
        }
        for off in 0..=(red.len() - seed_len) {
            ctx.hits.clear();
            db.index
                .find_seeds(&red[off..off + seed_len], off as u32, &mut ctx.hits);
            ctx.matches
                .try_reserve(ctx.hits.len())
                .map_err(|e| SearchError::OutOfMemory(e.to_string()))?;
            for h in &ctx.hits {
                ctx.matches.push(SeedMatch {
                    qry_id,
                    subj_id: h.subj_id,
                    qry_start: h.qry_offset,
                    subj_start: h.subj_offset,
                    length: h.length,
                });
            }
        }
    }
    stats.seeds = ctx.matches.len() as u64;

    // 3. hyper-sort when any filter heuristic wants grouped input
    let intervals: Vec<SortInterval> = if cfg.needs_hyper_sort() {
        hyper_sort(&mut ctx.matches, &mut ctx.scratch, q_num_frames, s_num_frames)
    } else if ctx.matches.is_empty() {
        Vec::new()
    } else {
        vec![SortInterval {
            true_qry_id: 0,
            begin: 0,
            end: ctx.matches.len(),
        }]
    };

    let covered: usize = intervals.iter().map(|iv| iv.len()).sum();
    if covered != ctx.matches.len() {
        return Err(SearchError::InternalInvariant(
            "hyper-sort intervals do not tile the match array".into(),
        ));
    }

    // 4. extend, score, threshold
    let mut records: Vec<MatchRecord> = Vec::new();
    let linear = cfg.linear_gaps && cfg.gap_open == 0;
    let mut last_alignment: FxHashMap<(u32, u32), (usize, usize, usize, usize)> =
        FxHashMap::default();

    for iv in &intervals {
        let mut seeds: Vec<SeedMatch> = ctx.matches[iv.begin..iv.end].to_vec();

        if cfg.filter_putative_abundant && seeds.len() > MAX_SEEDS_PER_GROUP {
            stats.skipped_abundant += (seeds.len() - MAX_SEEDS_PER_GROUP) as u64;
            seeds.truncate(MAX_SEEDS_PER_GROUP);
        }

        if cfg.merge_putative_siblings {
            // bridge comparison runs on the translated frames, the same
            // text the extension sees
            let mut merged: Vec<SeedMatch> = Vec::with_capacity(seeds.len());
            for chunk in seeds.chunk_by(|a, b| a.qry_id == b.qry_id && a.subj_id == b.subj_id) {
                let local = chunk[0].qry_id as usize - block_start * q_num_frames as usize;
                merged.extend(merge_sibling_seeds(
                    chunk,
                    &frames[local],
                    db.frames.seq(chunk[0].subj_id as usize),
                ));
            }
            seeds = merged;
        }

        for seed in &seeds {
            let local = seed.qry_id as usize - block_start * q_num_frames as usize;
            let q = frames[local].as_slice();
            let s = db.frames.seq(seed.subj_id as usize);
            if q.is_empty() || s.is_empty() {
                continue;
            }

            if cfg.filter_putative_duplicates {
                if let Some(&(qs, qe, ss, se)) = last_alignment.get(&(seed.qry_id, seed.subj_id))
                {
                    let q0 = seed.qry_start as usize;
                    let s0 = seed.subj_start as usize;
                    if q0 >= qs
                        && q0 + seed.length as usize <= qe
                        && s0 >= ss
                        && s0 + seed.length as usize <= se
                    {
                        stats.skipped_duplicates += 1;
                        continue;
                    }
                }
            }

            let (lower, upper) = {
                let b = band_width(cfg.band, q.len(), &mut ctx.band_memo);
                if b == UNBANDED {
                    (-(q.len() as i64), s.len() as i64)
                } else {
                    let d0 = seed.diagonal();
                    (d0 - b as i64, d0 + b as i64)
                }
            };

            let outcome = banded_local_align(q, s, scheme, lower, upper, linear);
            stats.extensions += 1;
            if outcome.is_empty() {
                continue;
            }

            last_alignment.insert(
                (seed.qry_id, seed.subj_id),
                (outcome.q_start, outcome.q_end, outcome.s_start, outcome.s_end),
            );

            let q_idx = seed.qry_id / q_num_frames;
            let physical_len = queries.seqs.seq(q_idx as usize).len() as u64;
            let e_value = ctx.stats_ctx.e_value(outcome.score, physical_len);
            if e_value > cfg.e_value_threshold {
                stats.rejected_by_evalue += 1;
                continue;
            }

            let subj_idx = seed.subj_id / s_num_frames;
            records.push(MatchRecord {
                query_name: queries.names[q_idx as usize].clone(),
                subject_name: db.names[subj_idx as usize].clone(),
                query_idx: q_idx,
                subject_idx: subj_idx,
                query_frame: frame_label(seed.qry_id % q_num_frames, q_num_frames),
                subject_frame: frame_label(seed.subj_id % s_num_frames, s_num_frames),
                identity: 100.0 * outcome.matches() as f64 / outcome.align_len() as f64,
                align_len: outcome.align_len(),
                mismatches: outcome.mismatches(),
                gap_opens: outcome.gap_opens(),
                q_start: outcome.q_start + 1,
                q_end: outcome.q_end,
                s_start: outcome.s_start + 1,
                s_end: outcome.s_end,
                raw_score: outcome.score,
                bit_score: ctx.stats_ctx.bit_score(outcome.score),
                e_value,
                taxon: None,
            });
            stats.reported += 1;
        }
    }

    Ok((stats, records))
}
