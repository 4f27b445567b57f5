//! Pipeline orchestration: scan, score, plan, encode, archive.
//!
//! ## Stages
//!
//! ```text
//! scan        input/         →  FrameSet            (ordered, ids 0..n)
//! phase 1     FrameSet       →  Vec<PairScore>      (every pair, rayon pool)
//! plan        scores         →  forest → graph → Manifest
//! phase 2     graph          →  staging/            (roots copied, diffs encoded)
//! archive     staging/       →  input.dia           (zip, deflate)
//! ```
//!
//! ## Staging Layout
//!
//! ```text
//! $TMPDIR/.tmpXXXX/
//! ├── optimization_map.json
//! ├── 0001.png            # root: byte copy of the source
//! └── 0002.png            # child: RGBA diff against the source parent
//! ```
//!
//! The staging directory is a [`TempDir`] and is removed on every exit path.
//!
//! ## Parallel Processing
//!
//! Each phase runs on its own bounded [rayon](https://docs.rs/rayon) pool
//! and fully drains before the next begins. Workers only read source files
//! and write disjoint outputs. Results flow back over a `std::sync::mpsc`
//! channel to the coordinating thread, which owns every aggregate (score
//! list, counters, failures) and emits [`ProcessEvent`]s in arrival order.
//!
//! A unit that fails (an undecodable pair, a diff that cannot be written) is
//! logged and skipped. Only scan failures and top-level I/O abort a run.

use crate::archive::{ArchiveError, write_archive};
use crate::config::{DiaConfig, effective_threads};
use crate::forest::spanning_forest;
use crate::graph::{self, DependencyGraph};
use crate::imaging::{BackendError, DiffParams, DiffStats, ImageBackend, PngLevel, RustBackend};
use crate::manifest::{Manifest, ManifestError};
use crate::scan::{self, ScanError};
use crate::types::{FrameId, FrameSet, PairScore};
use rayon::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Settings for one run, resolved from [`DiaConfig`] plus CLI overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub extensions: Vec<String>,
    pub score_workers: usize,
    pub encode_workers: usize,
    pub png_level: PngLevel,
    pub optimize_alpha: bool,
    pub manifest_name: String,
}

impl ProcessConfig {
    /// Build a ProcessConfig from DiaConfig values.
    pub fn from_dia_config(config: &DiaConfig) -> Self {
        Self {
            extensions: config.scan.extensions.clone(),
            score_workers: effective_threads(&config.processing),
            encode_workers: config.encode.workers.max(1),
            png_level: PngLevel::new(config.encode.png_level),
            optimize_alpha: config.encode.optimize_alpha,
            manifest_name: config.archive.manifest_name.clone(),
        }
    }

    /// Apply a command-line worker count. Taken as given, not capped at the
    /// core count the way `processing.max_processes` is.
    pub fn with_score_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(n) = workers {
            self.score_workers = n.max(1);
        }
        self
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_dia_config(&DiaConfig::default())
    }
}

/// Progress reported while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    FramesFound { count: usize },
    ScoringStarted { pairs: usize, workers: usize },
    /// Sent after every pair, failed or not. `done` never decreases.
    PairsScored { done: usize, total: usize, failed: usize },
    Planned { roots: usize, diffs: usize },
    RootCopied { path: String },
    EncodingStarted { diffs: usize, workers: usize },
    FrameEncoded {
        done: usize,
        total: usize,
        path: String,
        stats: DiffStats,
    },
    FrameFailed {
        done: usize,
        total: usize,
        path: String,
        reason: String,
    },
    ArchiveWritten { path: PathBuf, entries: usize },
}

/// Everything decided before any output is written.
#[derive(Debug, Clone)]
pub struct Plan {
    pub frames: FrameSet,
    /// Valid scores, in completion order.
    pub scores: Vec<PairScore>,
    pub graph: DependencyGraph,
    pub manifest: Manifest,
}

/// A frame that was planned but could not be written.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedFrame {
    pub id: FrameId,
    pub path: String,
    pub reason: String,
}

/// Outcome of a full encode run.
#[derive(Debug)]
pub struct ProcessResult {
    pub manifest: Manifest,
    pub archive: PathBuf,
    pub roots_copied: usize,
    pub diffs_encoded: usize,
    /// Diff bytes written, summed over encoded frames.
    pub diff_bytes: u64,
    pub failed: Vec<FailedFrame>,
}

/// `<input_dir>.dia`, next to the input directory.
pub fn default_output_path(input_dir: &Path) -> PathBuf {
    let dir = input_dir
        .canonicalize()
        .unwrap_or_else(|_| input_dir.to_path_buf());
    let mut name = dir.into_os_string();
    name.push(".dia");
    PathBuf::from(name)
}

fn emit(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is listening
        tx.send(event).ok();
    }
}

// ============================================================================
// Phase 1: scoring
// ============================================================================

/// Score every unordered frame pair on a pool of `workers` threads.
///
/// Pairs the backend cannot score are logged and left out.
pub fn score_pairs(
    backend: &impl ImageBackend,
    frames: &FrameSet,
    workers: usize,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<Vec<PairScore>, ProcessError> {
    let pairs = frames.pairs();
    let total = pairs.len();
    emit(events, ProcessEvent::ScoringStarted { pairs: total, workers });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;
    let (tx, rx) = mpsc::channel();

    let mut scores = Vec::with_capacity(total);
    let mut failed = 0;
    std::thread::scope(|s| {
        let pairs = &pairs;
        let pool = &pool;
        s.spawn(move || {
            pool.install(|| {
                pairs.par_iter().for_each_with(tx, |tx, &(a, b)| {
                    let result =
                        backend.similarity(&frames.source_path(a), &frames.source_path(b));
                    tx.send((a, b, result)).ok();
                });
            });
        });

        for (done, (a, b, result)) in rx.iter().enumerate() {
            match result {
                Ok(score) => scores.push(PairScore::new(score, a, b)),
                Err(e) => {
                    failed += 1;
                    debug!(
                        first = %frames.frames[a].path,
                        second = %frames.frames[b].path,
                        error = %e,
                        "pair skipped"
                    );
                }
            }
            let done = done + 1;
            emit(events, ProcessEvent::PairsScored { done, total, failed });
        }
    });

    info!(scored = scores.len(), failed, "scoring finished");
    Ok(scores)
}

// ============================================================================
// Planning
// ============================================================================

/// Scan `input_dir`, score all pairs, and derive the dependency graph.
///
/// Writes nothing.
pub fn plan(
    input_dir: &Path,
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<Plan, ProcessError> {
    plan_with_backend(&RustBackend::new(), input_dir, config, &events)
}

/// Plan using a specific backend (allows testing with mock).
pub fn plan_with_backend(
    backend: &impl ImageBackend,
    input_dir: &Path,
    config: &ProcessConfig,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<Plan, ProcessError> {
    let frames = scan::scan(input_dir, &config.extensions)?;
    emit(events, ProcessEvent::FramesFound { count: frames.len() });

    let scores = score_pairs(backend, &frames, config.score_workers, events)?;
    let forest = spanning_forest(frames.len(), &scores);
    let graph = graph::build(&forest, &frames.sizes());
    let manifest = Manifest::new(&frames, &graph);

    emit(
        events,
        ProcessEvent::Planned {
            roots: graph.roots().len(),
            diffs: graph.parents().len(),
        },
    );
    Ok(Plan {
        frames,
        scores,
        graph,
        manifest,
    })
}

// ============================================================================
// Phase 2: encoding
// ============================================================================

/// Run the whole pipeline and write the archive to `output`.
pub fn encode(
    input_dir: &Path,
    output: &Path,
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    encode_with_backend(&RustBackend::new(), input_dir, output, config, &events)
}

/// Encode using a specific backend (allows testing with mock).
pub fn encode_with_backend(
    backend: &impl ImageBackend,
    input_dir: &Path,
    output: &Path,
    config: &ProcessConfig,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let plan = plan_with_backend(backend, input_dir, config, events)?;

    let staging = TempDir::new()?;
    let json = plan.manifest.to_json()?;
    fs::write(staging.path().join(&config.manifest_name), json)?;

    let roots_copied = copy_roots(&plan, staging.path(), events)?;
    let (encoded, failed) = encode_diffs(backend, &plan, staging.path(), config, events)?;

    let entries = write_archive(staging.path(), output)?;
    emit(
        events,
        ProcessEvent::ArchiveWritten {
            path: output.to_path_buf(),
            entries,
        },
    );
    info!(archive = %output.display(), entries, "archive written");

    Ok(ProcessResult {
        manifest: plan.manifest,
        archive: output.to_path_buf(),
        roots_copied,
        diffs_encoded: encoded.len(),
        diff_bytes: encoded.iter().map(|s| s.bytes).sum(),
        failed,
    })
}

/// Copy every root into `staging`, keeping permissions and mtime.
fn copy_roots(
    plan: &Plan,
    staging: &Path,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<usize, ProcessError> {
    for &id in plan.graph.roots() {
        let frame = &plan.frames.frames[id];
        let source = plan.frames.source_path(id);
        let dest = staging.join(&frame.path);
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::copy(&source, &dest)?;
        let modified = fs::metadata(&source)?.modified()?;
        File::options().write(true).open(&dest)?.set_modified(modified)?;

        emit(
            events,
            ProcessEvent::RootCopied {
                path: frame.path.clone(),
            },
        );
    }
    Ok(plan.graph.roots().len())
}

/// Diff-encode every non-root frame against its source parent.
///
/// Returns stats for the frames written and the list of frames that failed.
fn encode_diffs(
    backend: &impl ImageBackend,
    plan: &Plan,
    staging: &Path,
    config: &ProcessConfig,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<(Vec<DiffStats>, Vec<FailedFrame>), ProcessError> {
    let jobs: Vec<(FrameId, DiffParams)> = plan
        .graph
        .parents()
        .iter()
        .map(|(&child, &parent)| {
            let params = DiffParams {
                child: plan.frames.source_path(child),
                parent: plan.frames.source_path(parent),
                output: staging.join(&plan.frames.frames[child].path),
                level: config.png_level,
                optimize_alpha: config.optimize_alpha,
            };
            (child, params)
        })
        .collect();
    let total = jobs.len();
    emit(
        events,
        ProcessEvent::EncodingStarted {
            diffs: total,
            workers: config.encode_workers,
        },
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.encode_workers.max(1))
        .build()?;
    let (tx, rx) = mpsc::channel::<(FrameId, Result<DiffStats, BackendError>)>();

    let mut encoded = Vec::with_capacity(total);
    let mut failed = Vec::new();
    std::thread::scope(|s| {
        let jobs = &jobs;
        let pool = &pool;
        s.spawn(move || {
            pool.install(|| {
                jobs.par_iter().for_each_with(tx, |tx, (child, params)| {
                    tx.send((*child, backend.encode_diff(params))).ok();
                });
            });
        });

        for (done, (id, result)) in rx.iter().enumerate() {
            let done = done + 1;
            let path = plan.frames.frames[id].path.clone();
            match result {
                Ok(stats) => {
                    encoded.push(stats);
                    emit(
                        events,
                        ProcessEvent::FrameEncoded {
                            done,
                            total,
                            path,
                            stats,
                        },
                    );
                }
                Err(e) => {
                    warn!(frame = %path, error = %e, "frame not encoded");
                    let reason = e.to_string();
                    emit(
                        events,
                        ProcessEvent::FrameFailed {
                            done,
                            total,
                            path: path.clone(),
                            reason: reason.clone(),
                        },
                    );
                    failed.push(FailedFrame { id, path, reason });
                }
            }
        }
    });

    failed.sort_by_key(|f| f.id);
    Ok((encoded, failed))
}
