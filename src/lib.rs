//! # dia
//!
//! Delta-encoded archives for image sequences. Frames that look alike are
//! stored once in full; every other frame is stored as a sparse RGBA diff
//! against its most similar neighbour, where unchanged pixels are fully
//! transparent and compress to almost nothing.
//!
//! # Architecture: Score, Plan, Encode
//!
//! ```text
//! 1. Scan      input/     →  FrameSet         (ordered frames, ids 0..n)
//! 2. Score     FrameSet   →  Vec<PairScore>   (identical-pixel count per pair)
//! 3. Plan      scores     →  Manifest         (max spanning forest → roots + parents)
//! 4. Encode    Manifest   →  staging/         (roots copied, children diffed)
//! 5. Archive   staging/   →  input.dia        (zip, deflate)
//! ```
//!
//! Decoding runs the other way: [`reconstruct`] walks a frame's chain from
//! its root and composites each diff in turn.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the input directory and assigns frame ids |
//! | [`forest`] | Union-find and the maximum spanning forest over pair scores |
//! | [`graph`] | Root selection and BFS parent assignment per component |
//! | [`manifest`] | The `optimization_map.json` document |
//! | [`process`] | Two-phase parallel pipeline: scoring, then diff encoding |
//! | [`archive`] | Writing and reading the `.dia` zip container |
//! | [`reconstruct`] | Rebuilding full frames from an archive |
//! | [`imaging`] | Pixel work: similarity, diff layers, PNG encoding |
//! | [`config`] | `dia.toml` loading, validation, merging |
//! | [`types`] | Frames, frame sets, pair scores |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Diffs Against Source Parents
//!
//! A child is diffed against the original file of its parent, not a
//! reconstruction. The diff is opaque exactly where the two differ, so
//! compositing it over a reconstructed parent that matches the source in RGB
//! yields the child exactly, however long the chain.
//!
//! ## Smallest File as Root
//!
//! Each connected component keeps its smallest file verbatim. Roots are the
//! only full-size entries, so this keeps the archive small when frames differ
//! mostly in noise.
//!
//! ## Deterministic Plans
//!
//! Scores arrive from the worker pool in completion order. Ties are broken by
//! frame ids before the forest is built, so the manifest is byte-identical
//! across runs and worker counts.

pub mod archive;
pub mod config;
pub mod forest;
pub mod graph;
pub mod imaging;
pub mod manifest;
pub mod output;
pub mod process;
pub mod reconstruct;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
