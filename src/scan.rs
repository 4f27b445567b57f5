//! Frame discovery.
//!
//! Walks the input directory recursively and turns every file with a frame
//! extension into a [`Frame`]. The result is an explicit, ordered
//! [`FrameSet`]: ids are assigned here, once, and every later stage works
//! from this list instead of re-reading the filesystem.
//!
//! ## Ordering
//!
//! ```text
//! 1.png, 2.png, 10.png          → numeric: 1, 2, 10
//! shots/003.png, 7.png          → numeric: 003 (=3), 7
//! a.png, b/1.png, 2.png         → lexicographic: 2.png, a.png, b/1.png
//! ```
//!
//! If **every** file stem parses as an integer, frames are ordered by that
//! integer (ties by relative path). Otherwise the whole set falls back to
//! lexicographic order of the relative path.
//!
//! ## Validation
//!
//! Fewer than two frames makes the encoding problem ill-defined, so
//! [`scan`] fails with [`ScanError::TooFewFrames`] before anything is written.

use crate::types::{Frame, FrameSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input directory not found: {0}")]
    NotADirectory(PathBuf),
    #[error("At least two images are required, found {found}")]
    TooFewFrames { found: usize },
}

/// Discover frames under `root` and assign ids.
///
/// Fails if fewer than two frames are found.
pub fn scan(root: &Path, extensions: &[String]) -> Result<FrameSet, ScanError> {
    let set = discover(root, extensions)?;
    if set.len() < 2 {
        return Err(ScanError::TooFewFrames { found: set.len() });
    }
    Ok(set)
}

/// Discover frames without enforcing the two-frame minimum.
pub fn discover(root: &Path, extensions: &[String]) -> Result<FrameSet, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    // Directory symlinks are not descended into; file symlinks count as frames
    let mut found: Vec<(String, u64)> = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.path().is_file() || !has_frame_extension(entry.path(), extensions) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let size = fs::metadata(entry.path())?.len();
        found.push((relative_key(&rel), size));
    }

    order_paths(&mut found);

    let frames = found
        .into_iter()
        .enumerate()
        .map(|(id, (path, size))| Frame { id, path, size })
        .collect();

    Ok(FrameSet::new(root, frames))
}

fn has_frame_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext)))
}

/// Relative path rendered with `/` separators on every platform.
fn relative_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Integer value of a path's file stem, if it is one.
fn numeric_stem(path: &str) -> Option<u64> {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Sort in place: numerically by stem when every stem is an integer,
/// lexicographically by relative path otherwise.
fn order_paths<T>(paths: &mut [(String, T)]) {
    if paths.iter().all(|(p, _)| numeric_stem(p).is_some()) {
        paths.sort_by(|(a, _), (b, _)| {
            numeric_stem(a)
                .cmp(&numeric_stem(b))
                .then_with(|| a.cmp(b))
        });
    } else {
        paths.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}
