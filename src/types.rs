//! Shared types passed between pipeline stages.
//!
//! Discovery produces a [`FrameSet`]; scoring turns it into [`PairScore`]s;
//! the forest and graph stages work purely on frame ids. Everything here is
//! plain data with no I/O.

use std::path::PathBuf;

/// Stable integer identifier for a frame, assigned 0-based by discovery order.
pub type FrameId = usize;

/// One input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: FrameId,
    /// Path relative to the input directory, always `/`-separated.
    pub path: String,
    /// On-disk size in bytes. Used for root selection.
    pub size: u64,
}

/// The ordered frames of one run plus the directory they are relative to.
///
/// Built once by [`scan`](crate::scan) and handed by reference to every
/// downstream stage, so nothing depends on filesystem traversal order.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub root: PathBuf,
    pub frames: Vec<Frame>,
}

impl FrameSet {
    pub fn new(root: impl Into<PathBuf>, frames: Vec<Frame>) -> Self {
        Self {
            root: root.into(),
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Absolute (root-joined) path of a frame's source file.
    pub fn source_path(&self, id: FrameId) -> PathBuf {
        self.root.join(&self.frames[id].path)
    }

    pub fn sizes(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.size).collect()
    }

    /// Every unordered pair `(a, b)` with `a < b`, in lexicographic order.
    pub fn pairs(&self) -> Vec<(FrameId, FrameId)> {
        let n = self.frames.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for a in 0..n {
            for b in (a + 1)..n {
                pairs.push((a, b));
            }
        }
        pairs
    }
}

/// Similarity between two frames: count of pixels identical in both.
///
/// Only successful comparisons become a `PairScore`; failed ones are dropped
/// at the scoring boundary and never reach the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairScore {
    pub score: u64,
    pub a: FrameId,
    pub b: FrameId,
}

impl PairScore {
    pub fn new(score: u64, a: FrameId, b: FrameId) -> Self {
        Self { score, a, b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> FrameSet {
        let frames = (0..n)
            .map(|id| Frame {
                id,
                path: format!("{id}.png"),
                size: 100,
            })
            .collect();
        FrameSet::new("/input", frames)
    }

    #[test]
    fn pairs_are_unordered_and_complete() {
        let set = frames(4);
        assert_eq!(
            set.pairs(),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn pairs_of_single_frame_is_empty() {
        assert!(frames(1).pairs().is_empty());
    }

    #[test]
    fn source_path_joins_root() {
        let set = frames(2);
        assert_eq!(set.source_path(1), PathBuf::from("/input/1.png"));
    }
}
