//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how*. They are the interface
//! between the pipeline (which decides which frame diffs against which) and
//! the [`backend`](super::backend) (which does the pixel work), so a mock
//! backend can stand in during pipeline tests.

use std::path::PathBuf;

/// oxipng optimization preset (0-6). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngLevel(u8);

impl PngLevel {
    pub const MAX: u8 = 6;

    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for PngLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Full specification of one diff-encoding unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffParams {
    /// Frame being encoded.
    pub child: PathBuf,
    /// Frame it is diffed against (always the original source file).
    pub parent: PathBuf,
    /// Destination of the RGBA diff PNG.
    pub output: PathBuf,
    pub level: PngLevel,
    pub optimize_alpha: bool,
}

/// What an encoded diff ended up containing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub width: u32,
    pub height: u32,
    /// Pixels that differ from the parent (opaque in the output).
    pub opaque_pixels: u64,
    /// Size of the written PNG.
    pub bytes: u64,
}
