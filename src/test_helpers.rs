//! Shared test utilities for the dia test suite.
//!
//! Builds small image sequences on disk so pipeline tests can run against
//! real files without checked-in fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let base = solid(4, 4, [0, 0, 0]);
//! write_sequence(tmp.path(), &[
//!     ("1.png", base.clone()),
//!     ("2.png", with_pixel(&base, 1, 1, [255, 0, 0])),
//! ]);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

// =========================================================================
// Image builders
// =========================================================================

/// A `w`×`h` image filled with one colour.
pub fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(rgb))
}

/// Copy of `base` with one pixel changed.
pub fn with_pixel(base: &RgbImage, x: u32, y: u32, rgb: [u8; 3]) -> RgbImage {
    let mut img = base.clone();
    img.put_pixel(x, y, Rgb(rgb));
    img
}

// =========================================================================
// Writers: create parent dirs, panic on failure
// =========================================================================

pub fn write_png(path: &Path, img: &DynamicImage) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    img.save_with_format(path, ImageFormat::Png)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}

pub fn write_rgb_png(path: &Path, img: &RgbImage) {
    write_png(path, &DynamicImage::ImageRgb8(img.clone()));
}

/// Write each `(relative path, image)` under `root`.
pub fn write_sequence(root: &Path, frames: &[(&str, RgbImage)]) {
    for (name, img) in frames {
        write_rgb_png(&root.join(name), img);
    }
}

/// Write bytes that carry a `.png` name but do not decode.
pub fn write_garbage(path: &Path) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(path, b"not an image at all").unwrap();
}
