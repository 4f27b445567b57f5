//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Resample for scoring | `image::DynamicImage::resize_exact` (`Nearest`) |
//! | Diff layer | [`calculations::diff_layer`](super::calculations::diff_layer) |
//! | Encode → PNG | `oxipng::RawImage` (RGBA8, `optimize_alpha`) |

use super::backend::{BackendError, ImageBackend};
use super::calculations::{diff_layer, opaque_count, similarity};
use super::params::{DiffParams, DiffStats, PngLevel};
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Backend built on the `image` crate for decoding and `oxipng` for output.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Load and decode an image from disk.
///
/// The format is sniffed from the content, so a mislabeled extension still
/// decodes and a truncated file fails here rather than later.
pub fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(|e| BackendError::decode(path, e))?
        .with_guessed_format()
        .map_err(|e| BackendError::decode(path, e))?
        .decode()
        .map_err(|e| BackendError::decode(path, e))
}

/// Decode an image held in memory (e.g. read out of an archive).
///
/// `name` is only used for error messages.
pub fn decode_bytes(bytes: &[u8], name: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::decode(name, e))?
        .decode()
        .map_err(|e| BackendError::decode(name, e))
}

/// Compress an RGBA8 buffer into an optimized PNG.
pub fn encode_rgba_png(
    layer: &RgbaImage,
    level: PngLevel,
    optimize_alpha: bool,
    name: &Path,
) -> Result<Vec<u8>, BackendError> {
    let encode_err = |e: oxipng::PngError| BackendError::Encode {
        path: name.to_path_buf(),
        message: e.to_string(),
    };
    let raw = oxipng::RawImage::new(
        layer.width(),
        layer.height(),
        oxipng::ColorType::RGBA,
        oxipng::BitDepth::Eight,
        layer.as_raw().clone(),
    )
    .map_err(encode_err)?;

    let mut options = oxipng::Options::from_preset(level.value());
    options.optimize_alpha = optimize_alpha;
    raw.create_optimized_png(&options).map_err(encode_err)
}

/// Write a reconstructed frame as a plain RGB PNG.
pub fn save_rgb_png(img: &RgbImage, path: &Path) -> Result<(), BackendError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| BackendError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| BackendError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Write through a `.part` sibling renamed into place. On failure neither
/// name is left on disk.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);
    std::fs::write(&part, bytes)
        .and_then(|()| std::fs::rename(&part, path))
        .map_err(|source| {
            std::fs::remove_file(&part).ok();
            BackendError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
}

impl ImageBackend for RustBackend {
    fn similarity(&self, first: &Path, second: &Path) -> Result<u64, BackendError> {
        let a = load_image(first)?;
        let b = load_image(second)?;
        Ok(similarity(&a, &b))
    }

    fn encode_diff(&self, params: &DiffParams) -> Result<DiffStats, BackendError> {
        if let Some(dir) = params.output.parent() {
            std::fs::create_dir_all(dir).map_err(|source| BackendError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        // Alpha is dropped here: in the output it carries the diff mask
        let child = load_image(&params.child)?.to_rgb8();
        let parent = load_image(&params.parent)?.to_rgb8();

        let layer =
            diff_layer(&child, &parent).ok_or_else(|| BackendError::DimensionMismatch {
                child: params.child.clone(),
                parent: params.parent.clone(),
                child_dims: child.dimensions(),
                parent_dims: parent.dimensions(),
            })?;

        let png = encode_rgba_png(&layer, params.level, params.optimize_alpha, &params.output)?;
        write_output(&params.output, &png)?;

        Ok(DiffStats {
            width: layer.width(),
            height: layer.height(),
            opaque_pixels: opaque_count(&layer),
            bytes: png.len() as u64,
        })
    }
}
