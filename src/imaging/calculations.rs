//! Pure pixel math: scoring, diff layers, compositing.
//!
//! No I/O here. Everything operates on decoded buffers so it can be tested
//! with tiny synthetic images.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use std::borrow::Cow;

/// Collapse a per-channel RGB difference to one luminance value.
///
/// ITU-R 601-2 weights in 16.16 fixed point, rounded.
#[inline]
pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Bring `other` to `reference`'s dimensions (nearest-neighbour).
fn match_dimensions<'a>(reference: &DynamicImage, other: &'a DynamicImage) -> Cow<'a, DynamicImage> {
    let (w, h) = reference.dimensions();
    if other.dimensions() == (w, h) {
        Cow::Borrowed(other)
    } else {
        Cow::Owned(other.resize_exact(w, h, FilterType::Nearest))
    }
}

/// Count of pixels identical between two images.
///
/// `second` is resampled to `first`'s size and compared in `first`'s color
/// model: RGB when `first` has color, single-channel gray otherwise. Alpha
/// never contributes. A pixel counts as identical when its collapsed
/// difference is exactly zero.
pub fn similarity(first: &DynamicImage, second: &DynamicImage) -> u64 {
    let second = match_dimensions(first, second);
    let total = first.width() as u64 * first.height() as u64;

    let changed = if first.color().has_color() {
        let a = first.to_rgb8();
        let b = second.to_rgb8();
        a.pixels()
            .zip(b.pixels())
            .filter(|(pa, pb)| {
                luma_601(
                    pa[0].abs_diff(pb[0]),
                    pa[1].abs_diff(pb[1]),
                    pa[2].abs_diff(pb[2]),
                ) != 0
            })
            .count() as u64
    } else {
        let a = first.to_luma8();
        let b = second.to_luma8();
        a.pixels()
            .zip(b.pixels())
            .filter(|(pa, pb)| pa[0] != pb[0])
            .count() as u64
    };

    total - changed
}

/// Build the diff layer of `child` against `parent`.
///
/// The layer carries the child's colors; alpha is 255 wherever any channel
/// differs from the parent and 0 elsewhere. Returns `None` if the sizes differ.
pub fn diff_layer(child: &RgbImage, parent: &RgbImage) -> Option<RgbaImage> {
    if child.dimensions() != parent.dimensions() {
        return None;
    }
    let (w, h) = child.dimensions();
    Some(RgbaImage::from_fn(w, h, |x, y| {
        let Rgb([r, g, b]) = *child.get_pixel(x, y);
        let alpha = if child.get_pixel(x, y) != parent.get_pixel(x, y) {
            255
        } else {
            0
        };
        Rgba([r, g, b, alpha])
    }))
}

/// Number of pixels with non-zero alpha.
pub fn opaque_count(layer: &RgbaImage) -> u64 {
    layer.pixels().filter(|p| p[3] != 0).count() as u64
}

/// Composite `layer` source-over onto `base` in place.
///
/// Diff layers only use alpha 0 or 255, but partial alpha is blended so a
/// hand-edited layer still composes sensibly. Returns `false` (and leaves
/// `base` untouched) if the sizes differ.
pub fn composite_over(base: &mut RgbImage, layer: &RgbaImage) -> bool {
    if base.dimensions() != layer.dimensions() {
        return false;
    }
    for (dst, src) in base.pixels_mut().zip(layer.pixels()) {
        let alpha = src[3] as u32;
        match alpha {
            0 => {}
            255 => *dst = Rgb([src[0], src[1], src[2]]),
            _ => {
                for c in 0..3 {
                    let blended = (src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha) + 127) / 255;
                    dst[c] = blended as u8;
                }
            }
        }
    }
    true
}
