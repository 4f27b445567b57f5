//! Image processing: decoding, scoring, diffing, PNG output.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Score a pair** | [`calculations::similarity`] |
//! | **Diff layer** | [`calculations::diff_layer`] (RGB + binary alpha mask) |
//! | **Encode diff** | `oxipng` (RGBA8, alpha optimization) |
//! | **Reconstruct** | [`calculations::composite_over`] |
//!
//! The module is split into:
//! - **Calculations**: Pure pixel functions (unit testable)
//! - **Parameters**: Data structures describing one diff-encoding unit
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use params::{DiffParams, DiffStats, PngLevel};
pub use rust_backend::RustBackend;
