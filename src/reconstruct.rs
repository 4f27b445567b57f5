//! Rebuilding full frames from an archive.
//!
//! A frame is reconstructed by walking its dependency chain up to the root,
//! decoding the root, then compositing each diff on top in order:
//!
//! ```text
//! chain(7) = [2, 5, 7]
//!
//! rgb(2)                       root, decoded as-is
//! rgb(5) = rgb(2) ◁ diff(5)    source-over composite
//! rgb(7) = rgb(5) ◁ diff(7)
//! ```
//!
//! Diffs are encoded against the original source of their parent, and the
//! reconstructed parent equals that source in RGB, so every step is exact.

use crate::archive::{ArchiveError, DiaArchive};
use crate::graph::{DependencyGraph, GraphError};
use crate::imaging::BackendError;
use crate::imaging::calculations::composite_over;
use crate::imaging::rust_backend::decode_bytes;
use crate::manifest::ManifestError;
use crate::types::FrameId;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Dependency error: {0}")]
    Graph(#[from] GraphError),
    #[error("Image error: {0}")]
    Imaging(#[from] BackendError),
    #[error("No frame matches {0:?}")]
    UnknownFrame(String),
    #[error("Diff for {child} does not match the size of its parent")]
    SizeMismatch { child: String },
}

/// One archive entry in a frame listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub id: FrameId,
    pub path: String,
    /// `None` for roots.
    pub parent: Option<FrameId>,
    /// Number of diffs composited to rebuild this frame.
    pub depth: usize,
}

/// Reads frames back out of a `.dia` archive.
pub struct Reconstructor {
    archive: DiaArchive,
    graph: DependencyGraph,
}

impl Reconstructor {
    pub fn open(path: &Path, manifest_name: &str) -> Result<Self, ReconstructError> {
        let archive = DiaArchive::open(path, manifest_name)?;
        let graph = archive.manifest().graph()?;
        Ok(Self { archive, graph })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Every frame with its parent and chain depth, by id.
    pub fn list(&self) -> Result<Vec<FrameEntry>, ReconstructError> {
        let manifest = self.archive.manifest();
        (0..self.graph.frame_count())
            .map(|id| {
                let path = manifest
                    .path_of(id)
                    .ok_or(ManifestError::UnknownFrame(id))?
                    .to_string();
                Ok(FrameEntry {
                    id,
                    path,
                    parent: self.graph.parent(id),
                    depth: self.graph.chain(id)?.len() - 1,
                })
            })
            .collect()
    }

    /// Resolve a user-supplied frame reference: a numeric id or a relative path.
    pub fn resolve(&self, reference: &str) -> Result<FrameId, ReconstructError> {
        let manifest = self.archive.manifest();
        if let Some(id) = reference
            .parse::<FrameId>()
            .ok()
            .filter(|&id| manifest.path_of(id).is_some())
        {
            return Ok(id);
        }
        let normalized = reference.replace('\\', "/");
        manifest
            .id_of(normalized.trim_start_matches("./"))
            .ok_or_else(|| ReconstructError::UnknownFrame(reference.to_string()))
    }

    /// Full RGB pixels of frame `id`.
    pub fn frame(&mut self, id: FrameId) -> Result<RgbImage, ReconstructError> {
        let chain = self.graph.chain(id)?;
        let mut layers = chain.into_iter();

        let root = layers.next().ok_or(GraphError::UnknownFrame(id))?;
        let mut canvas = self.decode_entry(root)?.to_rgb8();

        for child in layers {
            let layer = self.decode_entry(child)?.to_rgba8();
            if !composite_over(&mut canvas, &layer) {
                let child = self.entry_name(child)?;
                return Err(ReconstructError::SizeMismatch { child });
            }
        }
        Ok(canvas)
    }

    fn entry_name(&self, id: FrameId) -> Result<String, ReconstructError> {
        Ok(self
            .archive
            .manifest()
            .path_of(id)
            .ok_or(ManifestError::UnknownFrame(id))?
            .to_string())
    }

    fn decode_entry(&mut self, id: FrameId) -> Result<image::DynamicImage, ReconstructError> {
        let name = self.entry_name(id)?;
        let bytes = self.archive.read(&name)?;
        Ok(decode_bytes(&bytes, Path::new(&name))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::write_archive;
    use crate::imaging::PngLevel;
    use crate::imaging::calculations::diff_layer;
    use crate::imaging::rust_backend::encode_rgba_png;
    use crate::manifest::{MANIFEST_FILENAME, Manifest};
    use crate::test_helpers::write_rgb_png;
    use image::Rgb;
    use std::fs;
    use tempfile::TempDir;

    /// Hand-built archive: 0 is root, 1 diffs against 0, 2 diffs against 1.
    fn chain_archive(tmp: &Path) -> (std::path::PathBuf, Vec<RgbImage>) {
        let f0 = RgbImage::from_fn(6, 4, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 5]));
        let mut f1 = f0.clone();
        f1.put_pixel(1, 1, Rgb([255, 0, 0]));
        let mut f2 = f1.clone();
        f2.put_pixel(5, 3, Rgb([0, 255, 0]));

        let staging = tmp.join("staging");
        fs::create_dir_all(staging.join("s")).unwrap();
        write_rgb_png(&staging.join("s/0.png"), &f0);
        for (name, child, parent) in [("s/1.png", &f1, &f0), ("s/2.png", &f2, &f1)] {
            let layer = diff_layer(child, parent).unwrap();
            let png = encode_rgba_png(&layer, PngLevel::new(1), true, Path::new(name)).unwrap();
            fs::write(staging.join(name), png).unwrap();
        }

        let mut manifest = Manifest::default();
        for id in 0..3 {
            manifest
                .image_map
                .insert(id.to_string(), format!("s/{id}.png"));
        }
        manifest.root_images.push("0".into());
        manifest.dependencies.insert("1".into(), "0".into());
        manifest.dependencies.insert("2".into(), "1".into());
        fs::write(staging.join(MANIFEST_FILENAME), manifest.to_json().unwrap()).unwrap();

        let output = tmp.join("chain.dia");
        write_archive(&staging, &output).unwrap();
        (output, vec![f0, f1, f2])
    }

    #[test]
    fn reconstructs_every_frame_in_chain() {
        let tmp = TempDir::new().unwrap();
        let (path, originals) = chain_archive(tmp.path());
        let mut r = Reconstructor::open(&path, MANIFEST_FILENAME).unwrap();
        for (id, original) in originals.iter().enumerate() {
            assert_eq!(&r.frame(id).unwrap(), original, "frame {id}");
        }
    }

    #[test]
    fn list_reports_parents_and_depth() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = chain_archive(tmp.path());
        let r = Reconstructor::open(&path, MANIFEST_FILENAME).unwrap();
        let list = r.list().unwrap();
        assert_eq!(
            list.iter()
                .map(|e| (e.id, e.parent, e.depth))
                .collect::<Vec<_>>(),
            vec![(0, None, 0), (1, Some(0), 1), (2, Some(1), 2)]
        );
        assert_eq!(list[2].path, "s/2.png");
    }

    #[test]
    fn resolve_by_id_or_path() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = chain_archive(tmp.path());
        let r = Reconstructor::open(&path, MANIFEST_FILENAME).unwrap();
        assert_eq!(r.resolve("2").unwrap(), 2);
        assert_eq!(r.resolve("s/1.png").unwrap(), 1);
        assert_eq!(r.resolve("./s/1.png").unwrap(), 1);
        assert!(matches!(
            r.resolve("missing.png"),
            Err(ReconstructError::UnknownFrame(_))
        ));
        assert!(r.resolve("17").is_err());
    }

    #[test]
    fn unknown_id_errors() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = chain_archive(tmp.path());
        let mut r = Reconstructor::open(&path, MANIFEST_FILENAME).unwrap();
        assert!(matches!(
            r.frame(9),
            Err(ReconstructError::Graph(GraphError::UnknownFrame(9)))
        ));
    }
}
