//! The optimization map stored at the root of every archive.
//!
//! ```json
//! {
//!   "dependencies": {
//!     "0": "1",
//!     "2": "0"
//!   },
//!   "image_map": {
//!     "0": "shots/0.png",
//!     "1": "shots/1.png",
//!     "2": "shots/2.png"
//!   },
//!   "root_images": [
//!     "1"
//!   ]
//! }
//! ```
//!
//! Ids are decimal strings. Object keys sort lexicographically (`"10"`
//! before `"2"`), `root_images` sorts numerically, and the document is
//! pretty-printed with two-space indentation, so the same plan always
//! serializes to the same bytes.

use crate::graph::DependencyGraph;
use crate::types::{FrameId, FrameSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default name of the manifest at the archive root.
pub const MANIFEST_FILENAME: &str = "optimization_map.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid frame id {0:?}")]
    InvalidId(String),
    #[error("Frame {0} is referenced but missing from image_map")]
    UnknownFrame(FrameId),
}

/// Serialized form of the frame map, root set, and dependency map.
///
/// Field order is alphabetical so the struct serializes with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Child id → parent id for every non-root frame.
    pub dependencies: BTreeMap<String, String>,
    /// Frame id → path relative to the input directory.
    pub image_map: BTreeMap<String, String>,
    /// Ids of frames stored verbatim, ascending by numeric value.
    pub root_images: Vec<String>,
}

impl Manifest {
    pub fn new(frames: &FrameSet, graph: &DependencyGraph) -> Self {
        Self {
            dependencies: graph
                .parents()
                .iter()
                .map(|(child, parent)| (child.to_string(), parent.to_string()))
                .collect(),
            image_map: frames
                .frames
                .iter()
                .map(|f| (f.id.to_string(), f.path.clone()))
                .collect(),
            root_images: graph.roots().iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn frame_count(&self) -> usize {
        self.image_map.len()
    }

    /// Relative path of a frame.
    pub fn path_of(&self, id: FrameId) -> Option<&str> {
        self.image_map.get(&id.to_string()).map(String::as_str)
    }

    /// Id of the frame stored at `path`.
    pub fn id_of(&self, path: &str) -> Option<FrameId> {
        self.image_map
            .iter()
            .find(|(_, p)| p.as_str() == path)
            .and_then(|(id, _)| id.parse().ok())
    }

    /// Rebuild the typed dependency graph, checking every id.
    ///
    /// Ids must be dense `0..n` where `n` is the size of `image_map`.
    pub fn graph(&self) -> Result<DependencyGraph, ManifestError> {
        let n = self.frame_count();
        for key in self.image_map.keys() {
            let id = parse_id(key)?;
            if id >= n {
                return Err(ManifestError::InvalidId(key.clone()));
            }
        }
        let known = |raw: &String| -> Result<FrameId, ManifestError> {
            let id = parse_id(raw)?;
            if id >= n {
                return Err(ManifestError::UnknownFrame(id));
            }
            Ok(id)
        };

        let roots = self
            .root_images
            .iter()
            .map(known)
            .collect::<Result<Vec<_>, _>>()?;
        let parents = self
            .dependencies
            .iter()
            .map(|(child, parent)| Ok((known(child)?, known(parent)?)))
            .collect::<Result<BTreeMap<_, _>, ManifestError>>()?;

        Ok(DependencyGraph::from_parts(n, roots, parents))
    }
}

fn parse_id(raw: &str) -> Result<FrameId, ManifestError> {
    raw.parse()
        .map_err(|_| ManifestError::InvalidId(raw.to_string()))
}
