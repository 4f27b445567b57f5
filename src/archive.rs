//! The `.dia` container.
//!
//! A `.dia` file is a plain zip archive (deflate, no encryption):
//!
//! ```text
//! clip.dia
//! ├── optimization_map.json   # Manifest: frame map, roots, dependencies
//! ├── 0001.png                # Root frame: byte-identical copy of the source
//! ├── 0002.png                # Diff frame: RGBA, opaque where it differs
//! └── scene2/
//!     └── 0040.png
//! ```
//!
//! Writing packs a finished staging directory; reading gives random access to
//! the manifest and individual frame entries.

use crate::manifest::{Manifest, ManifestError};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Archive has no entry {0}")]
    MissingEntry(String),
}

/// Zip every file under `staging` into `output`.
///
/// Entry names are `/`-separated paths relative to `staging`, written in
/// sorted order. Returns the number of entries written.
pub fn write_archive(staging: &Path, output: &Path) -> Result<usize, ArchiveError> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(staging).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(staging).unwrap_or(entry.path());
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.path().to_path_buf()));
    }
    files.sort();

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in &files {
        zip.start_file(name.as_str(), options)?;
        let mut source = BufReader::new(File::open(path)?);
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;

    Ok(files.len())
}

/// Read access to a `.dia` archive.
pub struct DiaArchive {
    zip: ZipArchive<BufReader<File>>,
    manifest: Manifest,
}

impl DiaArchive {
    /// Open an archive and parse its manifest.
    pub fn open(path: &Path, manifest_name: &str) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let json = read_entry(&mut zip, manifest_name)?;
        let json = String::from_utf8(json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let manifest = Manifest::from_json(&json)?;
        Ok(Self { zip, manifest })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Names of every entry, in archive order.
    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_string).collect()
    }

    /// Raw bytes of an entry.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        read_entry(&mut self.zip, name)
    }
}

/// Upper bound on the buffer reserved up front for one entry.
const MAX_PREALLOC: u64 = 1 << 20;

fn read_entry(zip: &mut ZipArchive<BufReader<File>>, name: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingEntry(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    // The header size is untrusted; past the cap the buffer grows as it reads
    let hint = entry.size().min(MAX_PREALLOC) as usize;
    let mut bytes = Vec::with_capacity(hint);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}
