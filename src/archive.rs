//! Per-concept zip archive of composite screenshots.

use crate::catalog::BannerSize;
use crate::rendering::Screenshot;
use crate::{Error, Result};
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `full_ISI_Screenshots_<concept>.zip`
pub fn archive_file_name(concept: &str) -> String {
    format!("full_ISI_Screenshots_{}.zip", concept)
}

/// `full_ISI_screenshot_<concept>_<W>x<H>.png`
pub fn entry_name(concept: &str, size: BannerSize) -> String {
    format!("full_ISI_screenshot_{}_{}.png", concept, size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub name: String,
    /// Uncompressed size
    pub bytes: u64,
    /// Hex SHA-256 of the uncompressed entry
    pub sha256: String,
}

/// What a finalized archive contains.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub concept: String,
    /// Size of the archive file on disk
    pub total_bytes: u64,
    pub entries: Vec<EntrySummary>,
}

struct OpenArchive {
    writer: ZipWriter<File>,
    names: HashSet<String>,
    entries: Vec<EntrySummary>,
}

/// An open archive stream that accepts entries from concurrent captures.
///
/// Appends are serialized by a mutex; each entry is written whole before
/// the next one starts. All methods do blocking file I/O; async callers
/// go through `spawn_blocking`.
pub struct ArchiveBuilder {
    path: PathBuf,
    concept: String,
    state: Mutex<OpenArchive>,
}

impl ArchiveBuilder {
    /// Create `<output_dir>/full_ISI_Screenshots_<concept>.zip`, truncating any
    /// existing file.
    pub fn create(output_dir: impl AsRef<Path>, concept: &str) -> Result<Self> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(archive_file_name(concept));
        let file = File::create(&path)?;
        debug!("opened archive {}", path.display());

        Ok(Self {
            path,
            concept: concept.to_string(),
            state: Mutex::new(OpenArchive {
                writer: ZipWriter::new(file),
                names: HashSet::new(),
                entries: Vec::new(),
            }),
        })
    }

    /// Append one entry. Duplicate names are rejected.
    pub fn append(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::ArchiveError(format!("{} is poisoned by an earlier failure", self.path.display())))?;

        if !state.names.insert(name.to_string()) {
            return Err(Error::ArchiveError(format!("duplicate entry {}", name)));
        }

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));
        state.writer.start_file(name, options)?;
        state.writer.write_all(data)?;

        state.entries.push(EntrySummary {
            name: name.to_string(),
            bytes: data.len() as u64,
            sha256: hex::encode(Sha256::digest(data)),
        });
        debug!("appended {} ({} bytes) to {}", name, data.len(), self.path.display());
        Ok(())
    }

    /// Append a composite under its deterministic entry name.
    pub fn append_screenshot(&self, size: BannerSize, shot: &Screenshot) -> Result<()> {
        self.append(&entry_name(&self.concept, size), &shot.png_data)
    }

    /// Write the central directory and close the file.
    pub fn finalize(self) -> Result<ArchiveSummary> {
        let state = self
            .state
            .into_inner()
            .map_err(|_| Error::ArchiveError(format!("{} is poisoned by an earlier failure", self.path.display())))?;
        let OpenArchive {
            mut writer, entries, ..
        } = state;

        let file = writer.finish()?;
        file.sync_all()?;
        let total_bytes = file.metadata()?.len();

        info!(
            "finalized {} with {} entr{} ({} bytes)",
            self.path.display(),
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            total_bytes
        );

        Ok(ArchiveSummary {
            path: self.path,
            concept: self.concept,
            total_bytes,
            entries,
        })
    }
}
