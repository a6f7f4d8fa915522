//! Archive codec: named entries <-> gzip-compressed tar blob
//!
//! Directory markers are names ending in `/` and carry no data. Parent
//! directories are not implied by the format; creating them is the writer's job.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, trace};
use tar::{Archive, Builder, EntryType, Header};

use super::constants::DIR_MARKER;
use super::defaults::{DEFAULT_DIR_PERMS, DEFAULT_FILE_PERMS};
use crate::exceptions::{FormatError, Result, SfxError};

/// One named member of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated relative path; a trailing `/` marks a directory
    pub name: String,
    /// Unix permission bits, 0 when unset
    pub mode: u32,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn file<S: Into<String>>(name: S, mode: u32, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mode,
            data,
        }
    }

    pub fn dir<S: Into<String>>(name: S) -> Self {
        let mut name = name.into();
        if !name.ends_with(DIR_MARKER) {
            name.push(DIR_MARKER);
        }
        Self {
            name,
            mode: DEFAULT_DIR_PERMS,
            data: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.name.ends_with(DIR_MARKER)
    }

    /// Name without the directory marker
    pub fn trimmed_name(&self) -> &str {
        self.name.trim_end_matches(DIR_MARKER)
    }

    /// Resolve this entry below `base`, refusing absolute or escaping names
    pub fn target_path(&self, base: &Path) -> Result<PathBuf> {
        let relative = Path::new(self.trimmed_name());
        let mut out = base.to_path_buf();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    out.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => {
                    return Err(FormatError::Archive(format!(
                        "entry '{}' escapes the install directory",
                        self.name
                    ))
                    .into());
                }
            }
        }
        if depth == 0 {
            return Err(FormatError::Archive(format!("entry '{}' has no name", self.name)).into());
        }
        Ok(out)
    }
}

/// Find an entry by exact name
pub fn find<'a>(entries: &'a [ArchiveEntry], name: &str) -> Option<&'a ArchiveEntry> {
    entries.iter().find(|e| e.name == name)
}

/// Compress a set of entries into a tar.gz blob
pub fn encode(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.name.as_str()) {
            return Err(SfxError::Build(format!(
                "duplicate archive entry '{}'",
                entry.name
            )));
        }
    }

    let mtime = chrono::Utc::now().timestamp().max(0) as u64;
    let encoder = GzEncoder::new(Vec::new(), Compression::best());
    let mut builder = Builder::new(encoder);

    for entry in entries {
        let mut header = Header::new_gnu();
        header.set_mtime(mtime);
        if entry.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(if entry.mode == 0 {
                DEFAULT_DIR_PERMS
            } else {
                entry.mode
            });
            builder.append_data(&mut header, entry.trimmed_name(), std::io::empty())?;
        } else {
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            header.set_mode(if entry.mode == 0 {
                DEFAULT_FILE_PERMS
            } else {
                entry.mode
            });
            builder.append_data(&mut header, &entry.name, entry.data.as_slice())?;
        }
        trace!("📄 Archived {} ({} bytes)", entry.name, entry.data.len());
    }

    let encoder = builder.into_inner()?;
    let blob = encoder.finish()?;
    debug!(
        "🗜️ Encoded {} entries into {} bytes",
        entries.len(),
        blob.len()
    );
    Ok(blob)
}

/// Decompress a tar.gz blob into entries, in archive order
pub fn decode(blob: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let corrupt = |e: std::io::Error| SfxError::from(FormatError::Archive(e.to_string()));

    let mut tar = Archive::new(GzDecoder::new(Cursor::new(blob)));
    let mut entries = Vec::new();

    for entry_result in tar.entries().map_err(corrupt)? {
        let mut entry = entry_result.map_err(corrupt)?;
        let name = entry
            .path()
            .map_err(corrupt)?
            .to_string_lossy()
            .replace('\\', "/");
        let mode = entry.header().mode().unwrap_or(0);

        match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous => {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).map_err(corrupt)?;
                trace!("📄 Decoded {name} ({} bytes, mode {mode:o})", data.len());
                entries.push(ArchiveEntry { name, mode, data });
            }
            EntryType::Directory => {
                let mut name = name.trim_end_matches(DIR_MARKER).to_string();
                name.push(DIR_MARKER);
                trace!("📁 Decoded directory {name}");
                entries.push(ArchiveEntry {
                    name,
                    mode,
                    data: Vec::new(),
                });
            }
            other => {
                debug!("⏭️ Skipping unsupported entry {name} ({other:?})");
            }
        }
    }

    debug!("📦 Decoded {} entries", entries.len());
    Ok(entries)
}
