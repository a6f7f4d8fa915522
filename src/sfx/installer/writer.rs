//! Write decoded archive entries to the install directory

use std::fs;
use std::path::Path;

use log::{debug, trace};

use crate::exceptions::Result;
use crate::sfx::archive::ArchiveEntry;
use crate::sfx::defaults::{DEFAULT_DIR_PERMS, DEFAULT_FILE_PERMS};

/// Counts of what was written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

/// Materialize every entry below `base`
///
/// Directory markers become directories. Files get their parent directories
/// created on demand and their stored mode, or [`DEFAULT_FILE_PERMS`] when none
/// was stored.
pub fn write_entries(entries: &[ArchiveEntry], base: &Path) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    fs::create_dir_all(base)?;

    for entry in entries {
        let target = entry.target_path(base)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            apply_mode(&target, entry.mode, DEFAULT_DIR_PERMS)?;
            stats.dirs += 1;
            trace!("📁 Created {target:?}");
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &entry.data)?;
        apply_mode(&target, entry.mode, DEFAULT_FILE_PERMS)?;
        stats.files += 1;
        stats.bytes += entry.data.len() as u64;
        trace!("📝 Wrote {target:?} ({} bytes)", entry.data.len());
    }

    debug!(
        "📝 Wrote {} files, {} directories, {} bytes to {base:?}",
        stats.files, stats.dirs, stats.bytes
    );
    Ok(stats)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32, default_mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if mode & 0o777 == 0 {
        default_mode
    } else {
        mode & 0o7777
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32, _default_mode: u32) -> Result<()> {
    Ok(())
}
