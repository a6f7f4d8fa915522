//! Self-extracting installer engine
//!
//! `packager` fuses a stub, a payload and metadata into one setup binary.
//! At run time the same stub extracts itself (`installer`) or, when running
//! under an uninstall name, reverses the install (`uninstaller`).

pub mod archive;
pub mod constants;
pub mod defaults;
pub mod host;
pub mod installer;
pub mod metadata;
pub mod packager;
pub mod registration;
pub mod shortcuts;
pub mod trailer;
pub mod uninstaller;

use std::path::Path;

use constants::UNINSTALL_MARKER;

/// Which pipeline a running stub executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Install,
    Uninstall,
}

impl RunMode {
    /// Uninstall when the binary's file name contains the uninstall marker
    pub fn detect(self_path: &Path) -> Self {
        let is_uninstall = self_path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains(UNINSTALL_MARKER))
            .unwrap_or(false);
        if is_uninstall {
            RunMode::Uninstall
        } else {
            RunMode::Install
        }
    }
}
