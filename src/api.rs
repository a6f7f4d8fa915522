//! High-level API for sfxkit operations

use std::path::Path;

use log::debug;

use crate::exceptions::Result;
use crate::sfx::archive;
use crate::sfx::constants::META_FILE_NAME;
use crate::sfx::host::HostEnvironment;
use crate::sfx::installer::{InstallReport, Installer};
use crate::sfx::metadata::{MetadataMerge, merge_metadata};
use crate::sfx::packager::{self, PackageSummary, PackagerOptions};
use crate::sfx::RunMode;
use crate::sfx::trailer::{self, ArchiveLocation};
use crate::sfx::uninstaller::{UninstallReport, Uninstaller};

/// Result of inspecting a built installer
#[derive(Debug)]
pub struct InstallerInfo {
    pub location: ArchiveLocation,
    /// Entry names and sizes in archive order
    pub entries: Vec<(String, usize)>,
    pub metadata: MetadataMerge,
}

/// What a stub run did
#[derive(Debug)]
pub enum StubOutcome {
    Installed(InstallReport),
    Uninstalled(UninstallReport),
}

/// Build a self-extracting installer from a stub and a payload
pub fn build_installer(
    stub_path: &Path,
    payload_path: &Path,
    output_path: &Path,
    options: &PackagerOptions,
) -> Result<PackageSummary> {
    packager::create_installer(stub_path, payload_path, output_path, options)
}

/// Read back the embedded archive and metadata of an installer
pub fn inspect_installer(path: &Path) -> Result<InstallerInfo> {
    let location = trailer::locate(path)?;
    let entries = archive::decode(&trailer::extract(path)?)?;
    let raw_meta = archive::find(&entries, META_FILE_NAME).map(|e| e.data.as_slice());
    let metadata = merge_metadata(raw_meta);
    debug!("🔍 {path:?}: {} entries", entries.len());

    Ok(InstallerInfo {
        location,
        entries: entries
            .into_iter()
            .map(|e| (e.name, e.data.len()))
            .collect(),
        metadata,
    })
}

/// Install from the setup binary at `self_path`
pub fn install(self_path: &Path, host: HostEnvironment) -> Result<InstallReport> {
    Installer::new(self_path.to_path_buf(), host).run()
}

/// Uninstall using the uninstaller binary at `self_path`
pub fn uninstall(self_path: &Path, host: HostEnvironment) -> UninstallReport {
    Uninstaller::new(self_path.to_path_buf(), host).run()
}

/// Run the stub: pick install or uninstall from the binary's own name
///
/// When uninstalling, `acknowledge` runs after the files are removed and
/// before the deferred-delete script is started.
pub fn run_stub(self_path: &Path, acknowledge: fn()) -> Result<StubOutcome> {
    let host = HostEnvironment::detect()?;
    match RunMode::detect(self_path) {
        RunMode::Install => install(self_path, host).map(StubOutcome::Installed),
        RunMode::Uninstall => Ok(StubOutcome::Uninstalled(
            Uninstaller::new(self_path.to_path_buf(), host)
                .with_acknowledge(acknowledge)
                .run(),
        )),
    }
}
