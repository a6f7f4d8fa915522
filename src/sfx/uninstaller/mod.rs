//! Uninstall pipeline and uninstall entry point generation
//!
//! The uninstaller is a byte copy of the setup binary placed in the install
//! directory. It recognises its role from its own file name and reverses the
//! installation step by step; no step aborts the sequence.

pub mod self_delete;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::archive;
use super::constants::META_FILE_NAME;
use super::defaults::uninstaller_file_name;
use super::host::HostEnvironment;
use super::installer::cleanup::check_cleanup_target;
use super::metadata::{InstallMetadata, merge_metadata};
use super::registration::delete_registration;
use super::shortcuts::remove_shortcuts;
use super::trailer;
use crate::exceptions::{Result, SfxError};
use crate::utils::{names_equal, progress};
use self_delete::SelfDeleteScript;

/// Copy the running binary to `<install_dir>/uninstall<ext>` unless present
///
/// Returns the uninstaller path and whether it was created now.
pub fn ensure_uninstaller(self_path: &Path, install_dir: &Path) -> Result<(PathBuf, bool)> {
    let target = install_dir.join(uninstaller_file_name());
    if target.exists() {
        debug!("🧾 Uninstaller already present at {target:?}");
        return Ok((target, false));
    }

    fs::copy(self_path, &target)?;

    #[cfg(unix)]
    {
        use crate::sfx::defaults::DEFAULT_EXECUTABLE_PERMS;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(DEFAULT_EXECUTABLE_PERMS))?;
    }

    info!("🧾 Created uninstaller {target:?}");
    Ok((target, true))
}

/// Uninstall progress, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UninstallState {
    Start,
    Identified,
    RegistryCleared,
    ShortcutsRemoved,
    FilesRemoved,
    SelfDeleteScheduled,
    Done,
}

/// What an uninstall run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub state: UninstallState,
    pub install_dir: PathBuf,
    /// Product names whose registration and shortcuts were cleared
    pub product_names: Vec<String>,
    pub removed_shortcuts: Vec<PathBuf>,
    pub removed_entries: usize,
    pub self_delete_script: Option<PathBuf>,
    /// Whether the acknowledge hook ran before the handoff
    pub acknowledged: bool,
    /// Best-effort step failures, in the order they happened
    pub failures: Vec<String>,
}

impl UninstallReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reverses an installation from inside the install directory
#[derive(Debug)]
pub struct Uninstaller {
    self_path: PathBuf,
    host: HostEnvironment,
    launch: bool,
    /// Process the deferred-delete script waits for
    parent_pid: Option<u32>,
    delete_policy: Option<(u32, u32)>,
    /// Called after the script is written and before it is launched
    acknowledge: Option<fn()>,
}

impl Uninstaller {
    pub fn new(self_path: PathBuf, host: HostEnvironment) -> Self {
        Self {
            self_path,
            host,
            launch: true,
            parent_pid: Some(std::process::id()),
            delete_policy: None,
            acknowledge: None,
        }
    }

    /// Whether to start the deferred-delete script or only write it
    pub fn with_launch(mut self, launch: bool) -> Self {
        self.launch = launch;
        self
    }

    pub fn with_parent_pid(mut self, parent_pid: Option<u32>) -> Self {
        self.parent_pid = parent_pid;
        self
    }

    /// Attempts and interval of the deferred-delete script
    pub fn with_delete_policy(mut self, max_attempts: u32, interval_secs: u32) -> Self {
        self.delete_policy = Some((max_attempts, interval_secs));
        self
    }

    /// Hook run before the script starts, e.g. waiting for the user to
    /// dismiss the console. The script's delete budget only starts once this
    /// process has exited.
    pub fn with_acknowledge(mut self, acknowledge: fn()) -> Self {
        self.acknowledge = Some(acknowledge);
        self
    }

    pub fn run(&self) -> UninstallReport {
        progress("Uninstalling...");

        let install_dir = self
            .self_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.host.current_dir.clone());
        let leaf = install_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut report = UninstallReport {
            state: UninstallState::Start,
            install_dir: install_dir.clone(),
            product_names: Vec::new(),
            removed_shortcuts: Vec::new(),
            removed_entries: 0,
            self_delete_script: None,
            acknowledged: false,
            failures: Vec::new(),
        };

        // Identified
        let embedded = self.embedded_metadata();
        let mut names = Vec::new();
        push_unique(&mut names, &leaf);
        if let Some(meta) = &embedded {
            push_unique(&mut names, &meta.product_name);
        }
        report.product_names = names.clone();
        advance(&mut report, UninstallState::Identified);
        debug!("🔎 Install dir {install_dir:?}, products {names:?}");

        // RegistryCleared
        for name in &names {
            if let Err(e) = delete_registration(name) {
                fail(&mut report, format!("registration for {name}: {e}"));
            }
        }
        advance(&mut report, UninstallState::RegistryCleared);

        // ShortcutsRemoved
        if self.host.shell_integration {
            let mut shortcut_names = names.clone();
            if let Some(meta) = &embedded {
                push_unique(&mut shortcut_names, meta.effective_shortcut_name());
            }
            report.removed_shortcuts = remove_shortcuts(&self.host, &shortcut_names);
            for path in &report.removed_shortcuts {
                progress(&format!("Removed shortcut: {}", path.display()));
            }
        }
        advance(&mut report, UninstallState::ShortcutsRemoved);

        // FilesRemoved
        // A target refused by the cleanup guards is neither emptied nor
        // handed to the deferred-delete script
        let target =
            check_cleanup_target(&install_dir, self.host.convention_root.as_deref(), &leaf);
        match &target {
            Ok(dir) => match self.remove_install_contents(dir) {
                Ok(count) => report.removed_entries = count,
                Err(e) => fail(&mut report, format!("removing files: {e}")),
            },
            Err(e) => fail(&mut report, format!("removing files: {e}")),
        }
        advance(&mut report, UninstallState::FilesRemoved);

        // SelfDeleteScheduled
        let scheduled = match target {
            Ok(dir) => self.schedule(&dir, &mut report.acknowledged).map_err(|e| {
                fail(&mut report, e.to_string());
            }),
            Err(_) => Err(()),
        };
        match scheduled {
            Ok(script) => {
                report.self_delete_script = Some(script);
                advance(&mut report, UninstallState::SelfDeleteScheduled);
            }
            Err(()) => progress(&format!(
                "Could not schedule self-delete, remove {} manually.",
                install_dir.display()
            )),
        }

        advance(&mut report, UninstallState::Done);
        if !report.acknowledged {
            progress("Uninstall complete.");
        }
        report
    }

    fn embedded_metadata(&self) -> Option<InstallMetadata> {
        let blob = match trailer::extract(&self.self_path) {
            Ok(blob) => blob,
            Err(e) => {
                debug!("No embedded archive in {:?}: {e}", self.self_path);
                return None;
            }
        };
        let entries = archive::decode(&blob).ok()?;
        let raw = archive::find(&entries, META_FILE_NAME)?;
        Some(merge_metadata(Some(raw.data.as_slice())).metadata)
    }

    fn remove_install_contents(&self, install_dir: &Path) -> Result<usize> {
        let own_name = self
            .self_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut removed = 0;
        let mut errors = Vec::new();
        for entry in fs::read_dir(install_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if names_equal(&name, &own_name) {
                continue;
            }
            let path = entry.path();
            let result = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!("⚠️ Failed to remove {path:?}: {e}");
                    errors.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if errors.is_empty() {
            debug!("🗑️ Removed {removed} entries from {install_dir:?}");
            Ok(removed)
        } else {
            Err(SfxError::Generic(errors.join("; ")))
        }
    }

    fn schedule(&self, install_dir: &Path, acknowledged: &mut bool) -> Result<PathBuf> {
        let mut script = SelfDeleteScript::new(&self.self_path, install_dir, &self.host.temp_dir)
            .with_parent(self.parent_pid);
        if let Some((max_attempts, interval_secs)) = self.delete_policy {
            script = script.with_policy(max_attempts, interval_secs);
        }
        script.write()?;
        if self.launch {
            if let Some(acknowledge) = self.acknowledge {
                progress("Uninstall complete.");
                acknowledge();
                *acknowledged = true;
            }
            script.launch()?;
            progress("Scheduled removal of the uninstaller and install directory.");
        }
        Ok(script.script_path)
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name.to_string());
    }
}

fn advance(report: &mut UninstallReport, next: UninstallState) {
    debug!("🔁 Uninstall {:?} -> {next:?}", report.state);
    report.state = next;
}

fn fail(report: &mut UninstallReport, message: String) {
    warn!("⚠️ Uninstall step failed at {:?}: {message}", report.state);
    progress(&format!("Warning: {message}"));
    report.failures.push(message);
}
