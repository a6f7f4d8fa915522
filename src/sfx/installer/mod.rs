//! Install pipeline
//!
//! ```text
//! Start -> Extracted -> MetadataResolved -> DirResolved -> Cleaned -> Written
//!       -> ExeLocated -> Integrated -> Done
//! ```
//!
//! Any failure up to and including `Written` ends in `Failed` and is returned.
//! Integration (shortcuts, uninstaller, registration) is best-effort.

pub mod cleanup;
pub mod locate;
pub mod writer;

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use super::archive;
use super::constants::META_FILE_NAME;
use super::defaults::ENV_KEEP_CONTENTS;
use super::host::HostEnvironment;
use super::metadata::{InstallMetadata, merge_metadata};
use super::registration;
use super::shortcuts::{ShortcutChain, ShortcutOutcome, create_shortcuts};
use super::trailer;
use super::uninstaller::ensure_uninstaller;
use crate::exceptions::Result;
use crate::utils::{is_env_true, normalize_path, progress};
use writer::WriteStats;

/// Install progress, in order; `Failed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    Extracted,
    MetadataResolved,
    DirResolved,
    Cleaned,
    Written,
    ExeLocated,
    Integrated,
    Done,
    Failed,
}

/// Outcomes of the best-effort integration steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationReport {
    pub shortcuts: Vec<ShortcutOutcome>,
    /// `None` when the step did not run
    pub uninstaller: Option<std::result::Result<PathBuf, String>>,
    pub registration: Option<std::result::Result<(), String>>,
}

/// What a successful install did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub state: InstallState,
    pub metadata: InstallMetadata,
    pub diagnostics: Vec<String>,
    pub install_dir: PathBuf,
    pub cleaned_entries: usize,
    pub written: WriteStats,
    pub exe_path: Option<PathBuf>,
    pub integration: IntegrationReport,
}

/// Resolve where to install: forced path, then convention root, then cwd
///
/// Relative forced paths are anchored at the current directory.
pub fn resolve_install_dir(metadata: &InstallMetadata, host: &HostEnvironment) -> PathBuf {
    let forced = metadata.install_dir.trim();
    let dir = if !forced.is_empty() {
        normalize_path(Path::new(forced), &host.current_dir)
    } else if let Some(root) = &host.convention_root {
        root.join(metadata.product_name.trim())
    } else {
        host.current_dir.join(metadata.product_name.trim())
    };
    normalize_path(&dir, &host.current_dir)
}

/// Runs the install pipeline for one setup binary
#[derive(Debug)]
pub struct Installer {
    self_path: PathBuf,
    host: HostEnvironment,
    chain: ShortcutChain,
    keep_contents: bool,
    state: Cell<InstallState>,
}

impl Installer {
    pub fn new(self_path: PathBuf, host: HostEnvironment) -> Self {
        let chain = ShortcutChain::platform_default(&host.temp_dir);
        Self {
            self_path,
            host,
            chain,
            keep_contents: is_env_true(ENV_KEEP_CONTENTS),
            state: Cell::new(InstallState::Start),
        }
    }

    pub fn with_shortcut_chain(mut self, chain: ShortcutChain) -> Self {
        self.chain = chain;
        self
    }

    /// Skip the cleanup step and write over existing contents
    pub fn keep_contents(mut self, keep: bool) -> Self {
        self.keep_contents = keep;
        self
    }

    /// Last state reached; `Failed` after an aborted run
    pub fn state(&self) -> InstallState {
        self.state.get()
    }

    pub fn run(&self) -> Result<InstallReport> {
        progress("Installing, please wait...");
        match self.run_pipeline() {
            Ok(report) => {
                progress("Installation complete.");
                Ok(report)
            }
            Err(e) => {
                error!("❌ Install failed after {:?}: {e}", self.state());
                self.advance(InstallState::Failed);
                progress(&format!("Installation failed: {e}"));
                Err(e)
            }
        }
    }

    fn advance(&self, next: InstallState) {
        debug!("🔁 Install {:?} -> {next:?}", self.state.get());
        self.state.set(next);
    }

    fn run_pipeline(&self) -> Result<InstallReport> {
        let blob = trailer::extract(&self.self_path)?;
        let entries = archive::decode(&blob)?;
        self.advance(InstallState::Extracted);
        info!("📦 Extracted {} entries from {:?}", entries.len(), self.self_path);

        let raw_meta = archive::find(&entries, META_FILE_NAME).map(|e| e.data.as_slice());
        let merged = merge_metadata(raw_meta);
        for diagnostic in &merged.diagnostics {
            progress(&format!("Note: {diagnostic}"));
        }
        let metadata = merged.metadata;
        self.advance(InstallState::MetadataResolved);

        let install_dir = resolve_install_dir(&metadata, &self.host);
        fs::create_dir_all(&install_dir)?;
        self.advance(InstallState::DirResolved);
        info!("📁 Install directory {install_dir:?}");

        let cleaned_entries = if self.keep_contents {
            debug!("🧹 Keeping existing contents ({ENV_KEEP_CONTENTS})");
            0
        } else {
            cleanup::clean_install_dir(
                &install_dir,
                self.host.convention_root.as_deref(),
                &metadata.product_name,
            )?
        };
        self.advance(InstallState::Cleaned);

        let written = writer::write_entries(&entries, &install_dir)?;
        self.advance(InstallState::Written);
        progress(&format!("Installed to: {}", install_dir.display()));

        let mut report = InstallReport {
            state: InstallState::Written,
            metadata,
            diagnostics: merged.diagnostics,
            install_dir,
            cleaned_entries,
            written,
            exe_path: None,
            integration: IntegrationReport::default(),
        };

        let Some(exe_path) =
            locate::locate_main_executable(&report.install_dir, &report.metadata.exe_name)
        else {
            let note = format!(
                "no executable found in {}, skipping shortcuts and registration",
                report.install_dir.display()
            );
            warn!("⚠️ {note}");
            progress(&note);
            report.diagnostics.push(note);
            self.advance(InstallState::Done);
            report.state = InstallState::Done;
            return Ok(report);
        };
        if exe_path != report.install_dir.join(&report.metadata.exe_name) {
            progress(&format!("Detected executable: {}", exe_path.display()));
        }
        report.exe_path = Some(exe_path.clone());
        self.advance(InstallState::ExeLocated);

        report.integration = self.integrate(&report.metadata, &report.install_dir, &exe_path);
        self.advance(InstallState::Integrated);

        self.advance(InstallState::Done);
        report.state = InstallState::Done;
        Ok(report)
    }

    fn integrate(
        &self,
        metadata: &InstallMetadata,
        install_dir: &Path,
        exe_path: &Path,
    ) -> IntegrationReport {
        let mut integration = IntegrationReport::default();
        let working_dir = exe_path.parent().unwrap_or(install_dir);

        if self.host.shell_integration
            && (metadata.create_desktop_shortcut || metadata.create_start_menu_shortcut)
        {
            integration.shortcuts =
                create_shortcuts(metadata, exe_path, working_dir, &self.host, &self.chain);
            for outcome in &integration.shortcuts {
                match (&outcome.result, &outcome.link_path) {
                    (Ok(_), Some(link)) => progress(&format!(
                        "Created {} shortcut: {}",
                        outcome.location,
                        link.display()
                    )),
                    (Err(e), _) => progress(&format!(
                        "{} shortcut failed (ignored): {e}",
                        outcome.location
                    )),
                    _ => {}
                }
            }
        }

        let uninstaller = ensure_uninstaller(&self.self_path, install_dir)
            .map(|(path, _)| path)
            .map_err(|e| e.to_string());
        if let Err(e) = &uninstaller {
            warn!("⚠️ Uninstaller not created: {e}");
            progress(&format!("Creating uninstaller failed (ignored): {e}"));
        }
        integration.uninstaller = Some(uninstaller);

        if self.host.shell_integration {
            let registered = registration::register(metadata, install_dir, exe_path)
                .map_err(|e| e.to_string());
            match &registered {
                Ok(()) => progress("Registered with the system."),
                Err(e) => {
                    warn!("⚠️ Registration failed: {e}");
                    progress(&format!("Registration failed (ignored): {e}"));
                }
            }
            integration.registration = Some(registered);
        }

        integration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::SfxError;
    use crate::sfx::archive::ArchiveEntry;
    use crate::sfx::defaults::{DEFAULT_PRODUCT_NAME, uninstaller_file_name};
    use crate::sfx::packager::build_installer_bytes;
    use crate::sfx::shortcuts::{ShortcutDescriptor, ShortcutStrategy};
    use tempfile::TempDir;

    fn setup_image(tmp: &TempDir, meta: &str, extra: Vec<ArchiveEntry>) -> PathBuf {
        let mut entries = vec![
            ArchiveEntry::file("app.bin", 0o755, vec![7; 17]),
            ArchiveEntry::file(META_FILE_NAME, 0o644, meta.as_bytes().to_vec()),
        ];
        entries.extend(extra);
        let (image, _) = build_installer_bytes(&[0x90; 100], &entries).unwrap();
        let path = tmp.path().join("setup.bin");
        fs::write(&path, image).unwrap();
        path
    }

    #[test]
    fn test_resolve_install_dir_precedence() {
        let tmp = TempDir::new().unwrap();
        let mut host = HostEnvironment::isolated(tmp.path());
        let mut meta = InstallMetadata {
            product_name: "Demo".into(),
            ..InstallMetadata::default()
        };

        assert_eq!(
            resolve_install_dir(&meta, &host),
            tmp.path().join("programs").join("Demo")
        );

        host.convention_root = None;
        assert_eq!(
            resolve_install_dir(&meta, &host),
            tmp.path().join("cwd").join("Demo")
        );

        meta.install_dir = "elsewhere/./Demo".into();
        assert_eq!(
            resolve_install_dir(&meta, &host),
            tmp.path().join("cwd").join("elsewhere").join("Demo")
        );
    }

    #[test]
    fn test_full_install() {
        let tmp = TempDir::new().unwrap();
        let setup = setup_image(
            &tmp,
            r#"{"productName":"Demo","exeName":"app.bin","version":"1.0"}"#,
            vec![
                ArchiveEntry::dir("docs"),
                ArchiveEntry::file("docs/readme.txt", 0, b"read me".to_vec()),
            ],
        );
        let host = HostEnvironment::isolated(tmp.path());
        let dir = tmp.path().join("programs").join("Demo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.txt"), b"left over").unwrap();

        let installer = Installer::new(setup.clone(), host).keep_contents(false);
        let report = installer.run().unwrap();

        assert_eq!(report.state, InstallState::Done);
        assert_eq!(installer.state(), InstallState::Done);
        assert_eq!(report.install_dir, dir);
        assert_eq!(report.cleaned_entries, 1);
        assert!(!dir.join("stale.txt").exists());
        assert_eq!(fs::read(dir.join("app.bin")).unwrap(), vec![7; 17]);
        assert_eq!(fs::read(dir.join("docs").join("readme.txt")).unwrap(), b"read me");
        assert_eq!(report.exe_path, Some(dir.join("app.bin")));
        assert!(report.diagnostics.is_empty());

        // Uninstaller is a verbatim copy of the setup binary
        let uninstaller = dir.join(uninstaller_file_name());
        assert_eq!(
            report.integration.uninstaller,
            Some(Ok(uninstaller.clone()))
        );
        assert_eq!(fs::read(uninstaller).unwrap(), fs::read(setup).unwrap());
        assert!(report.integration.shortcuts.is_empty());
        assert_eq!(report.integration.registration, None);
    }

    #[test]
    fn test_invalid_meta_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let setup = setup_image(&tmp, "{ broken", Vec::new());
        let host = HostEnvironment::isolated(tmp.path());

        let report = Installer::new(setup, host).run().unwrap();
        assert_eq!(report.metadata.product_name, "MyApp");
        assert_eq!(report.install_dir, tmp.path().join("programs").join("MyApp"));
        assert!(!report.diagnostics.is_empty());
    }

    #[test]
    fn test_corrupt_image_fails_before_writing() {
        let tmp = TempDir::new().unwrap();
        let setup = tmp.path().join("setup.bin");
        fs::write(&setup, b"just a stub without any trailer").unwrap();

        let installer = Installer::new(setup, HostEnvironment::isolated(tmp.path()));
        let result = installer.run();
        assert!(matches!(result, Err(SfxError::Format(_))));
        assert_eq!(installer.state(), InstallState::Failed);
        assert!(!tmp.path().join("programs").exists());
    }

    #[test]
    fn test_guard_blocks_unrelated_forced_dir() {
        let tmp = TempDir::new().unwrap();
        let forced = tmp.path().join("Unrelated");
        fs::create_dir_all(&forced).unwrap();
        fs::write(forced.join("precious.txt"), b"keep").unwrap();
        let meta = format!(
            r#"{{"productName":"Zebra Suite","installDir":{}}}"#,
            serde_json::to_string(&forced.to_string_lossy()).unwrap()
        );
        let setup = setup_image(&tmp, &meta, Vec::new());

        let installer =
            Installer::new(setup, HostEnvironment::isolated(tmp.path())).keep_contents(false);
        let result = installer.run();
        assert!(matches!(result, Err(SfxError::SafetyGuard(_))));
        assert_eq!(installer.state(), InstallState::Failed);
        assert!(forced.join("precious.txt").exists());
        assert!(!forced.join("app.bin").exists());
    }

    #[test]
    fn test_empty_product_name_is_refused() {
        let tmp = TempDir::new().unwrap();
        let setup = setup_image(&tmp, r#"{"productName":"","exeName":"app.bin"}"#, Vec::new());
        let root = tmp.path().join("programs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("Other Product.txt"), b"shared").unwrap();

        let installer =
            Installer::new(setup, HostEnvironment::isolated(tmp.path())).keep_contents(false);
        let result = installer.run();

        assert!(matches!(result, Err(SfxError::SafetyGuard(_))));
        assert_eq!(installer.state(), InstallState::Failed);
        assert!(root.join("Other Product.txt").exists());
        assert!(!root.join("app.bin").exists());
        assert!(!root.join(DEFAULT_PRODUCT_NAME).exists());
    }

    #[test]
    fn test_empty_product_name_without_convention_root() {
        let tmp = TempDir::new().unwrap();
        let setup = setup_image(&tmp, r#"{"productName":"  "}"#, Vec::new());
        let mut host = HostEnvironment::isolated(tmp.path());
        host.convention_root = None;
        let cwd = host.current_dir.clone();

        let result = Installer::new(setup, host).keep_contents(false).run();
        assert!(matches!(result, Err(SfxError::SafetyGuard(_))));
        assert_eq!(fs::read_dir(&cwd).unwrap().count(), 0);
    }

    /// Writes a placeholder link file
    #[derive(Debug)]
    struct StubLinkWriter;

    impl ShortcutStrategy for StubLinkWriter {
        fn name(&self) -> &'static str {
            "stub-writer"
        }
        fn create(&self, descriptor: &ShortcutDescriptor) -> Result<()> {
            fs::write(&descriptor.link_path, b"lnk")?;
            Ok(())
        }
    }

    // Registration writes to the real per-user registry on Windows
    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_integrated_install_creates_shortcuts() {
        let tmp = TempDir::new().unwrap();
        let setup = setup_image(
            &tmp,
            r#"{"productName":"Demo","exeName":"app.bin","shortcutName":"Demo App"}"#,
            Vec::new(),
        );
        let mut host = HostEnvironment::isolated(tmp.path());
        host.shell_integration = true;

        let report = Installer::new(setup, host)
            .with_shortcut_chain(ShortcutChain::new(vec![Box::new(StubLinkWriter)]))
            .run()
            .unwrap();

        let shortcuts = &report.integration.shortcuts;
        assert_eq!(shortcuts.len(), 2);
        assert!(shortcuts.iter().all(|o| o.result == Ok("stub-writer")));
        assert!(tmp.path().join("desktop").join("Demo App.lnk").is_file());
        assert!(
            tmp.path()
                .join("start-menu")
                .join("Demo App")
                .join("Demo App.lnk")
                .is_file()
        );
        assert_eq!(report.integration.registration, Some(Ok(())));
        assert!(matches!(report.integration.uninstaller, Some(Ok(_))));
    }

    #[test]
    fn test_missing_exe_skips_integration() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            ArchiveEntry::file(
                META_FILE_NAME,
                0o644,
                br#"{"productName":"Demo","exeName":"absent.bin"}"#.to_vec(),
            ),
            ArchiveEntry::file("notes.txt", 0o644, b"n".to_vec()),
        ];
        let (image, _) = build_installer_bytes(b"stub", &entries).unwrap();
        let setup = tmp.path().join("setup.bin");
        fs::write(&setup, image).unwrap();

        let report = Installer::new(setup, HostEnvironment::isolated(tmp.path()))
            .run()
            .unwrap();
        assert_eq!(report.state, InstallState::Done);
        assert_eq!(report.exe_path, None);
        assert_eq!(report.integration, IntegrationReport::default());
        assert!(report.diagnostics.iter().any(|d| d.contains("no executable")));
    }
}
