//! Shell shortcut creation with an ordered fallback chain
//!
//! Each [`ShortcutStrategy`] is tried in order until one leaves a link file on
//! disk. A strategy that reports success without producing the file counts as
//! a failure, and every failure is kept so the final error carries the whole
//! history.

pub mod automation;
pub mod script;
pub mod shell_link;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::exceptions::{Result, SfxError};
use crate::sfx::constants::SHORTCUT_EXTENSION;
use crate::sfx::defaults::SHORTCUT_NAME_PLACEHOLDER;
use crate::sfx::host::HostEnvironment;
use crate::sfx::metadata::InstallMetadata;

const ILLEGAL_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Make a display name safe to use as a file name
///
/// Illegal characters become `_`, surrounding whitespace and trailing dots or
/// spaces are dropped. Never returns an empty string.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| {
            if ILLEGAL_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        SHORTCUT_NAME_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Where a shortcut is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutLocation {
    Desktop,
    StartMenu,
}

impl fmt::Display for ShortcutLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortcutLocation::Desktop => write!(f, "desktop"),
            ShortcutLocation::StartMenu => write!(f, "start menu"),
        }
    }
}

/// Everything a strategy needs to produce one link file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutDescriptor {
    /// Sanitized display name
    pub name: String,
    pub target: PathBuf,
    pub working_dir: PathBuf,
    pub icon: PathBuf,
    pub link_path: PathBuf,
    pub location: ShortcutLocation,
}

/// `<desktop>/<name>.lnk`
pub fn desktop_link_path(host: &HostEnvironment, name: &str) -> Option<PathBuf> {
    host.desktop_dir
        .as_ref()
        .map(|d| d.join(link_file_name(name)))
}

/// `<programs>/<name>`, the per-product start-menu group
pub fn start_menu_group(host: &HostEnvironment, name: &str) -> Option<PathBuf> {
    host.programs_dir.as_ref().map(|d| d.join(name))
}

/// `<programs>/<name>/<name>.lnk`
pub fn start_menu_link_path(host: &HostEnvironment, name: &str) -> Option<PathBuf> {
    start_menu_group(host, name).map(|g| g.join(link_file_name(name)))
}

fn link_file_name(name: &str) -> String {
    format!("{name}.{SHORTCUT_EXTENSION}")
}

/// Build a descriptor for each location the metadata asks for
///
/// Locations the host cannot resolve are returned as errors so they show up
/// in the integration report.
pub fn descriptors_for(
    metadata: &InstallMetadata,
    target: &Path,
    working_dir: &Path,
    host: &HostEnvironment,
) -> Vec<(ShortcutLocation, Option<ShortcutDescriptor>)> {
    let name = sanitize_name(metadata.effective_shortcut_name());
    let mut out = Vec::new();

    let mut push = |location: ShortcutLocation, link: Option<PathBuf>| {
        let descriptor = link.map(|link_path| ShortcutDescriptor {
            name: name.clone(),
            target: target.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            icon: target.to_path_buf(),
            link_path,
            location,
        });
        out.push((location, descriptor));
    };

    if metadata.create_desktop_shortcut {
        push(ShortcutLocation::Desktop, desktop_link_path(host, &name));
    }
    if metadata.create_start_menu_shortcut {
        push(ShortcutLocation::StartMenu, start_menu_link_path(host, &name));
    }
    out
}

/// One way of producing a link file
pub trait ShortcutStrategy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Try to write `descriptor.link_path`
    ///
    /// `Ok` is only a claim; the chain verifies the file afterwards.
    fn create(&self, descriptor: &ShortcutDescriptor) -> Result<()>;
}

/// A failed strategy and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutAttempt {
    pub strategy: &'static str,
    pub error: String,
}

impl fmt::Display for ShortcutAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Outcome for one requested shortcut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutOutcome {
    pub location: ShortcutLocation,
    pub link_path: Option<PathBuf>,
    /// Name of the strategy that produced the link, or the aggregated failure
    pub result: std::result::Result<&'static str, String>,
}

/// Ordered list of strategies tried until one verifiably succeeds
#[derive(Debug)]
pub struct ShortcutChain {
    strategies: Vec<Box<dyn ShortcutStrategy>>,
}

impl ShortcutChain {
    pub fn new(strategies: Vec<Box<dyn ShortcutStrategy>>) -> Self {
        Self { strategies }
    }

    /// Native shell link, then the automation object, then a script host
    pub fn platform_default(temp_dir: &Path) -> Self {
        let mut strategies: Vec<Box<dyn ShortcutStrategy>> = Vec::new();
        if cfg!(windows) {
            strategies.push(Box::new(shell_link::ShellLinkStrategy));
            strategies.push(Box::new(automation::AutomationStrategy));
            strategies.push(Box::new(script::ScriptStrategy::new(temp_dir)));
        }
        Self::new(strategies)
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run the chain for one descriptor, returning the winning strategy's name
    pub fn create(&self, descriptor: &ShortcutDescriptor) -> Result<&'static str> {
        if let Some(parent) = descriptor.link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Verification below only means something for a freshly written link
        if descriptor.link_path.is_file() {
            fs::remove_file(&descriptor.link_path)?;
            debug!("🗑️ Removed stale link {:?}", descriptor.link_path);
        }

        let mut attempts: Vec<ShortcutAttempt> = Vec::new();
        for strategy in &self.strategies {
            debug!(
                "🔗 Trying {} for {:?}",
                strategy.name(),
                descriptor.link_path
            );
            let error = match strategy.create(descriptor) {
                Ok(()) if descriptor.link_path.exists() => {
                    if !attempts.is_empty() {
                        debug!(
                            "🔗 {} succeeded after: {}",
                            strategy.name(),
                            join_attempts(&attempts)
                        );
                    }
                    return Ok(strategy.name());
                }
                Ok(()) => "reported success, link missing".to_string(),
                Err(e) => e.to_string(),
            };
            debug!("🔗 {} failed: {error}", strategy.name());
            attempts.push(ShortcutAttempt {
                strategy: strategy.name(),
                error,
            });
        }

        if attempts.is_empty() {
            return Err(SfxError::PlatformIntegration(
                "no shortcut strategies available on this platform".to_string(),
            ));
        }
        Err(SfxError::PlatformIntegration(format!(
            "{} shortcut not created: {}",
            descriptor.location,
            join_attempts(&attempts)
        )))
    }
}

fn join_attempts(attempts: &[ShortcutAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Create every shortcut the metadata requests; failures are reported, never raised
pub fn create_shortcuts(
    metadata: &InstallMetadata,
    target: &Path,
    working_dir: &Path,
    host: &HostEnvironment,
    chain: &ShortcutChain,
) -> Vec<ShortcutOutcome> {
    let mut outcomes = Vec::new();

    for (location, descriptor) in descriptors_for(metadata, target, working_dir, host) {
        let Some(descriptor) = descriptor else {
            warn!("⚠️ No {location} directory on this host, skipping shortcut");
            outcomes.push(ShortcutOutcome {
                location,
                link_path: None,
                result: Err(format!("{location} directory unavailable")),
            });
            continue;
        };

        let result = chain.create(&descriptor).map_err(|e| e.to_string());
        match &result {
            Ok(strategy) => info!(
                "🔗 Created {location} shortcut {:?} via {strategy}",
                descriptor.link_path
            ),
            Err(e) => warn!("⚠️ {e}"),
        }
        outcomes.push(ShortcutOutcome {
            location,
            link_path: Some(descriptor.link_path),
            result,
        });
    }

    outcomes
}

/// Delete the desktop link and start-menu group for each name
///
/// Returns the paths that were actually removed.
pub fn remove_shortcuts(host: &HostEnvironment, names: &[String]) -> Vec<PathBuf> {
    let mut removed = Vec::new();

    for raw in names {
        let name = sanitize_name(raw);
        if let Some(link) = desktop_link_path(host, &name) {
            if link.is_file() {
                match fs::remove_file(&link) {
                    Ok(()) => removed.push(link),
                    Err(e) => warn!("⚠️ Failed to remove {link:?}: {e}"),
                }
            }
        }
        if let Some(group) = start_menu_group(host, &name) {
            if group.is_dir() {
                match fs::remove_dir_all(&group) {
                    Ok(()) => removed.push(group),
                    Err(e) => warn!("⚠️ Failed to remove {group:?}: {e}"),
                }
            }
        }
    }

    removed.iter().for_each(|p| debug!("🗑️ Removed shortcut {p:?}"));
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Failing;

    impl ShortcutStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn create(&self, _: &ShortcutDescriptor) -> Result<()> {
            Err(SfxError::PlatformIntegration("COM unavailable".into()))
        }
    }

    /// Claims success without writing anything
    #[derive(Debug)]
    struct Lying;

    impl ShortcutStrategy for Lying {
        fn name(&self) -> &'static str {
            "lying"
        }
        fn create(&self, _: &ShortcutDescriptor) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Writing {
        calls: Cell<usize>,
    }

    impl ShortcutStrategy for Writing {
        fn name(&self) -> &'static str {
            "writing"
        }
        fn create(&self, d: &ShortcutDescriptor) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            fs::write(&d.link_path, b"lnk")?;
            Ok(())
        }
    }

    fn descriptor(dir: &Path) -> ShortcutDescriptor {
        ShortcutDescriptor {
            name: "Demo".into(),
            target: dir.join("app.exe"),
            working_dir: dir.to_path_buf(),
            icon: dir.join("app.exe"),
            link_path: dir.join("links").join("Demo.lnk"),
            location: ShortcutLocation::Desktop,
        }
    }

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        let out = sanitize_name(r#"My\App/: *?"<>|Pro. . "#);
        assert!(!out.contains(ILLEGAL_NAME_CHARS));
        assert!(!out.ends_with('.') && !out.ends_with(' '));
        assert!(out.starts_with("My_App"));
    }

    #[test]
    fn test_sanitize_never_empty() {
        assert_eq!(sanitize_name(""), "_");
        assert_eq!(sanitize_name("   "), "_");
        assert_eq!(sanitize_name(". . ."), "_");
        assert_eq!(sanitize_name("Demo"), "Demo");
    }

    #[test]
    fn test_chain_falls_through_to_verified_strategy() {
        let tmp = TempDir::new().unwrap();
        let chain = ShortcutChain::new(vec![
            Box::new(Failing),
            Box::new(Lying),
            Box::new(Writing::default()),
        ]);
        let d = descriptor(tmp.path());
        assert_eq!(chain.create(&d).unwrap(), "writing");
        assert!(d.link_path.is_file());
    }

    #[test]
    fn test_chain_aggregates_every_failure() {
        let tmp = TempDir::new().unwrap();
        let chain = ShortcutChain::new(vec![Box::new(Failing), Box::new(Lying)]);
        let err = chain.create(&descriptor(tmp.path())).unwrap_err().to_string();
        assert!(err.contains("failing: Platform integration error: COM unavailable"));
        assert!(err.contains("lying: reported success, link missing"));
    }

    #[test]
    fn test_stale_link_does_not_count_as_created() {
        let tmp = TempDir::new().unwrap();
        let d = descriptor(tmp.path());
        fs::create_dir_all(d.link_path.parent().unwrap()).unwrap();
        fs::write(&d.link_path, b"old lnk").unwrap();

        let chain = ShortcutChain::new(vec![Box::new(Lying)]);
        let err = chain.create(&d).unwrap_err().to_string();
        assert!(err.contains("lying: reported success, link missing"));
        assert!(!d.link_path.exists());

        let chain = ShortcutChain::new(vec![Box::new(Writing::default())]);
        fs::write(&d.link_path, b"old lnk").unwrap();
        assert_eq!(chain.create(&d).unwrap(), "writing");
        assert_eq!(fs::read(&d.link_path).unwrap(), b"lnk");
    }

    #[test]
    fn test_empty_chain_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let chain = ShortcutChain::new(Vec::new());
        assert!(chain.is_empty());
        assert!(matches!(
            chain.create(&descriptor(tmp.path())),
            Err(SfxError::PlatformIntegration(_))
        ));
    }

    #[test]
    fn test_create_and_remove_shortcuts() {
        let tmp = TempDir::new().unwrap();
        let host = HostEnvironment::isolated(tmp.path());
        let meta = InstallMetadata {
            product_name: "Demo".into(),
            shortcut_name: "Demo: Pro".into(),
            ..InstallMetadata::default()
        };
        let chain = ShortcutChain::new(vec![Box::new(Writing::default())]);
        let target = tmp.path().join("app.exe");

        let outcomes = create_shortcuts(&meta, &target, tmp.path(), &host, &chain);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result == Ok("writing")));

        let desktop = tmp.path().join("desktop").join("Demo_ Pro.lnk");
        let group = tmp.path().join("start-menu").join("Demo_ Pro");
        assert!(desktop.is_file());
        assert!(group.join("Demo_ Pro.lnk").is_file());

        let removed = remove_shortcuts(&host, &["Demo: Pro".to_string()]);
        assert_eq!(removed, vec![desktop.clone(), group.clone()]);
        assert!(!desktop.exists());
        assert!(!group.exists());
    }

    #[test]
    fn test_flags_select_locations() {
        let tmp = TempDir::new().unwrap();
        let host = HostEnvironment::isolated(tmp.path());
        let meta = InstallMetadata {
            create_desktop_shortcut: false,
            ..InstallMetadata::default()
        };
        let found = descriptors_for(&meta, &tmp.path().join("a"), tmp.path(), &host);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, ShortcutLocation::StartMenu);
    }
}
