//! Host environment: the paths and capabilities the pipelines depend on

use std::env;
use std::path::{Path, PathBuf};

use log::debug;

use super::defaults::ENV_INSTALL_ROOT;
use crate::exceptions::Result;
use crate::utils::home_dir;

/// Snapshot of the host locations used by install and uninstall
///
/// `detect` reads the process environment once; tests build one directly so
/// nothing touches the real desktop or program listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Shared root for installed products (`%ProgramFiles%` on Windows)
    pub convention_root: Option<PathBuf>,
    pub desktop_dir: Option<PathBuf>,
    /// Per-user start-menu programs root
    pub programs_dir: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub current_dir: PathBuf,
    /// Whether shortcuts and registration are supported here
    pub shell_integration: bool,
}

impl HostEnvironment {
    pub fn detect() -> Result<Self> {
        let current_dir = env::current_dir()?;
        let host = Self {
            convention_root: detect_convention_root(),
            desktop_dir: home_dir().map(|h| h.join("Desktop")),
            programs_dir: detect_programs_dir(),
            temp_dir: env::temp_dir(),
            current_dir,
            shell_integration: cfg!(windows),
        };
        debug!("🖥️ Host environment: {host:?}");
        Ok(host)
    }

    /// A host rooted entirely inside `base`, with shell integration off
    pub fn isolated(base: &Path) -> Self {
        Self {
            convention_root: Some(base.join("programs")),
            desktop_dir: Some(base.join("desktop")),
            programs_dir: Some(base.join("start-menu")),
            temp_dir: base.join("tmp"),
            current_dir: base.join("cwd"),
            shell_integration: false,
        }
    }
}

fn detect_convention_root() -> Option<PathBuf> {
    if let Some(root) = env::var_os(ENV_INSTALL_ROOT).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(root));
    }

    #[cfg(windows)]
    {
        if let Some(root) = env::var_os("ProgramFiles").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(root));
        }
    }

    None
}

fn detect_programs_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        env::var_os("APPDATA").filter(|v| !v.is_empty()).map(|appdata| {
            PathBuf::from(appdata)
                .join("Microsoft")
                .join("Windows")
                .join("Start Menu")
                .join("Programs")
        })
    }

    #[cfg(not(windows))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_uses_current_dir() {
        let host = HostEnvironment::detect().unwrap();
        assert_eq!(host.current_dir, env::current_dir().unwrap());
        assert_eq!(host.shell_integration, cfg!(windows));
    }

    #[test]
    fn test_isolated_stays_inside_base() {
        let dir = TempDir::new().unwrap();
        let host = HostEnvironment::isolated(dir.path());
        assert!(host.convention_root.unwrap().starts_with(dir.path()));
        assert!(host.temp_dir.starts_with(dir.path()));
        assert!(!host.shell_integration);
    }
}
