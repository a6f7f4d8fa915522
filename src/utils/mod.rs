//! Utility functions for sfxkit

use std::env;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Check if an environment variable is set to a truthy value
/// Accepts: "1", "true", "on", "yes", "t" (case insensitive)
pub fn is_env_true(key: &str) -> bool {
    match env::var(key) {
        Ok(val) => {
            let val_lower = val.to_lowercase();
            matches!(val_lower.as_str(), "1" | "true" | "on" | "yes" | "t")
        }
        Err(_) => false,
    }
}

/// Print a human-readable progress line
///
/// Progress goes to stdout regardless of the configured log level.
pub fn progress(message: &str) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{message}");
    let _ = handle.flush();
}

/// Lexically normalize a path: resolve `.` and `..`, drop trailing separators
///
/// Relative paths are anchored at `base` first. The filesystem is not
/// consulted, so the result is stable for paths that do not exist yet.
pub fn normalize_path(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Never climb above the root
                let has_normal = out
                    .components()
                    .any(|c| matches!(c, Component::Normal(_)));
                if has_normal {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Compare two paths the way the host filesystem does
///
/// Windows paths are case-insensitive; everything else compares exactly.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}

/// Compare two file names the way the host filesystem does
pub fn names_equal(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Resolve the user's home directory from the environment
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        if let Some(profile) = env::var_os("USERPROFILE") {
            return Some(PathBuf::from(profile));
        }
    }

    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
