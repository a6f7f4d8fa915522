//! Find the main executable after the payload is written

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::sfx::defaults::uninstaller_file_name;
use crate::utils::names_equal;

/// Resolve the product's executable inside `install_dir`
///
/// `exe_name` wins when it exists. Otherwise the top level is scanned for an
/// executable, then each immediate subdirectory. Directory order is sorted by
/// name so the pick is stable across runs.
pub fn locate_main_executable(install_dir: &Path, exe_name: &str) -> Option<PathBuf> {
    let named = install_dir.join(exe_name);
    if !exe_name.is_empty() && named.is_file() {
        trace!("🎯 Main executable found by name: {named:?}");
        return Some(named);
    }

    debug!("🔍 {exe_name} not found in {install_dir:?}, scanning for an executable");
    let top = sorted_entries(install_dir);

    if let Some(found) = top.iter().find(|p| is_candidate(p)) {
        return Some(found.clone());
    }

    top.iter()
        .filter(|p| p.is_dir())
        .flat_map(|sub| sorted_entries(sub))
        .find(|p| is_candidate(p))
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(e) => {
            trace!("Cannot read {dir:?}: {e}");
            Vec::new()
        }
    };
    paths.sort();
    paths
}

fn is_candidate(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return false;
    };
    if names_equal(&name, &uninstaller_file_name()) {
        return false;
    }
    is_executable(path)
}

/// Whether the host would treat `path` as a program
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("exe"))
        .unwrap_or(false)
}

/// Whether the host would treat `path` as a program
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
pub fn is_executable(_path: &Path) -> bool {
    false
}
