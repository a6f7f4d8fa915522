//! Safety-gated removal of a previous installation's contents

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, trace};

use crate::exceptions::{Result, SfxError};
use crate::sfx::defaults::MIN_CLEANUP_PATH_DEPTH;
use crate::utils::{normalize_path, paths_equal};

/// Check that `dir` is safe to empty, returning its normalized form
///
/// Guards run in order and the first failure wins:
/// 1. not a filesystem root and at least [`MIN_CLEANUP_PATH_DEPTH`] components deep
/// 2. not the shared convention root itself
/// 3. the product name is non-empty and appears in the path (case-insensitive)
pub fn check_cleanup_target(
    dir: &Path,
    convention_root: Option<&Path>,
    product_name: &str,
) -> Result<PathBuf> {
    let normalized = normalize_path(dir, Path::new(""));

    let depth = normalized
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    if depth == 0 {
        return Err(SfxError::SafetyGuard(format!(
            "refusing to clean filesystem root {normalized:?}"
        )));
    }
    if depth < MIN_CLEANUP_PATH_DEPTH {
        return Err(SfxError::SafetyGuard(format!(
            "refusing to clean {normalized:?}: path is too shallow"
        )));
    }

    if let Some(root) = convention_root {
        let root = normalize_path(root, Path::new(""));
        if paths_equal(&normalized, &root) {
            return Err(SfxError::SafetyGuard(format!(
                "refusing to clean shared install root {normalized:?}"
            )));
        }
    }

    let product = product_name.trim().to_lowercase();
    if product.is_empty() {
        return Err(SfxError::SafetyGuard(
            "refusing to clean: product name is empty".to_string(),
        ));
    }
    let haystack = normalized.to_string_lossy().to_lowercase();
    if !haystack.contains(&product) {
        return Err(SfxError::SafetyGuard(format!(
            "refusing to clean {normalized:?}: path does not contain product name '{product_name}'"
        )));
    }

    trace!("🛡️ Cleanup guards passed for {normalized:?}");
    Ok(normalized)
}

/// Remove every child of `dir` after the guards pass; the directory stays
///
/// Returns the number of top-level entries removed. A missing directory
/// counts as already clean.
pub fn clean_install_dir(
    dir: &Path,
    convention_root: Option<&Path>,
    product_name: &str,
) -> Result<usize> {
    let target = check_cleanup_target(dir, convention_root, product_name)?;
    if !target.exists() {
        debug!("🧹 Nothing to clean at {target:?}");
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(&target)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinks are removed, never followed
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        trace!("🗑️ Removed {path:?}");
        removed += 1;
    }

    if removed > 0 {
        info!("🧹 Removed {removed} existing entries from {target:?}");
    }
    Ok(removed)
}
