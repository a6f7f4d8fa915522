//! Packager: stub + payload + metadata -> self-extracting installer

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, trace};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::archive::{self, ArchiveEntry};
use super::constants::{META_FILE_NAME, TRAILER_SIZE};
use super::defaults::{
    DEFAULT_CREATE_DESKTOP_SHORTCUT, DEFAULT_CREATE_START_MENU_SHORTCUT,
    DEFAULT_EXECUTABLE_PERMS, DEFAULT_FILE_PERMS, DEFAULT_PRODUCT_NAME,
};
use super::metadata::InstallMetadata;
use super::trailer;
use crate::exceptions::{Result, SfxError};

/// Options for building an installer
#[derive(Debug, Clone)]
pub struct PackagerOptions {
    pub product_name: String,
    /// Name the payload is installed under; empty means the payload's file name
    pub exe_name: String,
    /// Forced install path baked into the metadata
    pub install_dir: String,
    pub create_desktop_shortcut: bool,
    pub create_start_menu_shortcut: bool,
    pub version: String,
    /// Shortcut display name; empty means the product name
    pub shortcut_name: String,
}

impl Default for PackagerOptions {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            exe_name: String::new(),
            install_dir: String::new(),
            create_desktop_shortcut: DEFAULT_CREATE_DESKTOP_SHORTCUT,
            create_start_menu_shortcut: DEFAULT_CREATE_START_MENU_SHORTCUT,
            version: String::new(),
            shortcut_name: String::new(),
        }
    }
}

impl PackagerOptions {
    /// Resolve empty fields and stamp the generation time
    pub fn to_metadata(&self, payload_path: &Path) -> Result<InstallMetadata> {
        let exe_name = if self.exe_name.trim().is_empty() {
            payload_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    SfxError::Build(format!("payload path has no file name: {payload_path:?}"))
                })?
        } else {
            self.exe_name.trim().to_string()
        };

        let product_name = if self.product_name.trim().is_empty() {
            DEFAULT_PRODUCT_NAME.to_string()
        } else {
            self.product_name.trim().to_string()
        };

        let shortcut_name = if self.shortcut_name.trim().is_empty() {
            product_name.clone()
        } else {
            self.shortcut_name.trim().to_string()
        };

        Ok(InstallMetadata {
            product_name,
            exe_name,
            install_dir: self.install_dir.clone(),
            create_desktop_shortcut: self.create_desktop_shortcut,
            create_start_menu_shortcut: self.create_start_menu_shortcut,
            version: self.version.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            shortcut_name,
        })
    }
}

/// What a successful build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub output: PathBuf,
    pub stub_len: u64,
    pub archive_len: u64,
    pub total_len: u64,
    /// `sha256:<hex>` of the embedded archive blob
    pub archive_sha256: String,
}

/// Build an installer image in memory
///
/// Returns the image and the length of the archive inside it.
pub fn build_installer_bytes(stub: &[u8], entries: &[ArchiveEntry]) -> Result<(Vec<u8>, u64)> {
    let blob = archive::encode(entries)?;
    let archive_len = blob.len() as u64;
    Ok((trailer::build(stub, &blob), archive_len))
}

/// Create an installer at `output_path` from a stub and a payload
///
/// The output is written to a temporary file beside the target and renamed
/// over it, so a failed build never leaves a truncated installer behind.
pub fn create_installer(
    stub_path: &Path,
    payload_path: &Path,
    output_path: &Path,
    options: &PackagerOptions,
) -> Result<PackageSummary> {
    info!("🔨 Building installer {output_path:?}");

    let stub = fs::read(stub_path)
        .map_err(|e| SfxError::Build(format!("cannot read stub {stub_path:?}: {e}")))?;
    let payload = fs::read(payload_path)
        .map_err(|e| SfxError::Build(format!("cannot read payload {payload_path:?}: {e}")))?;
    debug!(
        "📥 Stub {} bytes, payload {} bytes",
        stub.len(),
        payload.len()
    );

    let metadata = options.to_metadata(payload_path)?;
    if metadata.exe_name == META_FILE_NAME {
        return Err(SfxError::Build(format!(
            "exe name '{META_FILE_NAME}' collides with the metadata entry"
        )));
    }

    let entries = vec![
        ArchiveEntry::file(metadata.exe_name.clone(), DEFAULT_EXECUTABLE_PERMS, payload),
        ArchiveEntry::file(META_FILE_NAME, DEFAULT_FILE_PERMS, metadata.to_json_bytes()?),
    ];

    let blob = archive::encode(&entries)?;
    let archive_sha256 = format!("sha256:{}", hex::encode(Sha256::digest(&blob)));
    trace!("🔐 Archive digest {archive_sha256}");

    let image = trailer::build(&stub, &blob);
    write_atomically(output_path, &image)?;

    let summary = PackageSummary {
        output: output_path.to_path_buf(),
        stub_len: stub.len() as u64,
        archive_len: blob.len() as u64,
        total_len: image.len() as u64,
        archive_sha256,
    };
    debug_assert_eq!(
        summary.total_len,
        summary.stub_len + summary.archive_len + TRAILER_SIZE as u64
    );

    info!("✅ Built installer for {} {}", metadata.product_name, metadata.version);
    info!(
        "  Size: {} bytes (stub {}, archive {})",
        summary.total_len, summary.stub_len, summary.archive_len
    );
    Ok(summary)
}

fn write_atomically(output_path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;

    // Make the output file executable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(
            tmp.path(),
            fs::Permissions::from_mode(DEFAULT_EXECUTABLE_PERMS),
        )?;
    }

    tmp.persist(output_path).map_err(|e| SfxError::Io(e.error))?;
    debug!("💾 Wrote {} bytes to {output_path:?}", bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfx::constants::MAGIC_TRAILER;
    use crate::sfx::metadata::merge_metadata;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
        let stub = dir.path().join("stub.bin");
        let payload = dir.path().join("app.bin");
        fs::write(&stub, vec![0x4D; 100]).unwrap();
        fs::write(&payload, vec![0x11; 17]).unwrap();
        (stub, payload)
    }

    #[test]
    fn test_end_to_end_build() {
        let dir = TempDir::new().unwrap();
        let (stub, payload) = fixture(&dir);
        let output = dir.path().join("out").join("setup.bin");
        let options = PackagerOptions {
            product_name: "Demo".into(),
            exe_name: "app.bin".into(),
            version: "1.0".into(),
            ..PackagerOptions::default()
        };

        let summary = create_installer(&stub, &payload, &output, &options).unwrap();
        let image = fs::read(&output).unwrap();

        assert_eq!(image.len() as u64, 100 + summary.archive_len + 16);
        assert_eq!(&image[image.len() - 8..], MAGIC_TRAILER);
        let mut len = [0u8; 8];
        len.copy_from_slice(&image[image.len() - 16..image.len() - 8]);
        assert_eq!(u64::from_le_bytes(len), summary.archive_len);
        assert!(summary.archive_sha256.starts_with("sha256:"));

        let entries = archive::decode(&trailer::extract(&output).unwrap()).unwrap();
        let app = archive::find(&entries, "app.bin").unwrap();
        assert_eq!(app.data, vec![0x11; 17]);
        assert_eq!(app.mode, DEFAULT_EXECUTABLE_PERMS);

        let meta = archive::find(&entries, META_FILE_NAME).unwrap();
        let merged = merge_metadata(Some(meta.data.as_slice()));
        assert!(merged.is_clean());
        assert_eq!(merged.metadata.product_name, "Demo");
        assert_eq!(merged.metadata.exe_name, "app.bin");
        assert_eq!(merged.metadata.version, "1.0");
        assert_eq!(merged.metadata.shortcut_name, "Demo");
        assert!(!merged.metadata.generated_at.is_empty());
    }

    #[test]
    fn test_exe_name_defaults_to_payload_name() {
        let dir = TempDir::new().unwrap();
        let (stub, payload) = fixture(&dir);
        let output = dir.path().join("setup.bin");

        create_installer(&stub, &payload, &output, &PackagerOptions::default()).unwrap();
        let entries = archive::decode(&trailer::extract(&output).unwrap()).unwrap();
        assert!(archive::find(&entries, "app.bin").is_some());

        let meta = archive::find(&entries, META_FILE_NAME).unwrap();
        let merged = merge_metadata(Some(meta.data.as_slice()));
        assert_eq!(merged.metadata.product_name, DEFAULT_PRODUCT_NAME);
    }

    #[test]
    fn test_overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let (stub, payload) = fixture(&dir);
        let output = dir.path().join("setup.bin");
        fs::write(&output, b"old contents").unwrap();

        let summary =
            create_installer(&stub, &payload, &output, &PackagerOptions::default()).unwrap();
        assert_eq!(fs::metadata(&output).unwrap().len(), summary.total_len);
    }

    #[test]
    fn test_missing_stub_is_build_error() {
        let dir = TempDir::new().unwrap();
        let (_, payload) = fixture(&dir);
        let result = create_installer(
            &dir.path().join("nope"),
            &payload,
            &dir.path().join("setup.bin"),
            &PackagerOptions::default(),
        );
        assert!(matches!(result, Err(SfxError::Build(_))));
        assert!(!dir.path().join("setup.bin").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let (stub, payload) = fixture(&dir);
        let output = dir.path().join("setup.bin");
        create_installer(&stub, &payload, &output, &PackagerOptions::default()).unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, DEFAULT_EXECUTABLE_PERMS);
    }

    #[test]
    fn test_build_installer_bytes() {
        let entries = vec![ArchiveEntry::file("app.bin", 0o755, vec![1; 17])];
        let (image, archive_len) = build_installer_bytes(&[0; 100], &entries).unwrap();
        assert_eq!(image.len() as u64, 100 + archive_len + 16);
    }
}
