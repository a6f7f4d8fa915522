//! Per-user product registration (install info + program listing)
//!
//! The record is built and validated on every platform. Only Windows persists
//! it; elsewhere writing and deleting are successful no-ops.

use std::fmt;
use std::path::Path;

use log::{debug, info};

use super::constants::{REGISTRY_BASE_PREFIX, REGISTRY_UNINSTALL_PREFIX};
use super::defaults::{DEFAULT_PUBLISHER, QUIET_UNINSTALL_FLAG, uninstaller_file_name};
use super::metadata::InstallMetadata;
use crate::exceptions::{Result, SfxError};

/// Registry value kinds the registration writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    String(String),
    Dword(u32),
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryValue::String(s) => write!(f, "{s}"),
            RegistryValue::Dword(n) => write!(f, "{n:#x}"),
        }
    }
}

/// A key path below the current user's root and its named values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKey {
    pub path: String,
    pub values: Vec<(String, RegistryValue)>,
}

impl RegistryKey {
    fn new(path: String) -> Self {
        Self {
            path,
            values: Vec::new(),
        }
    }

    fn string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .push((name.to_string(), RegistryValue::String(value.into())));
        self
    }

    fn dword(mut self, name: &str, value: u32) -> Self {
        self.values.push((name.to_string(), RegistryValue::Dword(value)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegistryValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// `Software\<product>`
pub fn base_key_path(product_name: &str) -> String {
    format!(r"{REGISTRY_BASE_PREFIX}\{product_name}")
}

/// `Software\Microsoft\Windows\CurrentVersion\Uninstall\<product>`
pub fn uninstall_key_path(product_name: &str) -> String {
    format!(r"{REGISTRY_UNINSTALL_PREFIX}\{product_name}")
}

/// Both key groups written for one installed product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub base: RegistryKey,
    pub uninstall: RegistryKey,
}

impl RegistrationRecord {
    /// Validate inputs and lay out every value
    pub fn build(metadata: &InstallMetadata, install_dir: &Path, exe_path: &Path) -> Result<Self> {
        let product = metadata.product_name.trim();
        if product.is_empty() {
            return Err(SfxError::PlatformIntegration(
                "registration needs a product name".to_string(),
            ));
        }
        if install_dir.as_os_str().is_empty() || exe_path.as_os_str().is_empty() {
            return Err(SfxError::PlatformIntegration(
                "registration needs an install directory and executable path".to_string(),
            ));
        }

        let dir = install_dir.to_string_lossy().into_owned();
        let exe = exe_path.to_string_lossy().into_owned();
        let uninstall_command = format!(
            "\"{}\"",
            install_dir.join(uninstaller_file_name()).to_string_lossy()
        );
        let install_source = exe_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.clone());

        let base = RegistryKey::new(base_key_path(product))
            .string("InstallDir", dir.clone())
            .string("ExePath", exe.clone())
            .string("Version", metadata.version.clone());

        let uninstall = RegistryKey::new(uninstall_key_path(product))
            .string("DisplayName", product)
            .string("DisplayVersion", metadata.version.clone())
            .string("InstallLocation", dir)
            .string("Publisher", DEFAULT_PUBLISHER)
            .string("UninstallString", uninstall_command.clone())
            .string(
                "QuietUninstallString",
                format!("{uninstall_command} {QUIET_UNINSTALL_FLAG}"),
            )
            .string("DisplayIcon", format!("{exe},0"))
            .dword("NoModify", 1)
            .dword("NoRepair", 1)
            .string("InstallSource", install_source);

        Ok(Self { base, uninstall })
    }
}

/// Build and persist the registration for an installed product
pub fn register(metadata: &InstallMetadata, install_dir: &Path, exe_path: &Path) -> Result<()> {
    let record = RegistrationRecord::build(metadata, install_dir, exe_path)?;
    write_registration(&record)
}

/// Persist both key groups under the current user
pub fn write_registration(record: &RegistrationRecord) -> Result<()> {
    for key in [&record.base, &record.uninstall] {
        platform::write_key(key)?;
        debug!("🗝️ Wrote {} values to {}", key.values.len(), key.path);
    }
    info!("🗝️ Registered {}", record.base.path);
    Ok(())
}

/// Remove both key groups for `product_name`; missing keys are not an error
pub fn delete_registration(product_name: &str) -> Result<()> {
    if product_name.trim().is_empty() {
        return Err(SfxError::PlatformIntegration(
            "cannot unregister an empty product name".to_string(),
        ));
    }
    platform::delete_key(&uninstall_key_path(product_name))?;
    platform::delete_key(&base_key_path(product_name))?;
    debug!("🗝️ Removed registration for {product_name}");
    Ok(())
}

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;

    use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
    use windows::Win32::System::Registry::{
        HKEY, HKEY_CURRENT_USER, KEY_SET_VALUE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SZ,
        RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegSetValueExW,
    };
    use windows::core::PCWSTR;

    use super::{RegistryKey, RegistryValue};
    use crate::exceptions::{Result, SfxError};

    fn to_wide(s: &str) -> Vec<u16> {
        OsStr::new(s)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    fn check(code: WIN32_ERROR, step: &str, path: &str) -> Result<()> {
        if code == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(SfxError::PlatformIntegration(format!(
                "{step} {path} failed: {code:?}"
            )))
        }
    }

    /// Open key handle closed on drop
    struct KeyHandle(HKEY);

    impl Drop for KeyHandle {
        #[allow(unsafe_code)] // Required for Windows API FFI calls
        fn drop(&mut self) {
            let _ = unsafe { RegCloseKey(self.0) };
        }
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    pub(super) fn write_key(key: &RegistryKey) -> Result<()> {
        let path = to_wide(&key.path);
        let mut raw = HKEY::default();
        let code = unsafe {
            RegCreateKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR(path.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_SET_VALUE,
                None,
                &mut raw,
                None,
            )
        };
        check(code, "RegCreateKeyExW", &key.path)?;
        let handle = KeyHandle(raw);

        for (name, value) in &key.values {
            let wide_name = to_wide(name);
            let (kind, data) = match value {
                RegistryValue::String(s) => (
                    REG_SZ,
                    to_wide(s)
                        .iter()
                        .flat_map(|u| u.to_le_bytes())
                        .collect::<Vec<u8>>(),
                ),
                RegistryValue::Dword(n) => (REG_DWORD, n.to_le_bytes().to_vec()),
            };
            let code = unsafe {
                RegSetValueExW(
                    handle.0,
                    PCWSTR(wide_name.as_ptr()),
                    0,
                    kind,
                    Some(data.as_slice()),
                )
            };
            check(code, "RegSetValueExW", &format!(r"{}\{name}", key.path))?;
        }
        Ok(())
    }

    #[allow(unsafe_code)] // Required for Windows API FFI calls
    pub(super) fn delete_key(path: &str) -> Result<()> {
        let wide = to_wide(path);
        let code = unsafe { RegDeleteTreeW(HKEY_CURRENT_USER, PCWSTR(wide.as_ptr())) };
        if code == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check(code, "RegDeleteTreeW", path)
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use log::trace;

    use super::RegistryKey;
    use crate::exceptions::Result;

    pub(super) fn write_key(key: &RegistryKey) -> Result<()> {
        trace!("No registry on this platform, skipping {}", key.path);
        Ok(())
    }

    pub(super) fn delete_key(path: &str) -> Result<()> {
        trace!("No registry on this platform, skipping {path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta() -> InstallMetadata {
        InstallMetadata {
            product_name: "Demo".into(),
            version: "1.0".into(),
            ..InstallMetadata::default()
        }
    }

    #[test]
    fn test_key_paths() {
        assert_eq!(base_key_path("Demo"), r"Software\Demo");
        assert_eq!(
            uninstall_key_path("Demo"),
            r"Software\Microsoft\Windows\CurrentVersion\Uninstall\Demo"
        );
    }

    #[test]
    fn test_record_layout() {
        let dir = PathBuf::from("/opt/Demo");
        let exe = dir.join("bin").join("app");
        let record = RegistrationRecord::build(&meta(), &dir, &exe).unwrap();

        assert_eq!(
            record.base.get("Version"),
            Some(&RegistryValue::String("1.0".into()))
        );
        assert_eq!(record.base.get("ExePath").unwrap().to_string(), exe.to_string_lossy());

        let u = &record.uninstall;
        let uninstall = dir.join(uninstaller_file_name());
        let expected = format!("\"{}\"", uninstall.to_string_lossy());
        assert_eq!(u.get("UninstallString").unwrap().to_string(), expected);
        assert_eq!(
            u.get("QuietUninstallString").unwrap().to_string(),
            format!("{expected} /S")
        );
        assert_eq!(
            u.get("DisplayIcon").unwrap().to_string(),
            format!("{},0", exe.to_string_lossy())
        );
        assert_eq!(u.get("NoModify"), Some(&RegistryValue::Dword(1)));
        assert_eq!(u.get("NoRepair"), Some(&RegistryValue::Dword(1)));
        assert_eq!(
            u.get("InstallSource").unwrap().to_string(),
            dir.join("bin").to_string_lossy()
        );
        assert_eq!(u.get("Publisher"), Some(&RegistryValue::String(String::new())));
    }

    #[test]
    fn test_build_rejects_missing_inputs() {
        let mut m = meta();
        m.product_name = " ".into();
        assert!(RegistrationRecord::build(&m, Path::new("/opt/x"), Path::new("/opt/x/a")).is_err());
        assert!(RegistrationRecord::build(&meta(), Path::new(""), Path::new("/opt/x/a")).is_err());
        assert!(RegistrationRecord::build(&meta(), Path::new("/opt/x"), Path::new("")).is_err());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_noop_off_windows() {
        let record =
            RegistrationRecord::build(&meta(), Path::new("/opt/Demo"), Path::new("/opt/Demo/app"))
                .unwrap();
        assert!(write_registration(&record).is_ok());
        assert!(delete_registration("Demo").is_ok());
        assert!(delete_registration("").is_err());
    }
}
