// Centralized default values

// =================================
// Metadata defaults (used when meta.json is missing or unreadable)
// =================================
pub const DEFAULT_PRODUCT_NAME: &str = "MyApp";
pub const DEFAULT_EXE_STEM: &str = "app";
pub const DEFAULT_CREATE_DESKTOP_SHORTCUT: bool = true;
pub const DEFAULT_CREATE_START_MENU_SHORTCUT: bool = true;

// =================================
// File permissions defaults
// =================================
pub const DEFAULT_FILE_PERMS: u32 = 0o644; // Entries stored without mode bits
pub const DEFAULT_EXECUTABLE_PERMS: u32 = 0o755; // Payload, setup output, uninstaller
pub const DEFAULT_DIR_PERMS: u32 = 0o755;

// =================================
// Cleanup safety
// =================================
/// Fewest normal path components a directory needs before its contents may be wiped
pub const MIN_CLEANUP_PATH_DEPTH: usize = 2;

// =================================
// Shortcut defaults
// =================================
pub const SHORTCUT_NAME_PLACEHOLDER: &str = "_";
pub const SHORTCUT_SHOW_NORMAL: i32 = 1; // SW_SHOWNORMAL / WindowStyle 1
pub const SHORTCUT_SCRIPT_HOST: &str = "cscript.exe";

// =================================
// Self-delete policy
// =================================
pub const DEFAULT_SELF_DELETE_ATTEMPTS: u32 = 30;
pub const DEFAULT_SELF_DELETE_INTERVAL_SECS: u32 = 1;

// =================================
// Registration defaults
// =================================
pub const DEFAULT_PUBLISHER: &str = "";
pub const QUIET_UNINSTALL_FLAG: &str = "/S";

// =================================
// Environment configuration
// =================================
pub const ENV_INSTALL_ROOT: &str = "SFX_INSTALL_ROOT";
pub const ENV_NO_PAUSE: &str = "SFX_NO_PAUSE";
pub const ENV_KEEP_CONTENTS: &str = "SFX_KEEP_CONTENTS";
pub const ENV_LOG_LEVEL: &str = "SFX_LOG_LEVEL";
pub const ENV_LOG_PATH: &str = "SFX_LOG_PATH";

/// Default main executable name for the host platform
pub fn default_exe_name() -> String {
    format!("{DEFAULT_EXE_STEM}{}", std::env::consts::EXE_SUFFIX)
}

/// File name of the generated uninstall entry point
pub fn uninstaller_file_name() -> String {
    format!(
        "{}{}",
        super::constants::UNINSTALLER_STEM,
        std::env::consts::EXE_SUFFIX
    )
}
