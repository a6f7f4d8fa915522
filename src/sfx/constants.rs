// Core format constants that never change
// For defaults and configuration, see defaults.rs

// Trailer layout: [archive length: u64 LE][magic: 8 ASCII bytes]
pub const MAGIC_TRAILER: &[u8; 8] = b"SFXMAGIC";
pub const LENGTH_FIELD_SIZE: usize = 8;
pub const MAGIC_SIZE: usize = 8;
pub const TRAILER_SIZE: usize = LENGTH_FIELD_SIZE + MAGIC_SIZE; // 16

// Archive members
pub const META_FILE_NAME: &str = "meta.json";
pub const DIR_MARKER: char = '/';

// Role selection: the running binary's file name contains this (case-insensitive)
pub const UNINSTALL_MARKER: &str = "uninstall";
pub const UNINSTALLER_STEM: &str = "uninstall";

// Registration layout (per-user namespace)
pub const REGISTRY_BASE_PREFIX: &str = r"Software";
pub const REGISTRY_UNINSTALL_PREFIX: &str = r"Software\Microsoft\Windows\CurrentVersion\Uninstall";

// Shell link files
pub const SHORTCUT_EXTENSION: &str = "lnk";
