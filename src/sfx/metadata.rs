//! Install metadata schema and lenient merge rules

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::defaults::{
    DEFAULT_CREATE_DESKTOP_SHORTCUT, DEFAULT_CREATE_START_MENU_SHORTCUT, DEFAULT_PRODUCT_NAME,
    default_exe_name,
};

/// Install configuration carried in `meta.json`
///
/// Every field is written at build time. On read each one is optional and
/// falls back to the built-in default independently of the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMetadata {
    pub product_name: String,
    pub exe_name: String,
    /// Forced install path, empty when the host convention applies
    pub install_dir: String,
    pub create_desktop_shortcut: bool,
    pub create_start_menu_shortcut: bool,
    pub version: String,
    pub generated_at: String,
    pub shortcut_name: String,
}

impl Default for InstallMetadata {
    fn default() -> Self {
        Self {
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            exe_name: default_exe_name(),
            install_dir: String::new(),
            create_desktop_shortcut: DEFAULT_CREATE_DESKTOP_SHORTCUT,
            create_start_menu_shortcut: DEFAULT_CREATE_START_MENU_SHORTCUT,
            version: String::new(),
            generated_at: String::new(),
            shortcut_name: String::new(),
        }
    }
}

impl InstallMetadata {
    /// Shortcut display name before sanitizing; empty means the product name
    pub fn effective_shortcut_name(&self) -> &str {
        if self.shortcut_name.trim().is_empty() {
            &self.product_name
        } else {
            &self.shortcut_name
        }
    }

    /// Serialize for embedding as `meta.json`
    pub fn to_json_bytes(&self) -> crate::exceptions::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Result of overlaying parsed metadata on the defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMerge {
    pub metadata: InstallMetadata,
    /// Every input problem that caused a default to be kept
    pub diagnostics: Vec<String>,
}

impl MetadataMerge {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Merge raw `meta.json` bytes over the built-in defaults
///
/// Never fails. Missing input, invalid JSON or a wrongly typed field leaves the
/// affected values at their defaults and adds a diagnostic. Explicit empty
/// strings overlay the defaults like any other value.
pub fn merge_metadata(raw: Option<&[u8]>) -> MetadataMerge {
    let mut metadata = InstallMetadata::default();
    let mut diagnostics = Vec::new();

    let Some(raw) = raw else {
        diagnostics.push("meta.json not found in archive, using defaults".to_string());
        return finish(metadata, diagnostics);
    };

    let object = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            diagnostics.push(format!(
                "meta.json is not a JSON object ({}), using defaults",
                type_name(&other)
            ));
            return finish(metadata, diagnostics);
        }
        Err(e) => {
            diagnostics.push(format!("meta.json is not valid JSON ({e}), using defaults"));
            return finish(metadata, diagnostics);
        }
    };

    let mut fields = FieldReader {
        object: &object,
        diagnostics: &mut diagnostics,
    };
    fields.string("productName", &mut metadata.product_name);
    fields.string("exeName", &mut metadata.exe_name);
    fields.string("installDir", &mut metadata.install_dir);
    fields.boolean("createDesktopShortcut", &mut metadata.create_desktop_shortcut);
    fields.boolean(
        "createStartMenuShortcut",
        &mut metadata.create_start_menu_shortcut,
    );
    fields.string("version", &mut metadata.version);
    fields.string("generatedAt", &mut metadata.generated_at);
    fields.string("shortcutName", &mut metadata.shortcut_name);

    // Kept as given: the cleanup guard refuses an empty product name
    if metadata.product_name.trim().is_empty() {
        diagnostics.push("productName is empty".to_string());
    }
    if metadata.exe_name.trim().is_empty() {
        diagnostics.push("exeName is empty, the executable will be searched for".to_string());
    }

    finish(metadata, diagnostics)
}

fn finish(metadata: InstallMetadata, diagnostics: Vec<String>) -> MetadataMerge {
    for diagnostic in &diagnostics {
        warn!("⚠️ {diagnostic}");
    }
    debug!(
        "📋 Metadata: product={} exe={} version={}",
        metadata.product_name, metadata.exe_name, metadata.version
    );
    MetadataMerge {
        metadata,
        diagnostics,
    }
}

struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    diagnostics: &'a mut Vec<String>,
}

impl FieldReader<'_> {
    fn string(&mut self, key: &str, slot: &mut String) {
        match self.object.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => *slot = s.clone(),
            Some(other) => self.diagnostics.push(format!(
                "{key}: expected string, found {}, keeping default",
                type_name(other)
            )),
        }
    }

    fn boolean(&mut self, key: &str, slot: &mut bool) {
        match self.object.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::Bool(b)) => *slot = *b,
            Some(other) => self.diagnostics.push(format!(
                "{key}: expected boolean, found {}, keeping default",
                type_name(other)
            )),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_meta_keeps_defaults() {
        let merged = merge_metadata(None);
        assert_eq!(merged.metadata, InstallMetadata::default());
        assert_eq!(merged.diagnostics.len(), 1);
    }

    #[test]
    fn test_invalid_json_keeps_defaults() {
        let merged = merge_metadata(Some(b"{ not json".as_slice()));
        assert_eq!(merged.metadata.product_name, "MyApp");
        assert_eq!(merged.metadata.exe_name, default_exe_name());
        assert!(merged.metadata.create_desktop_shortcut);
        assert!(merged.metadata.create_start_menu_shortcut);
        assert!(!merged.is_clean());
    }

    #[test]
    fn test_non_object_keeps_defaults() {
        let merged = merge_metadata(Some(b"[1, 2, 3]".as_slice()));
        assert_eq!(merged.metadata, InstallMetadata::default());
        assert!(merged.diagnostics[0].contains("array"));
    }

    #[test]
    fn test_partial_overlay() {
        let raw = br#"{"productName":"Demo","exeName":"app.bin","version":"1.0"}"#;
        let merged = merge_metadata(Some(raw.as_slice()));
        assert!(merged.is_clean());
        assert_eq!(merged.metadata.product_name, "Demo");
        assert_eq!(merged.metadata.exe_name, "app.bin");
        assert_eq!(merged.metadata.version, "1.0");
        assert!(merged.metadata.create_desktop_shortcut);
        assert_eq!(merged.metadata.effective_shortcut_name(), "Demo");
    }

    #[test]
    fn test_wrong_type_only_affects_its_field() {
        let raw = br#"{"productName":"Demo","createDesktopShortcut":"no","version":3}"#;
        let merged = merge_metadata(Some(raw.as_slice()));
        assert_eq!(merged.metadata.product_name, "Demo");
        assert!(merged.metadata.create_desktop_shortcut);
        assert_eq!(merged.metadata.version, "");
        assert_eq!(merged.diagnostics.len(), 2);
    }

    #[test]
    fn test_explicit_empty_strings_are_kept() {
        let merged = merge_metadata(Some(br#"{"productName":"","exeName":""}"#.as_slice()));
        assert_eq!(merged.metadata.product_name, "");
        assert_eq!(merged.metadata.exe_name, "");
        assert_eq!(merged.diagnostics.len(), 2);
    }

    #[test]
    fn test_serialized_field_names() {
        let meta = InstallMetadata {
            shortcut_name: "Demo App".into(),
            ..InstallMetadata::default()
        };
        let value: Value = serde_json::from_slice(&meta.to_json_bytes().unwrap()).unwrap();
        for key in [
            "productName",
            "exeName",
            "installDir",
            "createDesktopShortcut",
            "createStartMenuShortcut",
            "version",
            "generatedAt",
            "shortcutName",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(meta.effective_shortcut_name(), "Demo App");
    }
}
