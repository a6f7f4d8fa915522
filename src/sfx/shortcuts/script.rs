//! Last-resort shortcut creation through an external script host

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use super::{ShortcutDescriptor, ShortcutStrategy};
use crate::exceptions::{Result, SfxError};
use crate::sfx::defaults::{SHORTCUT_SCRIPT_HOST, SHORTCUT_SHOW_NORMAL};

/// Third tier: write a VBScript and hand it to the script host
#[derive(Debug, Clone)]
pub struct ScriptStrategy {
    interpreter: String,
    temp_dir: PathBuf,
}

impl ScriptStrategy {
    pub fn new(temp_dir: &Path) -> Self {
        Self::with_interpreter(SHORTCUT_SCRIPT_HOST, temp_dir)
    }

    pub fn with_interpreter<S: Into<String>>(interpreter: S, temp_dir: &Path) -> Self {
        Self {
            interpreter: interpreter.into(),
            temp_dir: temp_dir.to_path_buf(),
        }
    }
}

impl ShortcutStrategy for ScriptStrategy {
    fn name(&self) -> &'static str {
        "script-host"
    }

    fn create(&self, descriptor: &ShortcutDescriptor) -> Result<()> {
        let interpreter = which::which(&self.interpreter).map_err(|e| {
            SfxError::PlatformIntegration(format!(
                "script host '{}' not found: {e}",
                self.interpreter
            ))
        })?;

        fs::create_dir_all(&self.temp_dir)?;
        let script = tempfile::Builder::new()
            .prefix("shortcut_")
            .suffix(".vbs")
            .tempfile_in(&self.temp_dir)?;
        fs::write(script.path(), encode_utf16le_bom(&render_vbscript(descriptor)))?;
        // Close our handle; the path is still deleted when `script` drops
        let script = script.into_temp_path();
        debug!("📜 Running {interpreter:?} on {:?}", script.to_path_buf());

        let output = Command::new(&interpreter)
            .arg("//NoLogo")
            .arg(script.as_os_str())
            .output()?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(SfxError::PlatformIntegration(format!(
                "script host exited with {}: {}",
                output.status,
                text.trim()
            )));
        }
        if !descriptor.link_path.exists() {
            return Err(SfxError::PlatformIntegration(
                "script host finished but the link file is missing".to_string(),
            ));
        }
        Ok(())
    }
}

fn vbs_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// VBScript performing the same automation sequence as the in-process tier
pub fn render_vbscript(d: &ShortcutDescriptor) -> String {
    let lines = [
        "Option Explicit".to_string(),
        "Dim shell, lnk".to_string(),
        "Set shell = CreateObject(\"WScript.Shell\")".to_string(),
        format!(
            "Set lnk = shell.CreateShortcut({})",
            vbs_quote(&d.link_path.to_string_lossy())
        ),
        format!("lnk.TargetPath = {}", vbs_quote(&d.target.to_string_lossy())),
        format!(
            "lnk.WorkingDirectory = {}",
            vbs_quote(&d.working_dir.to_string_lossy())
        ),
        format!("lnk.IconLocation = {}", vbs_quote(&d.icon.to_string_lossy())),
        format!("lnk.WindowStyle = {SHORTCUT_SHOW_NORMAL}"),
        "lnk.Save".to_string(),
        String::new(),
    ];
    lines.join("\r\n")
}

/// UTF-16 little-endian with a leading byte-order mark
pub fn encode_utf16le_bom(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xFF, 0xFE]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}
