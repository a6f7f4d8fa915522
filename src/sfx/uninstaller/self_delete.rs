//! Deferred removal of the running uninstaller and its directory
//!
//! A running executable cannot delete its own file, so the last step hands
//! off to a detached script that outlives the process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::exceptions::{Result, SfxError};
use crate::sfx::defaults::{DEFAULT_SELF_DELETE_ATTEMPTS, DEFAULT_SELF_DELETE_INTERVAL_SECS};

#[cfg(target_os = "windows")]
const SCRIPT_EXTENSION: &str = "bat";
#[cfg(not(target_os = "windows"))]
const SCRIPT_EXTENSION: &str = "sh";

/// Parameters of one deferred-delete script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfDeleteScript {
    pub exe: PathBuf,
    pub install_dir: PathBuf,
    pub script_path: PathBuf,
    /// Process to wait for before polling; `None` polls immediately
    pub parent_pid: Option<u32>,
    pub max_attempts: u32,
    pub interval_secs: u32,
}

impl SelfDeleteScript {
    pub fn new(exe: &Path, install_dir: &Path, temp_dir: &Path) -> Self {
        let pid = std::process::id();
        Self {
            exe: exe.to_path_buf(),
            install_dir: install_dir.to_path_buf(),
            script_path: temp_dir.join(format!("_uninst_del_{pid}.{SCRIPT_EXTENSION}")),
            parent_pid: Some(pid),
            max_attempts: DEFAULT_SELF_DELETE_ATTEMPTS,
            interval_secs: DEFAULT_SELF_DELETE_INTERVAL_SECS,
        }
    }

    pub fn with_parent(mut self, parent_pid: Option<u32>) -> Self {
        self.parent_pid = parent_pid;
        self
    }

    pub fn with_policy(mut self, max_attempts: u32, interval_secs: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.interval_secs = interval_secs;
        self
    }

    /// Script text for the host shell
    pub fn render(&self) -> String {
        if cfg!(target_os = "windows") {
            self.render_batch()
        } else {
            self.render_sh()
        }
    }

    /// POSIX shell flavour
    pub fn render_sh(&self) -> String {
        let wait_parent = match self.parent_pid {
            Some(pid) => format!(
                "i=0\nwhile kill -0 {pid} 2>/dev/null && [ \"$i\" -lt {max} ]; do\n  sleep {interval}\n  i=$((i + 1))\ndone\n",
                max = self.max_attempts,
                interval = self.interval_secs,
            ),
            None => String::new(),
        };

        format!(
            "#!/bin/sh\n\
             EXE={exe}\n\
             DIR={dir}\n\
             {wait_parent}\
             i=0\n\
             while [ -e \"$EXE\" ] && [ \"$i\" -lt {max} ]; do\n  \
             rm -f \"$EXE\" 2>/dev/null\n  \
             [ -e \"$EXE\" ] || break\n  \
             sleep {interval}\n  \
             i=$((i + 1))\n\
             done\n\
             rm -rf \"$DIR\" 2>/dev/null\n\
             rm -f \"$0\"\n",
            exe = sh_quote(&self.exe.to_string_lossy()),
            dir = sh_quote(&self.install_dir.to_string_lossy()),
            max = self.max_attempts,
            interval = self.interval_secs,
        )
    }

    /// cmd.exe flavour, CRLF line endings
    pub fn render_batch(&self) -> String {
        let mut lines = vec![
            "@echo off".to_string(),
            format!("set \"EXE={}\"", batch_escape(&self.exe.to_string_lossy())),
            format!(
                "set \"DIR={}\"",
                batch_escape(&self.install_dir.to_string_lossy())
            ),
        ];
        if let Some(pid) = self.parent_pid {
            lines.extend([
                "set /a W=0".to_string(),
                ":wait".to_string(),
                format!("tasklist /FI \"PID eq {pid}\" /NH 2>nul | find \" {pid} \" >nul"),
                "if errorlevel 1 goto start".to_string(),
                "set /a W+=1".to_string(),
                format!("if %W% geq {} goto start", self.max_attempts),
                format!("ping -n {} 127.0.0.1 >nul", self.interval_secs + 1),
                "goto wait".to_string(),
                ":start".to_string(),
            ]);
        }
        lines.extend([
            "set /a N=0".to_string(),
            ":again".to_string(),
            // ping waits roughly one second per echo after the first
            format!("ping -n {} 127.0.0.1 >nul", self.interval_secs + 1),
            "del /f /q \"%EXE%\" >nul 2>&1".to_string(),
            "if not exist \"%EXE%\" goto cleanup".to_string(),
            "set /a N+=1".to_string(),
            format!("if %N% lss {} goto again", self.max_attempts),
            ":cleanup".to_string(),
            "rmdir /s /q \"%DIR%\" >nul 2>&1".to_string(),
            "(goto) 2>nul & del /f /q \"%~f0\"".to_string(),
            String::new(),
        ]);
        lines.join("\r\n")
    }

    /// Write the script to `script_path`
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.script_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.script_path, self.render()).map_err(|e| {
            SfxError::SelfDeleteScheduling(format!(
                "cannot write {:?}: {e}",
                self.script_path
            ))
        })?;
        debug!("📜 Wrote deferred-delete script {:?}", self.script_path);
        Ok(())
    }

    /// Start the script detached from this process
    pub fn launch(&self) -> Result<()> {
        let mut command = detached_command(&self.script_path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command.spawn().map_err(|e| {
            SfxError::SelfDeleteScheduling(format!(
                "cannot launch {:?}: {e}",
                self.script_path
            ))
        })?;
        info!("⏳ Deferred delete scheduled for {:?}", self.install_dir);
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
fn detached_command(script: &Path) -> Command {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new("sh");
    command.arg(script).process_group(0);
    command
}

#[cfg(target_os = "windows")]
fn detached_command(script: &Path) -> Command {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut command = Command::new("cmd");
    command
        .args(["/c", "start", "", "/min"])
        .arg(script)
        .creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW);
    command
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn batch_escape(value: &str) -> String {
    value.replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script(tmp: &TempDir) -> SelfDeleteScript {
        let dir = tmp.path().join("Demo");
        SelfDeleteScript::new(&dir.join("uninstall"), &dir, &tmp.path().join("tmp"))
    }

    #[test]
    fn test_batch_is_bounded_and_crlf() {
        let tmp = TempDir::new().unwrap();
        let text = script(&tmp).with_policy(5, 2).render_batch();
        assert!(text.starts_with("@echo off\r\n"));
        assert!(text.contains("ping -n 3 127.0.0.1 >nul\r\n"));
        assert!(text.contains("if %N% lss 5 goto again\r\n"));
        assert!(text.contains("rmdir /s /q \"%DIR%\""));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_batch_waits_for_parent_first() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp).with_parent(Some(4242)).with_policy(7, 1);
        let text = s.render_batch();
        let wait = text.find("tasklist /FI \"PID eq 4242\"").unwrap();
        let delete = text.find("del /f /q \"%EXE%\"").unwrap();
        assert!(wait < delete);
        assert!(text.contains("if %W% geq 7 goto start\r\n"));

        let no_wait = script(&tmp).with_parent(None).render_batch();
        assert!(!no_wait.contains("tasklist"));
    }

    #[test]
    fn test_batch_escapes_percent() {
        let tmp = TempDir::new().unwrap();
        let mut s = script(&tmp);
        s.install_dir = PathBuf::from(r"C:\Apps\100%Demo");
        assert!(s.render_batch().contains(r#"set "DIR=C:\Apps\100%%Demo""#));
    }

    #[test]
    fn test_sh_quotes_paths() {
        let tmp = TempDir::new().unwrap();
        let mut s = script(&tmp).with_parent(None);
        s.install_dir = PathBuf::from("/opt/it's here");
        let text = s.render_sh();
        assert!(text.contains(r"DIR='/opt/it'\''s here'"));
        assert!(!text.contains("kill -0"));
        assert!(script(&tmp).render_sh().contains("kill -0"));
    }

    #[test]
    fn test_default_policy() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp);
        assert_eq!(s.max_attempts, DEFAULT_SELF_DELETE_ATTEMPTS);
        assert_eq!(s.parent_pid, Some(std::process::id()));
        assert!(s.script_path.starts_with(tmp.path().join("tmp")));
    }

    /// Pid of a child that has already been reaped
    #[cfg(unix)]
    pub(crate) fn exited_pid() -> u32 {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[cfg(unix)]
    #[test]
    fn test_sh_script_skips_wait_for_exited_parent() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp)
            .with_parent(Some(exited_pid()))
            .with_policy(3, 1);
        fs::create_dir_all(&s.install_dir).unwrap();
        fs::write(&s.exe, b"uninstaller").unwrap();
        s.write().unwrap();

        let started = std::time::Instant::now();
        let status = Command::new("sh").arg(&s.script_path).status().unwrap();
        assert!(status.success());
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
        assert!(!s.install_dir.exists());
        assert!(!s.script_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_sh_script_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp).with_parent(None).with_policy(3, 0);
        fs::create_dir_all(&s.install_dir).unwrap();
        fs::write(&s.exe, b"uninstaller").unwrap();
        s.write().unwrap();

        let status = Command::new("sh").arg(&s.script_path).status().unwrap();
        assert!(status.success());
        assert!(!s.install_dir.exists());
        assert!(!s.script_path.exists());
    }
}
