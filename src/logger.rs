//! Logging setup for the sfxkit binaries
//!
//! `SFX_LOG_LEVEL` selects the level (`trace`..`error`, `off`) and the format:
//! a `json` or `json:<level>` value switches to one JSON object per line.
//! `SFX_LOG_PATH` appends log output to a file instead of stderr.

use chrono::{Local, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

use crate::sfx::defaults::{ENV_LOG_LEVEL, ENV_LOG_PATH};

/// Parse a level name; unknown names yield `None`
pub fn parse_level_filter(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Split `json`, `json:<level>` or `<level>` into (json mode, level name)
fn split_format(level_str: &str) -> (bool, &str) {
    if let Some(stripped) = level_str.strip_prefix("json:") {
        (true, stripped)
    } else if level_str == "json" {
        (true, "info")
    } else {
        (false, level_str)
    }
}

fn open_log_file(path: Option<String>) -> Option<File> {
    let path = path.filter(|p| !p.is_empty())?;
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Cannot open log file {path}: {e}");
            None
        }
    }
}

/// JSON-lines logger
#[derive(Debug)]
pub struct JsonLogger {
    level: Level,
    target_file: Mutex<Option<File>>,
}

impl JsonLogger {
    pub fn new(level: Level, log_path: Option<String>) -> Self {
        JsonLogger {
            level,
            target_file: Mutex::new(open_log_file(log_path)),
        }
    }

    /// Install a logger for `level_str`, returning the effective level name
    ///
    /// `default_level` applies when `level_str` names no known level.
    pub fn init_with_level(level_str: &str, default_level: LevelFilter) -> String {
        let log_path = env::var(ENV_LOG_PATH).ok();
        let (use_json, level_name) = split_format(level_str);
        let filter = parse_level_filter(level_name).unwrap_or(default_level);

        if !use_json {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(filter).format(|buf, record| {
                write!(buf, "📦 ")?;
                write!(
                    buf,
                    "[{} {} {}] ",
                    Local::now().format("%Y-%m-%dT%H:%M:%S%z"),
                    record.level(),
                    record.target()
                )?;
                writeln!(buf, "{}", record.args())
            });
            if let Some(file) = open_log_file(log_path) {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            // A second init in the same process keeps the first logger
            let _ = builder.try_init();
            return filter.to_string().to_lowercase();
        }

        let Some(level) = filter.to_level() else {
            log::set_max_level(LevelFilter::Off);
            return "off".to_string();
        };
        let logger = Box::new(JsonLogger::new(level, log_path));
        if let Err(e) = log::set_boxed_logger(logger) {
            eprintln!("Failed to initialize JSON logger: {e}");
            return level.to_string().to_lowercase();
        }
        log::set_max_level(filter);
        level.to_string().to_lowercase()
    }

    /// Initialize from `SFX_LOG_LEVEL`, falling back to `default_level`
    pub fn init(default_level: LevelFilter) -> String {
        let level_str = env::var(ENV_LOG_LEVEL).unwrap_or_default();
        Self::init_with_level(&level_str, default_level)
    }

    fn entry(record: &Record<'_>) -> String {
        let log_entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().to_string().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
            "@file": record.file().unwrap_or("unknown"),
            "@line": record.line().unwrap_or(0),
        });
        format!("{}\n", serde_json::to_string(&log_entry).unwrap_or_default())
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::entry(record);

        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
                return;
            }
        }
        let _ = io::stderr().write_all(line.as_bytes());
        let _ = io::stderr().flush();
    }

    fn flush(&self) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}
