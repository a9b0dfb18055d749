//! File-based logging for conductor.
//!
//! Log lines go to `~/.conductor/conductor.log`; stdout stays reserved
//! for the CLI's JSON output. Verbosity is a process-wide [`LogLevel`]
//! threshold, raised to Debug by the `--debug` flag or the
//! `CONDUCTOR_DEBUG=1` environment variable.
//!
//! Call sites use the `clog!` macro family: `clog!` logs at Info,
//! `clog_error!`/`clog_warn!`/`clog_debug!`/`clog_trace!` at their
//! respective levels. Debug covers scheduling traces (readiness cycles,
//! dispatch, completion folding); Trace adds per-candidate scoring.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static DEBUG_MODE: AtomicBool = AtomicBool::new(false);
static THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Message severity. Lower values are more important; a message is
/// written when its level is at or below the current threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// Initialize logging at the default (Info) verbosity.
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging, optionally at Debug verbosity.
///
/// `CONDUCTOR_DEBUG=1` (or `true`) in the environment is equivalent to
/// `debug = true`. The log file is truncated so each run starts clean.
pub fn init_with_debug(debug: bool) {
    let env_debug = std::env::var("CONDUCTOR_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let enabled = debug || env_debug;

    DEBUG_MODE.store(enabled, Ordering::SeqCst);
    set_level(if enabled {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let Some(home) = dirs::home_dir() else {
        return;
    };
    let dir = home.join(".conductor");
    let _ = std::fs::create_dir_all(&dir);
    let path = dir.join("conductor.log");
    let _ = std::fs::write(&path, "");
    LOG_PATH.set(path).ok();
}

/// Whether debug mode was requested at init.
pub fn is_debug() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Set the verbosity threshold. Levels above it are dropped.
pub fn set_level(level: LogLevel) {
    THRESHOLD.store(level as u8, Ordering::SeqCst);
}

fn enabled(level: LogLevel) -> bool {
    level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

/// Append one timestamped line to the log file, subject to the
/// threshold. Silently a no-op before `init` or without a home dir.
pub fn write(level: LogLevel, msg: &str) {
    if !enabled(level) {
        return;
    }
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(file, "[{}] [{}] {}", stamp, level.as_str(), msg);
    }
}

/// Log at Info level.
#[macro_export]
macro_rules! clog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

/// Log at Error level.
#[macro_export]
macro_rules! clog_error {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

/// Log at Warn level.
#[macro_export]
macro_rules! clog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

/// Log at Debug level (dropped unless debug mode is on).
#[macro_export]
macro_rules! clog_debug {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Debug, &format!($($arg)*))
    };
}

/// Log at Trace level (per-candidate detail, off by default).
#[macro_export]
macro_rules! clog_trace {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Trace, &format!($($arg)*))
    };
}
