//! Session log: one file per run, truncated when the session opens.
//!
//! Records look like `[HH:MM:SS] [LEVEL] [module] message`, where `module` is
//! the emitting module path without the crate prefix. Records less severe
//! than the current maximum level (default [`Level::Info`]) are dropped.
//!
//! Log location:
//!   Windows:  `%APPDATA%\LayerDesk\layerdesk.log`
//!   Linux:    `~/.local/share/LayerDesk/layerdesk.log`
//!   macOS:    `~/Library/Application Support/LayerDesk/layerdesk.log`
//!
//! Emit through `log_err!`, `log_warn!`, `log_info!` and `log_debug!`. Before
//! [`init`] every record is discarded, so library code stays silent inside
//! tests and embedding hosts.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Record severity, most severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Level::Error),
            "warn" | "warning" => Some(Level::Warn),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static SINK_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level <= max_level()
}

/// Path of the open session log, if [`init`] succeeded.
pub fn log_path() -> Option<&'static Path> {
    SINK_PATH.get().map(PathBuf::as_path)
}

/// Macro backend. Filters by level, then appends one line to the session log.
pub fn record(level: Level, target: &str, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    append(&format_record(&clock(), level, target, &args.to_string()));
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

fn format_record(clock: &str, level: Level, target: &str, msg: &str) -> String {
    format!("[{}] [{}] [{}] {}", clock, level, short_target(target), msg)
}

/// `layerdesk::ops::text` -> `ops::text`; the crate root itself -> `layerdesk`.
fn short_target(target: &str) -> &str {
    target
        .split_once("::")
        .map_or(target, |(_, rest)| rest)
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Error, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Warn, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Info, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Debug, module_path!(), format_args!($($arg)*))
    };
}

/// Open the session log at its platform location with `level` as the
/// maximum. Call once, early in `main`; later calls only change the level.
///
/// Panics raised afterwards are written to the log before the previous hook
/// runs.
pub fn init(level: Level) {
    set_max_level(level);
    let path = data_dir().join("LayerDesk").join("layerdesk.log");
    if let Err(e) = open_session(&path) {
        eprintln!("[logger] could not open log file {}: {}", path.display(), e);
        return;
    }

    append(&format!("=== LayerDesk session {} (level {}) ===", session_stamp(), level));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append(&format!("[{}] [PANIC] {}", clock(), info));
        previous(info);
    }));
}

fn open_session(path: &Path) -> io::Result<()> {
    if SINK.get().is_some() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let _ = SINK_PATH.set(path.to_path_buf());
    let _ = SINK.set(Mutex::new(file));
    Ok(())
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// `HH:MM:SS` within the current UTC day.
fn clock() -> String {
    unix_secs().map_or_else(|| "??:??:??".to_string(), clock_of)
}

fn clock_of(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60)
}

fn session_stamp() -> String {
    unix_secs().map_or_else(|| "at unknown time".to_string(), |s| format!("at unix {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock_of(0), "00:00:00");
        assert_eq!(clock_of(3661), "01:01:01");
        assert_eq!(clock_of(86_400 + 59), "00:00:59");
    }

    #[test]
    fn records_carry_level_and_module() {
        assert_eq!(
            format_record("12:00:00", Level::Warn, "layerdesk::ops::text", "font missing"),
            "[12:00:00] [WARN] [ops::text] font missing"
        );
        assert_eq!(short_target("layerdesk"), "layerdesk");
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(Level::Error < Level::Warn && Level::Info < Level::Debug);
        assert_eq!(Level::parse("Warning"), Some(Level::Warn));
        assert_eq!(Level::parse("trace"), None);
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug] {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn emitting_before_init_is_harmless() {
        crate::log_info!("not initialised: {}", 42);
        crate::log_debug!("dropped");
    }
}
