//! Daemon logging
//!
//! Installs a `log` backend that writes to stderr while attached to a
//! terminal. Once detached, records go to the Unified Logging System on
//! macOS and to the daemon log file elsewhere. The log file path is
//! resolved against the chroot directory until the process is confined.

use anyhow::Result;
use log::{debug, error, info, warn, LevelFilter, Log, Metadata, Record};
#[cfg(target_os = "macos")]
use oslog::OsLogger;
use serde_json::json;
#[cfg(not(target_os = "macos"))]
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

#[cfg(target_os = "macos")]
use crate::constants::APP_SUBSYSTEM;
use crate::constants::{LOG_FILE, PROCESS_LABEL};

static DAEMONIZED: AtomicBool = AtomicBool::new(false);
static CHROOTED: AtomicBool = AtomicBool::new(false);
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Mark the process as detached from its terminal
pub fn set_daemonized() {
    DAEMONIZED.store(true, Ordering::SeqCst);
}

pub fn is_daemonized() -> bool {
    DAEMONIZED.load(Ordering::SeqCst)
}

/// Mark the process as confined to its chroot directory
pub fn set_chrooted() {
    CHROOTED.store(true, Ordering::SeqCst);
}

pub fn is_chrooted() -> bool {
    CHROOTED.load(Ordering::SeqCst)
}

/// Map the `-d` count to a level filter
pub fn level_for_debug(debug_level: u8) -> LevelFilter {
    match debug_level {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Path of the daemon log file as seen by the process right now.
pub fn log_file_path() -> PathBuf {
    log_file_path_for(LOG_ROOT.get().map(PathBuf::as_path), is_chrooted())
}

fn log_file_path_for(root: Option<&Path>, chrooted: bool) -> PathBuf {
    match root {
        Some(root) if !chrooted => root.join(LOG_FILE),
        _ => Path::new("/").join(LOG_FILE),
    }
}

/// Install the process-wide log backend.
pub fn init(debug_level: u8, chroot_dir: &Path) -> Result<()> {
    let _ = LOG_ROOT.set(chroot_dir.to_path_buf());

    let level = level_for_debug(debug_level);
    log::set_boxed_logger(Box::new(DaemonSink::new(level)))
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
    log::set_max_level(level);

    Ok(())
}

struct DaemonSink {
    #[cfg(target_os = "macos")]
    os_log: OsLogger,
}

impl DaemonSink {
    #[cfg(target_os = "macos")]
    fn new(level: LevelFilter) -> Self {
        Self {
            os_log: OsLogger::new(APP_SUBSYSTEM).level_filter(level),
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn new(_level: LevelFilter) -> Self {
        Self {}
    }

    #[cfg(target_os = "macos")]
    fn write_detached(&self, record: &Record) {
        self.os_log.log(record);
    }

    #[cfg(not(target_os = "macos"))]
    fn write_detached(&self, record: &Record) {
        // Nowhere to report a failure once stderr is gone
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path())
        {
            let _ = file.write_all(format_line(record).as_bytes());
        }
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "{} {}[{}] {}: {}\n",
        chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
        PROCESS_LABEL,
        std::process::id(),
        record.level(),
        record.args()
    )
}

impl Log for DaemonSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if is_daemonized() {
            self.write_detached(record);
        } else {
            let _ = std::io::stderr().write_all(format_line(record).as_bytes());
        }
    }

    fn flush(&self) {}
}

/// Structured lifecycle event logger
#[derive(Debug, Clone, Default)]
pub struct DaemonLogger;

impl DaemonLogger {
    pub fn new() -> Self {
        Self
    }

    /// Log daemon startup event
    pub fn log_startup(&self, config_path: &Path, pid: i32) {
        let message = json!({
            "event": "daemon_startup",
            "pid": pid,
            "config_path": config_path.display().to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        info!("Started (pid: {}) | {}", pid, message);
    }

    /// Log completed privilege separation
    pub fn log_privsep(&self, dir: &Path, user: &str) {
        let message = json!({
            "event": "privileges_dropped",
            "chroot_dir": dir.display().to_string(),
            "user": user,
        });

        debug!("Chrooted to directory: {}, using user: {} | {}", dir.display(), user, message);
    }

    /// Log email alerting being disabled
    pub fn log_alerting_disabled(&self, reason: &str) {
        let message = json!({
            "event": "email_alerts_disabled",
            "reason": reason,
        });

        warn!("{}. Disabling email reports. | {}", reason, message);
    }

    /// Log a reload request
    pub fn log_reload(&self) {
        info!("Reload requested; configuration is only read at startup");
    }

    /// Log daemon shutdown event
    pub fn log_shutdown(&self, reason: &str) {
        let message = json!({
            "event": "daemon_shutdown",
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        info!("Daemon shutting down | {}", message);
    }

    /// Log a fatal error
    pub fn log_error(&self, error_message: &str) {
        let message = json!({
            "event": "error",
            "message": error_message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        error!("{} | {}", error_message, message);
    }
}
