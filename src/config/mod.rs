//! Configuration loading for the monitor daemon
//!
//! Handles TOML configuration parsing and range validation of the
//! `[monitord]` settings, plus the optional `[[reports]]` section.

pub mod document;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration failure; always fatal at bootstrap.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error at '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error at '{}': {details}", .path.display())]
    Parse { path: PathBuf, details: String },

    #[error("Configuration error at '{}': {key} must be between {min} and {max} (got {value})", .path.display())]
    OutOfRange {
        path: PathBuf,
        key: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

/// Which optional sections the loader should read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadFlags {
    /// Read the `[[reports]]` section
    pub reports: bool,
}

impl LoadFlags {
    pub const REPORTS: LoadFlags = LoadFlags { reports: true };
}

/// Resolved SMTP server for outbound alerting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpServer {
    /// Host name as configured
    pub host: String,
    /// Resolved addresses, at most `SMTP_MAX_ADDRESSES`
    pub addresses: Vec<std::net::IpAddr>,
}

/// A configured report definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportConfig {
    pub title: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub email_to: Vec<String>,
    #[serde(default)]
    pub showlogs: bool,
}

/// Process-wide monitor settings.
///
/// Built once by [`load`], amended once by the email-alert step, then moved
/// into the work loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Seconds to wait before daily processing
    pub day_wait: u16,
    /// Compress rotated logs
    pub compress: bool,
    /// Sign rotated logs
    pub sign: bool,
    /// Watch for disconnected agents
    pub monitor_agents: bool,
    /// Days of logs to keep (0 keeps everything)
    pub keep_log_days: u32,
    /// Configured reports; empty unless loaded with [`LoadFlags::REPORTS`]
    pub reports: Vec<ReportConfig>,
    pub smtp_server: Option<SmtpServer>,
    pub email_from: Option<String>,
    pub email_idsname: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            day_wait: 10,
            compress: true,
            sign: true,
            monitor_agents: true,
            keep_log_days: 0,
            reports: Vec::new(),
            smtp_server: None,
            email_from: None,
            email_idsname: None,
        }
    }
}

impl MonitorSettings {
    /// Whether outbound email alerting is active
    pub fn email_enabled(&self) -> bool {
        self.smtp_server.is_some() && self.email_from.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    monitord: RawMonitord,
    #[serde(default)]
    reports: Vec<ReportConfig>,
    // Read separately through `ConfigDocument`
    #[serde(default)]
    #[allow(dead_code)]
    global: Option<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMonitord {
    day_wait: Option<i64>,
    compress: Option<i64>,
    sign: Option<i64>,
    monitor_agents: Option<i64>,
    keep_log_days: Option<i64>,
}

/// Load and validate the configuration file.
pub fn load(path: &Path, flags: LoadFlags) -> Result<MonitorSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse(path, &content, flags)
}

fn parse(path: &Path, content: &str, flags: LoadFlags) -> Result<MonitorSettings, ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        details: e.message().to_string(),
    })?;

    let defaults = MonitorSettings::default();
    let bounded = |key: &'static str, value: Option<i64>, min: i64, max: i64, default: i64| {
        let value = value.unwrap_or(default);
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                path: path.to_path_buf(),
                key,
                min,
                max,
                value,
            });
        }
        Ok(value)
    };

    let m = &raw.monitord;
    let day_wait = bounded("day_wait", m.day_wait, 5, 240, i64::from(defaults.day_wait))?;
    let compress = bounded("compress", m.compress, 0, 1, 1)?;
    let sign = bounded("sign", m.sign, 0, 1, 1)?;
    let monitor_agents = bounded("monitor_agents", m.monitor_agents, 0, 1, 1)?;
    let keep_log_days = bounded(
        "keep_log_days",
        m.keep_log_days,
        0,
        500,
        i64::from(defaults.keep_log_days),
    )?;

    Ok(MonitorSettings {
        // Ranges checked above
        day_wait: day_wait as u16,
        compress: compress == 1,
        sign: sign == 1,
        monitor_agents: monitor_agents == 1,
        keep_log_days: keep_log_days as u32,
        reports: if flags.reports { raw.reports } else { Vec::new() },
        ..defaults
    })
}
