//! Global constants for monitord
//!
//! Centralized location for application-wide constants

/// Process label used for the PID file name and log identification
pub const PROCESS_LABEL: &str = "monitord";

/// Unified Logging subsystem that receives detached output on macOS
pub const APP_SUBSYSTEM: &str = "org.monitord.daemon";

/// Default user the daemon switches to after privilege separation
pub const DEFAULT_USER: &str = "monitord";

/// Default group the daemon switches to after privilege separation
pub const DEFAULT_GROUP: &str = "monitord";

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/monitord/monitord.toml";

/// Default directory the daemon is confined to
pub const DEFAULT_CHROOT_DIR: &str = "/var/lib/monitord";

/// Directory holding PID files, relative to the confined root
pub const PID_DIR: &str = "/var/run";

/// Daemon log file, relative to the confined root
pub const LOG_FILE: &str = "logs/monitord.log";

/// Port used when resolving the SMTP server
pub const SMTP_PORT: u16 = 25;

/// Maximum number of resolved SMTP addresses retained
pub const SMTP_MAX_ADDRESSES: usize = 5;
