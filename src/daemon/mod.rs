//! Daemon lifecycle controls
//!
//! This module groups the process-level steps of startup:
//! - Detaching into the background
//! - Privilege separation
//! - Signal handler installation
//! - PID file registration
//! - Logging that follows the process through detach and chroot

pub mod logging;
pub mod pidfile;
pub mod privsep;
pub mod signals;

use crate::error::{BootstrapError, Result};
use crate::platform::Platform;

/// Detach from the controlling terminal unless running in the foreground.
pub fn daemonize<P: Platform>(platform: &mut P, foreground: bool) -> Result<()> {
    if foreground {
        return Ok(());
    }

    platform
        .daemonize()
        .map_err(|source| BootstrapError::Daemonize { source })?;
    logging::set_daemonized();

    Ok(())
}
