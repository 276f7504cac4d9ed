//! Signal handling
//!
//! Handlers are installed from a static table; the work loop polls the
//! resulting flags.

use log::debug;
use signal_hook::consts::{SIGHUP, SIGINT, SIGPIPE, SIGQUIT, SIGTERM};
use signal_hook::flag;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{BootstrapError, Result};

/// Effect of a handled signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Graceful shutdown; a second request exits immediately
    Terminate,
    /// Configuration reload request
    Reload,
    /// Swallowed
    Ignore,
}

/// Signals installed at startup and what each one does
pub const SIGNAL_TABLE: &[(c_int, &str, SignalAction)] = &[
    (SIGTERM, "SIGTERM", SignalAction::Terminate),
    (SIGINT, "SIGINT", SignalAction::Terminate),
    (SIGQUIT, "SIGQUIT", SignalAction::Terminate),
    (SIGHUP, "SIGHUP", SignalAction::Reload),
    (SIGPIPE, "SIGPIPE", SignalAction::Ignore),
];

/// Exit status used when a second termination request arrives mid-shutdown
const FORCED_EXIT_STATUS: i32 = 1;

/// Flags set by the installed handlers
#[derive(Debug, Clone, Default)]
pub struct SignalState {
    terminate: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
}

impl SignalState {
    pub fn terminate_requested(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Consume a pending reload request
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Request shutdown from inside the process
    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }
}

/// Install every handler in [`SIGNAL_TABLE`].
pub fn install(label: &str) -> Result<SignalState> {
    let state = SignalState::default();
    let ignored = Arc::new(AtomicBool::new(false));

    for &(signal, name, action) in SIGNAL_TABLE {
        let registered = match action {
            SignalAction::Terminate => {
                // Must precede the flag registration or the first signal exits
                flag::register_conditional_shutdown(
                    signal,
                    FORCED_EXIT_STATUS,
                    Arc::clone(&state.terminate),
                )
                .and_then(|_| flag::register(signal, Arc::clone(&state.terminate)))
            }
            SignalAction::Reload => flag::register(signal, Arc::clone(&state.reload)),
            SignalAction::Ignore => flag::register(signal, Arc::clone(&ignored)),
        };

        registered.map_err(|source| BootstrapError::Signals {
            signal: name,
            source,
        })?;
    }

    debug!("{}: installed handlers for {} signals", label, SIGNAL_TABLE.len());
    Ok(state)
}
