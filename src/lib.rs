//! monitord - privileged monitoring daemon
//!
//! This library exposes the startup sequence of the daemon: identity
//! resolution, configuration validation, optional email alerting,
//! daemonization, privilege separation, signal handling and the PID file
//! instance guard.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod email;
pub mod error;
pub mod identity;
pub mod monitor;
pub mod platform;
