//! Work loop entry point
//!
//! The bootstrap hands over settings, signal state and the PID file guard by
//! value; nothing else keeps a handle to them afterwards.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::bootstrap::RunningDaemon;
use crate::daemon::logging::DaemonLogger;

/// Receives control once startup has completed
pub trait WorkLoop {
    fn run(self, daemon: RunningDaemon) -> Result<()>;
}

/// Default work loop: waits for signals until asked to stop
#[derive(Debug, Clone)]
pub struct Monitord {
    logger: DaemonLogger,
    tick: Duration,
}

impl Monitord {
    pub fn new(logger: DaemonLogger) -> Self {
        Self {
            logger,
            tick: Duration::from_secs(1),
        }
    }

    /// Override the signal polling interval
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    async fn run_loop(&self, daemon: RunningDaemon) -> Result<()> {
        let RunningDaemon {
            settings,
            signals,
            guard,
        } = daemon;

        log::debug!(
            "Monitoring with day_wait={}s compress={} sign={} agents={} keep_log_days={} email={}",
            settings.day_wait,
            settings.compress,
            settings.sign,
            settings.monitor_agents,
            settings.keep_log_days,
            settings.email_enabled()
        );

        let mut interval = tokio::time::interval(self.tick);
        loop {
            interval.tick().await;

            if signals.terminate_requested() {
                self.logger.log_shutdown("Received termination signal");
                break;
            }

            if signals.take_reload() {
                self.logger.log_reload();
            }
        }

        // Removes the PID file
        drop(guard);
        Ok(())
    }
}

impl WorkLoop for Monitord {
    fn run(self, daemon: RunningDaemon) -> Result<()> {
        // Built here, after the fork, never before it
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        runtime.block_on(self.run_loop(daemon))
    }
}
