//! Startup sequence
//!
//! Each phase is a distinct type and every transition consumes the previous
//! one, so a phase cannot be skipped or run twice:
//!
//! ```text
//! Starting -> IdentityResolved -> ConfigLoaded -> EmailAlertEvaluated
//!   -> TestExit
//!   -> Daemonized -> PrivilegeDropped -> SignalArmed -> InstanceRegistered
//!   -> Running
//! ```
//!
//! Any error ends the sequence; there is no way back into it.

use log::debug;
use nix::unistd::Pid;
use std::fmt;

use crate::cli::RunConfig;
use crate::config::{self, LoadFlags, MonitorSettings};
use crate::constants::PROCESS_LABEL;
use crate::daemon::logging::DaemonLogger;
use crate::daemon::pidfile::InstanceGuard;
use crate::daemon::signals::SignalState;
use crate::daemon::{self, privsep};
use crate::email;
use crate::error::Result;
use crate::identity::{self, ResolvedIdentity};
use crate::platform::Platform;

/// Startup phase names, for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    IdentityResolved,
    ConfigLoaded,
    EmailAlertEvaluated,
    TestExit,
    Daemonized,
    Foreground,
    PrivilegeDropped,
    SignalArmed,
    InstanceRegistered,
    Running,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::IdentityResolved => "identity resolved",
            Phase::ConfigLoaded => "config loaded",
            Phase::EmailAlertEvaluated => "email alerts evaluated",
            Phase::TestExit => "test exit",
            Phase::Daemonized => "daemonized",
            Phase::Foreground => "staying in foreground",
            Phase::PrivilegeDropped => "privileges dropped",
            Phase::SignalArmed => "signals armed",
            Phase::InstanceRegistered => "instance registered",
            Phase::Running => "running",
        };
        f.write_str(name)
    }
}

pub struct Starting;

pub struct IdentityResolved {
    identity: ResolvedIdentity,
}

pub struct ConfigLoaded {
    identity: ResolvedIdentity,
    settings: MonitorSettings,
}

pub struct EmailAlertEvaluated {
    identity: ResolvedIdentity,
    settings: MonitorSettings,
}

pub struct Daemonized {
    identity: ResolvedIdentity,
    settings: MonitorSettings,
}

pub struct PrivilegeDropped {
    settings: MonitorSettings,
}

pub struct SignalArmed {
    settings: MonitorSettings,
    signals: SignalState,
}

pub struct InstanceRegistered {
    settings: MonitorSettings,
    signals: SignalState,
    guard: InstanceGuard,
}

/// The startup sequence in phase `S`
pub struct Bootstrap<S> {
    run: RunConfig,
    logger: DaemonLogger,
    state: S,
}

/// Result of configuration validation
pub enum Validation {
    /// `-t` was given; nothing else may run
    TestExit,
    Proceed(Bootstrap<EmailAlertEvaluated>),
}

/// Everything the work loop takes ownership of
#[derive(Debug)]
pub struct RunningDaemon {
    pub settings: MonitorSettings,
    pub signals: SignalState,
    pub guard: InstanceGuard,
}

/// How the sequence ended
#[derive(Debug)]
pub enum Outcome {
    TestExit,
    Running(RunningDaemon),
}

fn detach_phase(foreground: bool) -> Phase {
    if foreground {
        Phase::Foreground
    } else {
        Phase::Daemonized
    }
}

fn enter<T>(run: RunConfig, logger: DaemonLogger, phase: Phase, state: T) -> Bootstrap<T> {
    debug!("{}: {}", PROCESS_LABEL, phase);
    Bootstrap { run, logger, state }
}

impl Bootstrap<Starting> {
    pub fn new(run: RunConfig, logger: DaemonLogger) -> Self {
        enter(run, logger, Phase::Starting, Starting)
    }

    pub fn resolve_identity<P: Platform>(
        self,
        platform: &mut P,
    ) -> Result<Bootstrap<IdentityResolved>> {
        let identity = identity::resolve(platform, &self.run.user, &self.run.group)?;
        Ok(enter(
            self.run,
            self.logger,
            Phase::IdentityResolved,
            IdentityResolved { identity },
        ))
    }
}

impl Bootstrap<IdentityResolved> {
    pub fn load_config(self) -> Result<Bootstrap<ConfigLoaded>> {
        let Bootstrap { run, logger, state } = self;

        let mut settings = config::load(&run.config_path, LoadFlags::REPORTS)?;
        if run.no_agents {
            settings.monitor_agents = false;
        }

        let identity = state.identity;
        Ok(enter(run, logger, Phase::ConfigLoaded, ConfigLoaded { identity, settings }))
    }
}

impl Bootstrap<ConfigLoaded> {
    /// Check SMTP settings when any report is configured
    pub fn evaluate_email_alerts<P: Platform>(
        self,
        platform: &mut P,
    ) -> Result<Bootstrap<EmailAlertEvaluated>> {
        let Bootstrap { run, logger, state } = self;
        let ConfigLoaded {
            identity,
            mut settings,
        } = state;

        if !settings.reports.is_empty() {
            email::apply(platform, &run.config_path, &mut settings, &logger)?;
        }

        Ok(enter(
            run,
            logger,
            Phase::EmailAlertEvaluated,
            EmailAlertEvaluated { identity, settings },
        ))
    }
}

impl Bootstrap<EmailAlertEvaluated> {
    /// Stop here when only validating the configuration
    pub fn finish_validation(self) -> Validation {
        if self.run.test_config {
            debug!("{}: {}", PROCESS_LABEL, Phase::TestExit);
            Validation::TestExit
        } else {
            Validation::Proceed(self)
        }
    }

    pub fn daemonize<P: Platform>(self, platform: &mut P) -> Result<Bootstrap<Daemonized>> {
        let Bootstrap { run, logger, state } = self;
        daemon::daemonize(platform, run.foreground)?;

        let phase = detach_phase(run.foreground);
        let EmailAlertEvaluated { identity, settings } = state;
        Ok(enter(run, logger, phase, Daemonized { identity, settings }))
    }
}

impl Bootstrap<Daemonized> {
    pub fn drop_privileges<P: Platform>(
        self,
        platform: &mut P,
    ) -> Result<Bootstrap<PrivilegeDropped>> {
        let Bootstrap { run, logger, state } = self;

        privsep::drop_privileges(
            platform,
            &state.identity,
            &run.user,
            &run.group,
            &run.chroot_dir,
        )?;
        logger.log_privsep(&run.chroot_dir, &run.user);

        let settings = state.settings;
        Ok(enter(run, logger, Phase::PrivilegeDropped, PrivilegeDropped { settings }))
    }
}

impl Bootstrap<PrivilegeDropped> {
    pub fn arm_signals<P: Platform>(self, platform: &mut P) -> Result<Bootstrap<SignalArmed>> {
        let Bootstrap { run, logger, state } = self;
        let signals = platform.install_signals(PROCESS_LABEL)?;

        let settings = state.settings;
        Ok(enter(run, logger, Phase::SignalArmed, SignalArmed { settings, signals }))
    }
}

impl Bootstrap<SignalArmed> {
    pub fn register_instance<P: Platform>(
        self,
        platform: &mut P,
        pid: Pid,
    ) -> Result<Bootstrap<InstanceRegistered>> {
        let Bootstrap { run, logger, state } = self;
        let guard = platform.register_pid(PROCESS_LABEL, pid)?;

        let SignalArmed { settings, signals } = state;
        Ok(enter(
            run,
            logger,
            Phase::InstanceRegistered,
            InstanceRegistered {
                settings,
                signals,
                guard,
            },
        ))
    }
}

impl Bootstrap<InstanceRegistered> {
    /// Hand everything to the work loop
    pub fn into_running(self) -> RunningDaemon {
        let Bootstrap { run, logger, state } = self;
        let InstanceRegistered {
            settings,
            signals,
            guard,
        } = state;

        logger.log_startup(&run.config_path, guard.pid().as_raw());
        debug!("{}: {}", PROCESS_LABEL, Phase::Running);

        RunningDaemon {
            settings,
            signals,
            guard,
        }
    }
}

/// Run the whole sequence with the current process id.
pub fn run<P: Platform>(run: RunConfig, logger: DaemonLogger, platform: &mut P) -> Result<Outcome> {
    let validated = Bootstrap::new(run, logger)
        .resolve_identity(platform)?
        .load_config()?
        .evaluate_email_alerts(platform)?
        .finish_validation();

    let ready = match validated {
        Validation::TestExit => return Ok(Outcome::TestExit),
        Validation::Proceed(ready) => ready,
    };

    let armed = ready
        .daemonize(platform)?
        .drop_privileges(platform)?
        .arm_signals(platform)?;

    // The pid changes when daemonizing, so read it only now
    let running = armed
        .register_instance(platform, nix::unistd::getpid())?
        .into_running();

    Ok(Outcome::Running(running))
}
