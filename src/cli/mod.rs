//! CLI argument parsing
//!
//! Short getopt-style flags parsed with clap:
//! - `-V` version, `-h` help (exit 1)
//! - `-d` repeatable debug level
//! - `-t` configuration test, `-f` foreground, `-n` no agent monitoring
//! - `-u`, `-g`, `-c`, `-D` identity, config and chroot overrides

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::constants::{DEFAULT_CHROOT_DIR, DEFAULT_CONFIG_PATH, DEFAULT_GROUP, DEFAULT_USER};

/// Startup options, fixed once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub user: String,
    pub group: String,
    pub chroot_dir: PathBuf,
    pub config_path: PathBuf,
    pub foreground: bool,
    /// Validate configuration and exit
    pub test_config: bool,
    /// Number of `-d` flags given
    pub debug_level: u8,
    /// Force agent monitoring off regardless of configuration
    pub no_agents: bool,
}

/// What the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(RunConfig),
    Version,
    Help,
}

/// Build the clap command definition
pub fn command() -> Command {
    Command::new("monitord")
        .version(env!("MONITORD_VERSION"))
        .about("Monitoring daemon")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('V')
                .help("Version and license message")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("help")
                .short('h')
                .help("This help message")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .help("Execute in debug mode; repeat to increase the debug level")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("test")
                .short('t')
                .help("Test configuration")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("foreground")
                .short('f')
                .help("Run in foreground")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .value_name("user")
                .help("User to run as")
                .default_value(DEFAULT_USER),
        )
        .arg(
            Arg::new("group")
                .short('g')
                .value_name("group")
                .help("Group to run as")
                .default_value(DEFAULT_GROUP),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .value_name("config")
                .help("Configuration file to use")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("dir")
                .short('D')
                .value_name("dir")
                .help("Directory to chroot into")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_CHROOT_DIR),
        )
        .arg(
            Arg::new("no-agents")
                .short('n')
                .help("Disable agent monitoring")
                .action(ArgAction::SetTrue),
        )
}

/// Parse an explicit argument list (first element is the program name)
pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Ok(invocation(&matches))
}

fn invocation(matches: &ArgMatches) -> Invocation {
    if matches.get_flag("version") {
        return Invocation::Version;
    }
    if matches.get_flag("help") {
        return Invocation::Help;
    }

    // Every value argument carries a default
    let string = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
    let path = |id: &str| matches.get_one::<PathBuf>(id).cloned().unwrap_or_default();

    Invocation::Run(RunConfig {
        user: string("user"),
        group: string("group"),
        chroot_dir: path("dir"),
        config_path: path("config"),
        foreground: matches.get_flag("foreground"),
        test_config: matches.get_flag("test"),
        debug_level: matches.get_count("debug"),
        no_agents: matches.get_flag("no-agents"),
    })
}

/// Help text
pub fn usage() -> String {
    command().render_help().to_string()
}

/// Version and license text
pub fn version() -> String {
    format!(
        "monitord v{} ({})\nLicensed under the MIT license.",
        env!("MONITORD_VERSION"),
        env!("GIT_HASH")
    )
}
