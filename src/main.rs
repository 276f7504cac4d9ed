#![forbid(unsafe_code)]

use std::process::ExitCode;

use monitord::bootstrap::{self, Outcome};
use monitord::cli::{self, Invocation};
use monitord::daemon::logging::{self, DaemonLogger};
use monitord::monitor::{Monitord, WorkLoop};
use monitord::platform::UnixPlatform;

fn main() -> ExitCode {
    let run = match cli::parse_from(std::env::args_os()) {
        Ok(Invocation::Run(run)) => run,
        Ok(Invocation::Version) => {
            println!("{}", cli::version());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Help) => {
            println!("{}", cli::usage());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!(
                "monitord: {}",
                e.kind().as_str().unwrap_or("invalid arguments")
            );
            eprintln!("{}", cli::usage());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(run.debug_level, &run.chroot_dir) {
        eprintln!("monitord: {:#}", e);
        return ExitCode::FAILURE;
    }

    let logger = DaemonLogger::new();
    let outcome = match bootstrap::run(run, logger.clone(), &mut UnixPlatform) {
        Ok(outcome) => outcome,
        Err(e) => {
            logger.log_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let daemon = match outcome {
        Outcome::TestExit => return ExitCode::SUCCESS,
        Outcome::Running(daemon) => daemon,
    };

    match Monitord::new(logger.clone()).run(daemon) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.log_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
