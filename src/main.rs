use std::process::ExitCode;

use appsody::{exit_code_for_error, init_tracing, run_cli, LoggingConfig};

fn main() -> ExitCode {
    init_tracing();
    let log = LoggingConfig::stdio();
    match run_cli(std::env::args_os(), &log, None) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&e.to_string());
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}
