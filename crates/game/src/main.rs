mod app;

use std::process::ExitCode;

use tracing::error;

use app::bootstrap::build_app;
use app::loop_runner::{run, Command};

fn main() -> ExitCode {
    let command = match Command::from_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match build_app() {
        Ok(app) => run(app, command),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
