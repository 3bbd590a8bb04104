/*!
 * file2http — entry point
 */

use std::process::ExitCode;

use clap::Parser;
use file2http::{logging, Cli};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The CLI still works without logging, so a failed install is not fatal.
    if let Err(err) = logging::init_logging(cli.verbose, cli.log_format) {
        eprintln!("Warning: {err}");
    }

    match file2http::run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "file2http failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
