use clap::Parser;
use migrate_tools::cli::{self, Args};
use migrate_tools::core::error::{AppError, DefaultErrorReporter, ErrorReporter};
use migrate_tools::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = match logging::init(&args.command) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AppError>() {
                Some(app_error) => DefaultErrorReporter::new().report_error(app_error),
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
