// Entrypoint for the uploader.
// - Keeps `main` small: parse arguments, set up logging, run one upload.
// - Maps the outcome to the documented exit codes.

use call_upload::cli::{upload, UploadArgs};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "call_upload=debug"
    } else {
        "call_upload=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let args = UploadArgs::parse();
    init_tracing(args.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match upload(&args, &mut out) {
        Ok(result) => ExitCode::from(result.exit_code()),
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
