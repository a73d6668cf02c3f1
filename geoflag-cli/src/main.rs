//! Entry point for the `geoflag` command-line interface.
#![forbid(unsafe_code)]

use std::io;

use structured_logger::Builder;
use structured_logger::json::new_writer;

const LOG_LEVEL_ENV: &str = "GEOFLAG_LOG";

fn setup_logging() {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_owned());
    // stdout carries command output.
    Builder::with_level(&level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
}

fn main() {
    setup_logging();
    if let Err(err) = geoflag_cli::run() {
        eprintln!("geoflag: {err}");
        std::process::exit(1);
    }
}
