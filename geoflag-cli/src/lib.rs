//! Command-line interface for inspecting, re-batching and uploading flag logs.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod error;
mod logs;
mod rebatch;
mod stats;
mod upload;

pub use error::CliError;

const ARG_INPUT: &str = "input";
const ARG_OUTPUT: &str = "output";
const ARG_BATCH_SIZE: &str = "batch-size";
const ARG_BASE_URL: &str = "base-url";
const ARG_API_KEY: &str = "api-key";
const ARG_PROJECT: &str = "project";
const ENV_STATS_INPUT: &str = "GEOFLAG_CMDS_STATS_INPUT";
const ENV_REBATCH_INPUT: &str = "GEOFLAG_CMDS_REBATCH_INPUT";
const ENV_REBATCH_OUTPUT: &str = "GEOFLAG_CMDS_REBATCH_OUTPUT";
const ENV_UPLOAD_INPUT: &str = "GEOFLAG_CMDS_UPLOAD_INPUT";

/// Category given to flags that carry neither a challenge nor a generator.
const UNKNOWN_CATEGORY: &str = "unknown";

/// Run the CLI with the current process arguments and environment, writing
/// command output to stdout.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, input or output fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Stats(args) => stats::run_stats(args, writer),
        Command::Rebatch(args) => rebatch::run_rebatch(args, writer),
        Command::Upload(args) => upload::run_upload(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geoflag",
    about = "Inspect and deliver flags recorded by validation checks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarise the flags held in line-delimited logs.
    Stats(stats::StatsArgs),
    /// Rewrite line-delimited logs as GeoJSON batch files.
    Rebatch(rebatch::RebatchArgs),
    /// Upload the flags in line-delimited logs to the task service.
    Upload(upload::UploadArgs),
}

/// Write `value` as pretty JSON followed by a newline.
fn write_json(writer: &mut dyn Write, value: &impl Serialize) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
