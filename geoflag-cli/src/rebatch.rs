//! Rebatch command implementation.

use std::collections::BTreeSet;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geoflag_data::{FeatureBatcher, FileSink, FileStore, FlagEvent, PipelineConfig};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::logs::{category_of, read_flags};
use crate::{
    ARG_BATCH_SIZE, ARG_INPUT, ARG_OUTPUT, CliError, ENV_REBATCH_INPUT, ENV_REBATCH_OUTPUT,
    write_json,
};

/// CLI arguments for the `rebatch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read line-delimited flag logs and write them out again as \
                 GeoJSON feature collections, one series of batch files per \
                 category. Without --batch-size the batch size adapts to the \
                 number of categories.",
    about = "Rewrite line-delimited logs as GeoJSON batches"
)]
#[ortho_config(prefix = "GEOFLAG")]
pub(crate) struct RebatchArgs {
    /// A `.log` file or a directory of them.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Directory receiving the batch files.
    #[arg(long = ARG_OUTPUT, value_name = "dir")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Flags per batch file.
    #[arg(long = ARG_BATCH_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) batch_size: Option<usize>,
}

impl RebatchArgs {
    pub(crate) fn into_config(self) -> Result<RebatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RebatchConfig::try_from(merged)
    }
}

/// Resolved `rebatch` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RebatchConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) batch_size: Option<usize>,
}

impl RebatchConfig {
    fn pipeline(&self) -> PipelineConfig {
        self.batch_size
            .map_or_else(PipelineConfig::default, |size| {
                PipelineConfig::default().with_batch_size_override(size)
            })
    }
}

impl TryFrom<RebatchArgs> for RebatchConfig {
    type Error = CliError;

    fn try_from(args: RebatchArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_REBATCH_INPUT,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_REBATCH_OUTPUT,
        })?;
        if args.batch_size == Some(0) {
            return Err(CliError::InvalidBatchSize { value: 0 });
        }
        Ok(Self {
            input,
            output,
            batch_size: args.batch_size,
        })
    }
}

/// Summary printed by `rebatch`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RebatchSummary {
    pub(crate) files_read: usize,
    pub(crate) flags: usize,
    pub(crate) skipped: usize,
    pub(crate) batches_written: usize,
    pub(crate) categories: Vec<String>,
}

pub(crate) fn rebatch(config: &RebatchConfig) -> Result<RebatchSummary, CliError> {
    let store = FileStore::new(config.output.clone());
    let batcher = FeatureBatcher::new(FileSink::new(store), &config.pipeline());
    let mut categories = BTreeSet::new();
    let mut batches_written = 0;
    let read = read_flags(&config.input, |flag| {
        let event = FlagEvent::new(category_of(&flag), flag);
        categories.insert(event.category().to_owned());
        if batcher.publish(&event).map_err(CliError::WriteBatch)? {
            batches_written += 1;
        }
        Ok(())
    })?;
    for category in &categories {
        if batcher.flush(category).map_err(CliError::WriteBatch)? {
            batches_written += 1;
        }
    }
    info!(
        "rebatched {} flags into {batches_written} batches under {}",
        read.records, config.output
    );
    Ok(RebatchSummary {
        files_read: read.files,
        flags: read.records,
        skipped: read.skipped,
        batches_written,
        categories: categories.into_iter().collect(),
    })
}

pub(crate) fn run_rebatch(args: RebatchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let summary = rebatch(&config)?;
    write_json(writer, &summary)
}
