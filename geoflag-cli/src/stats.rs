//! Stats command implementation.

use std::collections::BTreeMap;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geoflag_core::Flag;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::logs::{ReadSummary, category_of, read_flags};
use crate::{ARG_INPUT, CliError, ENV_STATS_INPUT, write_json};

/// CLI arguments for the `stats` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read line-delimited flag logs and report how many flags, \
                 objects and fix suggestions they hold, per category and \
                 per country. Unreadable records are skipped and counted.",
    about = "Summarise flags in line-delimited logs"
)]
#[ortho_config(prefix = "GEOFLAG")]
pub(crate) struct StatsArgs {
    /// A `.log` file or a directory of them.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
}

impl StatsArgs {
    pub(crate) fn into_config(self) -> Result<StatsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        StatsConfig::try_from(merged)
    }
}

/// Resolved `stats` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatsConfig {
    pub(crate) input: Utf8PathBuf,
}

impl TryFrom<StatsArgs> for StatsConfig {
    type Error = CliError;

    fn try_from(args: StatsArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_STATS_INPUT,
        })?;
        Ok(Self { input })
    }
}

/// Summary printed by `stats`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FlagStats {
    pub(crate) files: usize,
    pub(crate) flags: usize,
    pub(crate) skipped: usize,
    pub(crate) objects: usize,
    pub(crate) fix_suggestions: usize,
    pub(crate) categories: BTreeMap<String, usize>,
    pub(crate) countries: BTreeMap<String, usize>,
}

impl FlagStats {
    fn record(&mut self, flag: &Flag) {
        self.objects += flag.objects().len();
        self.fix_suggestions += flag.fix_suggestions().len();
        *self.categories.entry(category_of(flag)).or_default() += 1;
        *self.countries.entry(flag.country().to_owned()).or_default() += 1;
    }

    fn finish(mut self, summary: ReadSummary) -> Self {
        self.files = summary.files;
        self.flags = summary.records;
        self.skipped = summary.skipped;
        self
    }
}

pub(crate) fn collect_stats(input: &Utf8Path) -> Result<FlagStats, CliError> {
    let mut stats = FlagStats::default();
    let summary = read_flags(input, |flag| {
        stats.record(&flag);
        Ok(())
    })?;
    Ok(stats.finish(summary))
}

pub(crate) fn run_stats(args: StatsArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let stats = collect_stats(&config.input)?;
    write_json(writer, &stats)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<StatsConfig, CliError> {
    let merged = StatsArgs::merge_from_layers(layers).map_err(CliError::from)?;
    StatsConfig::try_from(merged)
}
