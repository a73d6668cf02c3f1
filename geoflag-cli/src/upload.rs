//! Upload command implementation.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use geoflag_core::Flag;
use geoflag_data::upload::{
    HttpTaskLoader, HttpTaskLoaderConfig, SharedClient, TaskBatchClient, TaskLoader,
    UploadProcessor,
};
use geoflag_data::{FlagEvent, Processor};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::logs::{ReadSummary, category_of, read_flags};
use crate::{
    ARG_API_KEY, ARG_BASE_URL, ARG_INPUT, ARG_PROJECT, CliError, ENV_UPLOAD_INPUT, write_json,
};

/// CLI arguments for the `upload` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read line-delimited flag logs and upload every flag as a \
                 task. Each category becomes a challenge; the project is the \
                 flag's country unless --project is given.",
    about = "Upload flags to the task service"
)]
#[ortho_config(prefix = "GEOFLAG")]
pub(crate) struct UploadArgs {
    /// A `.log` file or a directory of them.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Base URL of the task service API.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
    /// Key sent with every request.
    #[arg(long = ARG_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) api_key: Option<String>,
    /// Project receiving every challenge.
    #[arg(long = ARG_PROJECT, value_name = "name")]
    #[serde(default)]
    pub(crate) project: Option<String>,
}

impl UploadArgs {
    pub(crate) fn into_config(self) -> Result<UploadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UploadConfig::try_from(merged)
    }
}

/// Resolved `upload` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) project: Option<String>,
}

impl TryFrom<UploadArgs> for UploadConfig {
    type Error = CliError;

    fn try_from(args: UploadArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_UPLOAD_INPUT,
        })?;
        let base_url = args
            .base_url
            .unwrap_or_else(|| HttpTaskLoaderConfig::default().base_url);
        Ok(Self {
            input,
            base_url,
            api_key: args.api_key,
            project: args.project,
        })
    }
}

/// Summary printed by `upload`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct UploadSummary {
    pub(crate) files_read: usize,
    pub(crate) flags: usize,
    pub(crate) skipped: usize,
    pub(crate) uploaded: usize,
    pub(crate) failed: usize,
    pub(crate) timed_out: usize,
}

/// Upload every flag under `config.input` through `loader`.
pub(crate) fn upload_with<L>(config: &UploadConfig, loader: &L) -> Result<UploadSummary, CliError>
where
    L: TaskLoader + Clone + Send + Sync + 'static,
{
    let mut flags: Vec<(String, Flag)> = Vec::new();
    let read: ReadSummary = read_flags(&config.input, |flag| {
        flags.push((category_of(&flag), flag));
        Ok(())
    })?;

    let categories: BTreeSet<&str> = flags.iter().map(|(category, _)| category.as_str()).collect();
    let clients = categories.into_iter().map(|category| {
        let client = TaskBatchClient::new(loader.clone());
        let client = match &config.project {
            Some(project) => client.with_project(project.clone()),
            None => client,
        };
        (category.to_owned(), Arc::new(client) as SharedClient)
    });
    let processor = UploadProcessor::new(clients).map_err(CliError::PrepareUpload)?;
    for (category, flag) in flags {
        processor.process_flag(&FlagEvent::new(category, flag));
    }
    let report = processor.upload_all();
    info!(
        "uploaded {} tasks to {}",
        report.uploaded,
        loader.connection_info()
    );
    Ok(UploadSummary {
        files_read: read.files,
        flags: read.records,
        skipped: read.skipped,
        uploaded: report.uploaded,
        failed: report.failed,
        timed_out: report.timed_out,
    })
}

pub(crate) fn run_upload(args: UploadArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let mut loader_config = HttpTaskLoaderConfig::new(config.base_url.clone());
    if let Some(api_key) = &config.api_key {
        loader_config = loader_config.with_api_key(api_key.clone());
    }
    let loader = HttpTaskLoader::with_config(loader_config).map_err(CliError::PrepareUpload)?;
    let summary = upload_with(&config, &loader)?;
    write_json(writer, &summary)?;
    if summary.failed > 0 || summary.timed_out > 0 {
        return Err(CliError::UploadIncomplete {
            failed: summary.failed,
            timed_out: summary.timed_out,
        });
    }
    Ok(())
}
