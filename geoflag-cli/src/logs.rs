//! Reading flags back from line-delimited logs.

use std::io::{BufReader, ErrorKind};

use camino::{Utf8Path, Utf8PathBuf};
use geoflag_core::Flag;
use geoflag_core::interchange::from_line_delimited;
use log::{debug, warn};
use serde::Serialize;

use crate::{ARG_INPUT, CliError, UNKNOWN_CATEGORY};

/// Extension of line-delimited flag logs.
pub(crate) const LOG_EXTENSION: &str = "log";

/// Counts gathered while reading logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ReadSummary {
    pub(crate) files: usize,
    pub(crate) records: usize,
    pub(crate) skipped: usize,
}

/// The log files named by `input`: the file itself, or every `.log` file in
/// the directory, sorted by name.
pub(crate) fn log_files(input: &Utf8Path) -> Result<Vec<Utf8PathBuf>, CliError> {
    let read_error = |source| CliError::ReadInput {
        path: input.to_path_buf(),
        source,
    };
    match geoflag_fs::is_dir(input) {
        Ok(true) => {
            let dir = geoflag_fs::open_dir(input).map_err(read_error)?;
            let names = geoflag_fs::list_files(&dir, LOG_EXTENSION).map_err(read_error)?;
            Ok(names.into_iter().map(|name| input.join(name)).collect())
        }
        Ok(false) => Ok(vec![input.to_path_buf()]),
        Err(source) if source.kind() == ErrorKind::NotFound => Err(CliError::MissingInput {
            field: ARG_INPUT,
            path: input.to_path_buf(),
        }),
        Err(source) => Err(read_error(source)),
    }
}

/// Hand every readable flag under `input` to `visit`. Records that fail to
/// parse are logged and skipped.
pub(crate) fn read_flags(
    input: &Utf8Path,
    mut visit: impl FnMut(Flag) -> Result<(), CliError>,
) -> Result<ReadSummary, CliError> {
    let mut summary = ReadSummary::default();
    for path in log_files(input)? {
        let file = geoflag_fs::open_utf8_file(&path).map_err(|source| CliError::ReadInput {
            path: path.clone(),
            source,
        })?;
        summary.files += 1;
        for record in from_line_delimited(BufReader::new(file)) {
            match record {
                Ok(flag) => {
                    summary.records += 1;
                    visit(flag)?;
                }
                Err(err) => {
                    warn!("skipping record in {path}: {err}");
                    summary.skipped += 1;
                }
            }
        }
        debug!("read {path}");
    }
    Ok(summary)
}

/// Category a flag is grouped under.
pub(crate) fn category_of(flag: &Flag) -> String {
    flag.challenge().unwrap_or(UNKNOWN_CATEGORY).to_owned()
}
