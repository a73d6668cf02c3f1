//! Test helpers that write line-delimited flag logs into a scratch workspace.

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use geoflag_core::interchange::to_line_delimited;
use geoflag_core::{CompleteEntity, Flag};
use std::fs;
use tempfile::TempDir;

pub(super) const TIMESTAMP: &str = "2024-03-01T09:30:00.000Z";

#[derive(Debug)]
pub(super) struct LogWorkspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl LogWorkspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn logs(&self) -> Utf8PathBuf {
        self.root.join("logs")
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.root.join("batches")
    }

    pub(super) fn write_log(&self, name: &str, lines: &[String]) -> Utf8PathBuf {
        let dir = self.logs();
        fs::create_dir_all(&dir).expect("create log dir");
        let path = dir.join(name);
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(&path, text).expect("write log");
        path
    }

    pub(super) fn output_files(&self, extension: &str) -> Vec<Utf8PathBuf> {
        let mut files: Vec<Utf8PathBuf> = fs::read_dir(self.output())
            .map(|entries| {
                entries
                    .map(|entry| {
                        Utf8PathBuf::from_path_buf(entry.expect("dir entry").path())
                            .expect("utf-8 entry")
                    })
                    .filter(|path| path.extension() == Some(extension))
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }
}

/// One log line for a single-node flag.
pub(super) fn flag_line(identifier: &str, challenge: &str, country: &str) -> String {
    let osm_identifier: i64 = identifier
        .trim_start_matches('F')
        .parse()
        .expect("numeric flag suffix");
    let node = CompleteEntity::node(
        (osm_identifier + 1) * 1_000_000,
        Coord {
            x: 174.7,
            y: -36.8,
        },
    )
    .with_tag("iso_country_code", country)
    .with_tag("highway", "crossing");
    let mut flag = Flag::new(identifier).with_challenge(challenge);
    flag.add_object(&node);
    flag.add_instruction("Check the crossing");
    to_line_delimited(&flag, challenge, TIMESTAMP)
}

pub(super) fn read_json(path: &Utf8Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read output")).expect("json output")
}
