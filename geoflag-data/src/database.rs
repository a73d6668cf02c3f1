//! SQLite sink for flushed flag batches.
//!
//! Each compact feature becomes a row in `flags`, keyed by category and flag
//! identifier, with one `flag_objects` row per referenced OSM identifier.
//! Writes are idempotent: re-flushing a flag replaces its rows.

use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, Error as SqliteError, Transaction, params};
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::{BatchSink, SinkError};

/// Errors raised by [`SqliteSink`].
#[derive(Debug, Error)]
pub enum SqliteSinkError {
    /// Failed to create the parent directory for the database.
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Enabling SQLite foreign keys failed.
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the tables failed.
    #[error("failed to create flag tables")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Beginning the transaction failed.
    #[error("failed to begin flag batch transaction")]
    BeginTransaction {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Preparing an insert statement failed.
    #[error("failed to prepare flag insert statement")]
    PrepareInsert {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A feature lacked its flag identifier.
    #[error("feature in {category} batch has no flag identifier")]
    MissingIdentifier {
        /// Category being flushed.
        category: String,
    },
    /// Writing a flag row failed.
    #[error("failed to persist flag {flag_id}")]
    PersistRow {
        /// Identifier of the flag being persisted.
        flag_id: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Committing the transaction failed.
    #[error("failed to commit flag batch transaction")]
    Commit {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Reading back rows failed.
    #[error("failed to query flag rows")]
    Query {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Persists batches into a SQLite database file.
#[derive(Debug)]
pub struct SqliteSink {
    path: Utf8PathBuf,
    connection: Mutex<Connection>,
}

impl SqliteSink {
    /// Open or create the database at `path`, creating parent directories
    /// and tables as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError`] when the directory, database or schema
    /// cannot be prepared.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteSinkError> {
        ensure_parent_dir(path)?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteSinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| SqliteSinkError::ForeignKeys { source })?;
        create_schema(&connection)?;
        Ok(Self {
            path: path.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    /// Database path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Flags stored for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Query`] when the count fails.
    pub fn count(&self, category: &str) -> Result<i64, SqliteSinkError> {
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        connection
            .query_row(
                "SELECT COUNT(*) FROM flags WHERE category = ?1",
                params![category],
                |row| row.get(0),
            )
            .map_err(|source| SqliteSinkError::Query { source })
    }

    /// OSM identifiers referenced by one flag, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Query`] when the lookup fails.
    pub fn osm_identifiers(
        &self,
        category: &str,
        flag_id: &str,
    ) -> Result<Vec<i64>, SqliteSinkError> {
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statement = connection
            .prepare(
                "SELECT osm_identifier FROM flag_objects \
                 WHERE category = ?1 AND flag_id = ?2 ORDER BY osm_identifier",
            )
            .map_err(|source| SqliteSinkError::Query { source })?;
        let rows = statement
            .query_map(params![category, flag_id], |row| row.get(0))
            .map_err(|source| SqliteSinkError::Query { source })?;
        rows.collect::<Result<Vec<i64>, _>>()
            .map_err(|source| SqliteSinkError::Query { source })
    }

    fn persist(&self, category: &str, features: &[Value]) -> Result<(), SqliteSinkError> {
        let mut connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let transaction = connection
            .transaction()
            .map_err(|source| SqliteSinkError::BeginTransaction { source })?;
        persist_rows(&transaction, category, features)?;
        transaction
            .commit()
            .map_err(|source| SqliteSinkError::Commit { source })
    }
}

impl BatchSink for SqliteSink {
    fn write_batch(&self, category: &str, features: Vec<Value>) -> Result<(), SinkError> {
        self.persist(category, &features).map_err(SinkError::from)
    }
}

fn ensure_parent_dir(path: &Utf8Path) -> Result<(), SqliteSinkError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    geoflag_fs::ensure_dir(parent)
        .map(|_| ())
        .map_err(|source| SqliteSinkError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })
}

fn create_schema(connection: &Connection) -> Result<(), SqliteSinkError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS flags (
                category TEXT NOT NULL,
                flag_id TEXT NOT NULL,
                instructions TEXT NOT NULL,
                feature TEXT NOT NULL,
                PRIMARY KEY (category, flag_id)
            );
            CREATE TABLE IF NOT EXISTS flag_objects (
                category TEXT NOT NULL,
                flag_id TEXT NOT NULL,
                osm_identifier INTEGER NOT NULL,
                PRIMARY KEY (category, flag_id, osm_identifier),
                FOREIGN KEY (category, flag_id) REFERENCES flags (category, flag_id)
                    ON DELETE CASCADE
            );",
        )
        .map_err(|source| SqliteSinkError::CreateSchema { source })
}

fn persist_rows(
    transaction: &Transaction<'_>,
    category: &str,
    features: &[Value],
) -> Result<(), SqliteSinkError> {
    let mut insert_flag = transaction
        .prepare(
            "INSERT OR REPLACE INTO flags (category, flag_id, instructions, feature) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|source| SqliteSinkError::PrepareInsert { source })?;
    let mut insert_object = transaction
        .prepare(
            "INSERT OR REPLACE INTO flag_objects (category, flag_id, osm_identifier) \
             VALUES (?1, ?2, ?3)",
        )
        .map_err(|source| SqliteSinkError::PrepareInsert { source })?;

    for feature in features {
        let properties = &feature["properties"];
        let flag_id = properties["flag:id"].as_str().ok_or_else(|| {
            SqliteSinkError::MissingIdentifier {
                category: category.to_owned(),
            }
        })?;
        let instructions = properties["flag:instructions"].as_str().unwrap_or_default();
        let persist_error = |source| SqliteSinkError::PersistRow {
            flag_id: flag_id.to_owned(),
            source,
        };
        insert_flag
            .execute(params![category, flag_id, instructions, feature.to_string()])
            .map_err(persist_error)?;
        for identifier in osm_identifiers(properties) {
            insert_object
                .execute(params![category, flag_id, identifier])
                .map_err(persist_error)?;
        }
    }
    Ok(())
}

fn osm_identifiers(properties: &Value) -> impl Iterator<Item = i64> + '_ {
    properties["feature_osmids"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{FlagEvent, Processor};
    use crate::pipeline::{BatchSizePolicy, FeatureBatcher};
    use geo::Coord;
    use geoflag_core::{CompleteEntity, Flag};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn database() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
        (temp, root.join("nested/flags.db"))
    }

    fn flag(identifier: &str, osm_ids: &[i64]) -> Flag {
        let mut flag = Flag::new(identifier);
        for (offset, osm_id) in osm_ids.iter().enumerate() {
            let x = f64::from(u8::try_from(offset).expect("few members"));
            let node = CompleteEntity::node(osm_id * 1_000_000 + 1, Coord { x, y: 0.0 });
            flag.add_object(&node);
        }
        flag.add_instruction("Check the nodes");
        flag
    }

    #[rstest]
    fn batches_are_persisted_with_their_members(database: (TempDir, Utf8PathBuf)) {
        let (_guard, path) = database;
        let sink = SqliteSink::open(&path).expect("open sink");
        let batcher = FeatureBatcher::with_policy(sink, BatchSizePolicy::Fixed(2));
        batcher.process_flag(&FlagEvent::new("Nodes", flag("F1", &[7, 3])));
        batcher.process_flag(&FlagEvent::new("Nodes", flag("F2", &[5])));
        batcher.process_flag(&FlagEvent::new("Other", flag("F3", &[9])));
        batcher.complete();

        let sink = batcher.sink();
        assert_eq!(sink.count("Nodes").expect("count"), 2);
        assert_eq!(sink.count("Other").expect("count"), 1);
        assert_eq!(sink.osm_identifiers("Nodes", "F1").expect("ids"), vec![3, 7]);
    }

    #[rstest]
    fn reflushing_a_flag_replaces_its_row(database: (TempDir, Utf8PathBuf)) {
        let (_guard, path) = database;
        let sink = SqliteSink::open(&path).expect("open sink");
        let feature = geoflag_core::interchange::to_feature(
            &flag("F1", &[4]),
            &geoflag_core::FlagContext::default(),
        );
        sink.write_batch("Nodes", vec![feature.clone()]).expect("first write");
        sink.write_batch("Nodes", vec![feature]).expect("second write");
        assert_eq!(sink.count("Nodes").expect("count"), 1);
    }

    #[rstest]
    fn features_without_identifiers_are_rejected(database: (TempDir, Utf8PathBuf)) {
        let (_guard, path) = database;
        let sink = SqliteSink::open(&path).expect("open sink");
        let result = sink.write_batch("Nodes", vec![serde_json::json!({ "properties": {} })]);
        assert!(matches!(
            result,
            Err(SinkError::Database(SqliteSinkError::MissingIdentifier { .. }))
        ));
        assert_eq!(sink.count("Nodes").expect("count"), 0);
    }
}
