//! SQLite persistence of the enriched access table.

pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::Serialize;
use thiserror::Error;

use crate::detect::{AnomalyFlag, Classification, DetectError, EnrichedRecord};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database '{}': {source}", path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error("unreadable stored label: {0}")]
    Label(#[from] DetectError),
}

impl StorageError {
    /// Attach the database path to a bare SQL error.
    fn at(self, path: &Path) -> Self {
        match self {
            StorageError::Sql(source) => StorageError::Database {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        }
    }
}

/// One row of the `acessos` table as read back from disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAccess {
    pub timestamp: String,
    pub event_type: String,
    pub status: String,
    pub subject: String,
    pub observations: Option<String>,
    pub response_time: i64,
    pub hour: i64,
    pub minute: i64,
    pub user_type: String,
    pub anomaly: AnomalyFlag,
    pub classification: Classification,
}

/// Open (or create) the SQLite database at `path`.
pub fn open(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(|e| StorageError::from(e).at(path))?;
    Ok(conn)
}

/// Replace the `acessos` table with `records`.
///
/// Drop, create and inserts run in one transaction, so on failure the
/// previous table is left as it was.
pub fn replace_access_table(conn: &mut Connection, records: &[EnrichedRecord]) -> Result<usize, StorageError> {
    let tx = conn.transaction()?;
    schema::recreate_access_table(&tx)?;
    {
        let mut stmt = tx.prepare(schema::INSERT_ACCESS)?;
        for r in records {
            let rec = &r.record;
            stmt.execute(params![
                rec.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                rec.event_type,
                rec.status,
                rec.subject,
                rec.observations,
                rec.response_time.as_secs(),
                rec.hour,
                rec.minute,
                rec.user_type,
                r.anomaly.as_str(),
                r.classification.as_str(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

/// Write `records` to the database file at `path`, replacing any previous run.
/// The connection is closed before returning, on success and on error.
pub fn persist(path: &Path, records: &[EnrichedRecord]) -> Result<usize, StorageError> {
    let mut conn = open(path)?;
    let written = replace_access_table(&mut conn, records).map_err(|e| e.at(path))?;
    tracing::info!(path = %path.display(), rows = written, table = schema::ACCESS_TABLE, "stored access table");
    Ok(written)
}

/// Read the whole `acessos` table back, in insertion order.
pub fn load_access_table(conn: &Connection) -> Result<Vec<StoredAccess>, StorageError> {
    let mut stmt = conn.prepare(schema::SELECT_ACCESS)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            StoredAccess {
                timestamp: row.get(0)?,
                event_type: row.get(1)?,
                status: row.get(2)?,
                subject: row.get(3)?,
                observations: row.get(4)?,
                response_time: row.get(5)?,
                hour: row.get(6)?,
                minute: row.get(7)?,
                user_type: row.get(8)?,
                anomaly: AnomalyFlag::Inlier,
                classification: Classification::Normal,
            },
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
        ))
    })?;

    let mut stored = Vec::new();
    for r in rows {
        let (mut access, anomaly, classification) = r?;
        access.anomaly = anomaly.parse()?;
        access.classification = classification.parse()?;
        stored.push(access);
    }
    Ok(stored)
}
