use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::RepoError;

use super::{DatasetState, DatasetStatus, PredictionRecord, PredictionRepository};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'uploaded',
    error_message TEXT,
    upload_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id INTEGER NOT NULL,
    row_order INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    prediction TEXT NOT NULL,
    confidence REAL,
    features TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_predictions_dataset ON predictions(dataset_id, row_order);
"#;

/// SQLite-backed repository. One connection, serialised behind a mutex.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, RepoError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepoError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl PredictionRepository for SqliteRepository {
    fn register_dataset(&self, file_path: &str) -> Result<i64, RepoError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO datasets (file_path, status) VALUES (?1, ?2)",
            params![file_path, DatasetStatus::Uploaded.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn file_path(&self, dataset_id: i64) -> Result<Option<String>, RepoError> {
        let conn = self.conn.lock();
        let path = conn
            .query_row(
                "SELECT file_path FROM datasets WHERE id = ?1",
                params![dataset_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        // Rows created by a status upsert carry no path.
        Ok(path.filter(|p| !p.is_empty()))
    }

    fn replace_predictions(
        &self,
        dataset_id: i64,
        records: &[PredictionRecord],
    ) -> Result<(), RepoError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM predictions WHERE dataset_id = ?1", params![dataset_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO predictions
                    (dataset_id, row_order, product_id, prediction, confidence, features, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (order, rec) in records.iter().enumerate() {
                let features = serde_json::to_string(&rec.features)?;
                stmt.execute(params![
                    dataset_id,
                    order as i64,
                    rec.product_id,
                    rec.prediction,
                    rec.confidence,
                    features,
                    rec.error,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("stored {} predictions for dataset {dataset_id}", records.len());
        Ok(())
    }

    fn predictions(&self, dataset_id: i64) -> Result<Vec<PredictionRecord>, RepoError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT product_id, prediction, confidence, features, error
             FROM predictions WHERE dataset_id = ?1 ORDER BY row_order",
        )?;
        let rows = stmt.query_map(params![dataset_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (product_id, prediction, confidence, features, error) = row?;
            out.push(PredictionRecord {
                product_id,
                prediction,
                confidence,
                features: serde_json::from_str(&features)?,
                error,
            });
        }
        Ok(out)
    }

    fn set_status(
        &self,
        dataset_id: i64,
        status: DatasetStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepoError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO datasets (id, file_path, status, error_message) VALUES (?1, '', ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status,
                                           error_message = excluded.error_message",
            params![dataset_id, status.as_str(), error_message],
        )?;
        Ok(())
    }

    fn status(&self, dataset_id: i64) -> Result<Option<DatasetState>, RepoError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT status, error_message FROM datasets WHERE id = ?1",
                params![dataset_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(status, error_message)| DatasetState {
            status: status.parse().unwrap_or_else(|e: String| {
                log::warn!("dataset {dataset_id}: {e}");
                DatasetStatus::Error
            }),
            error_message,
        }))
    }
}
