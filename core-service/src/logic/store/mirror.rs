//! Best-effort secondary copies of the stores.
//!
//! The local parquet artifacts are the source of truth. After each successful
//! write the engine hands the new contents to every configured mirror; a
//! mirror failure is logged and never fails the ingest.
//!
//! - `BlobMirror` uploads the artifact bytes to `<base_url>/<file name>`
//!   (optionally with a SAS query string) as a block blob.
//! - `SqliteMirror` replaces the rows for the written keys inside one
//!   transaction, creating the table and any missing columns first.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use super::{Column, ColumnKind, StoreError, StoreRecord};
use crate::constants;
use crate::logic::dataset::RawValue;

/// Snapshot of a freshly written store
#[derive(Debug, Clone)]
pub struct MirrorPayload<'a> {
    pub table: &'static str,
    pub file: &'a Path,
    pub key_columns: &'static [&'static str],
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<RawValue>>,
}

impl<'a> MirrorPayload<'a> {
    pub fn build<R: StoreRecord>(file: &'a Path, rows: &[R], dimensions: &[String]) -> Self {
        Self {
            table: R::TABLE,
            file,
            key_columns: R::KEY_COLUMNS,
            columns: R::columns(dimensions),
            rows: rows.iter().map(|r| r.to_row(dimensions)).collect(),
        }
    }

    /// Distinct key tuples present in the payload
    fn keys(&self) -> Vec<Vec<String>> {
        let positions: Vec<usize> = self
            .key_columns
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| c.name == *k))
            .collect();

        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].render()).collect::<Vec<_>>())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}

pub trait Mirror: Send + Sync {
    fn name(&self) -> &'static str;

    fn publish(&self, payload: &MirrorPayload<'_>) -> Result<(), StoreError>;
}

// ============================================================================
// OBJECT STORAGE
// ============================================================================

pub struct BlobMirror {
    base_url: String,
    sas: Option<String>,
    agent: ureq::Agent,
}

impl BlobMirror {
    pub fn new(base_url: impl Into<String>, sas: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sas,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn url_for(&self, file: &Path) -> String {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &self.sas {
            Some(sas) => format!("{}/{}?{}", self.base_url, name, sas),
            None => format!("{}/{}", self.base_url, name),
        }
    }
}

impl Mirror for BlobMirror {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn publish(&self, payload: &MirrorPayload<'_>) -> Result<(), StoreError> {
        let bytes = fs::read(payload.file)?;
        self.agent
            .put(&self.url_for(payload.file))
            .set("x-ms-blob-type", "BlockBlob")
            .set("Content-Type", "application/octet-stream")
            .send_bytes(&bytes)
            .map_err(|e| StoreError::Mirror {
                mirror: self.name(),
                message: e.to_string(),
            })?;

        log::debug!("Uploaded {} ({} bytes) to blob storage", payload.table, bytes.len());
        Ok(())
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteMirror {
    path: PathBuf,
}

impl SqliteMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_table(conn: &Connection, payload: &MirrorPayload<'_>) -> Result<(), StoreError> {
        let definitions: Vec<String> = payload
            .columns
            .iter()
            .map(|c| format!("{} {}", quote(&c.name), c.kind.sql_type()))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote(payload.table),
                definitions.join(", ")
            ),
            [],
        )?;

        let existing: HashSet<String> = {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(payload.table)))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<HashSet<String>, rusqlite::Error>>()?;
            names
        };

        for column in payload.columns.iter().filter(|c| !existing.contains(&c.name)) {
            log::info!("Adding column {} to mirrored {} table", column.name, payload.table);
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote(payload.table),
                    quote(&column.name),
                    column.kind.sql_type()
                ),
                [],
            )?;
        }
        Ok(())
    }
}

impl Mirror for SqliteMirror {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn publish(&self, payload: &MirrorPayload<'_>) -> Result<(), StoreError> {
        let mut conn = Connection::open(&self.path)?;
        Self::ensure_table(&conn, payload)?;

        let delete_sql = format!(
            "DELETE FROM {} WHERE {}",
            quote(payload.table),
            payload
                .key_columns
                .iter()
                .enumerate()
                .map(|(i, k)| format!("{} = ?{}", quote(k), i + 1))
                .collect::<Vec<_>>()
                .join(" AND ")
        );
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(payload.table),
            payload
                .columns
                .iter()
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            (1..=payload.columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare(&delete_sql)?;
            for key in payload.keys() {
                delete.execute(params_from_iter(key.iter()))?;
            }

            let mut insert = tx.prepare(&insert_sql)?;
            for row in &payload.rows {
                let values = row
                    .iter()
                    .zip(&payload.columns)
                    .map(|(cell, column)| sql_value(cell, column.kind));
                insert.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        log::debug!(
            "Mirrored {} {} rows to {}",
            payload.rows.len(),
            payload.table,
            self.path.display()
        );
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn sql_value(cell: &RawValue, kind: ColumnKind) -> SqlValue {
    match (cell, kind) {
        (RawValue::Null, _) => SqlValue::Null,
        (cell, ColumnKind::Real) => cell.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        (cell, ColumnKind::Flag) => SqlValue::Integer(i64::from(cell.as_flag())),
        (cell, ColumnKind::Text) => SqlValue::Text(cell.render()),
    }
}

/// Mirrors configured through `ASSURANCE_BLOB_URL` / `ASSURANCE_SQLITE_PATH`
pub fn mirrors_from_env() -> Vec<Box<dyn Mirror>> {
    let mut mirrors: Vec<Box<dyn Mirror>> = Vec::new();

    if let Some(url) = constants::get_blob_url() {
        log::info!("Blob mirror enabled: {}", url);
        mirrors.push(Box::new(BlobMirror::new(
            url,
            constants::get_blob_sas(),
            Duration::from_secs(constants::get_mirror_timeout()),
        )));
    }
    if let Some(path) = constants::get_sqlite_path() {
        log::info!("SQLite mirror enabled: {}", path);
        mirrors.push(Box::new(SqliteMirror::new(path)));
    }

    mirrors
}
