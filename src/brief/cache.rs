//! SQLite-backed context cache.
//!
//! One row per (issue key, report id). A row's presence is what marks an
//! issue as already distilled for that report; rows are only ever upserted.

use crate::brief::model::{IssueContext, IssueDigest, IssueMetadata};
use crate::error::CacheError;
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = core::result::Result<T, CacheError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS issue_context (
    issue_key  TEXT    NOT NULL,
    report_id  TEXT    NOT NULL,
    context    TEXT    NOT NULL,
    metadata   TEXT    NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (issue_key, report_id)
);
CREATE INDEX IF NOT EXISTS issue_context_report ON issue_context (report_id);
";

#[derive(Debug, Clone)]
pub struct ContextCache {
    path: PathBuf,
}

impl ContextCache {
    /// Opens (creating if needed) the cache database and applies the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let cache = Self { path };
        cache.connect()?.execute_batch(SCHEMA)?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Connections live for a single operation.
    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path).map_err(|source| CacheError::Open {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn upsert(&self, context: &IssueContext) -> Result<()> {
        let digest = serde_json::to_string(&context.digest)?;
        let metadata = serde_json::to_string(&context.metadata)?;
        self.connect()?.execute(
            "INSERT INTO issue_context (issue_key, report_id, context, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4, CAST(strftime('%s', 'now') AS INTEGER))
             ON CONFLICT (issue_key, report_id) DO UPDATE SET
                 context = excluded.context,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
            params![context.key, context.report_id, digest, metadata],
        )?;
        Ok(())
    }

    /// All cached contexts for one report, ordered by issue key.
    pub fn contexts_for_report(&self, report_id: &str) -> Result<Vec<IssueContext>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT issue_key, context, metadata FROM issue_context
             WHERE report_id = ?1 ORDER BY issue_key",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, context, metadata) = row?;
            let digest: IssueDigest =
                serde_json::from_str(&context).map_err(|source| CacheError::Corrupt {
                    key: key.clone(),
                    source,
                })?;
            let metadata: IssueMetadata =
                serde_json::from_str(&metadata).map_err(|source| CacheError::Corrupt {
                    key: key.clone(),
                    source,
                })?;
            out.push(IssueContext {
                key,
                report_id: report_id.to_string(),
                digest,
                metadata,
            });
        }
        Ok(out)
    }

    pub fn keys_for_report(&self, report_id: &str) -> Result<BTreeSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT issue_key FROM issue_context WHERE report_id = ?1")?;
        let keys = stmt
            .query_map(params![report_id], |row| row.get::<_, String>(0))?
            .collect::<core::result::Result<BTreeSet<_>, _>>()?;
        Ok(keys)
    }

    /// Every distinct issue key in the cache, across reports.
    pub fn list_all_keys(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT issue_key FROM issue_context ORDER BY issue_key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn report_counts(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT report_id, COUNT(*) FROM issue_context GROUP BY report_id ORDER BY report_id",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(counts
            .into_iter()
            .map(|(report, count)| (report, usize::try_from(count).unwrap_or(0)))
            .collect())
    }
}
