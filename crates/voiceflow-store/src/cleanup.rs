use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

use voiceflow_core::ids::JobId;
use voiceflow_core::job::ObjectRef;

use crate::database::Database;
use crate::error::StoreError;

/// Artifacts awaiting deletion for one job, eligible once `expires_at`
/// (unix millis) has passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupRecord {
    pub job_id: JobId,
    pub files: Vec<ObjectRef>,
    pub expires_at: i64,
}

/// Tracks per-job artifact lists with a time-to-live. Written by the
/// dispatcher after every terminal transition; drained by the cleanup
/// scanner.
#[derive(Clone)]
pub struct CleanupRepo {
    db: Database,
}

impl CleanupRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register (or re-register, on redelivery) a job's artifacts for
    /// deletion after `ttl`. Last write wins.
    #[instrument(skip(self, files), fields(job_id = %job_id, files = files.len()))]
    pub fn schedule(
        &self,
        job_id: &JobId,
        files: &[ObjectRef],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(files)?;
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cleanup_records (job_id, files, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(job_id) DO UPDATE SET files = ?2, expires_at = ?3",
                rusqlite::params![job_id.as_str(), payload, expires_at, now],
            )?;
            Ok(())
        })
    }

    /// All records whose TTL has elapsed.
    pub fn expired(&self) -> Result<Vec<CleanupRecord>, StoreError> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, files, expires_at FROM cleanup_records
                 WHERE expires_at <= ?1 ORDER BY expires_at",
            )?;
            let rows = stmt.query_map([now], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (job_id, files, expires_at) = row?;
                let files: Vec<ObjectRef> = serde_json::from_str(&files)?;
                records.push(CleanupRecord {
                    job_id: JobId::from_raw(job_id),
                    files,
                    expires_at,
                });
            }
            Ok(records)
        })
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn remove(&self, job_id: &JobId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cleanup_records WHERE job_id = ?1",
                [job_id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM cleanup_records", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
