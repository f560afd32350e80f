use chrono::Utc;
use tracing::instrument;

use voiceflow_core::ids::JobId;
use voiceflow_core::job::JobMode;
use voiceflow_core::task::{JobResult, TaskState};

use crate::database::Database;
use crate::error::StoreError;

/// One row of the task store.
#[derive(Clone, Debug)]
pub struct TaskRow {
    pub job_id: JobId,
    pub mode: JobMode,
    pub state: TaskState,
    pub created_at: String,
    pub updated_at: String,
}

/// Point reads and writes over `jobId -> TaskState`.
///
/// The gateway is the sole writer of the initial `Pending` row; the
/// dispatcher is the sole writer of terminal transitions. Terminal writes
/// are guarded by `status = 'pending'`, so once a task leaves `Pending` it
/// never changes again: a redelivered work item's second terminal write is
/// a no-op rather than a conflict.
#[derive(Clone)]
pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn insert_pending(&self, job_id: &JobId, mode: JobMode) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (job_id, mode, status, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', ?3, ?4)",
                rusqlite::params![job_id.as_str(), mode.to_string(), now, now],
            )?;
            Ok(())
        })
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn get(&self, job_id: &JobId) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, mode, status, result, error, created_at, updated_at
                 FROM tasks WHERE job_id = ?1",
            )?;
            let mut rows = stmt.query([job_id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_task(row),
                None => Err(StoreError::NotFound(format!("task {job_id}"))),
            }
        })
    }

    /// Terminal transition to `Success`. Returns false if the task was
    /// already terminal (redelivery), errors if the task is unknown.
    #[instrument(skip(self, result), fields(job_id = %job_id))]
    pub fn succeed(&self, job_id: &JobId, result: &JobResult) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(result)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = 'success', result = ?1, error = NULL, updated_at = ?2
                 WHERE job_id = ?3 AND status = 'pending'",
                rusqlite::params![payload, now, job_id.as_str()],
            )?;
            if changed > 0 {
                return Ok(true);
            }
            ensure_exists(conn, job_id)?;
            Ok(false)
        })
    }

    /// Terminal transition to `Failed`. Same write-once semantics as
    /// [`succeed`](Self::succeed).
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn fail(&self, job_id: &JobId, error: &str) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = 'failed', error = ?1, result = NULL, updated_at = ?2
                 WHERE job_id = ?3 AND status = 'pending'",
                rusqlite::params![error, now, job_id.as_str()],
            )?;
            if changed > 0 {
                return Ok(true);
            }
            ensure_exists(conn, job_id)?;
            Ok(false)
        })
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }
}

fn ensure_exists(conn: &rusqlite::Connection, job_id: &JobId) -> Result<(), StoreError> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM tasks WHERE job_id = ?1",
            [job_id.as_str()],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("task {job_id}")))
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<TaskRow, StoreError> {
    let job_id: String = row.get(0)?;
    let mode: String = row.get(1)?;
    let status: String = row.get(2)?;
    let result: Option<String> = row.get(3)?;
    let error: Option<String> = row.get(4)?;

    let mode: JobMode = mode
        .parse()
        .map_err(StoreError::Serialization)?;

    let state = match status.as_str() {
        "pending" => TaskState::Pending,
        "success" => {
            let payload =
                result.ok_or_else(|| StoreError::Serialization("success row without result".into()))?;
            let result: JobResult = serde_json::from_str(&payload)?;
            TaskState::Success { result }
        }
        "failed" => TaskState::Failed {
            error: error.unwrap_or_else(|| "unknown error".into()),
        },
        other => {
            return Err(StoreError::Serialization(format!("unknown task status: {other}")));
        }
    };

    Ok(TaskRow {
        job_id: JobId::from_raw(job_id),
        mode,
        state,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
