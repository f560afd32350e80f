use std::time::Duration;

use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use voiceflow_core::job::WorkItem;

use crate::database::Database;
use crate::error::StoreError;

/// A claimed work item. `attempt` counts deliveries of this item (first
/// delivery = 1) and feeds the dispatcher's retry budget.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub receipt: i64,
    pub attempt: u32,
    pub item: WorkItem,
}

/// Durable work queue with at-least-once delivery and late acknowledgment.
///
/// A claim takes a lease; the item stays invisible until the lease expires
/// or the worker nacks it. Acknowledging deletes the row. A worker that
/// crashes mid-processing simply lets its lease lapse, and the item becomes
/// claimable again. Redelivery, not loss.
#[derive(Clone)]
pub struct JobQueue {
    db: Database,
}

impl JobQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, item), fields(job_id = %item.job_id))]
    pub fn enqueue(&self, item: &WorkItem) -> Result<(), StoreError> {
        let payload = serde_json::to_string(item)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO queue (job_id, item, available_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![item.job_id.as_str(), payload, now_ms(), now],
            )?;
            Ok(())
        })
    }

    /// Claim the oldest available item, taking a lease for `lease`.
    /// Returns `None` when nothing is claimable right now.
    pub fn claim(&self, lease: Duration) -> Result<Option<Delivery>, StoreError> {
        let now = now_ms();
        let leased_until = now + lease.as_millis() as i64;

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let row: Option<(i64, String, u32)> = tx
                .query_row(
                    "SELECT receipt, item, attempts FROM queue
                     WHERE available_at <= ?1
                       AND (leased_until IS NULL OR leased_until <= ?1)
                     ORDER BY receipt LIMIT 1",
                    rusqlite::params![now],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((receipt, payload, attempts)) = row else {
                tx.commit()?;
                return Ok(None);
            };

            tx.execute(
                "UPDATE queue SET leased_until = ?1, attempts = attempts + 1 WHERE receipt = ?2",
                rusqlite::params![leased_until, receipt],
            )?;
            tx.commit()?;

            let item: WorkItem = serde_json::from_str(&payload)?;
            Ok(Some(Delivery {
                receipt,
                attempt: attempts + 1,
                item,
            }))
        })
    }

    /// Acknowledge a delivery, removing it permanently. Acknowledging an
    /// already-acknowledged receipt is a no-op.
    #[instrument(skip(self))]
    pub fn ack(&self, receipt: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM queue WHERE receipt = ?1", [receipt])?;
            Ok(())
        })
    }

    /// Return a delivery to the queue, becoming claimable again after
    /// `delay`. This is how retries travel: through the queue, not an
    /// in-process wait.
    #[instrument(skip(self))]
    pub fn nack(&self, receipt: i64, delay: Duration) -> Result<(), StoreError> {
        let available_at = now_ms() + delay.as_millis() as i64;
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE queue SET leased_until = NULL, available_at = ?1 WHERE receipt = ?2",
                rusqlite::params![available_at, receipt],
            )?;
            Ok(())
        })
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
