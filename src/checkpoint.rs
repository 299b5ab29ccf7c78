//! Checkpoint store (§4.5): atomic snapshot save/load/list/delete/prune.
//!
//! Grounded on `database::tasks`'s status-lifecycle table pattern and
//! `database::memory`'s upsert-by-primary-key style, narrowed to a single
//! opaque, self-describing JSONB payload per row. Postgres's row-level
//! atomicity gives the "survive a crash at any byte" guarantee for free —
//! a writer either commits the whole row or the old row is untouched.
//!
//! Save is fire-and-forget from the loop's perspective (§4.5 "loop progress
//! never blocks on persistence"): `CheckpointStore::save_detached` spawns
//! the write and returns immediately. `save`/`prune` share one internal
//! mutex so a prune never races a concurrent save for the same agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use crate::database::PostgresPool;
use crate::error::Result;

/// Lifecycle status of a checkpoint (§3 data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Paused,
    Completed,
    Failed,
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckpointStatus::Paused => "paused",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for CheckpointStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "paused" => Ok(CheckpointStatus::Paused),
            "completed" => Ok(CheckpointStatus::Completed),
            "failed" => Ok(CheckpointStatus::Failed),
            other => Err(crate::error::Error::Internal(format!(
                "unknown checkpoint status: {other}"
            ))),
        }
    }
}

/// One saved snapshot of a run, as an opaque payload. Callers define the
/// shape of `payload`; the store only ever passes it through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub agent_id: String,
    pub step_number: i32,
    pub payload: Value,
    pub status: CheckpointStatus,
    pub created_at: DateTime<Utc>,
}

/// Row shape as stored: `status` is a plain text column, decoded through
/// `FromStr` rather than relying on a DB-level enum type.
#[derive(FromRow)]
struct CheckpointRow {
    id: Uuid,
    agent_id: String,
    step_number: i32,
    payload: Value,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = crate::error::Error;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        Ok(Checkpoint {
            id: row.id,
            agent_id: row.agent_id,
            step_number: row.step_number,
            payload: row.payload,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl Checkpoint {
    pub fn new(agent_id: impl Into<String>, step_number: u32, payload: Value) -> Self {
        Checkpoint {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            step_number: step_number as i32,
            payload,
            status: CheckpointStatus::Paused,
            created_at: Utc::now(),
        }
    }
}

/// Checkpoint store backed by PostgreSQL.
#[derive(Clone)]
pub struct CheckpointStore {
    pool: PostgresPool,
    /// Serializes save+prune so a prune never removes a row a concurrent
    /// save is still writing.
    write_lock: Arc<Mutex<()>>,
}

impl CheckpointStore {
    pub fn new(pool: PostgresPool) -> Self {
        CheckpointStore {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Atomically persist a checkpoint. A single `INSERT ... ON CONFLICT`
    /// is the whole transaction; Postgres guarantees it is all-or-nothing.
    pub async fn save(&self, cp: &Checkpoint) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(r#"
            INSERT INTO checkpoints (id, agent_id, step_number, payload, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                step_number = EXCLUDED.step_number,
                payload = EXCLUDED.payload,
                status = EXCLUDED.status
        "#)
        .bind(cp.id)
        .bind(&cp.agent_id)
        .bind(cp.step_number)
        .bind(&cp.payload)
        .bind(cp.status.to_string())
        .bind(cp.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update only a checkpoint's status (e.g. `paused` → `completed` once a
    /// resumed run reaches a terminal response). Runs under the same write
    /// lock as `save`/`prune`.
    pub async fn set_status(&self, id: Uuid, status: CheckpointStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE checkpoints SET status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fire-and-forget save: spawns the write and returns immediately so
    /// the calling loop never blocks on persistence. Failures are logged,
    /// not surfaced — a missed checkpoint is not a run failure.
    pub fn save_detached(&self, cp: Checkpoint) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&cp).await {
                error!("checkpoint save failed for agent={}: {}", cp.agent_id, e);
            }
        });
    }

    pub async fn load(&self, id: Uuid) -> Result<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            "SELECT * FROM checkpoints WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Checkpoint::try_from).transpose()
    }

    /// All checkpoints for an agent, newest first.
    pub async fn list(&self, agent_id: &str) -> Result<Vec<Checkpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(r#"
            SELECT * FROM checkpoints WHERE agent_id = $1 ORDER BY created_at DESC
        "#)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Checkpoint::try_from).collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Keep only the `keep` newest checkpoints for `agent_id`, deleting the
    /// rest. Runs under the same lock as `save` so it never drops a row a
    /// concurrent save just wrote.
    pub async fn prune(&self, agent_id: &str, keep: i64) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        if keep < 0 {
            warn!("prune called with negative keep={}, treating as 0", keep);
        }
        let keep = keep.max(0);
        let result = sqlx::query(r#"
            DELETE FROM checkpoints
            WHERE agent_id = $1
              AND id NOT IN (
                  SELECT id FROM checkpoints
                  WHERE agent_id = $1
                  ORDER BY created_at DESC
                  LIMIT $2
              )
        "#)
        .bind(agent_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkpoint_new_stamps_ids_and_time() {
        let cp = Checkpoint::new("agent-1", 5, json!({"step": 5}));
        assert_eq!(cp.agent_id, "agent-1");
        assert_eq!(cp.step_number, 5);
        assert_eq!(cp.payload["step"], 5);
        assert_eq!(cp.status, CheckpointStatus::Paused);
    }

    #[test]
    fn checkpoint_status_round_trips_through_display_and_parse() {
        use std::str::FromStr;
        for status in [
            CheckpointStatus::Paused,
            CheckpointStatus::Completed,
            CheckpointStatus::Failed,
        ] {
            assert_eq!(CheckpointStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }
}
