//! Archival memory (§4.4 tier 2): process-wide, append-only, labeled long
//! texts. Entries are immutable once written; retrieval is substring /
//! keyword match with a top-K cutoff.
//!
//! Grounded on `database::memory`'s save/get_all pattern, narrowed to
//! append-only semantics (no update, no delete — only `core_block`'s
//! overflow handler and operator tools ever write here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::PostgresPool;
use crate::error::Result;

/// One immutable archival entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArchivalEntry {
    pub id: Uuid,
    pub label: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Archival store backed by PostgreSQL.
#[derive(Clone)]
pub struct ArchivalStore {
    pool: PostgresPool,
}

impl ArchivalStore {
    pub fn new(pool: PostgresPool) -> Self {
        ArchivalStore { pool }
    }

    /// Append a new archival entry under `label`. Archival entries are
    /// never updated in place — each call creates a fresh row.
    pub async fn append(&self, label: &str, content: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(r#"
            INSERT INTO archival_entries (id, label, content)
            VALUES ($1, $2, $3)
        "#)
        .bind(id)
        .bind(label)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ArchivalEntry>> {
        let entry: Option<ArchivalEntry> = sqlx::query_as(
            "SELECT * FROM archival_entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Top-K entries matching `query` by substring/keyword, most recent
    /// first among matches.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ArchivalEntry>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let entries: Vec<ArchivalEntry> = sqlx::query_as(r#"
            SELECT * FROM archival_entries
            WHERE content ILIKE $1 OR label ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2
        "#)
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// All entries under a label, oldest first (the order they were split
    /// off from a core block).
    pub async fn get_by_label(&self, label: &str, limit: usize) -> Result<Vec<ArchivalEntry>> {
        let entries: Vec<ArchivalEntry> = sqlx::query_as(r#"
            SELECT * FROM archival_entries
            WHERE label = $1
            ORDER BY created_at ASC
            LIMIT $2
        "#)
        .bind(label)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archival_entry_is_plain_data() {
        let entry = ArchivalEntry {
            id: Uuid::new_v4(),
            label: "human".into(),
            content: "older half".into(),
            created_at: Utc::now(),
        };
        assert_eq!(entry.label, "human");
    }
}
