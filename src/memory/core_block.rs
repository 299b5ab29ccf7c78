//! Core memory blocks (§4.4 tier 1): fixed, small, per-agent labeled text
//! blocks rendered into every system prompt. Mutated by dedicated tools
//! (`append`, `replace`, `read`) and by the loop's overflow handler.
//!
//! Table shape and upsert style follow `database::soul`'s section storage;
//! unlike soul sections, core blocks are scoped per `agent_id` rather than
//! global, and carry a char limit that drives the overflow protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::PostgresPool;
use crate::error::{Error, Result};

use super::archival::ArchivalStore;

/// Default character cap for a core block before it counts as "full".
const DEFAULT_CHAR_LIMIT: usize = 2000;

/// Usage fraction above which a block is split and its older half archived.
const OVERFLOW_THRESHOLD: f32 = 0.8;

/// One labeled block of an agent's core memory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoreBlock {
    pub agent_id: String,
    pub label: String,
    pub content: String,
    pub char_limit: i32,
    pub read_only: bool,
    pub updated_at: DateTime<Utc>,
}

impl CoreBlock {
    pub fn usage_percent(&self) -> f32 {
        if self.char_limit <= 0 {
            return 0.0;
        }
        (self.content.len() as f32) / (self.char_limit as f32)
    }
}

/// Core memory store backed by PostgreSQL, one row per `(agent_id, label)`.
#[derive(Clone)]
pub struct CoreMemoryStore {
    pool: PostgresPool,
}

impl CoreMemoryStore {
    pub fn new(pool: PostgresPool) -> Self {
        CoreMemoryStore { pool }
    }

    /// Ensure a block exists for this agent/label, creating it empty if not.
    pub async fn ensure_block(&self, agent_id: &str, label: &str, read_only: bool) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO core_memory_blocks (agent_id, label, content, char_limit, read_only)
            VALUES ($1, $2, '', $3, $4)
            ON CONFLICT (agent_id, label) DO NOTHING
        "#)
        .bind(agent_id)
        .bind(label)
        .bind(DEFAULT_CHAR_LIMIT as i32)
        .bind(read_only)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, agent_id: &str, label: &str) -> Result<Option<CoreBlock>> {
        let block: Option<CoreBlock> = sqlx::query_as(
            "SELECT * FROM core_memory_blocks WHERE agent_id = $1 AND label = $2",
        )
        .bind(agent_id)
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;
        Ok(block)
    }

    /// All blocks for an agent, for rendering into a system prompt.
    pub async fn get_all(&self, agent_id: &str) -> Result<Vec<CoreBlock>> {
        let blocks: Vec<CoreBlock> = sqlx::query_as(
            "SELECT * FROM core_memory_blocks WHERE agent_id = $1 ORDER BY label ASC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(blocks)
    }

    /// Append text to a block. Rejects read-only blocks.
    pub async fn append(&self, agent_id: &str, label: &str, text: &str) -> Result<()> {
        let block = self
            .get(agent_id, label)
            .await?
            .ok_or_else(|| Error::NotFound(format!("core block '{label}'")))?;
        if block.read_only {
            return Err(Error::InvalidInput(format!("core block '{label}' is read-only")));
        }
        let mut content = block.content;
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(text);
        self.write(agent_id, label, &content).await
    }

    /// Replace a block's content wholesale. Rejects read-only blocks.
    pub async fn replace(&self, agent_id: &str, label: &str, text: &str) -> Result<()> {
        let block = self
            .get(agent_id, label)
            .await?
            .ok_or_else(|| Error::NotFound(format!("core block '{label}'")))?;
        if block.read_only {
            return Err(Error::InvalidInput(format!("core block '{label}' is read-only")));
        }
        self.write(agent_id, label, text).await
    }

    async fn write(&self, agent_id: &str, label: &str, content: &str) -> Result<()> {
        sqlx::query(r#"
            UPDATE core_memory_blocks
            SET content = $1, updated_at = NOW()
            WHERE agent_id = $2 AND label = $3
        "#)
        .bind(content)
        .bind(agent_id)
        .bind(label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overflow protocol (§4.4): for every non-read-only block over
    /// threshold, split at the midpoint line, archive the older half under
    /// the same label, and retain the newer half in the block.
    pub async fn run_overflow_protocol(
        &self,
        agent_id: &str,
        archival: &ArchivalStore,
    ) -> Result<Vec<String>> {
        let mut overflowed = Vec::new();
        for block in self.get_all(agent_id).await? {
            if block.read_only || block.usage_percent() <= OVERFLOW_THRESHOLD {
                continue;
            }
            let (older, newer) = split_at_midpoint(&block.content);
            if older.is_empty() {
                continue;
            }
            archival.append(&block.label, &older).await?;
            self.write(agent_id, &block.label, &newer).await?;
            overflowed.push(block.label);
        }
        Ok(overflowed)
    }
}

/// Split text by lines at the midpoint: the first half (older) and the
/// second half (newer). A single-line block is never split.
fn split_at_midpoint(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return (String::new(), content.to_string());
    }
    let mid = lines.len() / 2;
    (lines[..mid].join("\n"), lines[mid..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_split_keeps_newer_half_in_block() {
        let content = "l1\nl2\nl3\nl4\nl5\nl6";
        let (older, newer) = split_at_midpoint(content);
        assert_eq!(older, "l1\nl2\nl3");
        assert_eq!(newer, "l4\nl5\nl6");
    }

    #[test]
    fn single_line_is_never_split() {
        let (older, newer) = split_at_midpoint("only one line");
        assert!(older.is_empty());
        assert_eq!(newer, "only one line");
    }

    #[test]
    fn usage_percent_is_length_over_limit() {
        let block = CoreBlock {
            agent_id: "a".into(),
            label: "human".into(),
            content: "x".repeat(1600),
            char_limit: 2000,
            read_only: false,
            updated_at: Utc::now(),
        };
        assert!((block.usage_percent() - 0.8).abs() < 0.001);
    }

    #[test]
    fn zero_char_limit_reports_zero_usage() {
        let block = CoreBlock {
            agent_id: "a".into(),
            label: "human".into(),
            content: "x".into(),
            char_limit: 0,
            read_only: false,
            updated_at: Utc::now(),
        };
        assert_eq!(block.usage_percent(), 0.0);
    }
}
