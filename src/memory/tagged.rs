//! Tagged memory entries (§4.4 tier 3): small atomic facts, process-wide,
//! individually deletable, retrieved by semantic search first with a
//! lexical (tsvector) fallback on failure.
//!
//! Wraps `database::memory::MemoryStore` (pgvector + tsvector) and
//! `MemoryRetriever`'s cache/embedding orchestration rather than
//! reimplementing them — a tagged entry and `database::Memory` are the
//! same row shape, so this module is the public-facing tier, not a
//! parallel store.

use uuid::Uuid;

use crate::database::Memory;
use crate::error::Result;

use super::retrieval::MemoryRetriever;

/// One tagged fact, after retrieval.
pub type TaggedEntry = Memory;

/// Tagged-entry tier: semantic-first retrieval with a lexical fallback.
#[derive(Clone)]
pub struct TaggedMemoryStore {
    retriever: MemoryRetriever,
}

impl TaggedMemoryStore {
    pub fn new(retriever: MemoryRetriever) -> Self {
        TaggedMemoryStore { retriever }
    }

    /// Save a new tagged fact, embedding it if possible.
    pub async fn save(&self, entry: &TaggedEntry) -> Result<()> {
        self.retriever.save_memory(entry).await
    }

    /// Top-K tagged entries relevant to `query`, as a formatted context
    /// string ready to inline into a system prompt. Semantic search is
    /// attempted first inside the retriever; a full-text fallback runs
    /// automatically when it errors or returns nothing usable.
    pub async fn retrieve(&self, user_id: &str, query: &str, limit: usize) -> Result<String> {
        self.retriever.retrieve(user_id, query, limit).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.retriever.store().delete(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<TaggedEntry>> {
        self.retriever.store().get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_entry_is_a_memory_row() {
        let entry: TaggedEntry = Memory::new("agent-1", "the user prefers dark mode");
        assert_eq!(entry.user_id, "agent-1");
    }
}
