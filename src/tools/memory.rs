//! Memory tools (§4.4): the dedicated `append`/`replace`/`read` tools over
//! core blocks, archival insert/search, and tagged save/search/delete.
//!
//! Every call carries `_agent_id`, injected by the loop (the same `agent_id`
//! that scopes the owning `AgentLoop`'s core blocks) rather than supplied by
//! the model, since the registry these tools live in is shared across every
//! worker in the pool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::database::Memory;
use crate::error::{Error, Result};
use crate::memory::{ArchivalStore, CoreMemoryStore, TaggedMemoryStore};
use crate::tools::traits::{Tool, ToolResult};

fn agent_id(args: &Value) -> Result<&str> {
    args.get("_agent_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidInput("missing _agent_id".into()))
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidInput(format!("missing '{key}' parameter")))
}

/// `core_memory_append(label, content)`: append text to a labeled block.
pub struct CoreMemoryAppendTool {
    core_memory: CoreMemoryStore,
}

impl CoreMemoryAppendTool {
    pub fn new(core_memory: CoreMemoryStore) -> Self {
        CoreMemoryAppendTool { core_memory }
    }
}

#[async_trait]
impl Tool for CoreMemoryAppendTool {
    fn name(&self) -> &str {
        "core_memory_append"
    }

    fn description(&self) -> &str {
        "Append text to a core memory block (persona, human, or scratchpad). Use for durable facts that should stay visible in every future turn."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "label": {"type": "string", "description": "Block label, e.g. 'persona', 'human', 'scratchpad'"},
                "content": {"type": "string", "description": "Text to append"}
            },
            "required": ["label", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let agent_id = agent_id(&args)?;
        let label = required_str(&args, "label")?;
        let content = required_str(&args, "content")?;

        self.core_memory.append(agent_id, label, content).await?;
        info!("core memory block '{}' appended for agent {}", label, agent_id);
        Ok(ToolResult::success(format!("Appended to core block '{label}'.")))
    }
}

/// `core_memory_replace(label, content)`: overwrite a block's content.
pub struct CoreMemoryReplaceTool {
    core_memory: CoreMemoryStore,
}

impl CoreMemoryReplaceTool {
    pub fn new(core_memory: CoreMemoryStore) -> Self {
        CoreMemoryReplaceTool { core_memory }
    }
}

#[async_trait]
impl Tool for CoreMemoryReplaceTool {
    fn name(&self) -> &str {
        "core_memory_replace"
    }

    fn description(&self) -> &str {
        "Replace the full content of a core memory block. Use to correct or rewrite a block rather than growing it indefinitely."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "label": {"type": "string", "description": "Block label, e.g. 'persona', 'human', 'scratchpad'"},
                "content": {"type": "string", "description": "New content for the block"}
            },
            "required": ["label", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let agent_id = agent_id(&args)?;
        let label = required_str(&args, "label")?;
        let content = required_str(&args, "content")?;

        self.core_memory.replace(agent_id, label, content).await?;
        info!("core memory block '{}' replaced for agent {}", label, agent_id);
        Ok(ToolResult::success(format!("Replaced core block '{label}'.")))
    }
}

/// `core_memory_read(label?)`: read one block, or all blocks if omitted.
pub struct CoreMemoryReadTool {
    core_memory: CoreMemoryStore,
}

impl CoreMemoryReadTool {
    pub fn new(core_memory: CoreMemoryStore) -> Self {
        CoreMemoryReadTool { core_memory }
    }
}

#[async_trait]
impl Tool for CoreMemoryReadTool {
    fn name(&self) -> &str {
        "core_memory_read"
    }

    fn description(&self) -> &str {
        "Read a core memory block by label, or all blocks if no label is given."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "label": {"type": "string", "description": "Optional block label; omit to read every block"}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let agent_id = agent_id(&args)?;
        let label = args.get("label").and_then(|v| v.as_str());

        let blocks = match label {
            Some(label) => match self.core_memory.get(agent_id, label).await? {
                Some(block) => vec![block],
                None => return Ok(ToolResult::failure(format!("No core block named '{label}'."))),
            },
            None => self.core_memory.get_all(agent_id).await?,
        };

        if blocks.is_empty() {
            return Ok(ToolResult::success("No core memory blocks found.".to_string()));
        }

        let mut output = String::new();
        for block in &blocks {
            output.push_str(&format!(
                "[{}] ({:.0}% full, read_only={})\n{}\n\n",
                block.label,
                block.usage_percent() * 100.0,
                block.read_only,
                block.content
            ));
        }
        Ok(ToolResult::success(output))
    }
}

/// `archival_memory_insert(label, content)`: write an entry to archival
/// storage, typically holding what an overflowing core block evicted.
pub struct ArchivalMemoryInsertTool {
    archival: ArchivalStore,
}

impl ArchivalMemoryInsertTool {
    pub fn new(archival: ArchivalStore) -> Self {
        ArchivalMemoryInsertTool { archival }
    }
}

#[async_trait]
impl Tool for ArchivalMemoryInsertTool {
    fn name(&self) -> &str {
        "archival_memory_insert"
    }

    fn description(&self) -> &str {
        "Insert an entry into archival memory, for information too large or too rarely needed to keep in a core block."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "label": {"type": "string", "description": "Label to file this entry under"},
                "content": {"type": "string", "description": "Entry content"}
            },
            "required": ["label", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let label = required_str(&args, "label")?;
        let content = required_str(&args, "content")?;

        let id = self.archival.append(label, content).await?;
        info!("archival memory entry {} inserted under '{}'", id, label);
        Ok(ToolResult::success(format!("Archived under '{label}'. ID: {id}")))
    }
}

/// `archival_memory_search(query, limit?)`: substring search over archival
/// entries, most recent first.
pub struct ArchivalMemorySearchTool {
    archival: ArchivalStore,
}

impl ArchivalMemorySearchTool {
    pub fn new(archival: ArchivalStore) -> Self {
        ArchivalMemorySearchTool { archival }
    }
}

#[async_trait]
impl Tool for ArchivalMemorySearchTool {
    fn name(&self) -> &str {
        "archival_memory_search"
    }

    fn description(&self) -> &str {
        "Search archival memory for entries matching a query. Use before answering questions about information that may have been moved out of core memory."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search text"},
                "limit": {"type": "integer", "description": "Maximum number of results (default: 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let query = required_str(&args, "query")?;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(5);

        let entries = self.archival.search(query, limit).await?;
        if entries.is_empty() {
            return Ok(ToolResult::success("No matching archival entries found.".to_string()));
        }

        let mut output = format!("Found {} archival entries:\n\n", entries.len());
        for entry in &entries {
            output.push_str(&format!("[{}] {} (id: {})\n\n", entry.label, entry.content, entry.id));
        }
        Ok(ToolResult::success(output))
    }
}

/// `memory_save(content, tags?, importance?, summary?)`: save a tagged entry
/// to long-term memory, retrievable later by semantic or lexical search.
pub struct MemorySaveTool {
    tagged: TaggedMemoryStore,
}

impl MemorySaveTool {
    pub fn new(tagged: TaggedMemoryStore) -> Self {
        MemorySaveTool { tagged }
    }
}

#[async_trait]
impl Tool for MemorySaveTool {
    fn name(&self) -> &str {
        "memory_save"
    }

    fn description(&self) -> &str {
        "Save important information to long-term memory for future recall. Use this when the user shares preferences, facts, decisions, or procedural knowledge worth remembering."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The information to remember"},
                "summary": {"type": "string", "description": "Brief one-line summary for quick reference"},
                "importance": {"type": "number", "description": "Importance score 0.0-1.0. Default: 0.5"},
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tags for categorization (e.g., 'preference', 'project', 'decision')"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let agent_id = agent_id(&args)?;
        let content = required_str(&args, "content")?;

        let importance = args
            .get("importance")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or(0.5);
        let summary = args.get("summary").and_then(|v| v.as_str());
        let tags: Vec<String> = args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let mut memory = Memory::new(agent_id, content)
            .with_importance(importance)
            .with_tags(tags.clone());
        if let Some(summary) = summary {
            memory = memory.with_summary(summary);
        }

        let memory_id = memory.id;
        self.tagged.save(&memory).await?;
        info!("tagged memory saved: id={}, agent={}", memory_id, agent_id);

        let tag_info = if tags.is_empty() {
            String::new()
        } else {
            format!(", tags: [{}]", tags.join(", "))
        };
        Ok(ToolResult::success(format!(
            "Memory saved (importance: {importance:.1}{tag_info}). ID: {memory_id}"
        )))
    }
}

/// `memory_search(query, limit?)`: retrieve previously saved entries,
/// semantic-first with lexical fallback, as a pre-formatted context block.
pub struct MemorySearchTool {
    tagged: TaggedMemoryStore,
}

impl MemorySearchTool {
    pub fn new(tagged: TaggedMemoryStore) -> Self {
        MemorySearchTool { tagged }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for relevant information. Use this before answering questions about past interactions, user preferences, or previously discussed topics."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query in natural language"},
                "limit": {"type": "integer", "description": "Maximum number of results (default: 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let agent_id = agent_id(&args)?;
        let query = required_str(&args, "query")?;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(5);

        let result = self.tagged.retrieve(agent_id, query, limit).await?;
        if result.is_empty() {
            Ok(ToolResult::success("No matching memories found.".to_string()))
        } else {
            Ok(ToolResult::success(result))
        }
    }
}

/// `memory_delete(memory_id)`: remove a tagged entry by id.
pub struct MemoryDeleteTool {
    tagged: TaggedMemoryStore,
}

impl MemoryDeleteTool {
    pub fn new(tagged: TaggedMemoryStore) -> Self {
        MemoryDeleteTool { tagged }
    }
}

#[async_trait]
impl Tool for MemoryDeleteTool {
    fn name(&self) -> &str {
        "memory_delete"
    }

    fn description(&self) -> &str {
        "Delete a specific memory by its ID. Use when information is outdated, incorrect, or no longer needed."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_id": {"type": "string", "description": "UUID of the memory to delete"}
            },
            "required": ["memory_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let memory_id_str = required_str(&args, "memory_id")?;
        let memory_id = Uuid::parse_str(memory_id_str)
            .map_err(|e| Error::InvalidInput(format!("Invalid UUID '{memory_id_str}': {e}")))?;

        match self.tagged.get(memory_id).await? {
            Some(memory) => {
                self.tagged.delete(memory_id).await?;
                info!("tagged memory deleted: id={}", memory_id);
                let preview = memory
                    .summary
                    .as_deref()
                    .unwrap_or(&memory.content[..memory.content.len().min(80)]);
                Ok(ToolResult::success(format!("Memory deleted: \"{preview}\" (ID: {memory_id})")))
            }
            None => Ok(ToolResult::failure(format!("Memory not found: {memory_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_is_required() {
        let args = serde_json::json!({"label": "persona", "content": "x"});
        assert!(agent_id(&args).is_err());
    }

    #[test]
    fn agent_id_reads_injected_field() {
        let args = serde_json::json!({"_agent_id": "worker-1", "label": "persona"});
        assert_eq!(agent_id(&args).unwrap(), "worker-1");
    }

    #[test]
    fn required_str_reports_missing_key() {
        let args = serde_json::json!({});
        assert!(required_str(&args, "content").is_err());
    }
}
