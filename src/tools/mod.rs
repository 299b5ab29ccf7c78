//! Tools module - Modular tool system for agent capabilities
//!
//! Each tool is a self-contained module that implements the `Tool` trait.
//! Tools are registered into a `ToolRegistry` and made available to the LLM
//! for function calling.
//!
//! ## Built-in Tools
//!
//! - **memory**: core/archival/tagged memory read, write, and search
//! - **subagent**: delegate a sub-task to a fresh or parallel pool of agents
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `src/tools/` (e.g., `my_tool.rs`)
//! 2. Implement the `Tool` trait
//! 3. Add `mod my_tool;` and `pub use` in this file
//! 4. Register it into the `ToolRegistry` built by the binary entry point

mod traits;
mod registry;
pub mod subagent;
mod memory;

// Core trait and types
pub use traits::{Tool, ToolResult, ToolCall};

// Registry
pub use registry::ToolRegistry;

// Delegation
pub use subagent::{CallSubordinateTool, DelegateParallelTool, SubAgentRunner};

// Memory tools
pub use memory::{
    ArchivalMemoryInsertTool, ArchivalMemorySearchTool, CoreMemoryAppendTool, CoreMemoryReadTool,
    CoreMemoryReplaceTool, MemoryDeleteTool, MemorySaveTool, MemorySearchTool,
};
