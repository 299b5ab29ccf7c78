//! Multi-tier memory (§4.4): core blocks, archival, and tagged entries,
//! plus the embedding/caching/summarization plumbing that backs them.

pub mod archival;
pub mod cache;
pub mod core_block;
pub mod embedding;
pub mod retrieval;
pub mod summarizer;
pub mod tagged;

pub use archival::{ArchivalEntry, ArchivalStore};
pub use cache::MemoryCache;
pub use core_block::{CoreBlock, CoreMemoryStore};
pub use embedding::EmbeddingService;
pub use retrieval::MemoryRetriever;
pub use tagged::{TaggedEntry, TaggedMemoryStore};
