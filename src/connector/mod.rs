//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - Embedding generation (OpenAI-compatible HTTP, deterministic mock)
//! - Storage (random-projection forest, passage corpus)
//! - Corpus loading and the MCP server
//! - CLI wiring (container, router, controllers)

pub mod adapter;
pub mod api;
pub mod storage;

pub use adapter::*;
pub use storage::*;
