pub mod mcp;
mod mock_embedding;
mod openai_embedding;
mod text_corpus_loader;

pub use mcp::FaqsearchMcpServer;
pub use mock_embedding::*;
pub use openai_embedding::*;
pub use text_corpus_loader::*;
