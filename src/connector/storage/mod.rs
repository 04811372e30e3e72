//! File-backed storage: the ANN embedding store and the passage corpus.

mod atomic_file;
mod embedding_store;
mod forest;
mod passage_corpus;

pub use embedding_store::*;
pub use forest::{Forest, LEAF_SIZE};
pub use passage_corpus::*;
