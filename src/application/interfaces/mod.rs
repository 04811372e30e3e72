mod embedding_service;
mod passage_lookup;
mod vector_index;

pub use embedding_service::*;
pub use passage_lookup::*;
pub use vector_index::*;
