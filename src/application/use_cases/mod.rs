mod build_index;
mod retrieval_session;

pub use build_index::*;
pub use retrieval_session::*;
