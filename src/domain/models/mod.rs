mod context;
mod distance;
mod embedding;
mod passage;
mod query_result;

pub use context::*;
pub use distance::*;
pub use embedding::*;
pub use passage::*;
pub use query_result::*;
