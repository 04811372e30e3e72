mod server;
mod tools;

pub use server::{serve_stdio, FaqsearchMcpServer};
pub use tools::LookupToolInput;
