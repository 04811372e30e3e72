//! # Domain Layer
//!
//! Core retrieval models, the error taxonomy, and pure text services.
//! This layer is independent of storage formats and external APIs.

mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
