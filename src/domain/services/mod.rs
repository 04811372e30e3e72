//! Pure domain services.

mod attribution;

pub use attribution::*;
