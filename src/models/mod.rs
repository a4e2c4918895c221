//! Data models for the donated objects service.
//!
//! Wire names follow the Portuguese JSON contract of the service's clients.

mod object;
mod validation;

pub use object::*;
pub use validation::*;
