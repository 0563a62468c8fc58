//! Domain types
//!
//! - Newtypes for validated tokens, location ids and profile names
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;

pub use errors::DomainError;
pub use newtypes::*;
