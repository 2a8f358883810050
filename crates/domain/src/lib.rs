//! Domain layer for the weather agent
//!
//! Contains the conversation entities, tool results and value objects shared
//! by every other crate. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
