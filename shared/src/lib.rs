//! Shared types for the conformance suite driver
//!
//! Identifiers, endpoint addressing and logging used by every part of the
//! driver. Anything that only one component needs stays in that component.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
