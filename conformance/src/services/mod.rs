//! Service implementations
//!
//! Real implementations of the service traits. These perform the actual
//! network I/O.

pub mod connector;

#[cfg(test)]
mod tests;

pub use connector::{RealConnection, RealConnector};
