//! Core driver types
//!
//! Connection observation, count decoding and result bookkeeping. Nothing in
//! here performs I/O.

pub mod collector;
pub mod count;
pub mod outcome;

pub use collector::{CloseInfo, EventCollector, Payload};
pub use count::parse_case_count;
pub use outcome::{CaseOutcome, ReportStatus, RunReport, RunResult};
