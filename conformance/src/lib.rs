//! Conformance driver for the Autobahn fuzzing server
//!
//! Discovers how many cases the server has, runs each of them as a client
//! (echoing every message back), then asks the server to write its reports.
//! All connection work goes through the [`Connector`] trait so the whole run
//! can be driven against mocks.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod steps;
pub mod traits;

// Re-export commonly used types
pub use config::{default_agent, DriverConfig, Timeouts};
pub use core::{CaseOutcome, CloseInfo, EventCollector, Payload, ReportStatus, RunReport, RunResult};
pub use error::{ConformanceError, ConformanceResult};
pub use orchestrator::{CaseSelection, Orchestrator, RunPhase};
pub use traits::{CloseRequest, Connection, Connector, MockConnection, MockConnector, CLOSE_GOING_AWAY};
