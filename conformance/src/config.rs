//! Driver configuration
//!
//! Every wait in the driver is bounded by one of the values in [`Timeouts`].

use shared::{AgentIdentity, TargetEndpoint};
use std::time::Duration;

/// Bounds for every suspension point in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait for the single message carrying the case count
    pub count_message: Duration,
    /// Wait for the server to acknowledge closing the count connection
    pub count_close: Duration,
    /// Wait for the server to end one case
    pub case_close: Duration,
    /// Wait for the server to close the update-reports connection
    pub report_close: Duration,
    /// Opening handshake for any connection
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            count_message: Duration::from_secs(10),
            count_close: Duration::from_secs(2),
            // Some cases stream large or slow payloads
            case_close: Duration::from_secs(5 * 60),
            report_close: Duration::from_secs(15),
            connect: Duration::from_secs(15),
        }
    }
}

impl Timeouts {
    pub fn with_count_message(mut self, timeout: Duration) -> Self {
        self.count_message = timeout;
        self
    }

    pub fn with_count_close(mut self, timeout: Duration) -> Self {
        self.count_close = timeout;
        self
    }

    pub fn with_case_close(mut self, timeout: Duration) -> Self {
        self.case_close = timeout;
        self
    }

    pub fn with_report_close(mut self, timeout: Duration) -> Self {
        self.report_close = timeout;
        self
    }

    pub fn with_connect(mut self, timeout: Duration) -> Self {
        self.connect = timeout;
        self
    }
}

/// Everything an orchestrator needs to know about its run
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub endpoint: TargetEndpoint,
    pub agent: AgentIdentity,
    pub timeouts: Timeouts,
}

impl DriverConfig {
    pub fn new(endpoint: TargetEndpoint, agent: AgentIdentity) -> Self {
        Self {
            endpoint,
            agent,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Identity announced when no `--agent` is given
pub fn default_agent() -> AgentIdentity {
    AgentIdentity::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
