//! Trait definitions with mockall annotations for testing
//!
//! The orchestrator and its steps only ever see connections through these
//! traits, so every step can be driven by mocks or scripted fakes.

use url::Url;

use crate::core::EventCollector;
use crate::error::ConformanceResult;

/// Close code sent when the driver ends a connection itself
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close frame the driver sends when it initiates closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub code: u16,
    pub reason: String,
}

impl CloseRequest {
    /// Orderly, caller-initiated shutdown
    pub fn going_away() -> Self {
        Self {
            code: CLOSE_GOING_AWAY,
            reason: String::new(),
        }
    }
}

/// One live or terminated protocol session
///
/// Events for the session are delivered to the [`EventCollector`] it was
/// opened with; the handle itself only supports closing.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Start the closing handshake. Closing an already-closed session is a no-op.
    async fn close(&self, request: CloseRequest) -> ConformanceResult<()>;
}

/// Connection factory, doubling as the shared client container
#[mockall::automock]
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a session to `uri`, delivering its events to `collector`
    ///
    /// # Errors
    /// `ConnectFailed` when the transport cannot be established or upgraded
    async fn connect(&self, uri: &Url, collector: EventCollector) -> ConformanceResult<Box<dyn Connection>>;

    /// Tear down every session this connector opened. Later calls are no-ops.
    async fn shutdown(&self);
}
