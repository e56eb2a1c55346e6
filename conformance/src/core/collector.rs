//! Event Collector
//!
//! Passive observer bound to one connection. The connection's pump task feeds
//! it from the runtime while the control flow waits on it with a bound.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;

use crate::error::{ConformanceError, ConformanceResult};

/// One data message received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// Terminal state of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseInfo {
    /// Close code from the peer's close frame, if it sent one
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Transport ended without a close frame
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(None, reason)
    }
}

#[derive(Debug)]
struct CollectorInner {
    echo: bool,
    messages_tx: mpsc::UnboundedSender<Payload>,
    messages_rx: Mutex<mpsc::UnboundedReceiver<Payload>>,
    received: AtomicUsize,
    closed: watch::Sender<Option<CloseInfo>>,
}

/// Records inbound messages in arrival order and the single close transition
#[derive(Debug, Clone)]
pub struct EventCollector {
    inner: Arc<CollectorInner>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Collector whose connection sends every data message back to the peer
    pub fn echoing() -> Self {
        Self::build(true)
    }

    fn build(echo: bool) -> Self {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(None);

        Self {
            inner: Arc::new(CollectorInner {
                echo,
                messages_tx,
                messages_rx: Mutex::new(messages_rx),
                received: AtomicUsize::new(0),
                closed,
            }),
        }
    }

    pub fn echoes(&self) -> bool {
        self.inner.echo
    }

    /// Append an inbound message
    pub fn record_message(&self, payload: Payload) {
        self.inner.received.fetch_add(1, Ordering::Relaxed);
        // The receiver lives in the same Arc, so this cannot fail
        let _ = self.inner.messages_tx.send(payload);
    }

    /// Record the close transition. Returns false if it was already recorded.
    pub fn record_closed(&self, info: CloseInfo) -> bool {
        self.inner.closed.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(info);
            true
        })
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.borrow().is_some()
    }

    pub fn close_info(&self) -> Option<CloseInfo> {
        self.inner.closed.borrow().clone()
    }

    /// Messages recorded so far, including ones already taken
    pub fn received_count(&self) -> usize {
        self.inner.received.load(Ordering::Relaxed)
    }

    /// Take the next message in arrival order, waiting at most `limit`
    pub async fn await_message(&self, limit: Duration) -> ConformanceResult<Payload> {
        let next = async {
            let mut rx = self.inner.messages_rx.lock().await;
            rx.recv().await
        };

        match timeout(limit, next).await {
            Ok(Some(payload)) => Ok(payload),
            _ => Err(ConformanceError::TimedOut {
                waiting_for: "message",
                timeout: limit,
            }),
        }
    }

    /// Wait at most `limit` for the connection to reach the closed state
    pub async fn await_closed(&self, limit: Duration) -> ConformanceResult<CloseInfo> {
        let mut rx = self.inner.closed.subscribe();
        let waited = timeout(limit, rx.wait_for(Option::is_some)).await;
        let info = match waited {
            Ok(Ok(state)) => state.as_ref().cloned(),
            _ => None,
        };

        info.ok_or(ConformanceError::TimedOut {
            waiting_for: "close",
            timeout: limit,
        })
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}
