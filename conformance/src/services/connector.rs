//! WebSocket connection factory built on tokio-tungstenite
//!
//! Each connection gets a pump task that owns the socket: it feeds the
//! collector, echoes data messages when asked to, and performs the closing
//! handshake on request. The connector keeps every pump so that shutdown can
//! stop the ones still running.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};
use url::Url;

use crate::core::{CloseInfo, EventCollector, Payload};
use crate::error::{ConformanceError, ConformanceResult};
use crate::traits::{CloseRequest, Connection, Connector};

/// Real connector for `ws://` endpoints
pub struct RealConnector {
    connect_timeout: Duration,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl RealConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            pumps: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Pumps that have not finished yet
    pub fn active_connections(&self) -> usize {
        match self.pumps.lock() {
            Ok(pumps) => pumps.iter().filter(|pump| !pump.is_finished()).count(),
            Err(_) => 0,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Keep a pump for shutdown. Fails if shutdown already began.
    fn track(&self, pump: JoinHandle<()>) -> bool {
        let mut pumps = match self.pumps.lock() {
            Ok(pumps) => pumps,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Checked under the lock so shutdown cannot miss this pump
        if self.is_shut_down() {
            pump.abort();
            return false;
        }

        pumps.retain(|pump| !pump.is_finished());
        pumps.push(pump);
        true
    }
}

impl Default for RealConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[async_trait]
impl Connector for RealConnector {
    async fn connect(&self, uri: &Url, collector: EventCollector) -> ConformanceResult<Box<dyn Connection>> {
        if self.is_shut_down() {
            return Err(ConformanceError::connect_failed(uri, "client container shut down"));
        }

        let (ws, _response) = match timeout(self.connect_timeout, connect_async(uri.as_str())).await {
            Ok(Ok(handshake)) => handshake,
            Ok(Err(e)) => return Err(ConformanceError::connect_failed(uri, e)),
            Err(_) => {
                return Err(ConformanceError::connect_failed(
                    uri,
                    format!("handshake not completed within {:?}", self.connect_timeout),
                ))
            }
        };

        tracing::debug!("🔌 Connected to {}", uri);

        let (commands_tx, commands_rx) = mpsc::channel(1);
        let pump = tokio::spawn(pump_connection(ws, collector, commands_rx));
        if !self.track(pump) {
            return Err(ConformanceError::connect_failed(uri, "client container shut down"));
        }

        Ok(Box::new(RealConnection {
            uri: uri.clone(),
            commands: commands_tx,
        }))
    }

    async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let pumps = match self.pumps.lock() {
            Ok(mut pumps) => std::mem::take(&mut *pumps),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let stopped = pumps.iter().filter(|pump| !pump.is_finished()).count();
        for pump in pumps {
            pump.abort();
        }

        tracing::debug!("🛑 Client container shut down, {} connections still open were stopped", stopped);
    }
}

/// Handle to one pumped connection
pub struct RealConnection {
    uri: Url,
    commands: mpsc::Sender<CloseRequest>,
}

#[async_trait]
impl Connection for RealConnection {
    async fn close(&self, request: CloseRequest) -> ConformanceResult<()> {
        // Full or closed means a close is already underway or done
        if self.commands.try_send(request).is_err() {
            tracing::debug!("Close of {} skipped, connection already closing", self.uri);
        }
        Ok(())
    }
}

/// Drive one socket until the transport ends
pub(crate) async fn pump_connection<S>(
    mut ws: WebSocketStream<S>,
    collector: EventCollector,
    mut commands: mpsc::Receiver<CloseRequest>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut accepting_commands = true;

    loop {
        tokio::select! {
            command = commands.recv(), if accepting_commands => {
                // A dropped handle leaves the session to the peer
                accepting_commands = false;
                if let Some(request) = command {
                    let frame = CloseFrame {
                        code: CloseCode::from(request.code),
                        reason: request.reason.into(),
                    };
                    if let Err(e) = ws.close(Some(frame)).await {
                        collector.record_closed(CloseInfo::abnormal(e.to_string()));
                        break;
                    }
                }
            }

            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if collector.echoes() {
                            if let Err(e) = ws.send(Message::Text(text.clone())).await {
                                tracing::debug!("Echo failed: {}", e);
                            }
                        }
                        collector.record_message(Payload::Text(text));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if collector.echoes() {
                            if let Err(e) = ws.send(Message::Binary(data.clone())).await {
                                tracing::debug!("Echo failed: {}", e);
                            }
                        }
                        collector.record_message(Payload::Binary(data));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let info = match frame {
                            Some(frame) => CloseInfo::new(Some(u16::from(frame.code)), frame.reason.into_owned()),
                            None => CloseInfo::new(None, ""),
                        };
                        collector.record_closed(info);
                        // Keep reading so the close reply gets flushed
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        collector.record_closed(CloseInfo::abnormal(e.to_string()));
                        break;
                    }
                    None => {
                        collector.record_closed(CloseInfo::abnormal("connection ended"));
                        break;
                    }
                }
            }
        }
    }
}
