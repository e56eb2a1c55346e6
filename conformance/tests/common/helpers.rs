//! Test helpers and builder patterns for conformance tests
//!
//! [`ScriptedConnector`] fakes the fuzzing server at the `Connector` seam and
//! journals every request; [`StubFuzzingServer`] is a real WebSocket server
//! for runs through `RealConnector`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use url::Url;

use conformance::*;
use shared::TargetEndpoint;

use super::fixtures::TestFixtures;

/// What the scripted server does with `/updateReports`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerBehaviour {
    Closes,
    Hangs,
    Refuses,
}

#[derive(Debug, Default)]
struct Journal {
    connected: Vec<Url>,
    closes: Vec<(Url, CloseRequest)>,
}

/// Connector that plays the fuzzing server from a script
pub struct ScriptedConnector {
    count_reply: Option<String>,
    hung_cases: HashSet<u32>,
    refused_cases: HashSet<u32>,
    finalizer: FinalizerBehaviour,
    journal: Arc<Mutex<Journal>>,
    shutdowns: AtomicUsize,
}

impl ScriptedConnector {
    /// Server that never sends a count, closes every case and updates reports
    pub fn new() -> Self {
        Self {
            count_reply: None,
            hung_cases: HashSet::new(),
            refused_cases: HashSet::new(),
            finalizer: FinalizerBehaviour::Closes,
            journal: Arc::new(Mutex::new(Journal::default())),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn with_count_reply(mut self, reply: &str) -> Self {
        self.count_reply = Some(reply.to_string());
        self
    }

    /// The server never ends this case
    pub fn with_hung_case(mut self, case: u32) -> Self {
        self.hung_cases.insert(case);
        self
    }

    /// The server rejects the handshake for this case
    pub fn with_refused_case(mut self, case: u32) -> Self {
        self.refused_cases.insert(case);
        self
    }

    pub fn with_finalizer(mut self, behaviour: FinalizerBehaviour) -> Self {
        self.finalizer = behaviour;
        self
    }

    /// Paths of every connection attempt, in order
    pub fn connected_paths(&self) -> Vec<String> {
        self.journal.lock().unwrap().connected.iter().map(|uri| uri.path().to_string()).collect()
    }

    pub fn connected_uris(&self) -> Vec<Url> {
        self.journal.lock().unwrap().connected.clone()
    }

    /// Case numbers requested through `/runCase`, in order
    pub fn run_case_order(&self) -> Vec<u32> {
        self.journal
            .lock()
            .unwrap()
            .connected
            .iter()
            .filter(|uri| uri.path() == "/runCase")
            .map(case_of)
            .collect()
    }

    /// Paths the driver closed itself, with the close code it sent
    pub fn driver_closes(&self) -> Vec<(String, u16)> {
        self.journal
            .lock()
            .unwrap()
            .closes
            .iter()
            .map(|(uri, request)| (uri.path().to_string(), request.code))
            .collect()
    }

    /// Cases the driver had to close itself
    pub fn forced_case_closes(&self) -> Vec<u32> {
        self.journal
            .lock()
            .unwrap()
            .closes
            .iter()
            .filter(|(uri, _)| uri.path() == "/runCase")
            .map(|(uri, _)| case_of(uri))
            .collect()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn case_of(uri: &Url) -> u32 {
    uri.query_pairs()
        .find(|(key, _)| key == "case")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, uri: &Url, collector: EventCollector) -> ConformanceResult<Box<dyn Connection>> {
        if self.shutdowns.load(Ordering::SeqCst) > 0 {
            return Err(ConformanceError::connect_failed(uri, "client container shut down"));
        }
        self.journal.lock().unwrap().connected.push(uri.clone());

        match uri.path() {
            "/getCaseCount" => {
                if let Some(reply) = &self.count_reply {
                    collector.record_message(Payload::Text(reply.clone()));
                }
            }
            "/runCase" => {
                let case = case_of(uri);
                if self.refused_cases.contains(&case) {
                    return Err(ConformanceError::connect_failed(uri, "handshake rejected"));
                }
                if !self.hung_cases.contains(&case) {
                    collector.record_closed(CloseInfo::new(Some(1000), ""));
                }
            }
            "/updateReports" => match self.finalizer {
                FinalizerBehaviour::Closes => {
                    collector.record_closed(CloseInfo::new(Some(1000), ""));
                }
                FinalizerBehaviour::Hangs => {}
                FinalizerBehaviour::Refuses => {
                    return Err(ConformanceError::connect_failed(uri, "connection refused"));
                }
            },
            other => {
                return Err(ConformanceError::connect_failed(uri, format!("unexpected path {other}")));
            }
        }

        Ok(Box::new(ScriptedConnection {
            uri: uri.clone(),
            collector,
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session handle that acknowledges every driver-initiated close
struct ScriptedConnection {
    uri: Url,
    collector: EventCollector,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn close(&self, request: CloseRequest) -> ConformanceResult<()> {
        if self.collector.is_closed() {
            return Ok(());
        }
        self.journal.lock().unwrap().closes.push((self.uri.clone(), request.clone()));
        self.collector.record_closed(CloseInfo::new(Some(request.code), request.reason));
        Ok(())
    }
}

/// Builder for orchestrators backed by a [`ScriptedConnector`]
pub struct OrchestratorBuilder {
    config: DriverConfig,
    connector: ScriptedConnector,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: TestFixtures::config(),
            connector: ScriptedConnector::new(),
        }
    }

    /// Configure the scripted server
    pub fn with_connector<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(ScriptedConnector) -> ScriptedConnector,
    {
        self.connector = setup(self.connector);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config = self.config.with_timeouts(timeouts);
        self
    }

    pub fn build(self) -> TestOrchestrator {
        Orchestrator::new(self.config, self.connector)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for the scripted test orchestrator
pub type TestOrchestrator = Orchestrator<ScriptedConnector>;

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Orchestrator whose server reports `count` cases and closes each of them
    pub fn counting_orchestrator(count: u32) -> TestOrchestrator {
        let reply = count.to_string();
        OrchestratorBuilder::new()
            .with_connector(|connector| connector.with_count_reply(&reply))
            .build()
    }

    /// Orchestrator over a mockall connector configured by `setup`
    pub fn mock_orchestrator<F>(setup: F) -> Orchestrator<MockConnector>
    where
        F: FnOnce(&mut MockConnector),
    {
        let mut connector = MockConnector::new();
        setup(&mut connector);
        Orchestrator::new(TestFixtures::config(), connector)
    }

    /// Outcome recorded for each case, in execution order
    pub fn outcomes(report: &RunReport) -> Vec<(u32, CaseOutcome)> {
        report
            .results
            .iter()
            .map(|result| (result.case.get(), result.outcome))
            .collect()
    }
}

struct StubState {
    case_count: u32,
    hung_cases: HashSet<u32>,
    events: Mutex<Vec<String>>,
}

impl StubState {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-process fuzzing server speaking the three request paths
///
/// `/runCase` sends one text message, expects it echoed back, then closes
/// with 1000. Hung cases never send or close anything.
pub struct StubFuzzingServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubFuzzingServer {
    pub async fn start(case_count: u32, hung_cases: &[u32]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
        let addr = listener.local_addr().expect("stub server address");
        let state = Arc::new(StubState {
            case_count,
            hung_cases: hung_cases.iter().copied().collect(),
            events: Mutex::new(Vec::new()),
        });

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_session(stream, Arc::clone(&accept_state)));
            }
        });

        Self { addr, state, handle }
    }

    pub fn endpoint(&self) -> TargetEndpoint {
        TargetEndpoint::new("127.0.0.1", self.addr.port()).expect("stub endpoint")
    }

    /// Everything the server observed, roughly in order
    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }

    /// Request targets of every accepted session, in order
    pub fn requests(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.strip_prefix("connect ").map(str::to_string))
            .collect()
    }
}

impl Drop for StubFuzzingServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_session(stream: TcpStream, state: Arc<StubState>) {
    let mut target = String::new();
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        target = request.uri().to_string();
        Ok(response)
    };
    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    state.record(format!("connect {target}"));

    let uri = match Url::parse(&format!("ws://stub{target}")) {
        Ok(uri) => uri,
        Err(_) => return,
    };

    match uri.path() {
        "/getCaseCount" => {
            let _ = ws.send(Message::Text(state.case_count.to_string())).await;
        }
        "/runCase" => {
            let case = case_of(&uri);
            if !state.hung_cases.contains(&case) {
                let payload = format!("payload for case {case}");
                let _ = ws.send(Message::Text(payload.clone())).await;
                match ws.next().await {
                    Some(Ok(Message::Text(echo))) if echo == payload => state.record(format!("echoed {case}")),
                    other => state.record(format!("no echo for {case}: {other:?}")),
                }
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                let _ = ws.close(Some(frame)).await;
            }
        }
        "/updateReports" => {
            state.record("reports updated".to_string());
            let _ = ws.close(None).await;
        }
        _ => {
            let _ = ws.close(None).await;
        }
    }

    drain(&mut ws, &state).await;
}

/// Read until the session ends, noting any close the client sends
async fn drain(ws: &mut WebSocketStream<TcpStream>, state: &StubState) {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Close(Some(frame))) => state.record(format!("client closed {}", u16::from(frame.code))),
            Ok(_) => {}
            Err(_) => break,
        }
    }
}
