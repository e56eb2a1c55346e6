//! Shared logging utilities for consistent run-scoped tracing

use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{Event, Subscriber, error, info};
use tracing_subscriber::layer::Context;

/// Tracing endpoint configuration
#[derive(Debug, Clone)]
pub struct TracingEndpoint {
    pub url: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl TracingEndpoint {
    pub fn new(url: String) -> Self {
        Self {
            url,
            batch_size: 5,
            flush_interval: Duration::from_millis(500),
        }
    }
}

/// Structured trace event for HTTP endpoint
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    pub run: String,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Work items for the layer's shipping task
enum LayerCommand {
    Ship(TraceEvent),
    /// Send whatever is buffered, then acknowledge
    Flush(oneshot::Sender<()>),
}

/// HTTP tracing layer that ships run-scoped events to a remote endpoint
pub struct HttpTracingLayer {
    sender: mpsc::UnboundedSender<LayerCommand>,
}

/// Handle for draining an [`HttpTracingLayer`] on demand
#[derive(Debug, Clone)]
pub struct TraceFlusher {
    sender: mpsc::UnboundedSender<LayerCommand>,
}

impl TraceFlusher {
    /// Ship every event emitted before this call. Returns `false` if the
    /// layer did not confirm within [`FLUSH_ACK_TIMEOUT`].
    pub async fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.sender.send(LayerCommand::Flush(ack_tx)).is_err() {
            return false;
        }
        matches!(tokio::time::timeout(FLUSH_ACK_TIMEOUT, ack_rx).await, Ok(Ok(())))
    }
}

/// Upper bound on waiting for the layer to confirm a flush
pub const FLUSH_ACK_TIMEOUT: Duration = Duration::from_secs(5);

impl HttpTracingLayer {
    /// Must be called from within a tokio runtime
    pub fn new(endpoint: TracingEndpoint) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LayerCommand>();

        let endpoint_url = endpoint.url.clone();
        let batch_size = endpoint.batch_size;
        let flush_interval = endpoint.flush_interval;

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let mut events_buffer = Vec::with_capacity(batch_size);
            let mut flush_timer = tokio::time::interval(flush_interval);

            loop {
                tokio::select! {
                    command = rx.recv() => {
                        match command {
                            Some(LayerCommand::Ship(event)) => {
                                events_buffer.push(event);
                                if events_buffer.len() >= batch_size {
                                    Self::send_batch(&client, &endpoint_url, &mut events_buffer).await;
                                }
                            }
                            Some(LayerCommand::Flush(ack)) => {
                                if !events_buffer.is_empty() {
                                    Self::send_batch(&client, &endpoint_url, &mut events_buffer).await;
                                }
                                let _ = ack.send(());
                            }
                            None => {
                                if !events_buffer.is_empty() {
                                    Self::send_batch(&client, &endpoint_url, &mut events_buffer).await;
                                }
                                break;
                            }
                        }
                    }

                    _ = flush_timer.tick() => {
                        if !events_buffer.is_empty() {
                            Self::send_batch(&client, &endpoint_url, &mut events_buffer).await;
                        }
                    }
                }
            }
        });

        HttpTracingLayer { sender: tx }
    }

    pub fn flusher(&self) -> TraceFlusher {
        TraceFlusher {
            sender: self.sender.clone(),
        }
    }

    async fn send_batch(client: &reqwest::Client, endpoint_url: &str, events_buffer: &mut Vec<TraceEvent>) {
        let batch = std::mem::take(events_buffer);

        // Never log from here: the event would loop back into this layer
        match client.post(endpoint_url).json(&batch).send().await {
            Ok(response) if !response.status().is_success() => {
                eprintln!("Failed to send trace batch: HTTP {}", response.status());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed to send trace batch: {e}");
            }
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for HttpTracingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut fields = HashMap::new();
        let mut message = String::new();

        let mut visitor = TraceVisitor {
            message: &mut message,
            fields: &mut fields,
        };
        event.record(&mut visitor);

        // Only events emitted through the run_* macros are shipped
        let run = match fields.remove("run") {
            Some(serde_json::Value::String(run)) => run,
            _ => return,
        };

        let trace_event = TraceEvent {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            run,
            fields,
        };

        let _ = self.sender.send(LayerCommand::Ship(trace_event));
    }
}

/// Visitor to extract event fields and message
struct TraceVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut HashMap<String, serde_json::Value>,
}

impl<'a> tracing::field::Visit for TraceVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message.push_str(&format!("{value:?}"));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{value:?}")),
            );
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

fn level_filter(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("conformance={base_level},shared={base_level},tokio_tungstenite=warn,tungstenite=warn,reqwest=warn")
}

/// Initialize tracing subscriber with optional endpoint and log level
///
/// Returns the flush handle of the HTTP layer when an endpoint is given.
pub fn init_tracing_with_endpoint_and_level(
    endpoint: Option<TracingEndpoint>,
    log_level: Option<&str>,
) -> Option<TraceFlusher> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter = EnvFilter::new(level_filter(log_level));

    match endpoint {
        Some(endpoint) => {
            let http_layer = HttpTracingLayer::new(endpoint);
            let flusher = http_layer.flusher();

            let fmt_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .compact();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(http_layer)
                .with(fmt_layer)
                .init();

            Some(flusher)
        }
        None => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .init();

            None
        }
    }
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Per-run diagnostics handle: created when a run starts, flushed when it ends
#[derive(Debug, Clone)]
pub struct Diagnostics {
    run_id: RunId,
    started: Instant,
    flusher: Option<TraceFlusher>,
}

impl Diagnostics {
    pub fn start() -> Self {
        Self {
            run_id: RunId::new(),
            started: Instant::now(),
            flusher: None,
        }
    }

    /// Drain the HTTP layer through `flusher` when the run finishes
    pub fn with_remote_flush(mut self, flusher: TraceFlusher) -> Self {
        self.flusher = Some(flusher);
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub async fn finish(&self, outcome: &str) {
        info!(
            run = %self.run_id,
            timestamp = format_timestamp(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "🏁 Run finished: {}",
            outcome
        );
        if let Some(flusher) = &self.flusher {
            if !flusher.flush().await {
                eprintln!("Trace flush was not confirmed within {FLUSH_ACK_TIMEOUT:?}");
            }
        }
    }
}

/// Macro for run-scoped info logging
#[macro_export]
macro_rules! run_info {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::info!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped warning logging
#[macro_export]
macro_rules! run_warn {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped error logging
#[macro_export]
macro_rules! run_error {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::error!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for run-scoped debug logging
#[macro_export]
macro_rules! run_debug {
    ($run_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            run = %$run_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(run_id: &RunId, details: &str) {
    info!(
        run = %run_id,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(run_id: &RunId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        run = %run_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(run_id: &RunId, message: &str) {
    info!(
        run = %run_id,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
