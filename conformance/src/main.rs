//! Main entry point for the conformance binary
//!
//! Wires the real connector into the orchestrator and runs the suite against
//! a fuzzing server.

use anyhow::Context;
use clap::Parser;
use std::time::Duration;

use conformance::{
    default_agent, services::RealConnector, CaseSelection, ConformanceError, DriverConfig, Orchestrator, Timeouts,
};
use shared::logging::{self, Diagnostics, TracingEndpoint};
use shared::{AgentIdentity, CaseIndex, TargetEndpoint};

/// Runs the Autobahn fuzzing server's WebSocket conformance cases
#[derive(Parser)]
#[command(name = "conformance")]
#[command(about = "Drives an Autobahn fuzzing server through its WebSocket conformance cases")]
pub struct Args {
    /// Fuzzing server host
    #[arg(default_value = TargetEndpoint::DEFAULT_HOST)]
    pub host: String,

    /// Fuzzing server port
    #[arg(default_value_t = TargetEndpoint::DEFAULT_PORT)]
    pub port: u16,

    /// Case numbers to run, in order (runs every case when empty)
    pub cases: Vec<CaseIndex>,

    /// User agent announced to the server, `name/version`
    #[arg(long)]
    pub agent: Option<AgentIdentity>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Tracing endpoint URL
    #[arg(long)]
    pub trace_ep: Option<String>,

    /// Seconds to wait for the server to end a single case
    #[arg(long, default_value_t = 300)]
    pub case_timeout_secs: u64,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let trace_endpoint = args.trace_ep.as_ref().map(|url| TracingEndpoint::new(url.clone()));
    let flusher = logging::init_tracing_with_endpoint_and_level(trace_endpoint, Some(&args.log_level));

    let endpoint = TargetEndpoint::new(&args.host, args.port).context("Invalid fuzzing server address")?;
    if args.case_timeout_secs == 0 {
        return Err(ConformanceError::config("case-timeout-secs must be at least 1").into());
    }

    let timeouts = Timeouts::default().with_case_close(Duration::from_secs(args.case_timeout_secs));
    let agent = args.agent.unwrap_or_else(default_agent);
    let config = DriverConfig::new(endpoint, agent).with_timeouts(timeouts);

    let mut diagnostics = Diagnostics::start();
    if let Some(flusher) = flusher {
        diagnostics = diagnostics.with_remote_flush(flusher);
    }

    let connector = RealConnector::new(timeouts.connect);
    let mut orchestrator = Orchestrator::new(config, connector).with_diagnostics(diagnostics);

    let report = orchestrator
        .run(CaseSelection::from_cases(args.cases))
        .await
        .context("Conformance run aborted")?;

    if args.json {
        println!("{}", report.to_json()?);
    }

    Ok(())
}
