//! Main orchestrator implementation
//!
//! Resolves the case list, runs every case in order and asks the server to
//! update its reports. The connector is shut down at the end of every run,
//! whether the run completed or aborted.

use shared::logging::{self, Diagnostics};
use shared::{run_error, run_info, run_warn, CaseIndex, RunId};

use crate::config::DriverConfig;
use crate::core::{ReportStatus, RunReport};
use crate::error::{ConformanceError, ConformanceResult};
use crate::steps::{CaseRunner, CountDiscoverer, ReportFinalizer};
use crate::traits::Connector;

/// Which cases a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseSelection {
    /// Every case the server reports, 1 through N
    All,
    /// Exactly these cases, in this order, duplicates included
    Explicit(Vec<CaseIndex>),
}

impl CaseSelection {
    /// An empty list means every case
    pub fn from_cases(cases: Vec<CaseIndex>) -> Self {
        if cases.is_empty() {
            CaseSelection::All
        } else {
            CaseSelection::Explicit(cases)
        }
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Discovering,
    Preset,
    Running(CaseIndex),
    Finalizing,
    Done,
    Aborted,
}

/// Drives the fuzzing server through a run
pub struct Orchestrator<C>
where
    C: Connector,
{
    config: DriverConfig,

    /// Shared client container, used only to open connections
    connector: C,

    diagnostics: Diagnostics,

    phase: RunPhase,
    history: Vec<RunPhase>,
}

impl<C> Orchestrator<C>
where
    C: Connector,
{
    pub fn new(config: DriverConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            diagnostics: Diagnostics::start(),
            phase: RunPhase::Init,
            history: vec![RunPhase::Init],
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    pub fn run_id(&self) -> RunId {
        self.diagnostics.run_id()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Execute a complete run
    ///
    /// The summary and all other run-scoped events are logged before the
    /// diagnostics handle flushes remote traces.
    ///
    /// # Errors
    /// Only failures that prevent resolving the case list abort the run.
    /// Case failures and report failures are recorded in the [`RunReport`].
    pub async fn run(&mut self, selection: CaseSelection) -> ConformanceResult<RunReport> {
        let run_id = self.run_id();
        logging::log_startup(&run_id, "conformance run");
        run_info!(run_id, "Using Fuzzing Server: {}", self.config.endpoint);
        run_info!(run_id, "User Agent: {}", self.config.agent);

        let outcome = self.drive(selection).await;

        self.connector.shutdown().await;

        match &outcome {
            Ok(report) => {
                run_info!(run_id, "📊 {}", report);
                logging::log_success(&run_id, "Test suite finished!");
                self.diagnostics.finish(&report.to_string()).await;
            }
            Err(e) => {
                logging::log_error(&run_id, "Conformance run", e);
                self.diagnostics.finish("aborted").await;
            }
        }

        outcome
    }

    async fn drive(&mut self, selection: CaseSelection) -> ConformanceResult<RunReport> {
        let run_id = self.run_id();

        let cases = match self.resolve(selection).await {
            Ok(cases) => cases,
            Err(e) => {
                self.enter(RunPhase::Aborted);
                return Err(e);
            }
        };

        let total = cases.len();
        let mut results = Vec::with_capacity(total);

        for (position, case) in cases.into_iter().enumerate() {
            self.enter(RunPhase::Running(case));
            run_info!(run_id, "Running case {} ({} of {}) ...", case, position + 1, total);

            let result = CaseRunner::new(&self.connector, &self.config, run_id).run(case).await;
            run_info!(run_id, "Case {}: {}", case, result.outcome);
            results.push(result);
        }
        run_info!(run_id, "All test cases executed.");

        self.enter(RunPhase::Finalizing);
        let report_status = match ReportFinalizer::new(&self.connector, &self.config, run_id).finalize().await {
            Ok(_) => {
                run_info!(run_id, "Reports updated.");
                ReportStatus::Updated
            }
            Err(e @ ConformanceError::ReportTimeout { .. }) => {
                run_warn!(run_id, "⚠️ {}", e);
                ReportStatus::TimedOut
            }
            Err(e) => {
                run_error!(run_id, "❌ Report update failed: {}", e);
                ReportStatus::ConnectFailed
            }
        };

        self.enter(RunPhase::Done);
        Ok(RunReport::new(results, report_status))
    }

    async fn resolve(&mut self, selection: CaseSelection) -> ConformanceResult<Vec<CaseIndex>> {
        let run_id = self.run_id();

        match selection {
            CaseSelection::All => {
                self.enter(RunPhase::Discovering);
                let count = CountDiscoverer::new(&self.connector, &self.config, run_id).discover().await?;
                run_info!(run_id, "Will run all {} cases ...", count);
                Ok(CaseIndex::range_to(count).collect())
            }
            CaseSelection::Explicit(cases) => {
                self.enter(RunPhase::Preset);
                run_info!(run_id, "Will run {} cases ...", cases.len());
                Ok(cases)
            }
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        self.phase = phase;
        self.history.push(phase);
    }
}
