//! Case Runner
//!
//! Runs one case: connect, wait for the server to end it, force closure if it
//! never does. Failures end up in the returned outcome, never as errors.

use shared::{run_debug, run_warn, CaseIndex, RunId};

use crate::config::DriverConfig;
use crate::core::{CaseOutcome, EventCollector, RunResult};
use crate::traits::{CloseRequest, Connector};

pub struct CaseRunner<'a, C: Connector + ?Sized> {
    connector: &'a C,
    config: &'a DriverConfig,
    run_id: RunId,
}

impl<'a, C: Connector + ?Sized> CaseRunner<'a, C> {
    pub fn new(connector: &'a C, config: &'a DriverConfig, run_id: RunId) -> Self {
        Self {
            connector,
            config,
            run_id,
        }
    }

    pub async fn run(&self, case: CaseIndex) -> RunResult {
        RunResult::new(case, self.execute(case).await)
    }

    async fn execute(&self, case: CaseIndex) -> CaseOutcome {
        let uri = match self.config.endpoint.run_case_uri(case, &self.config.agent) {
            Ok(uri) => uri,
            Err(e) => {
                run_warn!(self.run_id, "❌ Case {}: cannot build URI: {}", case, e);
                return CaseOutcome::ConnectFailed;
            }
        };
        run_debug!(self.run_id, "test uri: {}", uri);

        let collector = EventCollector::echoing();
        let connection = match self.connector.connect(&uri, collector.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                run_warn!(self.run_id, "❌ Case {}: {}", case, e);
                return CaseOutcome::ConnectFailed;
            }
        };

        let limit = self.config.timeouts.case_close;
        match collector.await_closed(limit).await {
            Ok(info) => {
                run_debug!(
                    self.run_id,
                    "Case {} closed (code {:?}, {} messages echoed)",
                    case,
                    info.code,
                    collector.received_count()
                );
                CaseOutcome::CompletedNormally
            }
            Err(_) => {
                run_warn!(self.run_id, "⏰ Case {} did not close within {:?}, closing session", case, limit);
                if let Err(e) = connection.close(CloseRequest::going_away()).await {
                    run_warn!(self.run_id, "⚠️ Forced close of case {} failed: {}", case, e);
                }
                CaseOutcome::TimedOut
            }
        }
    }
}
