//! Report Finalizer
//!
//! The server closes the `/updateReports` connection once its reports are
//! written; that close is the only completion signal.

use shared::{run_debug, run_warn, RunId};

use crate::config::DriverConfig;
use crate::core::{CloseInfo, EventCollector};
use crate::error::{ConformanceError, ConformanceResult};
use crate::traits::{CloseRequest, Connector};

pub struct ReportFinalizer<'a, C: Connector + ?Sized> {
    connector: &'a C,
    config: &'a DriverConfig,
    run_id: RunId,
}

impl<'a, C: Connector + ?Sized> ReportFinalizer<'a, C> {
    pub fn new(connector: &'a C, config: &'a DriverConfig, run_id: RunId) -> Self {
        Self {
            connector,
            config,
            run_id,
        }
    }

    pub async fn finalize(&self) -> ConformanceResult<CloseInfo> {
        let uri = self.config.endpoint.update_reports_uri(&self.config.agent)?;
        let collector = EventCollector::new();

        run_debug!(self.run_id, "📝 Requesting report update via {}", uri);
        let connection = self.connector.connect(&uri, collector.clone()).await?;

        let limit = self.config.timeouts.report_close;
        match collector.await_closed(limit).await {
            Ok(info) => Ok(info),
            Err(_) => {
                // Release the session; the report outcome is already decided
                if let Err(e) = connection.close(CloseRequest::going_away()).await {
                    run_warn!(self.run_id, "⚠️ Forced close of report update failed: {}", e);
                }
                Err(ConformanceError::ReportTimeout { timeout: limit })
            }
        }
    }
}
