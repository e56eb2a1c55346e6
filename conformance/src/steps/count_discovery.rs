//! Count Discoverer
//!
//! Asks the fuzzing server how many cases it has registered.

use shared::{run_debug, run_info, run_warn, RunId};

use crate::config::DriverConfig;
use crate::core::{parse_case_count, EventCollector, Payload};
use crate::error::{ConformanceError, ConformanceResult};
use crate::traits::{CloseRequest, Connector};

pub struct CountDiscoverer<'a, C: Connector + ?Sized> {
    connector: &'a C,
    config: &'a DriverConfig,
    run_id: RunId,
}

impl<'a, C: Connector + ?Sized> CountDiscoverer<'a, C> {
    pub fn new(connector: &'a C, config: &'a DriverConfig, run_id: RunId) -> Self {
        Self {
            connector,
            config,
            run_id,
        }
    }

    /// Read the case count from `/getCaseCount`
    ///
    /// A close that is not confirmed in time is only logged; the count is
    /// still returned.
    pub async fn discover(&self) -> ConformanceResult<u32> {
        let timeouts = &self.config.timeouts;
        let uri = self.config.endpoint.case_count_uri()?;
        let collector = EventCollector::new();

        run_debug!(self.run_id, "🔢 Requesting case count from {}", uri);
        let connection = self.connector.connect(&uri, collector.clone()).await?;

        let message = collector.await_message(timeouts.count_message).await;

        if let Err(e) = connection.close(CloseRequest::going_away()).await {
            run_warn!(self.run_id, "⚠️ Closing {} failed: {}", uri, e);
        }
        if collector.await_closed(timeouts.count_close).await.is_err() {
            let unconfirmed = ConformanceError::CloseNotConfirmed {
                uri: uri.to_string(),
                timeout: timeouts.count_close,
            };
            run_warn!(self.run_id, "⚠️ {}", unconfirmed);
        }

        let payload = message.map_err(|_| ConformanceError::CountUnavailable {
            timeout: timeouts.count_message,
        })?;
        let text = match payload {
            Payload::Text(text) => text,
            Payload::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
        };

        let count = parse_case_count(&text)?;
        run_info!(self.run_id, "📋 Fuzzing server reports {} cases", count);
        Ok(count)
    }
}
