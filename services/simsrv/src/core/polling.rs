//! Variable Polling Engine
//!
//! Continuously refreshes every registered variable. One pass walks the
//! registry in declaration order, reading each variable in turn; a failed
//! read is logged and the pass moves on. Passes are separated by a fixed
//! delay. Cancellation is honored between reads, never in the middle of
//! an exchange, so the command channel is left in a clean state.

use crate::core::client::{LoadReport, SimulatorClient};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for the polling loop.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PollingStats {
    /// Completed passes over the registry
    pub passes: u64,
    /// Successful reads across all passes
    pub reads_ok: u64,
    /// Failed reads across all passes
    pub reads_failed: u64,
    /// When the last complete pass finished
    pub last_pass_at: Option<DateTime<Utc>>,
}

impl PollingStats {
    fn record_pass(&mut self, ok: u64, failed: u64) {
        self.passes += 1;
        self.reads_ok += ok;
        self.reads_failed += failed;
        self.last_pass_at = Some(Utc::now());
    }

    /// Reads from a pass that was cancelled before completing.
    fn record_partial(&mut self, ok: u64, failed: u64) {
        self.reads_ok += ok;
        self.reads_failed += failed;
    }
}

/// Background poller over a [`SimulatorClient`].
pub struct VariablePoller {
    client: Arc<SimulatorClient>,
    interval: Duration,
    stats: Arc<RwLock<PollingStats>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl VariablePoller {
    /// Create a poller with the given inter-pass delay.
    pub fn new(client: Arc<SimulatorClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            stats: Arc::new(RwLock::new(PollingStats::default())),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Start the polling task. Starting a running poller is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.cancel = CancellationToken::new();
        let client = self.client.clone();
        let interval = self.interval;
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();

        self.task = Some(tokio::spawn(async move {
            Self::polling_loop(client, interval, stats, cancel).await;
        }));
        info!(interval_ms = self.interval.as_millis() as u64, "Variable polling started");
    }

    /// Stop the polling task and wait for the pass in flight to yield.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.take() {
            if let Err(e) = handle.await {
                warn!("Polling task ended abnormally: {e}");
            }
            info!("Variable polling stopped");
        }
    }

    /// Whether the polling task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Snapshot of the polling counters.
    pub async fn stats(&self) -> PollingStats {
        self.stats.read().await.clone()
    }

    async fn polling_loop(
        client: Arc<SimulatorClient>,
        interval: Duration,
        stats: Arc<RwLock<PollingStats>>,
        cancel: CancellationToken,
    ) {
        'outer: loop {
            let names = client.variable_names().await;
            if names.is_empty() {
                debug!("No variables registered for polling");
            }

            let mut ok = 0u64;
            let mut failed = 0u64;

            for name in names {
                if cancel.is_cancelled() {
                    stats.write().await.record_partial(ok, failed);
                    break 'outer;
                }

                match client.read(&name).await {
                    Ok(_) => ok += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(variable = %name, error = %e, "Poll read failed");
                    }
                }
            }

            stats.write().await.record_pass(ok, failed);

            tokio::select! {
                _ = cancel.cancelled() => break 'outer,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

/// Reload the working set from a declaration file, pausing the poller
/// around the load so no pass observes a half-built registry. A poller
/// that was running is restarted afterwards.
pub async fn reload_declarations(
    client: &Arc<SimulatorClient>,
    poller: &mut VariablePoller,
    path: impl AsRef<Path>,
) -> Result<LoadReport> {
    let was_running = poller.is_running();
    if was_running {
        poller.stop().await;
    }

    let report = client.load_declarations(path).await?;

    if was_running {
        poller.start();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::CommandChannel;
    use crate::core::resolver::Resolution;
    use crate::core::transport::MockTransport;
    use crate::core::variable::SimVariable;

    fn resolved_variable(name: &str) -> SimVariable {
        let mut var = SimVariable::with_type(name, "INT");
        var.apply_resolution(Resolution {
            revision: b"1".to_vec(),
            address: b"100,1,1,16".to_vec(),
            size: 2,
        });
        var
    }

    async fn client_over(mock: MockTransport) -> Arc<SimulatorClient> {
        let channel = CommandChannel::new(Box::new(mock), 512, Duration::from_secs(1));
        let client = Arc::new(SimulatorClient::new(channel));
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_poller_reads_registered_variables() {
        let mock = MockTransport::new();
        for _ in 0..3 {
            mock.add_exchange(&[&[0x01, 0x00]]).await;
        }

        let client = client_over(mock).await;
        client.register(resolved_variable("Motor.Speed")).await;

        let mut poller = VariablePoller::new(client.clone(), Duration::from_millis(10));
        assert!(!poller.is_running());

        poller.start();
        assert!(poller.is_running());

        tokio::time::sleep(Duration::from_millis(60)).await;
        poller.stop().await;
        assert!(!poller.is_running());

        let stats = poller.stats().await;
        assert!(stats.passes >= 1);
        assert!(stats.reads_ok >= 1);
        assert!(stats.last_pass_at.is_some());

        let snapshot = client.snapshot().await;
        assert!(snapshot[0].value.is_some());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_poller_continues_after_read_failure() {
        let mock = MockTransport::new();
        mock.add_response_error("memory fault").await;
        mock.add_exchange(&[&[0x02, 0x00]]).await;

        let client = client_over(mock).await;
        client.register(resolved_variable("Bad")).await;
        client.register(resolved_variable("Good")).await;

        let mut poller = VariablePoller::new(client.clone(), Duration::from_millis(10));
        poller.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        poller.stop().await;

        let stats = poller.stats().await;
        assert!(stats.reads_failed >= 1);
        assert!(stats.reads_ok >= 1);

        let snapshot = client.snapshot().await;
        assert!(snapshot[0].last_error.is_some());
        assert!(snapshot[1].value.is_some());
        assert!(logs_contain("Poll read failed"));
    }

    #[tokio::test]
    async fn test_poller_with_empty_registry_still_passes() {
        let mock = MockTransport::new();
        let client = client_over(mock).await;

        let mut poller = VariablePoller::new(client, Duration::from_millis(5));
        poller.start();
        tokio::time::sleep(Duration::from_millis(25)).await;
        poller.stop().await;

        let stats = poller.stats().await;
        assert!(stats.passes >= 1);
        assert_eq!(stats.reads_ok, 0);
        assert_eq!(stats.reads_failed, 0);
    }

    #[tokio::test]
    async fn test_double_start_is_harmless() {
        let mock = MockTransport::new();
        let client = client_over(mock).await;

        let mut poller = VariablePoller::new(client, Duration::from_millis(5));
        poller.start();
        poller.start();
        assert!(poller.is_running());
        poller.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let mock = MockTransport::new();
        let client = client_over(mock).await;

        let mut poller = VariablePoller::new(client, Duration::from_millis(5));
        poller.stop().await;
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_reload_pauses_and_restarts_poller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.tsv");
        tokio::fs::write(&path, "Name\tType\nFresh\tINT\n")
            .await
            .unwrap();

        let mock = MockTransport::new();
        mock.add_exchange(&[b"1", b"reserved", b"100,1,1,16"]).await;

        let client = client_over(mock).await;
        // Undeclared, so poll passes never touch the channel
        client.register(SimVariable::new("Stale")).await;

        let mut poller = VariablePoller::new(client.clone(), Duration::from_millis(10));
        poller.start();

        let report = reload_declarations(&client, &mut poller, &path)
            .await
            .unwrap();
        assert_eq!(report.loaded, 1);
        assert!(poller.is_running());
        assert_eq!(client.variable_names().await, vec!["Fresh"]);

        poller.stop().await;
    }
}
