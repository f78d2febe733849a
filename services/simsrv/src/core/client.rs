//! Simulator Client
//!
//! High-level variable access over one command channel. The client caches
//! address resolutions in its registry, resolving on first use, and keeps
//! per-variable read state for the monitor view. Exchanges serialize on the
//! channel; registry locks are never held across an exchange.

use crate::core::codec::{decode, encode, PlcType, PlcValue};
use crate::core::declarations::load_declaration_file;
use crate::core::protocol::{
    encode_write_payload, read_command, resolve_command, write_command, CommandChannel,
    ExchangeResponse,
};
use crate::core::resolver::{parse_resolution, trimmed_text, Resolution};
use crate::core::transport::{ConnectionState, TransportStats};
use crate::core::variable::{SimVariable, VariableRegistry, VariableSnapshot};
use crate::utils::error::{Result, SimSrvError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of a declaration load.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadReport {
    /// Variables declared and resolved
    pub loaded: usize,
    /// Variables that failed resolution, with the endpoint's error text
    pub failures: Vec<(String, String)>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.loaded + self.failures.len()
    }
}

/// Client for variable access against one simulator endpoint.
#[derive(Debug)]
pub struct SimulatorClient {
    channel: Mutex<CommandChannel>,
    registry: RwLock<VariableRegistry>,
}

impl SimulatorClient {
    /// Create a client over an established command channel.
    pub fn new(channel: CommandChannel) -> Self {
        Self {
            channel: Mutex::new(channel),
            registry: RwLock::new(VariableRegistry::new()),
        }
    }

    /// Connect to the simulator endpoint.
    pub async fn connect(&self) -> Result<()> {
        self.channel.lock().await.connect().await
    }

    /// Disconnect from the simulator endpoint.
    pub async fn disconnect(&self) -> Result<()> {
        self.channel.lock().await.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_connected().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.channel.lock().await.connection_state().await
    }

    /// Transport-level traffic counters.
    pub async fn transport_stats(&self) -> TransportStats {
        self.channel.lock().await.stats().await
    }

    /// Transport diagnostics plus registry counters.
    pub async fn diagnostics(&self) -> HashMap<String, String> {
        let mut diag = self.channel.lock().await.diagnostics().await;
        let registry = self.registry.read().await;
        diag.insert("variables".to_string(), registry.len().to_string());
        let resolved = registry
            .names()
            .iter()
            .filter(|name| registry.get(name).is_some_and(SimVariable::is_resolved))
            .count();
        diag.insert("variables_resolved".to_string(), resolved.to_string());
        diag
    }

    /// Register a variable without touching the endpoint.
    pub async fn register(&self, variable: SimVariable) {
        self.registry.write().await.upsert(variable);
    }

    /// Resolve a variable name to its address and remember the result.
    ///
    /// An unregistered name is registered on the fly, so ad-hoc resolves
    /// show up in the monitor too.
    pub async fn resolve(&self, name: &str) -> Result<Resolution> {
        let resolution = self.resolve_uncached(name).await?;

        let mut registry = self.registry.write().await;
        match registry.get_mut(name) {
            Some(var) => var.apply_resolution(resolution.clone()),
            None => {
                let mut var = SimVariable::new(name);
                var.apply_resolution(resolution.clone());
                registry.upsert(var);
            }
        }

        debug!(
            variable = %name,
            size = resolution.size,
            "Resolved variable address"
        );
        Ok(resolution)
    }

    /// Run the resolution exchange without registry bookkeeping.
    ///
    /// Transport faults during the exchange read as resolution failures:
    /// the name could not be resolved, whatever the underlying cause.
    async fn resolve_uncached(&self, name: &str) -> Result<Resolution> {
        let exchanged = {
            let mut channel = self.channel.lock().await;
            channel.exchange(&resolve_command(name)).await
        };
        let frames = exchanged
            .and_then(ExchangeResponse::into_frames)
            .map_err(|e| match e {
                SimSrvError::TransportError(msg) | SimSrvError::TimeoutError(msg) => {
                    SimSrvError::ResolutionError(msg)
                }
                other => other,
            })?;
        parse_resolution(name, &frames)
    }

    /// Cached resolution texts for a name, resolving on first use.
    async fn resolution_for(&self, name: &str) -> Result<(String, String, usize)> {
        {
            let registry = self.registry.read().await;
            if let Some(resolution) = registry.get(name).and_then(|var| var.resolution.as_ref()) {
                return Ok((
                    trimmed_text(&resolution.revision),
                    trimmed_text(&resolution.address),
                    resolution.size,
                ));
            }
        }

        let resolution = self.resolve(name).await?;
        Ok((
            trimmed_text(&resolution.revision),
            trimmed_text(&resolution.address),
            resolution.size,
        ))
    }

    /// Declared type of a registered variable.
    async fn declared_type(&self, name: &str) -> Result<PlcType> {
        let registry = self.registry.read().await;
        match registry.get(name) {
            Some(var) => var.plc_type(),
            None => Err(SimSrvError::UnsupportedType(format!(
                "Variable '{name}' is not declared"
            ))),
        }
    }

    /// Read a variable, decoding per its declared type.
    pub async fn read(&self, name: &str) -> Result<PlcValue> {
        let ty = self.declared_type(name).await?;
        self.read_as(name, ty).await
    }

    /// Read a variable, decoding per an explicit type.
    pub async fn read_as(&self, name: &str, ty: PlcType) -> Result<PlcValue> {
        let result = self.read_value(name, ty).await;

        let mut registry = self.registry.write().await;
        if let Some(var) = registry.get_mut(name) {
            match &result {
                Ok(value) => var.record_value(value.clone()),
                Err(e) => var.record_error(e.to_string()),
            }
        }
        result
    }

    async fn read_value(&self, name: &str, ty: PlcType) -> Result<PlcValue> {
        let (revision, address, _size) = self.resolution_for(name).await?;

        let response = {
            let mut channel = self.channel.lock().await;
            channel.exchange(&read_command(&revision, &address)).await?
        };
        let frames = response.into_frames()?;

        let Some(value_frame) = frames.first() else {
            return Err(SimSrvError::MalformedResponse(format!(
                "Read of '{name}' returned no value frame"
            )));
        };
        decode(ty, value_frame)
    }

    /// Write a textual value to a variable, encoding per its declared type.
    ///
    /// The locally cached value is left untouched; the next read reports
    /// what the simulator actually holds.
    pub async fn write(&self, name: &str, value_text: &str) -> Result<()> {
        let ty = self.declared_type(name).await?;
        self.write_as(name, ty, value_text).await
    }

    /// Write a textual value, encoding per an explicit type.
    pub async fn write_as(&self, name: &str, ty: PlcType, value_text: &str) -> Result<()> {
        let (revision, address, size) = self.resolution_for(name).await?;
        let payload = encode(ty, value_text, size)?;
        let command = write_command(&revision, &address, &encode_write_payload(&payload));

        let response = {
            let mut channel = self.channel.lock().await;
            channel.exchange(&command).await?
        };
        response.into_frames()?;

        info!(variable = %name, bytes = payload.len(), "Wrote variable");
        Ok(())
    }

    /// Replace the working set from a declaration file, resolving every
    /// declared variable against the endpoint.
    ///
    /// Variables that fail resolution stay registered with their error
    /// recorded; a later read retries the resolution.
    pub async fn load_declarations(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let declared = load_declaration_file(path).await?;
        self.registry.write().await.clear();

        let mut report = LoadReport::default();
        for mut var in declared {
            let name = var.name.clone();
            match self.resolve_uncached(&name).await {
                Ok(resolution) => {
                    var.apply_resolution(resolution);
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!(variable = %name, error = %e, "Failed to resolve declared variable");
                    var.record_error(e.to_string());
                    report.failures.push((name, e.to_string()));
                }
            }
            self.registry.write().await.upsert(var);
        }

        info!(
            loaded = report.loaded,
            failed = report.failed(),
            "Declaration load complete"
        );
        Ok(report)
    }

    /// Names of all registered variables in declaration order.
    pub async fn variable_names(&self) -> Vec<String> {
        self.registry.read().await.names()
    }

    /// Snapshot of every registered variable in declaration order.
    pub async fn snapshot(&self) -> Vec<VariableSnapshot> {
        self.registry.read().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::MockTransport;
    use std::time::Duration;

    const RESOLUTION: [&[u8]; 3] = [b"1", b"reserved", b"100,1,1,16"];

    async fn connected_client(mock: MockTransport) -> SimulatorClient {
        let channel = CommandChannel::new(Box::new(mock), 512, Duration::from_secs(1));
        let client = SimulatorClient::new(channel);
        client.connect().await.unwrap();
        client
    }

    // ===== Phase 1: Resolution =====

    #[tokio::test]
    async fn test_resolve_registers_ad_hoc_variable() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        let probe = mock.clone();

        let client = connected_client(mock).await;
        let resolution = client.resolve("Motor.Speed").await.unwrap();

        assert_eq!(resolution.size, 2);
        assert_eq!(
            probe.get_sent_data().await,
            vec![b"GetVarAddrText 1 VAR://Motor.Speed".to_vec()]
        );

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Motor.Speed");
        assert_eq!(snapshot[0].address, "100,1,1,16");
    }

    #[tokio::test]
    async fn test_endpoint_rejection_is_resolution_error() {
        let mock = MockTransport::new();
        mock.add_response_error("No such variable: VAR://Bogus").await;

        let client = connected_client(mock).await;
        let err = client.resolve("Bogus").await.unwrap_err();
        match err {
            SimSrvError::ResolutionError(msg) => {
                assert_eq!(msg, "No such variable: VAR://Bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // ===== Phase 2: Read path =====

    #[tokio::test]
    async fn test_read_resolves_then_decodes() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_exchange(&[&[0x2A, 0x00]]).await;
        let probe = mock.clone();

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        let value = client.read("Motor.Speed").await.unwrap();
        assert_eq!(value, PlcValue::Int(42));

        let sent = probe.get_sent_data().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"GetVarAddrText 1 VAR://Motor.Speed");
        assert_eq!(sent[1], b"AsyncReadMemText 1 1 100,1,1,16,2");

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot[0].value, Some(PlcValue::Int(42)));
        assert!(snapshot[0].updated_at.is_some());
        assert!(snapshot[0].last_error.is_none());
    }

    #[tokio::test]
    async fn test_read_reuses_cached_resolution() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_exchange(&[&[0x01, 0x00]]).await;
        mock.add_exchange(&[&[0x02, 0x00]]).await;
        let probe = mock.clone();

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        assert_eq!(
            client.read("Motor.Speed").await.unwrap(),
            PlcValue::Int(1)
        );
        assert_eq!(
            client.read("Motor.Speed").await.unwrap(),
            PlcValue::Int(2)
        );

        // One resolve, two reads
        assert_eq!(probe.get_sent_data().await.len(), 3);
    }

    #[tokio::test]
    async fn test_read_undeclared_variable_fails() {
        let mock = MockTransport::new();
        let client = connected_client(mock).await;

        let err = client.read("Unknown").await.unwrap_err();
        assert!(matches!(err, SimSrvError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn test_read_failure_records_last_error() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_response_error("memory fault").await;

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        assert!(client.read("Motor.Speed").await.is_err());

        let snapshot = client.snapshot().await;
        assert!(snapshot[0].value.is_none());
        assert!(snapshot[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("memory fault"));
    }

    #[tokio::test]
    async fn test_read_empty_response_is_malformed() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_response_end().await;

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        let err = client.read("Motor.Speed").await.unwrap_err();
        assert!(matches!(err, SimSrvError::MalformedResponse(_)));
    }

    // ===== Phase 3: Write path =====

    #[tokio::test]
    async fn test_write_sends_hex_payload() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_response_end().await;
        let probe = mock.clone();

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        client.write("Motor.Speed", "258").await.unwrap();

        let sent = probe.get_sent_data().await;
        assert_eq!(sent[1], b"AsyncWriteMemText 1 1 100,1,1,16,2,0201");
    }

    #[tokio::test]
    async fn test_write_does_not_update_cached_value() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_response_end().await;

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        client.write("Motor.Speed", "7").await.unwrap();

        let snapshot = client.snapshot().await;
        assert!(snapshot[0].value.is_none());
        assert!(snapshot[0].updated_at.is_none());
    }

    #[tokio::test]
    async fn test_write_unparseable_value_sends_nothing() {
        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        let probe = mock.clone();

        let client = connected_client(mock).await;
        client
            .register(SimVariable::with_type("Motor.Speed", "INT"))
            .await;

        let err = client.write("Motor.Speed", "fast").await.unwrap_err();
        assert!(matches!(err, SimSrvError::ParseFailure(_)));

        // Resolution went out, the write command did not
        assert_eq!(probe.get_sent_data().await.len(), 1);
    }

    // ===== Phase 4: Declaration loading =====

    #[tokio::test]
    async fn test_load_declarations_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.tsv");
        tokio::fs::write(&path, "Name\tType\nMotor.Speed\tINT\nBogus\tBOOL\n")
            .await
            .unwrap();

        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;
        mock.add_response_error("No such variable: VAR://Bogus").await;

        let client = connected_client(mock).await;
        let report = client.load_declarations(&path).await.unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total(), 2);
        assert_eq!(report.failures[0].0, "Bogus");

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "Motor.Speed");
        assert_eq!(snapshot[0].address, "100,1,1,16");
        assert_eq!(snapshot[1].name, "Bogus");
        assert!(snapshot[1].last_error.is_some());
    }

    #[tokio::test]
    async fn test_load_declarations_replaces_working_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.tsv");
        tokio::fs::write(&path, "Name\tType\nFresh\tINT\n")
            .await
            .unwrap();

        let mock = MockTransport::new();
        mock.add_exchange(&RESOLUTION).await;

        let client = connected_client(mock).await;
        client.register(SimVariable::with_type("Stale", "INT")).await;

        client.load_declarations(&path).await.unwrap();

        let names = client.variable_names().await;
        assert_eq!(names, vec!["Fresh"]);
    }
}
