//! Simulator Command Protocol
//!
//! Text command construction and the request/response exchange over a
//! [`Transport`]. Every interaction with the simulator is one exchange: a
//! single command line is sent, then response frames are collected until the
//! endpoint signals end-of-response. A negative-length message from the
//! endpoint aborts the exchange and surfaces as an error carrying the
//! endpoint's own text.

use crate::core::transport::{ConnectionState, Transport, TransportError, TransportStats};
use crate::utils::error::{Result, SimSrvError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Build the command that resolves a variable name to its memory address.
pub fn resolve_command(name: &str) -> String {
    format!("GetVarAddrText 1 VAR://{name}")
}

/// Build the command that reads the memory behind a resolved variable.
pub fn read_command(revision: &str, address: &str) -> String {
    format!("AsyncReadMemText {revision} 1 {address},2")
}

/// Build the command that writes raw bytes to a resolved variable.
///
/// `hex_payload` must already be uppercase hex without separators, see
/// [`encode_write_payload`].
pub fn write_command(revision: &str, address: &str, hex_payload: &str) -> String {
    format!("AsyncWriteMemText {revision} 1 {address},2,{hex_payload}")
}

/// Encode raw value bytes as the hex text a write command carries.
pub fn encode_write_payload(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Strip the trailing NUL padding and whitespace an endpoint error
/// message arrives with.
fn clean_endpoint_error(text: &str) -> String {
    text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Everything one exchange produced.
///
/// An endpoint error halts frame accumulation, but the frames that arrived
/// before it are kept here next to the error text.
#[derive(Debug, Clone, Default)]
pub struct ExchangeResponse {
    /// Response frames in arrival order
    pub frames: Vec<Vec<u8>>,
    /// Error text from the endpoint, if it reported one
    pub error: Option<String>,
}

impl ExchangeResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Frames of a successful exchange, or the endpoint's error.
    pub fn into_frames(self) -> Result<Vec<Vec<u8>>> {
        match self.error {
            Some(message) => Err(SimSrvError::TransportError(message)),
            None => Ok(self.frames),
        }
    }
}

/// One command/response channel to a simulator endpoint.
///
/// The channel owns its transport; callers that need concurrent access wrap
/// the channel in a mutex so each exchange runs to completion before the
/// next begins. Interleaving frames of two exchanges would corrupt both.
#[derive(Debug)]
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    buffer_size: usize,
    response_timeout: Duration,
}

impl CommandChannel {
    /// Create a channel over the given transport.
    pub fn new(transport: Box<dyn Transport>, buffer_size: usize, response_timeout: Duration) -> Self {
        Self {
            transport,
            buffer_size,
            response_timeout,
        }
    }

    /// Connect the underlying transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await?;
        Ok(())
    }

    /// Disconnect the underlying transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await?;
        Ok(())
    }

    /// Whether the underlying transport currently holds a connection.
    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Connection state reported by the transport.
    pub async fn connection_state(&self) -> ConnectionState {
        self.transport.connection_state().await
    }

    /// Transport-level statistics.
    pub async fn stats(&self) -> TransportStats {
        self.transport.stats().await
    }

    /// Transport diagnostics map.
    pub async fn diagnostics(&self) -> HashMap<String, String> {
        self.transport.diagnostics().await
    }

    /// Send one command and collect the response.
    ///
    /// Frames accumulate in arrival order until the endpoint's
    /// end-of-response marker, or until the endpoint reports an error;
    /// either way the frames gathered so far come back in the response.
    /// `Err` here means the transport itself failed mid-exchange.
    pub async fn exchange(&mut self, command: &str) -> Result<ExchangeResponse> {
        debug!(command = %command, "Sending simulator command");
        self.transport.send(command.as_bytes()).await?;

        let mut response = ExchangeResponse::default();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            match self
                .transport
                .receive(&mut buffer, Some(self.response_timeout))
                .await
            {
                Ok(0) => break,
                Ok(n) => response.frames.push(buffer[..n].to_vec()),
                Err(TransportError::ReceiveFailed(text)) => {
                    let message = clean_endpoint_error(&text);
                    debug!(command = %command, error = %message, "Simulator reported an error");
                    response.error = Some(message);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            command = %command,
            frame_count = response.frames.len(),
            error = response.error.is_some(),
            "Simulator response complete"
        );
        Ok(response)
    }
}
