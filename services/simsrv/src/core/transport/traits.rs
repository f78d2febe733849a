//! Transport Layer Traits
//!
//! Defines the byte-stream abstraction the variable access layer depends on.
//! The simulator endpoint behaves like the vendor socket binding: `send`
//! pushes a command's bytes, and repeated `receive` calls drain the response
//! where a zero-length result means end-of-response and an error result
//! carries the endpoint-reported failure text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::utils::error::SimSrvError;

/// Transport layer error types
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection lost mid-exchange
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Send operation failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The endpoint reported an error in place of response data; carries the
    /// endpoint's message text
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Operation attempted while disconnected
    #[error("Not connected")]
    NotConnected,

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<TransportError> for SimSrvError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed(msg) => SimSrvError::ConnectionError(msg),
            TransportError::Timeout(msg) => SimSrvError::TimeoutError(msg),
            TransportError::NotConnected => SimSrvError::NotConnected,
            other => SimSrvError::TransportError(other.to_string()),
        }
    }
}

/// Connection state for transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport is disconnected
    Disconnected,
    /// Transport is attempting to connect
    Connecting,
    /// Transport is connected and ready
    Connected,
    /// Transport has encountered an error
    Error,
}

/// Transport statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Response frames received
    pub frames_received: u64,
    /// Transport-level errors observed
    pub errors: u64,
    /// Connection attempts
    pub connection_attempts: u64,
    /// Most recent successful connection time
    pub connected_at: Option<DateTime<Utc>>,
    /// Most recent send or receive activity
    pub last_activity: Option<DateTime<Utc>>,
    /// Current connection state
    pub connection_state: ConnectionState,
}

impl TransportStats {
    /// Create new transport statistics
    pub fn new() -> Self {
        Self {
            bytes_sent: 0,
            bytes_received: 0,
            frames_received: 0,
            errors: 0,
            connection_attempts: 0,
            connected_at: None,
            last_activity: None,
            connection_state: ConnectionState::Disconnected,
        }
    }

    /// Record a connection attempt
    pub fn record_connection_attempt(&mut self) {
        self.connection_attempts += 1;
        self.connection_state = ConnectionState::Connecting;
    }

    /// Record a successful connection
    pub fn record_successful_connection(&mut self) {
        self.connected_at = Some(Utc::now());
        self.connection_state = ConnectionState::Connected;
    }

    /// Record a failed connection
    pub fn record_failed_connection(&mut self) {
        self.errors += 1;
        self.connection_state = ConnectionState::Error;
    }

    /// Record a disconnection
    pub fn record_disconnection(&mut self) {
        self.connection_state = ConnectionState::Disconnected;
    }

    /// Record bytes sent
    pub fn record_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.last_activity = Some(Utc::now());
    }

    /// Record one received frame of the given length
    pub fn record_frame_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.frames_received += 1;
        self.last_activity = Some(Utc::now());
    }

    /// Record a transport-level error
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        let state = self.connection_state;
        *self = Self::new();
        self.connection_state = state;
    }
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Core transport trait for the simulator byte stream
///
/// Implementations carry one connected stream each. The receive contract
/// mirrors the vendor binding: `Ok(0)` means the current response is
/// complete, `Ok(n)` means `n` bytes of one response frame were written into
/// the buffer, and `Err(ReceiveFailed)` means the endpoint answered with an
/// error whose text rides in the variant.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Connect to the remote endpoint
    async fn connect(&mut self) -> std::result::Result<(), TransportError>;

    /// Disconnect from the remote endpoint; idempotent
    async fn disconnect(&mut self) -> std::result::Result<(), TransportError>;

    /// Send data to the remote endpoint
    ///
    /// # Returns
    ///
    /// `Ok(bytes_sent)` if successful, `Err` otherwise
    async fn send(&mut self, data: &[u8]) -> std::result::Result<usize, TransportError>;

    /// Receive the next response frame
    ///
    /// # Arguments
    ///
    /// * `buffer` - Buffer to store received data
    /// * `timeout` - Optional deadline for the receive operation
    ///
    /// # Returns
    ///
    /// `Ok(0)` on end-of-response, `Ok(n)` for an `n`-byte frame, `Err`
    /// carrying the endpoint's error text otherwise
    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> std::result::Result<usize, TransportError>;

    /// Check if transport is currently connected
    async fn is_connected(&self) -> bool;

    /// Get current connection state
    async fn connection_state(&self) -> ConnectionState;

    /// Get transport statistics
    async fn stats(&self) -> TransportStats;

    /// Get transport-specific diagnostic information
    ///
    /// # Returns
    ///
    /// Key-value pairs of diagnostic information
    async fn diagnostics(&self) -> std::collections::HashMap<String, String> {
        let stats = self.stats().await;
        let mut diag = std::collections::HashMap::new();
        diag.insert("name".to_string(), self.name().to_string());
        diag.insert(
            "connection_state".to_string(),
            format!("{:?}", stats.connection_state),
        );
        diag.insert("bytes_sent".to_string(), stats.bytes_sent.to_string());
        diag.insert(
            "bytes_received".to_string(),
            stats.bytes_received.to_string(),
        );
        diag.insert(
            "frames_received".to_string(),
            stats.frames_received.to_string(),
        );
        diag.insert("errors".to_string(), stats.errors.to_string());
        diag
    }
}

/// Implementation of Transport trait for Box<dyn Transport>
/// This allows Box<dyn Transport> to be used where Transport trait is required
#[async_trait]
impl Transport for Box<dyn Transport> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn connect(&mut self) -> std::result::Result<(), TransportError> {
        self.as_mut().connect().await
    }

    async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        self.as_mut().disconnect().await
    }

    async fn send(&mut self, data: &[u8]) -> std::result::Result<usize, TransportError> {
        self.as_mut().send(data).await
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> std::result::Result<usize, TransportError> {
        self.as_mut().receive(buffer, timeout).await
    }

    async fn is_connected(&self) -> bool {
        self.as_ref().is_connected().await
    }

    async fn connection_state(&self) -> ConnectionState {
        self.as_ref().connection_state().await
    }

    async fn stats(&self) -> TransportStats {
        self.as_ref().stats().await
    }

    async fn diagnostics(&self) -> std::collections::HashMap<String, String> {
        self.as_ref().diagnostics().await
    }
}
