//! Mock Transport for Testing
//!
//! Scriptable transport double for exercising protocol logic without a
//! simulator endpoint. Responses are scripted as a queue of events: data
//! frames, end-of-response markers, and endpoint error messages, which lets a
//! single mock serve several back-to-back exchanges (resolve followed by
//! read, a full poll pass) exactly the way the live endpoint would.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{ConnectionState, Transport, TransportError, TransportStats};

/// One scripted receive outcome
#[derive(Debug, Clone)]
enum MockEvent {
    /// A response frame delivered as one receive call
    Frame(Vec<u8>),
    /// Clean end-of-response (the zero-length receive)
    End,
    /// Endpoint-reported error with its message text
    Error(String),
}

/// Mock transport configuration
#[derive(Debug, Clone)]
pub struct MockTransportConfig {
    /// Transport name for identification
    pub name: String,
    /// Simulated connection delay
    pub connection_delay: Duration,
    /// Simulated per-receive delay
    pub receive_delay: Duration,
    /// Whether connections should fail
    pub should_fail_connection: bool,
    /// Whether send operations should fail
    pub should_fail_send: bool,
}

impl Default for MockTransportConfig {
    fn default() -> Self {
        Self {
            name: "Mock Transport".to_string(),
            connection_delay: Duration::from_millis(0),
            receive_delay: Duration::from_millis(0),
            should_fail_connection: false,
            should_fail_send: false,
        }
    }
}

/// Mock transport state
#[derive(Debug)]
struct MockTransportState {
    connected: bool,
    /// Scripted receive outcomes, consumed front to back
    receive_queue: VecDeque<MockEvent>,
    /// History of sent commands
    sent_data: Vec<Vec<u8>>,
    stats: TransportStats,
}

impl MockTransportState {
    fn new() -> Self {
        Self {
            connected: false,
            receive_queue: VecDeque::new(),
            sent_data: Vec::new(),
            stats: TransportStats::new(),
        }
    }
}

/// Mock transport implementation
///
/// Clones share the scripted queue and sent-data history, so a test can
/// keep a probe handle while the transport itself moves into a channel.
#[derive(Debug, Clone)]
pub struct MockTransport {
    config: MockTransportConfig,
    state: Arc<RwLock<MockTransportState>>,
}

impl MockTransport {
    /// Create new mock transport with default configuration
    pub fn new() -> Self {
        Self::with_config(MockTransportConfig::default())
    }

    /// Create new mock transport with configuration
    pub fn with_config(config: MockTransportConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MockTransportState::new())),
        }
    }

    /// Script one response frame (for testing)
    pub async fn add_response_frame(&self, data: Vec<u8>) {
        let mut state = self.state.write().await;
        state.receive_queue.push_back(MockEvent::Frame(data));
    }

    /// Script an end-of-response marker (for testing)
    pub async fn add_response_end(&self) {
        let mut state = self.state.write().await;
        state.receive_queue.push_back(MockEvent::End);
    }

    /// Script an endpoint error (for testing)
    pub async fn add_response_error(&self, message: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .receive_queue
            .push_back(MockEvent::Error(message.into()));
    }

    /// Script a complete exchange: the given frames followed by a clean end
    pub async fn add_exchange(&self, frames: &[&[u8]]) {
        let mut state = self.state.write().await;
        for frame in frames {
            state.receive_queue.push_back(MockEvent::Frame(frame.to_vec()));
        }
        state.receive_queue.push_back(MockEvent::End);
    }

    /// Get all sent commands (for testing)
    pub async fn get_sent_data(&self) -> Vec<Vec<u8>> {
        let state = self.state.read().await;
        state.sent_data.clone()
    }

    /// Clear the sent-command history (for testing)
    pub async fn clear_sent_data(&self) {
        let mut state = self.state.write().await;
        state.sent_data.clear();
    }

    /// Set send failure mode (for testing)
    pub fn set_send_failure(&mut self, should_fail: bool) {
        self.config.should_fail_send = should_fail;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        {
            let mut state = self.state.write().await;
            state.stats.record_connection_attempt();
        }

        tokio::time::sleep(self.config.connection_delay).await;

        let mut state = self.state.write().await;
        if self.config.should_fail_connection {
            state.stats.record_failed_connection();
            return Err(TransportError::ConnectionFailed(
                "Mock connection failure".to_string(),
            ));
        }

        state.connected = true;
        state.stats.record_successful_connection();
        debug!("Mock transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        if state.connected {
            state.connected = false;
            state.stats.record_disconnection();
            debug!("Mock transport disconnected");
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.write().await;

        if !state.connected {
            return Err(TransportError::NotConnected);
        }

        if self.config.should_fail_send {
            state.stats.record_error();
            return Err(TransportError::SendFailed("Mock send failure".to_string()));
        }

        let bytes_sent = data.len();
        state.sent_data.push(data.to_vec());
        state.stats.record_bytes_sent(bytes_sent);
        Ok(bytes_sent)
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, TransportError> {
        if !self.config.receive_delay.is_zero() {
            tokio::time::sleep(self.config.receive_delay).await;
        }

        let mut state = self.state.write().await;

        if !state.connected {
            return Err(TransportError::NotConnected);
        }

        match state.receive_queue.pop_front() {
            Some(MockEvent::Frame(data)) => {
                let bytes_to_copy = std::cmp::min(data.len(), buffer.len());
                buffer[..bytes_to_copy].copy_from_slice(&data[..bytes_to_copy]);
                state.stats.record_frame_received(bytes_to_copy);
                debug!("Mock transport delivered {} byte frame", bytes_to_copy);
                Ok(bytes_to_copy)
            }
            Some(MockEvent::Error(message)) => {
                state.stats.record_error();
                Err(TransportError::ReceiveFailed(message))
            }
            // An explicit end marker or an exhausted script both read as a
            // clean end-of-response
            Some(MockEvent::End) | None => Ok(0),
        }
    }

    async fn is_connected(&self) -> bool {
        let state = self.state.read().await;
        state.connected
    }

    async fn connection_state(&self) -> ConnectionState {
        let state = self.state.read().await;
        state.stats.connection_state
    }

    async fn stats(&self) -> TransportStats {
        let state = self.state.read().await;
        state.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_connect_disconnect() {
        let mut transport = MockTransport::new();

        assert!(!transport.is_connected().await);

        assert!(transport.connect().await.is_ok());
        assert!(transport.is_connected().await);
        assert_eq!(
            transport.connection_state().await,
            ConnectionState::Connected
        );

        assert!(transport.disconnect().await.is_ok());
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_mock_transport_scripted_frames() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        transport.add_response_frame(vec![1, 2, 3, 4]).await;
        transport.add_response_end().await;

        let mut buffer = [0u8; 16];
        let n = transport.receive(&mut buffer, None).await.unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buffer[..4], &[1, 2, 3, 4]);

        // End marker reads as the zero-length receive
        let n = transport.receive(&mut buffer, None).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_mock_transport_scripted_error() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        transport.add_response_error("no such variable").await;

        let mut buffer = [0u8; 16];
        let err = transport.receive(&mut buffer, None).await.unwrap_err();
        match err {
            TransportError::ReceiveFailed(msg) => assert_eq!(msg, "no such variable"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_exhausted_script_ends_cleanly() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        let mut buffer = [0u8; 16];
        assert_eq!(transport.receive(&mut buffer, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_transport_records_sent_commands() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        let command = b"GetVarAddrText 1 VAR://MyBool";
        let bytes_sent = transport.send(command).await.unwrap();
        assert_eq!(bytes_sent, command.len());

        let sent = transport.get_sent_data().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], command);

        transport.clear_sent_data().await;
        assert!(transport.get_sent_data().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_transport_send_failure() {
        let mut config = MockTransportConfig::default();
        config.should_fail_send = true;

        let mut transport = MockTransport::with_config(config);
        transport.connect().await.unwrap();

        let result = transport.send(&[1, 2, 3]).await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));
    }

    #[tokio::test]
    async fn test_mock_transport_connection_failure() {
        let mut config = MockTransportConfig::default();
        config.should_fail_connection = true;

        let mut transport = MockTransport::with_config(config);
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected().await);
        assert_eq!(transport.connection_state().await, ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_mock_transport_requires_connection() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.send(&[1]).await,
            Err(TransportError::NotConnected)
        ));
        let mut buffer = [0u8; 4];
        assert!(matches!(
            transport.receive(&mut buffer, None).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_mock_transport_stats() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        transport.send(&[0xAA, 0xBB]).await.unwrap();
        transport.add_exchange(&[&[1, 2, 3]]).await;

        let mut buffer = [0u8; 8];
        transport.receive(&mut buffer, None).await.unwrap();

        let stats = transport.stats().await;
        assert_eq!(stats.connection_attempts, 1);
        assert_eq!(stats.bytes_sent, 2);
        assert_eq!(stats.bytes_received, 3);
        assert_eq!(stats.frames_received, 1);
    }
}
