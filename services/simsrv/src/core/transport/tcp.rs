//! TCP Transport Implementation
//!
//! Carries the simulator conversation over a TCP stream. Messages travel
//! with a little-endian `i32` length prefix: a positive length precedes that
//! many payload bytes (one command or one response frame), zero marks
//! end-of-response, and a negative length precedes `|length|` bytes of
//! endpoint error text. This is the stream realization of the receive
//! contract in [`super::traits::Transport`]; the bundled protocol stub
//! speaks the same framing.

use crate::utils::hex::format_hex_spaced;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::traits::{ConnectionState, Transport, TransportError, TransportStats};

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Remote host address
    pub host: String,
    /// Remote port number
    pub port: u16,
    /// Connect and default receive timeout
    pub timeout: Duration,
    /// TCP no-delay (Nagle algorithm)
    pub no_delay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            timeout: Duration::from_secs(10),
            no_delay: true,
        }
    }
}

impl TcpTransportConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.is_empty() {
            return Err(TransportError::ConnectionFailed(
                "Host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(TransportError::ConnectionFailed(
                "Port cannot be zero".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(TransportError::ConnectionFailed(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// TCP transport implementation
#[derive(Debug)]
pub struct TcpTransport {
    /// Transport configuration
    config: TcpTransportConfig,
    /// TCP connection
    connection: Arc<RwLock<Option<TcpStream>>>,
    /// Transport statistics
    stats: Arc<RwLock<TransportStats>>,
}

impl TcpTransport {
    /// Create new TCP transport with configuration
    pub fn new(config: TcpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(TransportStats::new())),
        })
    }

    fn socket_addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Read one framed message into `buffer`.
    ///
    /// Returns the frame length, `0` for the end-of-response marker, or the
    /// endpoint error carried by a negative-length message.
    async fn read_message(
        stream: &mut TcpStream,
        buffer: &mut [u8],
    ) -> Result<usize, TransportError> {
        let mut prefix = [0u8; 4];
        stream.read_exact(&mut prefix).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::ConnectionLost("Connection closed by peer".to_string())
            } else {
                TransportError::ReceiveFailed(format!("Failed to read length prefix: {e}"))
            }
        })?;

        let length = i32::from_le_bytes(prefix);
        if length == 0 {
            return Ok(0);
        }

        if length < 0 {
            let mut payload = vec![0u8; length.unsigned_abs() as usize];
            stream.read_exact(&mut payload).await.map_err(|e| {
                TransportError::ReceiveFailed(format!("Failed to read error payload: {e}"))
            })?;
            return Err(TransportError::ReceiveFailed(
                String::from_utf8_lossy(&payload).to_string(),
            ));
        }

        let frame_len = length as usize;
        if frame_len > buffer.len() {
            // Drain the oversized frame so the stream stays aligned
            let mut sink = vec![0u8; frame_len];
            stream.read_exact(&mut sink).await.map_err(|e| {
                TransportError::ReceiveFailed(format!("Failed to drain oversized frame: {e}"))
            })?;
            return Err(TransportError::ReceiveFailed(format!(
                "Frame of {frame_len} bytes exceeds receive buffer of {}",
                buffer.len()
            )));
        }

        stream
            .read_exact(&mut buffer[..frame_len])
            .await
            .map_err(|e| TransportError::ReceiveFailed(format!("Failed to read frame: {e}")))?;
        Ok(frame_len)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &str {
        "TCP Transport"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        {
            let mut stats = self.stats.write().await;
            stats.record_connection_attempt();
        }

        let addr = self.socket_addr();
        debug!("Connecting to simulator endpoint: {addr}");

        match timeout(self.config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if self.config.no_delay {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY: {e}");
                    }
                }

                let mut conn = self.connection.write().await;
                *conn = Some(stream);
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_successful_connection();

                info!("Connected to simulator endpoint: {addr}");
                Ok(())
            }
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect to {addr}: {e}");
                error!("{error_msg}");

                let mut stats = self.stats.write().await;
                stats.record_failed_connection();

                Err(TransportError::ConnectionFailed(error_msg))
            }
            Err(_) => {
                let error_msg = format!("Connection to {addr} timed out");
                warn!("{error_msg}");

                let mut stats = self.stats.write().await;
                stats.record_failed_connection();

                Err(TransportError::Timeout(error_msg))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut conn = self.connection.write().await;
        if let Some(mut stream) = conn.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error during TCP shutdown: {e}");
            }
            drop(conn);

            let mut stats = self.stats.write().await;
            stats.record_disconnection();
            info!("Disconnected from simulator endpoint");
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut conn = self.connection.write().await;
        let Some(stream) = conn.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let prefix = (data.len() as i32).to_le_bytes();
        let write_result = async {
            stream.write_all(&prefix).await?;
            stream.write_all(data).await
        }
        .await;

        match write_result {
            Ok(()) => {
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_bytes_sent(data.len());

                debug!(
                    hex_data = %format_hex_spaced(data),
                    length = data.len(),
                    direction = "send",
                    "[TCP Transport] Raw packet"
                );
                Ok(data.len())
            }
            Err(e) => {
                let error_msg = format!("Failed to send data: {e}");
                error!("{error_msg}");

                // Connection might be broken, remove it
                *conn = None;
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_error();
                stats.connection_state = ConnectionState::Error;

                Err(TransportError::SendFailed(error_msg))
            }
        }
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout_duration: Option<Duration>,
    ) -> Result<usize, TransportError> {
        let mut conn = self.connection.write().await;
        let Some(stream) = conn.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let receive_timeout = timeout_duration.unwrap_or(self.config.timeout);
        let result = match timeout(receive_timeout, Self::read_message(stream, buffer)).await {
            Ok(result) => result,
            Err(_) => {
                drop(conn);
                let error_msg = format!("Receive timed out after {receive_timeout:?}");
                warn!("{error_msg}");

                let mut stats = self.stats.write().await;
                stats.record_error();
                return Err(TransportError::Timeout(error_msg));
            }
        };

        match result {
            Ok(0) => {
                drop(conn);
                debug!("End-of-response marker received");
                Ok(0)
            }
            Ok(bytes_read) => {
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_frame_received(bytes_read);

                debug!(
                    hex_data = %format_hex_spaced(&buffer[..bytes_read]),
                    length = bytes_read,
                    direction = "recv",
                    "[TCP Transport] Raw packet"
                );
                Ok(bytes_read)
            }
            Err(TransportError::ConnectionLost(msg)) => {
                warn!("Simulator connection closed by peer");
                *conn = None;
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_error();
                stats.record_disconnection();
                Err(TransportError::ConnectionLost(msg))
            }
            Err(e) => {
                drop(conn);

                let mut stats = self.stats.write().await;
                stats.record_error();
                Err(e)
            }
        }
    }

    async fn is_connected(&self) -> bool {
        let conn = self.connection.read().await;
        conn.is_some()
    }

    async fn connection_state(&self) -> ConnectionState {
        let stats = self.stats.read().await;
        stats.connection_state
    }

    async fn stats(&self) -> TransportStats {
        self.stats.read().await.clone()
    }

    async fn diagnostics(&self) -> std::collections::HashMap<String, String> {
        let stats = self.stats().await;
        let mut diag = std::collections::HashMap::new();
        diag.insert("name".to_string(), self.name().to_string());
        diag.insert("host".to_string(), self.config.host.clone());
        diag.insert("port".to_string(), self.config.port.to_string());
        diag.insert(
            "timeout_ms".to_string(),
            self.config.timeout.as_millis().to_string(),
        );
        diag.insert(
            "connected".to_string(),
            self.is_connected().await.to_string(),
        );
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

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_config_validation() {
        let mut config = TcpTransportConfig::default();
        assert!(config.validate().is_ok());

        config.host = "".to_string();
        assert!(config.validate().is_err());

        config.host = "127.0.0.1".to_string();
        config.port = 0;
        assert!(config.validate().is_err());

        config.port = 7000;
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_not_connected_initially() {
        let transport = TcpTransport::new(TcpTransportConfig::default()).unwrap();

        assert!(!transport.is_connected().await);
        assert_eq!(
            transport.connection_state().await,
            ConnectionState::Disconnected
        );

        let mut transport = transport;
        assert!(matches!(
            transport.send(b"x").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_tcp_transport_framed_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Peer: read one framed command, answer with a frame, an error
        // message, and an end marker
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut prefix = [0u8; 4];
            stream.read_exact(&mut prefix).await.unwrap();
            let len = i32::from_le_bytes(prefix) as usize;
            let mut command = vec![0u8; len];
            stream.read_exact(&mut command).await.unwrap();
            assert_eq!(command, b"hello");

            stream.write_all(&2i32.to_le_bytes()).await.unwrap();
            stream.write_all(b"AB").await.unwrap();

            let message = b"bad name";
            stream
                .write_all(&(-(message.len() as i32)).to_le_bytes())
                .await
                .unwrap();
            stream.write_all(message).await.unwrap();

            stream.write_all(&0i32.to_le_bytes()).await.unwrap();
            stream
        });

        let mut config = TcpTransportConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = addr.port();
        let mut transport = TcpTransport::new(config).unwrap();
        transport.connect().await.unwrap();
        assert!(transport.is_connected().await);

        transport.send(b"hello").await.unwrap();

        let mut buffer = [0u8; 512];
        let n = transport.receive(&mut buffer, None).await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buffer[..2], b"AB");

        let err = transport.receive(&mut buffer, None).await.unwrap_err();
        match err {
            TransportError::ReceiveFailed(msg) => assert_eq!(msg, "bad name"),
            other => panic!("unexpected error: {other:?}"),
        }

        let n = transport.receive(&mut buffer, None).await.unwrap();
        assert_eq!(n, 0);

        let stats = transport.stats().await;
        assert_eq!(stats.bytes_sent, 5);
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.errors, 1);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_transport_peer_close_is_connection_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut config = TcpTransportConfig::default();
        config.port = addr.port();
        let mut transport = TcpTransport::new(config).unwrap();
        transport.connect().await.unwrap();
        server.await.unwrap();

        let mut buffer = [0u8; 64];
        let err = transport.receive(&mut buffer, None).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_tcp_transport_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = TcpTransportConfig::default();
        config.port = addr.port();
        config.timeout = Duration::from_secs(1);
        let mut transport = TcpTransport::new(config).unwrap();

        assert!(transport.connect().await.is_err());
        assert_eq!(transport.connection_state().await, ConnectionState::Error);
    }
}
