//! Simulator stub endpoint for testing
//!
//! A small in-memory endpoint speaking the variable access protocol over
//! the framed TCP stream, so integration tests and demos can run without a
//! real simulator. Variables are seeded programmatically; each gets a
//! synthetic address whose last comma field is its bit width, the shape
//! resolution clients depend on.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::error::Result;

/// Revision token handed out by every resolution
const REVISION: &[u8] = b"1";
/// Placeholder for the reserved second resolution frame
const RESERVED: &[u8] = b"0";

/// One simulated variable: its synthetic address and backing bytes.
#[derive(Debug, Clone)]
struct StubVariable {
    address: String,
    memory: Vec<u8>,
}

/// What one command produces.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StubReply {
    /// Data frames followed by the end-of-response marker
    Frames(Vec<Vec<u8>>),
    /// A negative-length error message, ending the response
    Error(String),
}

/// In-process simulator endpoint.
///
/// Clones share the variable table, so a test can keep a handle for
/// seeding and out-of-band mutation after `start` consumes the stub.
#[derive(Debug, Clone, Default)]
pub struct SimulatorStub {
    variables: Arc<RwLock<HashMap<String, StubVariable>>>,
    cancel: CancellationToken,
}

impl SimulatorStub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that stops the accept loop when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Seed a variable with zeroed memory. The synthetic address carries
    /// the bit width as its last comma field.
    pub async fn seed_variable(&self, name: impl Into<String>, bit_width: u32) {
        let mut vars = self.variables.write().await;
        let slot = 100 + vars.len();
        let size = ((bit_width / 8).max(1)) as usize;
        vars.insert(
            name.into(),
            StubVariable {
                address: format!("{slot},1,1,{bit_width}"),
                memory: vec![0u8; size],
            },
        );
    }

    /// Replace a variable's bytes out-of-band (for testing)
    pub async fn set_bytes(&self, name: &str, bytes: &[u8]) -> bool {
        let mut vars = self.variables.write().await;
        match vars.get_mut(name) {
            Some(var) => {
                store_bytes(&mut var.memory, bytes);
                true
            }
            None => false,
        }
    }

    /// Current bytes of a variable (for testing)
    pub async fn get_bytes(&self, name: &str) -> Option<Vec<u8>> {
        let vars = self.variables.read().await;
        vars.get(name).map(|var| var.memory.clone())
    }

    /// Start the stub server. Port `0` binds an ephemeral port; the bound
    /// address is returned.
    pub async fn start(self, port: u16) -> Result<SocketAddr> {
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!("Simulator stub listening on {local_addr}");

        let stub = Arc::new(self);
        let cancel = stub.cancel.clone();

        // Accept loop
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Simulator stub shutting down");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("New connection from {peer}");
                            let stub = stub.clone();
                            tokio::spawn(async move {
                                if let Err(e) = stub.handle_connection(stream).await {
                                    debug!("Stub connection ended: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {e}");
                            break;
                        }
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Handle a single connection
    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        loop {
            let mut prefix = [0u8; 4];
            if stream.read_exact(&mut prefix).await.is_err() {
                break; // Connection closed
            }

            let length = i32::from_le_bytes(prefix);
            if length <= 0 {
                debug!("Client sent invalid frame length {length}, closing");
                break;
            }

            let mut command = vec![0u8; length as usize];
            stream.read_exact(&mut command).await?;
            let text = String::from_utf8_lossy(&command).to_string();
            debug!(command = %text, "Stub received command");

            let reply = self.respond(&text).await;
            write_reply(&mut stream, reply).await?;
        }

        Ok(())
    }

    /// Build the reply for one command line.
    async fn respond(&self, command: &str) -> StubReply {
        let mut parts = command.splitn(4, ' ');
        let verb = parts.next().unwrap_or("");

        match verb {
            "GetVarAddrText" => {
                let _index = parts.next();
                let target = parts.next().unwrap_or("");
                self.resolve_reply(target).await
            }
            "AsyncReadMemText" => {
                let _revision = parts.next();
                let _index = parts.next();
                let spec = parts.next().unwrap_or("");
                self.read_reply(spec).await
            }
            "AsyncWriteMemText" => {
                let _revision = parts.next();
                let _index = parts.next();
                let spec = parts.next().unwrap_or("");
                self.write_reply_for(spec).await
            }
            _ => StubReply::Error(format!("Unknown command: {command}")),
        }
    }

    async fn resolve_reply(&self, target: &str) -> StubReply {
        let Some(name) = target.strip_prefix("VAR://") else {
            return StubReply::Error(format!("Bad variable reference: {target}"));
        };

        let vars = self.variables.read().await;
        match vars.get(name) {
            Some(var) => StubReply::Frames(vec![
                REVISION.to_vec(),
                RESERVED.to_vec(),
                var.address.clone().into_bytes(),
            ]),
            None => StubReply::Error(format!("No such variable: VAR://{name}")),
        }
    }

    /// `spec` is `<address>,<elementCount>`; the address itself contains
    /// commas, so the count is split off the tail.
    async fn read_reply(&self, spec: &str) -> StubReply {
        let Some((address, _count)) = spec.rsplit_once(',') else {
            return StubReply::Error(format!("Bad read spec: {spec}"));
        };

        let vars = self.variables.read().await;
        match vars.values().find(|var| var.address == address) {
            Some(var) => StubReply::Frames(vec![var.memory.clone()]),
            None => StubReply::Error(format!("Unknown address: {address}")),
        }
    }

    /// `spec` is `<address>,<elementCount>,<hexBytes>`.
    async fn write_reply_for(&self, spec: &str) -> StubReply {
        let Some((head, hex_payload)) = spec.rsplit_once(',') else {
            return StubReply::Error(format!("Bad write spec: {spec}"));
        };
        let Some((address, _count)) = head.rsplit_once(',') else {
            return StubReply::Error(format!("Bad write spec: {spec}"));
        };

        let payload = match hex::decode(hex_payload) {
            Ok(payload) => payload,
            Err(e) => return StubReply::Error(format!("Bad hex payload: {e}")),
        };

        let mut vars = self.variables.write().await;
        match vars.values_mut().find(|var| var.address == address) {
            Some(var) => {
                store_bytes(&mut var.memory, &payload);
                StubReply::Frames(Vec::new())
            }
            None => StubReply::Error(format!("Unknown address: {address}")),
        }
    }
}

/// Copy incoming bytes into fixed-size variable memory, truncating or
/// zero-padding so the memory size never changes.
fn store_bytes(memory: &mut [u8], bytes: &[u8]) {
    let n = bytes.len().min(memory.len());
    memory[..n].copy_from_slice(&bytes[..n]);
    for slot in memory[n..].iter_mut() {
        *slot = 0;
    }
}

/// Send one reply over the framed stream.
async fn write_reply(stream: &mut TcpStream, reply: StubReply) -> std::io::Result<()> {
    match reply {
        StubReply::Frames(frames) => {
            for frame in frames {
                stream
                    .write_all(&(frame.len() as i32).to_le_bytes())
                    .await?;
                stream.write_all(&frame).await?;
            }
            stream.write_all(&0i32.to_le_bytes()).await?;
        }
        StubReply::Error(text) => {
            let bytes = text.into_bytes();
            stream
                .write_all(&(-(bytes.len() as i32)).to_le_bytes())
                .await?;
            stream.write_all(&bytes).await?;
        }
    }
    stream.flush().await
}
