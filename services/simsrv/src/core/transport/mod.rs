//! Transport Layer
//!
//! Byte-level connectivity to a simulator endpoint. The [`Transport`] trait
//! captures the framed receive contract the protocol layer depends on;
//! [`TcpTransport`] is the production implementation and [`MockTransport`]
//! scripts exchanges for tests.

pub mod mock;
pub mod tcp;
pub mod traits;

pub use mock::{MockTransport, MockTransportConfig};
pub use tcp::{TcpTransport, TcpTransportConfig};
pub use traits::{ConnectionState, Transport, TransportError, TransportStats};
