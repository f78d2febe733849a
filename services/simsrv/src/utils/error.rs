//! Error handling for the Simulator Access Service
//!
//! This module provides the error type, result alias, and conversion helpers
//! used throughout the service. The taxonomy mirrors the failure modes of the
//! variable access layer: transport faults, resolution faults, codec faults,
//! and the ambient configuration/IO conditions around them.

use thiserror::Error;

/// Simulator Access Service Error Type
#[derive(Error, Debug, Clone)]
pub enum SimSrvError {
    /// Send failed, or receive reported an error frame; carries the
    /// transport-reported text
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Resolution exchange completed but the response was unusable, or the
    /// transport failed while resolving
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// A type tag outside the closed codec set reached encode or decode
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Textual value could not be parsed into the target type during encode
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// Response frames present but structurally unusable (missing frames,
    /// undersized value buffer)
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Connection establishment and teardown errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Operation attempted on a disconnected transport
    #[error("Not connected")]
    NotConnected,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Declaration source errors (unreadable file, malformed range token)
    #[error("Declaration error: {0}")]
    DeclarationError(String),

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// General internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the Simulator Access Service
pub type Result<T> = std::result::Result<T, SimSrvError>;

// Conversion from std::io::Error
impl From<std::io::Error> for SimSrvError {
    fn from(err: std::io::Error) -> Self {
        SimSrvError::IoError(err.to_string())
    }
}

// Conversion from figment::Error
impl From<figment::Error> for SimSrvError {
    fn from(err: figment::Error) -> Self {
        SimSrvError::ConfigError(format!("Configuration error: {err}"))
    }
}

// Helper methods for creating errors
impl SimSrvError {
    pub fn transport(msg: impl Into<String>) -> Self {
        SimSrvError::TransportError(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        SimSrvError::ResolutionError(msg.into())
    }

    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        SimSrvError::UnsupportedType(msg.into())
    }

    pub fn parse_failure(msg: impl Into<String>) -> Self {
        SimSrvError::ParseFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        SimSrvError::MalformedResponse(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        SimSrvError::ConnectionError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SimSrvError::ConfigError(msg.into())
    }

    pub fn declaration(msg: impl Into<String>) -> Self {
        SimSrvError::DeclarationError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        SimSrvError::TimeoutError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SimSrvError::InternalError(msg.into())
    }
}

/// Extension trait for adding context to errors
pub trait ErrorExt<T> {
    fn transport_error(self, msg: &str) -> Result<T>;
    fn resolution_error(self, msg: &str) -> Result<T>;
    fn connection_error(self, msg: &str) -> Result<T>;
    fn config_error(self, msg: &str) -> Result<T>;
    fn declaration_error(self, msg: &str) -> Result<T>;
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorExt<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn transport_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::TransportError(format!("{msg}: {e}")))
    }

    fn resolution_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::ResolutionError(format!("{msg}: {e}")))
    }

    fn connection_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::ConnectionError(format!("{msg}: {e}")))
    }

    fn config_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::ConfigError(format!("{msg}: {e}")))
    }

    fn declaration_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::DeclarationError(format!("{msg}: {e}")))
    }

    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| SimSrvError::InternalError(format!("{msg}: {e}")))
    }
}
