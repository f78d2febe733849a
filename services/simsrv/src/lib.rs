//! Simulator Variable Access Service (simsrv)
//!
//! An async service library for reading and writing named variables inside a
//! running Sysmac-style PLC simulator. The simulator exposes a line-command
//! endpoint; this library speaks that protocol, resolves symbolic variable
//! names to memory addresses, and keeps a registry of declared variables
//! fresh through periodic polling.
//!
//! # Features
//!
//! - **Name Resolution**: `VAR://` name lookup with per-variable caching of
//!   the returned revision, address, and size
//! - **Typed Access**: encode and decode BOOL, SINT/INT/DINT/LINT, their
//!   unsigned counterparts, REAL/LREAL, and STRING values
//! - **Declarations**: tab-separated declaration files with `[low..high]`
//!   array range expansion
//! - **Polling**: background refresh of every registered variable with
//!   cooperative cancellation
//! - **Simulator Stub**: an in-process endpoint speaking the same framing,
//!   for tests and demos without a real simulator
//! - **Configuration**: layered settings (defaults, file, environment,
//!   command line) via figment
//! - **Logging**: structured tracing to stdout or daily-rolling files
//!
//! # Architecture
//!
//! The library is organized into two main modules:
//!
//! - **`core`**: transports, the command channel, resolution, codecs, the
//!   variable registry, polling, and service bootstrap
//! - **`utils`**: the error taxonomy and hex formatting helpers
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ Declarations │────►│ SimulatorClient  │────►│ CommandChannel   │
//! │ (TSV file)   │     │ (registry+cache) │     │ (one exchange    │
//! └──────────────┘     └──────────────────┘     │  at a time)      │
//!                               ▲               └──────────────────┘
//!                               │                        │
//!                      ┌────────┴───────┐       ┌────────▼─────────┐
//!                      │ VariablePoller │       │ Transport        │
//!                      │ (periodic)     │       │ (TCP / mock)     │
//!                      └────────────────┘       └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use simsrv::core::bootstrap;
//! use simsrv::{PlcType, Result, SimSrvConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SimSrvConfig::load(None)?;
//!     let client = bootstrap::build_client(&config)?;
//!     client.connect().await?;
//!
//!     let value = client.read_as("Motor.Speed", PlcType::Int).await?;
//!     println!("Motor.Speed = {value}");
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Command Line Usage
//!
//! ```bash
//! # Monitor declared variables (default subcommand)
//! simsrv --config config/simsrv.yaml monitor --declarations config/variables.tsv
//!
//! # One-shot operations
//! simsrv read Motor.Speed --type INT
//! simsrv write Conveyor.Run true
//! simsrv resolve Tank[3].Level
//!
//! # Check the effective configuration without connecting
//! simsrv --config config/simsrv.yaml --validate
//! ```
//!
//! ## Environment Variables
//!
//! - `SIMSRV_CONNECTION__HOST`, `SIMSRV_CONNECTION__PORT`: endpoint override
//! - `SIMSRV_POLLING__INTERVAL_MS`: polling cadence override
//! - `RUST_LOG`: tracing filter, wins over the configured log level
//!
//! ## Configuration
//!
//! ```yaml
//! connection:
//!   host: "127.0.0.1"
//!   port: 7000
//!   response_timeout_ms: 5000
//!   buffer_size: 512
//!
//! polling:
//!   interval_ms: 100
//!
//! declarations: "config/variables.tsv"
//!
//! logging:
//!   level: "info"
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`](Result) with the service-wide
//! [`SimSrvError`] taxonomy: transport and connection faults, resolution
//! failures, codec errors, and the configuration and declaration conditions
//! around them. Endpoint-reported errors arrive as readable text and are
//! carried through unchanged.

pub mod core;
pub mod utils;

// Re-export commonly used types
pub use crate::core::client::{LoadReport, SimulatorClient};
pub use crate::core::codec::{PlcType, PlcValue};
pub use crate::core::config::SimSrvConfig;
pub use crate::core::polling::VariablePoller;
pub use crate::core::sim::SimulatorStub;
pub use crate::utils::error::{Result, SimSrvError};
