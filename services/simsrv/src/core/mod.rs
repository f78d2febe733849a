//! Core Simulator Access Components
//!
//! This module contains the core functionality of the variable access
//! service, organized around one command/response channel to a running
//! simulator:
//!
//! - **`transport`** - Framed byte transports (TCP, plus a scripted mock)
//! - **`protocol`** - Command construction and the exchange loop
//! - **`resolver`** - Resolution responses (revision, address, size)
//! - **`codec`** - PLC type tags and value encode/decode
//! - **`variable`** - Variable records and the ordered registry
//! - **`declarations`** - Tab-separated declaration files and array ranges
//! - **`client`** - High-level read/write/resolve operations
//! - **`polling`** - Periodic refresh of every registered variable
//! - **`sim`** - In-process simulator stub for tests and demos
//! - **`config`** - Layered configuration (defaults, file, environment)
//! - **`bootstrap`** - CLI surface, logging setup, client assembly
//!
//! All components are async and exchange exactly one command at a time
//! over the shared channel.

pub mod bootstrap;
pub mod client;
pub mod codec;
pub mod config;
pub mod declarations;
pub mod polling;
pub mod protocol;
pub mod resolver;
pub mod sim;
pub mod transport;
pub mod variable;
