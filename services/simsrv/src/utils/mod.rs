//! Utility modules shared across the service

pub mod error;
pub mod hex;
