//! Hexadecimal formatting utilities
//!
//! Small helpers for rendering byte buffers in debug logs. Bulk
//! encoding/decoding of wire payloads goes through the `hex` crate; these
//! exist for the separated, human-readable form used in traces.
//!
//! # Examples
//!
//! ```rust
//! use simsrv::utils::hex::format_hex_spaced;
//!
//! let data = &[0x01, 0x02, 0xFF];
//! assert_eq!(format_hex_spaced(data), "01 02 ff");
//! ```

/// Format byte array as hex string with custom separator
///
/// # Arguments
///
/// * `data` - Byte array to format
/// * `separator` - String to use between hex bytes
///
/// # Example
///
/// ```rust
/// use simsrv::utils::hex::format_hex_pretty;
///
/// let data = &[0x01, 0x02, 0xFF];
/// assert_eq!(format_hex_pretty(data, ":"), "01:02:ff");
/// ```
pub fn format_hex_pretty(data: &[u8], separator: &str) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Format byte array with standard space separation (lowercase)
///
/// Convenience function for the most common hex formatting use case.
///
/// # Example
///
/// ```rust
/// use simsrv::utils::hex::format_hex_spaced;
///
/// let data = &[0x01, 0x02, 0xFF];
/// assert_eq!(format_hex_spaced(data), "01 02 ff");
/// ```
pub fn format_hex_spaced(data: &[u8]) -> String {
    format_hex_pretty(data, " ")
}
