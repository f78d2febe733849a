//! Resolution Response Parsing
//!
//! Turns the frames of a `GetVarAddrText` response into the revision,
//! address, and byte size a variable needs before it can be read or
//! written. Frame layout: frame 0 is the revision token, frame 1 is
//! reserved by the endpoint, frame 2 is the address text. The address
//! text's last comma-separated field is the variable's width in bits.

use crate::utils::error::{Result, SimSrvError};

/// Decode wire bytes as text, dropping trailing NUL padding and
/// whitespace. Responses arrive in fixed buffers padded with NULs.
pub fn trimmed_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// A parsed resolution: everything needed to address a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Revision token, kept as raw wire bytes
    pub revision: Vec<u8>,
    /// Address text, kept as raw wire bytes
    pub address: Vec<u8>,
    /// Variable width in bytes, derived from the address text
    pub size: usize,
}

/// Parse the frames of a resolution response.
///
/// A response with fewer than three frames fails the resolution. Frames
/// beyond the third are ignored.
pub fn parse_resolution(name: &str, frames: &[Vec<u8>]) -> Result<Resolution> {
    if frames.len() < 3 {
        return Err(SimSrvError::ResolutionError(format!(
            "Resolution of '{name}' returned {} frames, expected at least 3",
            frames.len()
        )));
    }

    let revision = frames[0].clone();
    let address = frames[2].clone();
    let size = derive_size(name, &trimmed_text(&address))?;

    Ok(Resolution {
        revision,
        address,
        size,
    })
}

/// Derive the byte size from an address text.
///
/// The last comma-separated field is the width in bits. Sub-byte widths
/// (a single BOOL bit) still occupy one byte on the wire.
fn derive_size(name: &str, address_text: &str) -> Result<usize> {
    let bits_field = address_text.rsplit(',').next().unwrap_or(address_text);
    let bits: u64 = bits_field.trim().parse().map_err(|_| {
        SimSrvError::ResolutionError(format!(
            "Variable '{name}': cannot derive size from address '{address_text}'"
        ))
    })?;
    Ok((bits / 8).max(1) as usize)
}
