//! PLC value codec
//!
//! Converts between IEC 61131-3 typed values and their wire representation.
//! Multi-byte numerics are little-endian. SINT and USINT travel as a single
//! byte on the wire but decode through a zero-extended 16-bit path, so their
//! observable numeric value matches the corresponding 2-byte decode. STRING
//! width is fixed by the declared size, not by the text length.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::utils::error::{Result, SimSrvError};

/// Closed set of wire types understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlcType {
    Bool,
    Sint,
    Int,
    Dint,
    Lint,
    Usint,
    Uint,
    Udint,
    Ulint,
    Real,
    Lreal,
    Str,
}

impl PlcType {
    /// Map a declared type tag to a codec type.
    ///
    /// STRING matches by prefix, so declarations like `STRING[20]` resolve to
    /// the string type while keeping their suffix in the declaration text.
    /// Any tag outside the closed set is an `UnsupportedType` error.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let trimmed = tag.trim();
        if trimmed.starts_with("STRING") {
            return Ok(PlcType::Str);
        }
        match trimmed {
            "BOOL" => Ok(PlcType::Bool),
            "SINT" => Ok(PlcType::Sint),
            "INT" => Ok(PlcType::Int),
            "DINT" => Ok(PlcType::Dint),
            "LINT" => Ok(PlcType::Lint),
            "USINT" => Ok(PlcType::Usint),
            "UINT" => Ok(PlcType::Uint),
            "UDINT" => Ok(PlcType::Udint),
            "ULINT" => Ok(PlcType::Ulint),
            "REAL" => Ok(PlcType::Real),
            "LREAL" => Ok(PlcType::Lreal),
            other => Err(SimSrvError::unsupported_type(other.to_string())),
        }
    }
}

/// Decoded variable value, tagged by wire type
///
/// `Sint`/`Usint` carry the 16-bit result of the widened single-byte decode,
/// which keeps the numeric value identical to the 2-byte path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlcValue {
    Bool(bool),
    Sint(i16),
    Int(i16),
    Dint(i32),
    Lint(i64),
    Usint(u16),
    Uint(u16),
    Udint(u32),
    Ulint(u64),
    Real(f32),
    Lreal(f64),
    Str(String),
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlcValue::Bool(v) => write!(f, "{}", v),
            PlcValue::Sint(v) => write!(f, "{}", v),
            PlcValue::Int(v) => write!(f, "{}", v),
            PlcValue::Dint(v) => write!(f, "{}", v),
            PlcValue::Lint(v) => write!(f, "{}", v),
            PlcValue::Usint(v) => write!(f, "{}", v),
            PlcValue::Uint(v) => write!(f, "{}", v),
            PlcValue::Udint(v) => write!(f, "{}", v),
            PlcValue::Ulint(v) => write!(f, "{}", v),
            PlcValue::Real(v) => write!(f, "{}", v),
            PlcValue::Lreal(v) => write!(f, "{}", v),
            PlcValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Decode a wire buffer into a typed value.
///
/// The buffer must carry at least the type's width; an undersized buffer is
/// a malformed response, not something to pad. The single sanctioned widening
/// is the SINT/USINT path, where the one wire byte is zero-extended into the
/// 16-bit decode.
pub fn decode(ty: PlcType, data: &[u8]) -> Result<PlcValue> {
    match ty {
        PlcType::Bool => Ok(PlcValue::Bool(take::<1>(data, "BOOL")?[0] != 0)),
        PlcType::Sint => {
            let byte = take::<1>(data, "SINT")?[0];
            Ok(PlcValue::Sint(i16::from_le_bytes([byte, 0])))
        }
        PlcType::Int => Ok(PlcValue::Int(i16::from_le_bytes(take(data, "INT")?))),
        PlcType::Dint => Ok(PlcValue::Dint(i32::from_le_bytes(take(data, "DINT")?))),
        PlcType::Lint => Ok(PlcValue::Lint(i64::from_le_bytes(take(data, "LINT")?))),
        PlcType::Usint => {
            let byte = take::<1>(data, "USINT")?[0];
            Ok(PlcValue::Usint(u16::from_le_bytes([byte, 0])))
        }
        PlcType::Uint => Ok(PlcValue::Uint(u16::from_le_bytes(take(data, "UINT")?))),
        PlcType::Udint => Ok(PlcValue::Udint(u32::from_le_bytes(take(data, "UDINT")?))),
        PlcType::Ulint => Ok(PlcValue::Ulint(u64::from_le_bytes(take(data, "ULINT")?))),
        PlcType::Real => Ok(PlcValue::Real(f32::from_le_bytes(take(data, "REAL")?))),
        PlcType::Lreal => Ok(PlcValue::Lreal(f64::from_le_bytes(take(data, "LREAL")?))),
        PlcType::Str => Ok(PlcValue::Str(
            String::from_utf8_lossy(data)
                .trim_end_matches('\0')
                .to_string(),
        )),
    }
}

/// Encode a textual value into its wire buffer.
///
/// Numeric text is trimmed and parsed with the target type's standard parse
/// rules; an unparsable value is a `ParseFailure` and produces no bytes.
/// Booleans accept `true`/`false` case-insensitively. STRING copies the UTF-8
/// bytes into a buffer of exactly `size`, truncating or zero-padding.
pub fn encode(ty: PlcType, text: &str, size: usize) -> Result<Vec<u8>> {
    match ty {
        PlcType::Bool => {
            let trimmed = text.trim();
            let value = if trimmed.eq_ignore_ascii_case("true") {
                true
            } else if trimmed.eq_ignore_ascii_case("false") {
                false
            } else {
                return Err(SimSrvError::parse_failure(format!(
                    "cannot parse '{text}' as BOOL"
                )));
            };
            Ok(vec![if value { 0xFF } else { 0x00 }])
        }
        // Single wire byte, taken from the 16-bit encode of the parsed value
        PlcType::Sint => Ok(vec![parse_num::<i16>(text, "SINT")?.to_le_bytes()[0]]),
        PlcType::Usint => Ok(vec![parse_num::<u16>(text, "USINT")?.to_le_bytes()[0]]),
        PlcType::Int => Ok(parse_num::<i16>(text, "INT")?.to_le_bytes().to_vec()),
        PlcType::Dint => Ok(parse_num::<i32>(text, "DINT")?.to_le_bytes().to_vec()),
        PlcType::Lint => Ok(parse_num::<i64>(text, "LINT")?.to_le_bytes().to_vec()),
        PlcType::Uint => Ok(parse_num::<u16>(text, "UINT")?.to_le_bytes().to_vec()),
        PlcType::Udint => Ok(parse_num::<u32>(text, "UDINT")?.to_le_bytes().to_vec()),
        PlcType::Ulint => Ok(parse_num::<u64>(text, "ULINT")?.to_le_bytes().to_vec()),
        PlcType::Real => Ok(parse_num::<f32>(text, "REAL")?.to_le_bytes().to_vec()),
        PlcType::Lreal => Ok(parse_num::<f64>(text, "LREAL")?.to_le_bytes().to_vec()),
        PlcType::Str => {
            let mut buffer = vec![0u8; size];
            let bytes = text.as_bytes();
            let n = bytes.len().min(size);
            buffer[..n].copy_from_slice(&bytes[..n]);
            Ok(buffer)
        }
    }
}

/// First `N` bytes of the buffer, or a malformed-response error naming the type
fn take<const N: usize>(data: &[u8], tag: &str) -> Result<[u8; N]> {
    let slice = data.get(..N).ok_or_else(|| {
        SimSrvError::malformed(format!(
            "{tag} value needs {N} bytes, response carried {}",
            data.len()
        ))
    })?;
    let mut buf = [0u8; N];
    buf.copy_from_slice(slice);
    Ok(buf)
}

fn parse_num<T>(text: &str, tag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| SimSrvError::parse_failure(format!("cannot parse '{text}' as {tag}: {e}")))
}
