//! # Endpoint Contracts
//!
//! Fixed-width, tightly packed endpoint descriptors. The registry appends
//! one per registration and the `?` pseudo-endpoint exposes the raw byte
//! image of the whole array, so clients can discover every endpoint and
//! generate typed proxies without a schema file.

use bytemuck::{Pod, Zeroable};

/// Width of the zero-padded endpoint name.
pub const NAME_LEN: usize = 31;

/// Width of each zero-padded schema string.
pub const SCHEMA_LEN: usize = 44;

/// Kind of a registered endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum EndpointKind {
    /// One request in, one response out.
    Request = 0,
    /// Producer fanned out over a WebSocket channel.
    Stream = 1,
}

/// Wire descriptor for one registered endpoint.
///
/// Little-endian, no padding, 128 bytes. Strings are zero-padded and
/// truncated one byte short of their field width so a terminator always
/// survives.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct EndpointContract {
    /// Command byte, unique per registration.
    pub id: u8,
    /// Human-readable endpoint name.
    pub name: [u8; NAME_LEN],
    /// Advisory fixed response width, or 0 for variable.
    pub response_size: u32,
    /// 0 = request/response, 1 = stream.
    pub kind: u32,
    /// Request field list (empty for streams).
    pub request_schema: [u8; SCHEMA_LEN],
    /// Response field list.
    pub response_schema: [u8; SCHEMA_LEN],
}

/// Total packed size of one contract record.
pub const CONTRACT_SIZE: usize = std::mem::size_of::<EndpointContract>();

fn pad<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let take = text.len().min(N - 1);
    out[..take].copy_from_slice(&text.as_bytes()[..take]);
    out
}

impl EndpointContract {
    /// Builds a contract record, zero-padding the string fields.
    #[must_use]
    pub fn new(
        id: u8,
        name: &str,
        response_size: u32,
        kind: EndpointKind,
        request_schema: &str,
        response_schema: &str,
    ) -> Self {
        Self {
            id,
            name: pad(name),
            response_size,
            kind: kind as u32,
            request_schema: pad(request_schema),
            response_schema: pad(response_schema),
        }
    }

    /// Endpoint name with the zero padding stripped.
    #[must_use]
    pub fn name_str(&self) -> &str {
        str_field(&self.name)
    }

    /// Request schema with the zero padding stripped.
    #[must_use]
    pub fn request_schema_str(&self) -> &str {
        str_field(&self.request_schema)
    }

    /// Response schema with the zero padding stripped.
    #[must_use]
    pub fn response_schema_str(&self) -> &str {
        str_field(&self.response_schema)
    }
}

fn str_field(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_is_128_bytes() {
        assert_eq!(CONTRACT_SIZE, 128);
    }

    #[test]
    fn test_byte_image_layout() {
        let contract = EndpointContract::new(
            b'1',
            "GetWeatherForecast",
            24,
            EndpointKind::Request,
            "",
            "u32:date|i32:temp|c16:summary",
        );
        let bytes = bytemuck::bytes_of(&contract);

        assert_eq!(bytes[0], b'1');
        assert_eq!(&bytes[1..19], b"GetWeatherForecast");
        assert_eq!(bytes[19..32], [0u8; 13]);
        assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 24);
        assert_eq!(u32::from_le_bytes(bytes[36..40].try_into().unwrap()), 0);
        assert_eq!(bytes[40..84], [0u8; 44]);
        assert_eq!(&bytes[84..113], b"u32:date|i32:temp|c16:summary");
    }

    #[test]
    fn test_overlong_name_keeps_terminator() {
        let long = "x".repeat(64);
        let contract =
            EndpointContract::new(b'Z', &long, 0, EndpointKind::Stream, &long, &long);
        assert_eq!(contract.name[NAME_LEN - 1], 0);
        assert_eq!(contract.request_schema[SCHEMA_LEN - 1], 0);
        assert_eq!(contract.name_str().len(), NAME_LEN - 1);
        assert_eq!(contract.kind, 1);
    }
}
