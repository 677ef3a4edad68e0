//! # Length-Prefixed String Codec
//!
//! Variable-length fields on the wire are a `u32` little-endian byte
//! count followed by UTF-8 bytes. Readers advance a shared offset;
//! truncated input yields `None` and the handler decides how to degrade.

/// Appends a length-prefixed string to `buf`.
pub fn write_str(buf: &mut Vec<u8>, text: &str) {
    #[allow(clippy::cast_possible_truncation)]
    let len = text.len() as u32;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
}

/// Reads a length-prefixed string at `offset`, advancing it.
#[must_use]
pub fn read_str(data: &[u8], offset: &mut usize) -> Option<String> {
    let len = read_u32(data, offset)? as usize;
    let end = offset.checked_add(len)?;
    if end > data.len() {
        return None;
    }
    let text = String::from_utf8(data[*offset..end].to_vec()).ok()?;
    *offset = end;
    Some(text)
}

/// Reads a little-endian `u32` at `offset`, advancing it.
#[must_use]
pub fn read_u32(data: &[u8], offset: &mut usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    if end > data.len() {
        return None;
    }
    let value = u32::from_le_bytes(data[*offset..end].try_into().ok()?);
    *offset = end;
    Some(value)
}
