//! # WebSocket Frame Codec
//!
//! Outbound binary framing and the RFC 6455 opening-handshake key
//! computation. This is a one-way codec: after upgrade the server only
//! writes. Masked client frames are never decoded; a subscriber socket is
//! write-only from the server's perspective.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};

/// Fixed GUID appended to the client key per RFC 6455 §4.2.2.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// First header byte of every outbound frame: FIN=1, opcode=binary.
const FIN_BINARY: u8 = 0x82;

/// Builds the frame header for a binary payload of `payload_len` bytes.
///
/// Three forms, selected by length: 2 bytes (7-bit), 4 bytes (16-bit
/// big-endian), or 10 bytes (64-bit big-endian). Outbound frames are
/// never masked.
#[must_use]
pub fn frame_header(payload_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(10);
    header.push(FIN_BINARY);

    if payload_len <= 125 {
        #[allow(clippy::cast_possible_truncation)]
        header.push(payload_len as u8);
    } else if payload_len <= 65535 {
        header.push(126);
        #[allow(clippy::cast_possible_truncation)]
        header.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }
    header
}

/// Builds one contiguous buffer holding the header followed by `payload`.
///
/// The pump frames each broadcast payload exactly once and writes the
/// result to every subscriber in a single send.
#[must_use]
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = frame_header(payload.len());
    buf.extend_from_slice(payload);
    buf
}

/// Computes the `Sec-WebSocket-Accept` value for a client key.
///
/// `Base64(SHA1(key ∥ GUID))`, with surrounding whitespace on the key
/// trimmed first.
#[must_use]
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}
