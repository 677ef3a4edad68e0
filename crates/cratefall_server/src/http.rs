//! # HTTP Classification and Responses
//!
//! A deliberately small HTTP/1.1 surface: classify an inbound buffer as
//! HTTP or raw binary, pull out the command id, the upgrade headers, and a
//! `Content-Length` body, and emit terminal CORS-permissive responses.
//! Keep-alive, chunked transfer, and HTTP/2 are out of scope; every
//! response closes the connection.

use std::io;
use std::time::Duration;

use crate::sys::ReadOutcome;

/// Bounded retries while collecting a declared body (spin-sleep budget).
pub const BODY_RETRY_LIMIT: u32 = 10;

/// Sleep between body-collection retries.
pub const BODY_RETRY_DELAY: Duration = Duration::from_micros(100);

/// Returns true if the buffer starts like an HTTP request we serve.
#[must_use]
pub fn is_http(buf: &[u8]) -> bool {
    buf.starts_with(b"GET ") || buf.starts_with(b"POST ") || buf.starts_with(b"OPTIONS ")
}

/// Returns true for a CORS preflight request.
#[must_use]
pub fn is_options(buf: &[u8]) -> bool {
    buf.starts_with(b"OPTIONS ")
}

/// Extracts the command id from an HTTP request line.
///
/// The id is the byte after the first ` /` sequence; a space (or end of
/// buffer) there means the bare root path, id 0.
#[must_use]
pub fn http_command_id(buf: &[u8]) -> u8 {
    let Some(at) = buf.windows(2).position(|w| w == b" /") else {
        return 0;
    };
    match buf.get(at + 2) {
        Some(&b) if b != b' ' => b,
        _ => 0,
    }
}

/// Offset of the first body byte (past `\r\n\r\n`), if headers terminated.
#[must_use]
pub fn body_offset(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|at| at + 4)
}

/// Case-insensitive lookup of a header value in the head section.
///
/// Scans only up to the blank line; the value is returned with
/// surrounding spaces trimmed.
#[must_use]
pub fn header_value<'a>(buf: &'a [u8], name: &str) -> Option<&'a str> {
    let head_end = body_offset(buf).map_or(buf.len(), |off| off - 4);
    let head = &buf[..head_end];

    for line in head.split(|&b| b == b'\n') {
        let Ok(line) = std::str::from_utf8(line) else {
            continue;
        };
        let line = line.trim_end_matches('\r');
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Declared `Content-Length`, when present and parseable.
#[must_use]
pub fn content_length(buf: &[u8]) -> Option<usize> {
    header_value(buf, "Content-Length")?.parse().ok()
}

/// Returns true if the request asks for a WebSocket upgrade.
#[must_use]
pub fn is_upgrade(buf: &[u8]) -> bool {
    header_value(buf, "Upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Client key from the upgrade request, if present.
#[must_use]
pub fn websocket_key(buf: &[u8]) -> Option<&str> {
    header_value(buf, "Sec-WebSocket-Key")
}

/// Collects a request body of `expected` bytes, starting from whatever
/// arrived with the headers.
///
/// Additional bytes are pulled with `read_more` under a bounded
/// spin-sleep budget: up to [`BODY_RETRY_LIMIT`] consecutive
/// `WouldBlock`s of [`BODY_RETRY_DELAY`] each. Any other error or EOF
/// ends collection with whatever was gathered; dispatch proceeds
/// best-effort.
pub(crate) fn collect_body(
    initial: &[u8],
    expected: usize,
    mut read_more: impl FnMut(&mut [u8]) -> io::Result<ReadOutcome>,
) -> Vec<u8> {
    let mut body = initial.to_vec();
    let mut scratch = [0u8; crate::SCRATCH_BUF_LEN];
    let mut retries = 0;

    while body.len() < expected && retries < BODY_RETRY_LIMIT {
        match read_more(&mut scratch) {
            Ok(ReadOutcome::Data(n)) => {
                body.extend_from_slice(&scratch[..n]);
                retries = 0;
            }
            Ok(ReadOutcome::WouldBlock) => {
                retries += 1;
                std::thread::sleep(BODY_RETRY_DELAY);
            }
            Ok(ReadOutcome::Closed) | Err(_) => break,
        }
    }
    body
}

/// Preflight response: `204 No Content` plus the permissive CORS set.
pub(crate) const OPTIONS_RESPONSE: &[u8] = b"HTTP/1.1 204 No Content\r\n\
Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
Access-Control-Allow-Headers: Content-Type\r\n\
Connection: close\r\n\r\n";

/// Builds a terminal `200 OK` / `404 Not Found` response.
///
/// Every response carries `Access-Control-Allow-Origin: *`,
/// `Content-Length`, and `Connection: close`.
#[must_use]
pub(crate) fn response(found: bool, content_type: &str, body: &[u8]) -> Vec<u8> {
    let status = if found {
        "HTTP/1.1 200 OK"
    } else {
        "HTTP/1.1 404 Not Found"
    };
    let mut out = format!(
        "{status}\r\nContent-Type: {content_type}\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Builds the `101 Switching Protocols` handshake reply.
#[must_use]
pub(crate) fn switching_protocols(accept: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_http(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(is_http(b"POST /4 HTTP/1.1\r\n\r\n"));
        assert!(is_http(b"OPTIONS /1 HTTP/1.1\r\n\r\n"));
        assert!(is_options(b"OPTIONS /1 HTTP/1.1\r\n\r\n"));
        assert!(!is_http(b"\x32rest-of-request"));
        assert!(!is_http(b"PUT /1 HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_command_id_extraction() {
        assert_eq!(http_command_id(b"GET /1 HTTP/1.1\r\n\r\n"), b'1');
        assert_eq!(http_command_id(b"GET /? HTTP/1.1\r\n\r\n"), b'?');
        assert_eq!(http_command_id(b"GET / HTTP/1.1\r\n\r\n"), 0);
        assert_eq!(http_command_id(b"POST /W HTTP/1.1\r\n\r\n"), b'W');
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = b"GET /W HTTP/1.1\r\nupgrade: WebSocket\r\nSec-WebSocket-Key:  abc  \r\n\r\n";
        assert!(is_upgrade(req));
        assert_eq!(websocket_key(req), Some("abc"));
        assert_eq!(header_value(req, "missing"), None);
    }

    #[test]
    fn test_content_length_parsing() {
        let req = b"POST /4 HTTP/1.1\r\nContent-Length: 12\r\n\r\nhello";
        assert_eq!(content_length(req), Some(12));
        assert_eq!(body_offset(req).map(|o| &req[o..]), Some(&b"hello"[..]));

        let bad = b"POST /4 HTTP/1.1\r\nContent-Length: twelve\r\n\r\n";
        assert_eq!(content_length(bad), None);
    }

    #[test]
    fn test_collect_body_reads_until_expected() {
        let mut chunks: Vec<&[u8]> = vec![b" world", b"!"];
        let body = collect_body(b"hello", 12, |buf| {
            if chunks.is_empty() {
                return Ok(ReadOutcome::WouldBlock);
            }
            let chunk = chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(ReadOutcome::Data(chunk.len()))
        });
        assert_eq!(body, b"hello world!");
    }

    #[test]
    fn test_collect_body_gives_up_after_budget() {
        let mut attempts = 0;
        let body = collect_body(b"partial", 64, |_| {
            attempts += 1;
            Ok(ReadOutcome::WouldBlock)
        });
        assert_eq!(body, b"partial");
        assert_eq!(attempts, BODY_RETRY_LIMIT);
    }

    #[test]
    fn test_response_headers() {
        let res = response(true, "application/octet-stream", b"OK");
        let text = String::from_utf8(res).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nOK"));

        let missing = response(false, "application/octet-stream", b"");
        assert!(missing.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn test_switching_protocols_reply() {
        let reply = switching_protocols("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        let text = String::from_utf8(reply).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
