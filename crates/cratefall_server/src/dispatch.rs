//! # Hybrid Request Dispatcher
//!
//! One entry point for all three wire shapes on the listening port. The
//! buffer decides: `GET ` / `POST ` / `OPTIONS ` prefixes are HTTP
//! (possibly carrying a WebSocket upgrade), anything else is a raw binary
//! command whose first byte is the id.
//!
//! Dispatch order: preflight, upgrade, health (id 0), introspection
//! (`?`), registered command, not-found. Every path deregisters the
//! descriptor from the worker's poller before closing it; a successful
//! stream upgrade deregisters *without* closing and hands the descriptor
//! to the broadcast pump.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::os::unix::io::RawFd;
use std::sync::Arc;

use crate::registry::ConnectionId;
use crate::server::ServerShared;
use crate::sys::{self, ReadOutcome, WriteOutcome};
use crate::{codec, http, HEALTH_ID, INTROSPECT_ID, SCRATCH_BUF_LEN, STREAM_SNDBUF_BYTES};

/// JSON body served for the bare-path health probe.
const HEALTH_BODY: &[u8] = br#"{"status":"ok"}"#;

/// Services one readable event on a reactor-owned connection.
pub(crate) fn service_connection(fd: RawFd, epoll: &sys::Epoll, shared: &Arc<ServerShared>) {
    let mut request = Vec::new();
    let mut scratch = [0u8; SCRATCH_BUF_LEN];

    // Drain everything currently available; edge-triggered registration
    // means this event is the only notification for these bytes.
    loop {
        match sys::recv(fd, &mut scratch) {
            Ok(ReadOutcome::Data(n)) => request.extend_from_slice(&scratch[..n]),
            Ok(ReadOutcome::WouldBlock) => break,
            // EOF after data still carries a full request (the peer may
            // shut down its write side immediately after sending).
            Ok(ReadOutcome::Closed) => break,
            Err(err) => {
                tracing::debug!(fd, %err, "read error; dropping connection");
                teardown(fd, epoll);
                return;
            }
        }
    }

    // Readable event with nothing to read: the peer went away or the
    // event was spurious. Either way this connection is done.
    if request.is_empty() {
        teardown(fd, epoll);
        return;
    }

    let is_http = http::is_http(&request);

    if is_http && http::is_options(&request) {
        send_all(fd, http::OPTIONS_RESPONSE);
        teardown(fd, epoll);
        return;
    }

    let cmd_id = if is_http {
        http::http_command_id(&request)
    } else {
        request[0]
    };

    if is_http && http::is_upgrade(&request) {
        upgrade(fd, epoll, shared, &request, cmd_id);
        return;
    }

    let body = extract_body(fd, &request, is_http);
    respond(fd, epoll, shared, cmd_id, &body, is_http);
}

/// Completes the RFC 6455 opening handshake and, for a registered stream
/// id, migrates the descriptor to the broadcast pump.
fn upgrade(fd: RawFd, epoll: &sys::Epoll, shared: &Arc<ServerShared>, request: &[u8], cmd_id: u8) {
    let Some(key) = http::websocket_key(request) else {
        tracing::debug!(fd, "upgrade without Sec-WebSocket-Key");
        teardown(fd, epoll);
        return;
    };

    let reply = http::switching_protocols(&codec::accept_key(key));
    if !send_all(fd, &reply) {
        teardown(fd, epoll);
        return;
    }

    if !shared.registry.is_stream(cmd_id) {
        // Handshake completed, but there is nothing to subscribe to.
        teardown(fd, epoll);
        return;
    }

    let _ = sys::set_nonblocking(fd);
    let _ = sys::set_nodelay(fd);
    if let Err(err) = sys::set_send_buffer(fd, STREAM_SNDBUF_BYTES) {
        tracing::debug!(fd, %err, "could not enlarge subscriber send buffer");
    }

    // Ownership handoff: out of the poller first, then into the
    // subscriber set, so the descriptor is never owned by both.
    epoll.remove(fd);
    shared.subscribers.insert(cmd_id, fd);
    tracing::info!(fd, stream = %(cmd_id as char), "stream subscriber attached");
}

/// Pulls the request body out of the buffered bytes, reading more for a
/// declared `Content-Length` under the bounded retry budget.
fn extract_body(fd: RawFd, request: &[u8], is_http: bool) -> Vec<u8> {
    if !is_http {
        return request[1..].to_vec();
    }
    let Some(offset) = http::body_offset(request) else {
        // Malformed head; proceed best-effort with an empty body.
        return Vec::new();
    };
    let initial = &request[offset..];
    match http::content_length(request) {
        Some(expected) if expected > initial.len() => {
            http::collect_body(initial, expected, |buf| sys::recv(fd, buf))
        }
        _ => initial.to_vec(),
    }
}

/// Runs the dispatch table and writes the terminal response.
fn respond(
    fd: RawFd,
    epoll: &sys::Epoll,
    shared: &Arc<ServerShared>,
    cmd_id: u8,
    body: &[u8],
    is_http: bool,
) {
    let mut content_type = "application/octet-stream";

    let reply: Option<Vec<u8>> = if cmd_id == HEALTH_ID && is_http {
        content_type = "application/json";
        Some(HEALTH_BODY.to_vec())
    } else if cmd_id == INTROSPECT_ID {
        Some(shared.registry.contract_bytes())
    } else if let Some(handler) = shared.registry.command(cmd_id) {
        let outcome = catch_unwind(AssertUnwindSafe(|| handler(ConnectionId(fd), body)));
        match outcome {
            Ok(bytes) => Some(bytes),
            Err(_) => {
                // A faulty handler costs one connection, never the process.
                tracing::error!(fd, id = %(cmd_id as char), "command handler panicked");
                teardown(fd, epoll);
                return;
            }
        }
    } else {
        None
    };

    match reply {
        Some(bytes) => {
            if is_http {
                send_all(fd, &http::response(true, content_type, &bytes));
            } else {
                send_all(fd, &bytes);
            }
        }
        None => {
            if is_http {
                send_all(fd, &http::response(false, content_type, &[]));
            }
            // Unknown raw command: close silently.
        }
    }

    teardown(fd, epoll);
}

/// Deregisters from the poller, then closes. Order matters: the fd must
/// never be closed while still registered.
fn teardown(fd: RawFd, epoll: &sys::Epoll) {
    epoll.remove(fd);
    sys::close(fd);
}

/// Writes the whole buffer with bounded non-blocking retries.
///
/// Responses are small relative to a fresh socket's send buffer, so
/// `WouldBlock` here is rare; the budget mirrors the body collector's.
fn send_all(fd: RawFd, buf: &[u8]) -> bool {
    let mut written = 0;
    let mut retries = 0;
    while written < buf.len() {
        match sys::send(fd, &buf[written..]) {
            Ok(WriteOutcome::Wrote(n)) => {
                written += n;
                retries = 0;
            }
            Ok(WriteOutcome::WouldBlock) => {
                retries += 1;
                if retries >= http::BODY_RETRY_LIMIT {
                    return false;
                }
                std::thread::sleep(http::BODY_RETRY_DELAY);
            }
            Err(err) => {
                tracing::debug!(fd, %err, "send failed");
                return false;
            }
        }
    }
    true
}
