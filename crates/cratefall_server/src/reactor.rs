//! # Reactor Pool Worker
//!
//! Each worker owns the full accept-and-service path for the connections
//! the kernel hands it: a private `SO_REUSEPORT` listener, a private
//! epoll instance, and an 8 KiB scratch buffer. Nothing is shared between
//! workers except the read-only registry and the subscriber table.
//!
//! The listener is registered level-triggered so pending accepts are
//! never lost; accepted connections are registered edge-triggered
//! readable and serviced to completion on their first readable event.

use std::os::unix::io::RawFd;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::dispatch;
use crate::server::ServerShared;
use crate::sys;

/// Epoll wait bound so workers can observe the shutdown flag.
const WAIT_TIMEOUT_MS: i32 = 100;

/// Body of one reactor worker thread.
///
/// A `bind` failure aborts this worker only; the rest of the pool keeps
/// serving. `accept` failures are logged and retried on the next event.
pub(crate) fn run_worker(worker_id: usize, shared: &Arc<ServerShared>) {
    let port = shared.config.port;

    let listener = match sys::listener(port, shared.config.backlog) {
        Ok(fd) => fd,
        Err(err) => {
            tracing::error!(worker_id, port, %err, "worker failed to bind; aborting worker");
            return;
        }
    };

    let mut epoll = match sys::Epoll::new() {
        Ok(ep) => ep,
        Err(err) => {
            tracing::error!(worker_id, %err, "epoll creation failed; aborting worker");
            sys::close(listener);
            return;
        }
    };
    if let Err(err) = epoll.add_level(listener) {
        tracing::error!(worker_id, %err, "listener registration failed; aborting worker");
        sys::close(listener);
        return;
    }

    tracing::info!(worker_id, port, "reactor worker listening");

    while shared.running.load(Ordering::Relaxed) {
        let ready = match epoll.wait(WAIT_TIMEOUT_MS) {
            Ok(fds) => fds,
            Err(err) => {
                tracing::error!(worker_id, %err, "epoll wait failed");
                break;
            }
        };

        for fd in ready {
            if fd == listener {
                drain_accepts(listener, &epoll);
            } else {
                dispatch::service_connection(fd, &epoll, shared);
            }
        }
    }

    sys::close(listener);
    tracing::debug!(worker_id, "reactor worker exited");
}

/// Accepts until the kernel queue is empty, registering each connection
/// edge-triggered readable.
fn drain_accepts(listener: RawFd, epoll: &sys::Epoll) {
    loop {
        match sys::accept(listener) {
            Ok(Some(conn)) => {
                if sys::set_nonblocking(conn)
                    .and_then(|()| epoll.add_edge(conn))
                    .is_err()
                {
                    sys::close(conn);
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                break;
            }
        }
    }
}
