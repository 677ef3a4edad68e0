//! # Broadcast Pump
//!
//! The single thread that publishes stream snapshots to every subscriber.
//! One producer invocation and one framing per channel per tick, then one
//! non-blocking send per subscriber. There is no per-subscriber queue: a
//! subscriber that cannot take a whole frame in one send is evicted, so
//! memory and tail latency stay bounded no matter how slow a client is.
//!
//! ## Locking
//!
//! The subscriber mutex is held only to copy the set out and to remove
//! evicted descriptors, never across producer calls or sends. Disconnect
//! hooks fire after the mutex is released (lock order: `stream_clients` →
//! hook-local locks → registry).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registry::ConnectionId;
use crate::server::ServerShared;
use crate::sys::{self, WriteOutcome};
use crate::{codec, TICK_INTERVAL_NANOS};

/// Body of the broadcast pump thread.
///
/// Advances a monotonic deadline by one tick interval per iteration and
/// sleeps until it, yielding a near-uniform 60 Hz cadence independent of
/// per-tick work cost.
pub(crate) fn run_pump(shared: &Arc<ServerShared>) {
    let stream_ids = shared.registry.stream_ids();
    tracing::info!(streams = stream_ids.len(), "broadcast pump started");

    let tick = Duration::from_nanos(TICK_INTERVAL_NANOS);
    let mut deadline = Instant::now();

    while shared.running.load(Ordering::Relaxed) {
        deadline += tick;

        for &id in &stream_ids {
            broadcast_channel(shared, id);
        }

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }

    tracing::info!("broadcast pump stopped");
}

/// One tick of one channel: snapshot the subscriber set, produce once,
/// frame once, fan out, evict failures.
fn broadcast_channel(shared: &Arc<ServerShared>, id: u8) {
    let subscribers = shared.subscribers.snapshot(id);
    if subscribers.is_empty() {
        return;
    }

    let Some(producer) = shared.registry.producer(id) else {
        return;
    };
    let payload = match catch_unwind(AssertUnwindSafe(producer)) {
        Ok(payload) => payload,
        Err(_) => {
            tracing::error!(stream = %(id as char), "stream producer panicked");
            return;
        }
    };
    // Empty payload: the producer declined this tick (no data yet, or it
    // lost a try-lock race with the simulation writer).
    if payload.is_empty() {
        return;
    }

    let frame = codec::frame(&payload);
    let mut evicted = Vec::new();

    for fd in subscribers {
        match sys::send(fd, &frame) {
            Ok(WriteOutcome::Wrote(n)) if n == frame.len() => {}
            // Transient backpressure with nothing written: the kernel
            // buffer is momentarily full. Keep the subscriber; it misses
            // this frame.
            Ok(WriteOutcome::WouldBlock) => {}
            Ok(WriteOutcome::Wrote(n)) => {
                tracing::debug!(fd, wrote = n, frame = frame.len(), "short write; evicting");
                evicted.push(fd);
            }
            Err(err) => {
                tracing::debug!(fd, %err, "subscriber send failed; evicting");
                evicted.push(fd);
            }
        }
    }

    if evicted.is_empty() {
        return;
    }

    shared.subscribers.remove_and_close(id, &evicted);
    for fd in evicted {
        tracing::info!(fd, stream = %(id as char), "stream subscriber evicted");
        for hook in &shared.hooks {
            hook(ConnectionId(fd));
        }
    }
}
