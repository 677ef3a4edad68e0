//! # Cratefall Server
//!
//! A single-process command server that speaks three wire shapes on one
//! listening port: raw single-byte binary commands, plain HTTP/1.1, and
//! RFC 6455 WebSocket upgrades for fan-out streaming.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CRATEFALL SERVER                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │  │ Reactor Pool │   │  Dispatcher  │   │ Broadcast    │     │
//! │  │ (W × epoll)  │──▶│ (raw/HTTP/WS)│──▶│ Pump (60Hz)  │     │
//! │  └──────────────┘   └──────────────┘   └──────────────┘     │
//! │         │                  │                  │              │
//! │         └──────────────────┼──────────────────┘              │
//! │                            ▼                                 │
//! │              ┌─────────────────────────┐                     │
//! │              │   Endpoint Registry     │                     │
//! │              │  - command handlers     │                     │
//! │              │  - stream producers     │                     │
//! │              │  - wire contracts (`?`) │                     │
//! │              └─────────────────────────┘                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every reactor worker owns a private epoll instance and its own
//! `SO_REUSEPORT` listener; the kernel load-balances `accept` across
//! them, so no accept queue or cross-worker lock exists. Connections are
//! serviced to completion on the worker that accepted them, except for
//! successful stream upgrades, which migrate the descriptor to the single
//! broadcast pump.
//!
//! ## Back-pressure policy
//!
//! Subscribers are never buffered for. A subscriber that cannot absorb a
//! full frame in one non-blocking send is dropped; transient `EAGAIN`
//! with nothing written is tolerated. Memory stays bounded and the pump
//! cadence never couples to the slowest client.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cratefall_server::{Server, ServerConfig};
//!
//! let mut server = Server::new(ServerConfig::default());
//! server.register_command(b'2', "GetSystemStatus", 2, "", "c2:status",
//!     |_conn, _body| b"OK".to_vec())?;
//! server.start()?;
//! server.join();
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod contract;
pub mod error;
pub mod http;
pub mod registry;
pub mod server;
pub mod snapshot;

mod dispatch;
mod pump;
mod reactor;
mod sys;

pub use contract::{EndpointContract, EndpointKind};
pub use error::ServerError;
pub use registry::{CommandHandler, ConnectionId, EndpointRegistry, StreamProducer};
pub use server::{Server, ServerConfig};
pub use snapshot::SharedSnapshot;

/// Broadcast and simulation cadence (frames per second).
pub const BROADCAST_HZ: u32 = 60;

/// Nanoseconds between pump ticks at [`BROADCAST_HZ`].
pub const TICK_INTERVAL_NANOS: u64 = 1_000_000_000 / BROADCAST_HZ as u64;

/// Per-event scratch buffer for reactor reads.
pub const SCRATCH_BUF_LEN: usize = 8192;

/// Listen backlog requested for every worker listener.
pub const LISTEN_BACKLOG: i32 = 1024;

/// Send-buffer size requested for upgraded stream subscribers.
pub const STREAM_SNDBUF_BYTES: usize = 128 * 1024;

/// Command id reserved for the HTTP health probe (bare `/` path).
pub const HEALTH_ID: u8 = 0;

/// Command id reserved for contract introspection.
pub const INTROSPECT_ID: u8 = b'?';
