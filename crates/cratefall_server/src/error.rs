//! # Server Error Types
//!
//! Errors surfaced by registration and startup. Runtime I/O faults never
//! reach the caller: they terminate the affected connection on the worker
//! or pump thread that observed them.

use thiserror::Error;

/// Errors that can occur while configuring or starting the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Registration used a reserved command id (`0` or `?`).
    #[error("command id {0:#04x} is reserved")]
    ReservedId(u8),

    /// A command id was registered in both the command and stream tables.
    #[error("command id {0:#04x} already registered with a different endpoint kind")]
    KindCollision(u8),

    /// Registration or hook installation after `start()`.
    #[error("server already started; registration must happen before start()")]
    AlreadyStarted,

    /// `start()` called twice.
    #[error("start() may only be called once")]
    AlreadyRunning,

    /// Worker thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}
