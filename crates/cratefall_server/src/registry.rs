//! # Endpoint Registry
//!
//! Maps single command bytes to request/response handlers or stream
//! producers, and keeps the parallel contract table served by the `?`
//! pseudo-endpoint.
//!
//! ## Design
//!
//! Registration happens on one thread, before the reactor starts; the
//! tables are read-only afterwards and shared without locks. A command
//! byte lives in exactly one of the two tables. The reserved ids (`0` for
//! the health probe, `?` for introspection) are rejected outright.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use crate::contract::{EndpointContract, EndpointKind};
use crate::error::ServerError;
use crate::{HEALTH_ID, INTROSPECT_ID};

/// Identifier for a live connection, handed to command handlers.
///
/// Wraps the file descriptor; gameplay handlers key per-connection
/// ownership (which entity a connection controls) off this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub RawFd);

/// Request/response handler: `(connection, request bytes) → response bytes`.
pub type CommandHandler = Box<dyn Fn(ConnectionId, &[u8]) -> Vec<u8> + Send + Sync>;

/// Stream producer: `() → payload bytes`; empty means nothing this tick.
pub type StreamProducer = Box<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Registry of commands, streams, and their wire contracts.
#[derive(Default)]
pub struct EndpointRegistry {
    commands: HashMap<u8, CommandHandler>,
    streams: HashMap<u8, StreamProducer>,
    contracts: Vec<EndpointContract>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_id(&self, id: u8, kind: EndpointKind) -> Result<(), ServerError> {
        if id == HEALTH_ID || id == INTROSPECT_ID {
            return Err(ServerError::ReservedId(id));
        }
        let other_table = match kind {
            EndpointKind::Request => self.streams.contains_key(&id),
            EndpointKind::Stream => self.commands.contains_key(&id),
        };
        if other_table {
            return Err(ServerError::KindCollision(id));
        }
        Ok(())
    }

    /// Registers a request/response handler under `id`.
    ///
    /// A duplicate id in the command table overwrites the handler and
    /// appends a second contract row; callers should avoid this.
    pub fn register_command(
        &mut self,
        id: u8,
        name: &str,
        response_size: u32,
        request_schema: &str,
        response_schema: &str,
        handler: impl Fn(ConnectionId, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) -> Result<(), ServerError> {
        self.check_id(id, EndpointKind::Request)?;
        if self.commands.insert(id, Box::new(handler)).is_some() {
            tracing::warn!(id = %(id as char), "duplicate command registration overwrites handler");
        }
        self.contracts.push(EndpointContract::new(
            id,
            name,
            response_size,
            EndpointKind::Request,
            request_schema,
            response_schema,
        ));
        Ok(())
    }

    /// Registers a stream producer under `id`.
    pub fn register_stream(
        &mut self,
        id: u8,
        name: &str,
        response_size: u32,
        response_schema: &str,
        producer: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) -> Result<(), ServerError> {
        self.check_id(id, EndpointKind::Stream)?;
        if self.streams.insert(id, Box::new(producer)).is_some() {
            tracing::warn!(id = %(id as char), "duplicate stream registration overwrites producer");
        }
        self.contracts.push(EndpointContract::new(
            id,
            name,
            response_size,
            EndpointKind::Stream,
            "",
            response_schema,
        ));
        Ok(())
    }

    /// Looks up a request/response handler.
    #[must_use]
    pub fn command(&self, id: u8) -> Option<&CommandHandler> {
        self.commands.get(&id)
    }

    /// Looks up a stream producer.
    #[must_use]
    pub fn producer(&self, id: u8) -> Option<&StreamProducer> {
        self.streams.get(&id)
    }

    /// Returns true if `id` names a registered stream channel.
    #[must_use]
    pub fn is_stream(&self, id: u8) -> bool {
        self.streams.contains_key(&id)
    }

    /// Ids of all registered stream channels.
    #[must_use]
    pub fn stream_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.streams.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Contract records in registration order.
    #[must_use]
    pub fn contracts(&self) -> &[EndpointContract] {
        &self.contracts
    }

    /// Raw little-endian byte image of the contract array.
    #[must_use]
    pub fn contract_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.contracts).to_vec()
    }
}
