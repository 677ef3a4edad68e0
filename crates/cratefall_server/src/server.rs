//! # Server Façade and Shared State
//!
//! Owns the pieces the threads share: configuration, the read-only
//! endpoint registry, the subscriber table, the disconnect hooks, and the
//! running flag. Registration happens before `start()`; `start()` spawns
//! the reactor workers first and the broadcast pump after them, matching
//! the rule that the pump outlives no worker on the way up and every
//! worker on the way down.

use std::collections::{HashMap, HashSet};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::ServerError;
use crate::registry::{ConnectionId, EndpointRegistry};
use crate::{pump, reactor, sys, LISTEN_BACKLOG};

/// Callback fired when the pump evicts a stream subscriber.
pub type DisconnectHook = Box<dyn Fn(ConnectionId) + Send + Sync>;

/// Server construction parameters.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// TCP port shared by all worker listeners.
    pub port: u16,
    /// Reactor worker count; 0 means one per hardware thread.
    pub workers: usize,
    /// Listen backlog per worker listener.
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            workers: 0,
            backlog: LISTEN_BACKLOG,
        }
    }
}

impl ServerConfig {
    /// Worker count after resolving the automatic setting.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

/// Subscriber sets per stream channel, guarded by one mutex.
///
/// The mutex is held only for insert, set-copy, and removal. Membership
/// changes exactly two ways: a successful upgrade inserts, pump eviction
/// removes.
#[derive(Default)]
pub(crate) struct StreamClients {
    inner: Mutex<HashMap<u8, HashSet<RawFd>>>,
}

impl StreamClients {
    /// Adds an upgraded descriptor to channel `id`.
    pub(crate) fn insert(&self, id: u8, fd: RawFd) {
        self.inner.lock().entry(id).or_default().insert(fd);
    }

    /// Copies the current subscriber set of channel `id`.
    pub(crate) fn snapshot(&self, id: u8) -> Vec<RawFd> {
        self.inner
            .lock()
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Removes and closes evicted descriptors under one lock hold.
    pub(crate) fn remove_and_close(&self, id: u8, fds: &[RawFd]) {
        let mut inner = self.inner.lock();
        if let Some(set) = inner.get_mut(&id) {
            for &fd in fds {
                if set.remove(&fd) {
                    sys::close(fd);
                }
            }
        }
    }

    /// Number of subscribers currently attached to channel `id`.
    pub(crate) fn count(&self, id: u8) -> usize {
        self.inner.lock().get(&id).map_or(0, HashSet::len)
    }
}

/// State shared by reactor workers and the broadcast pump.
pub(crate) struct ServerShared {
    pub(crate) config: ServerConfig,
    pub(crate) registry: EndpointRegistry,
    pub(crate) subscribers: StreamClients,
    pub(crate) hooks: Vec<DisconnectHook>,
    pub(crate) running: AtomicBool,
}

/// The hybrid binary/HTTP/WebSocket command server.
///
/// Lifecycle: construct, register endpoints and hooks, `start()`,
/// `join()`. `shutdown()` (from any thread) makes `join()` return.
pub struct Server {
    config: ServerConfig,
    registry: EndpointRegistry,
    hooks: Vec<DisconnectHook>,
    shared: Option<Arc<ServerShared>>,
    workers: Vec<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl Server {
    /// Creates an unstarted server.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: EndpointRegistry::new(),
            hooks: Vec::new(),
            shared: None,
            workers: Vec::new(),
            pump: None,
        }
    }

    /// Port the server was configured with.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.config.port
    }

    fn pre_start_mut(&mut self) -> Result<&mut EndpointRegistry, ServerError> {
        if self.shared.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        Ok(&mut self.registry)
    }

    /// Registers a request/response handler. Must precede `start()`.
    ///
    /// # Errors
    ///
    /// Rejects reserved ids (`0`, `?`), ids registered as streams, and
    /// registration after start.
    pub fn register_command(
        &mut self,
        id: u8,
        name: &str,
        response_size: u32,
        request_schema: &str,
        response_schema: &str,
        handler: impl Fn(ConnectionId, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) -> Result<(), ServerError> {
        self.pre_start_mut()?.register_command(
            id,
            name,
            response_size,
            request_schema,
            response_schema,
            handler,
        )
    }

    /// Registers a stream producer. Must precede `start()`.
    ///
    /// # Errors
    ///
    /// Rejects reserved ids (`0`, `?`), ids registered as commands, and
    /// registration after start.
    pub fn register_stream(
        &mut self,
        id: u8,
        name: &str,
        response_size: u32,
        response_schema: &str,
        producer: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) -> Result<(), ServerError> {
        self.pre_start_mut()?
            .register_stream(id, name, response_size, response_schema, producer)
    }

    /// Registers a disconnect callback, fired on pump eviction.
    ///
    /// Hooks run on the pump thread after the subscriber mutex is
    /// released; a hook that needs collaborator locks must take them in
    /// the documented order and finish quickly.
    ///
    /// # Errors
    ///
    /// Rejects installation after `start()`.
    pub fn on_disconnect(
        &mut self,
        hook: impl Fn(ConnectionId) + Send + Sync + 'static,
    ) -> Result<(), ServerError> {
        if self.shared.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        self.hooks.push(Box::new(hook));
        Ok(())
    }

    /// Spawns the reactor workers, then the broadcast pump.
    ///
    /// # Errors
    ///
    /// Fails if called twice or if a thread cannot be spawned. A worker
    /// that cannot bind aborts itself and is logged, not surfaced here.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.shared.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let shared = Arc::new(ServerShared {
            config: self.config.clone(),
            registry: std::mem::take(&mut self.registry),
            subscribers: StreamClients::default(),
            hooks: std::mem::take(&mut self.hooks),
            running: AtomicBool::new(true),
        });

        let worker_count = self.config.resolved_workers();
        for worker_id in 0..worker_count {
            let worker_shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("reactor-{worker_id}"))
                .spawn(move || reactor::run_worker(worker_id, &worker_shared))
                .map_err(ServerError::Spawn)?;
            self.workers.push(handle);
        }

        // The pump starts only after every worker is spawned.
        let pump_shared = Arc::clone(&shared);
        let pump_handle = std::thread::Builder::new()
            .name("broadcast-pump".into())
            .spawn(move || pump::run_pump(&pump_shared))
            .map_err(ServerError::Spawn)?;
        self.pump = Some(pump_handle);

        tracing::info!(
            port = self.config.port,
            workers = worker_count,
            "server started"
        );
        self.shared = Some(shared);
        Ok(())
    }

    /// Blocks until the workers exit, then stops and joins the pump.
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        // Workers are gone; the pump stops after them.
        if let Some(shared) = &self.shared {
            shared.running.store(false, Ordering::Relaxed);
        }
        if let Some(handle) = self.pump.take() {
            let _ = handle.join();
        }
    }

    /// Signals every thread to wind down; `join()` then returns.
    pub fn shutdown(&self) {
        if let Some(shared) = &self.shared {
            shared.running.store(false, Ordering::Relaxed);
        }
    }

    /// Returns true between `start()` and `shutdown()`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|shared| shared.running.load(Ordering::Relaxed))
    }

    /// Current subscriber count of a stream channel (observability and
    /// tests).
    #[must_use]
    pub fn subscriber_count(&self, id: u8) -> usize {
        self.shared
            .as_ref()
            .map_or(0, |shared| shared.subscribers.count(id))
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}
