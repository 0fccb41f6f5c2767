//! Server front-ends: one logical listener per bound address.
//!
//! A [`StreamServer`] owns its listener, a registry of live sessions, and
//! the lifecycle hooks; it spawns one session task per accepted connection.
//! A [`DatagramServer`] owns one socket and runs its session loop directly.
//! The registry is an explicit object owned here and shared by reference,
//! never process-global state.

use crate::error::ServiceError;
use crate::processor::RequestProcessor;
use crate::session::{run_datagram_session, run_stream_session, SessionConfig};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use tidepool_core::{
    DatagramProvider, DatagramSocketTrait, NetworkProvider, Providers, TaskProvider,
    TcpListenerTrait,
};

/// Unique identifier for each accepted connection.
pub type ConnectionId = u64;

/// Session lifecycle hooks exposed to the owning service.
pub trait SessionHooks {
    /// A connection was accepted and its session is about to start.
    fn on_accept(&self, id: ConnectionId, peer: &str) {
        let _ = (id, peer);
    }

    /// A session terminated with the given human-readable reason.
    fn on_terminate(&self, id: ConnectionId, reason: &str) {
        let _ = (id, reason);
    }
}

/// Hooks implementation that does nothing.
#[derive(Debug, Clone, Default)]
pub struct NullHooks;

impl SessionHooks for NullHooks {}

/// Stream server: accept loop plus per-connection session tasks.
pub struct StreamServer<P, H, K = NullHooks>
where
    P: Providers,
    H: ?Sized,
{
    providers: P,
    listener: <P::Network as NetworkProvider>::TcpListener,
    local: String,
    processor: Rc<H>,
    hooks: Rc<K>,
    config: SessionConfig,
    /// Live sessions by id, mapped to their peer address.
    sessions: Rc<RefCell<HashMap<ConnectionId, String>>>,
    next_id: Cell<ConnectionId>,
}

impl<P, H, K> StreamServer<P, H, K>
where
    P: Providers,
    H: RequestProcessor + ?Sized + 'static,
    K: SessionHooks + 'static,
{
    /// Bind a listener and prepare the server.
    pub async fn bind(
        providers: P,
        addr: &str,
        processor: Rc<H>,
        hooks: Rc<K>,
        config: SessionConfig,
    ) -> io::Result<Self> {
        let listener = providers.network().bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(local = %local, "stream server listening");
        Ok(Self {
            providers,
            listener,
            local,
            processor,
            hooks,
            config,
            sessions: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> &str {
        &self.local
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.borrow().len()
    }

    /// Run the accept loop forever.
    ///
    /// Accept failures are logged and retried; a failed accept must not
    /// take down the sessions already running.
    pub async fn run(&self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(local = %self.local, error = %e, "accept failed");
                    self.providers.task().yield_now().await;
                    continue;
                }
            };

            let id = self.next_id.get();
            self.next_id.set(id + 1);
            tracing::debug!(id, peer = %peer, "connection accepted");
            self.hooks.on_accept(id, &peer);
            self.sessions.borrow_mut().insert(id, peer.clone());

            let providers = self.providers.clone();
            let processor = self.processor.clone();
            let hooks = self.hooks.clone();
            let sessions = self.sessions.clone();
            let config = self.config.clone();
            let local = self.local.clone();
            self.providers.task().spawn_task("stream_session", async move {
                let result =
                    run_stream_session(providers, stream, peer.clone(), local, processor, config)
                        .await;
                let reason = termination_reason(&result);
                sessions.borrow_mut().remove(&id);
                tracing::debug!(id, peer = %peer, reason = %reason, "session terminated");
                hooks.on_terminate(id, &reason);
            });
        }
    }
}

/// Datagram server: one socket, one session loop.
pub struct DatagramServer<P, H>
where
    P: Providers,
    H: ?Sized,
{
    providers: P,
    socket: <P::Datagram as DatagramProvider>::Socket,
    local: String,
    processor: Rc<H>,
    config: SessionConfig,
}

impl<P, H> DatagramServer<P, H>
where
    P: Providers,
    H: RequestProcessor + ?Sized + 'static,
{
    /// Bind a datagram socket and prepare the server.
    pub async fn bind(
        providers: P,
        addr: &str,
        processor: Rc<H>,
        config: SessionConfig,
    ) -> io::Result<Self> {
        let socket = providers.datagram().bind_datagram(addr).await?;
        let local = socket.local_addr()?;
        tracing::info!(local = %local, "datagram server listening");
        Ok(Self {
            providers,
            socket,
            local,
            processor,
            config,
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> &str {
        &self.local
    }

    /// Run the receive loop forever.
    pub async fn run(self) {
        run_datagram_session(
            self.providers,
            self.socket,
            self.local,
            self.processor,
            self.config,
        )
        .await;
    }
}

/// Render a session result into the reason string given to hooks.
fn termination_reason(result: &Result<(), ServiceError>) -> String {
    match result {
        Ok(()) => "connection closed by peer".to_string(),
        Err(e) => e.to_string(),
    }
}
