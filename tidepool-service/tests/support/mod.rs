//! Scripted in-memory providers for driving the service core in tests.
//!
//! No real sockets: stream transports are `tokio::io::duplex` pairs, and
//! datagram sockets exchange packets through a shared in-memory ether. Each
//! test runs on a current-thread runtime inside a `LocalSet`, matching the
//! single-threaded model of the crate.

#![allow(dead_code)]

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use tidepool_service::{ProcessOutcome, RequestContext, RequestProcessor};
use tidepool_core::{
    DatagramProvider, DatagramSocketTrait, NetworkProvider, Providers, ResolveProvider,
    TcpListenerTrait, TokioTaskProvider, TokioTimeProvider,
};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

/// Run a future to completion on a current-thread runtime with a LocalSet.
///
/// Tracing output is enabled via `RUST_LOG` and routed to the test writer.
pub fn run_local<F: Future>(future: F) -> F::Output {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build local runtime");
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, future)
}

type ServeFn = Box<dyn FnOnce(DuplexStream) -> Pin<Box<dyn Future<Output = ()>>>>;

/// What one connect attempt against an address should do.
pub enum ConnectPlan {
    /// Fail immediately with ConnectionRefused.
    Refuse,
    /// Never complete the connect (tests timeout handling).
    Hang,
    /// Succeed; the given function drives the server half of the pair.
    Serve(ServeFn),
}

#[derive(Default)]
struct ScriptedNetInner {
    plans: HashMap<String, VecDeque<ConnectPlan>>,
    listeners: HashMap<String, mpsc::UnboundedSender<(DuplexStream, String)>>,
    connect_log: Vec<String>,
}

/// Stream network provider driven by per-address connect plans.
#[derive(Clone, Default)]
pub struct ScriptedNet {
    inner: Rc<RefCell<ScriptedNetInner>>,
}

impl ScriptedNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plan for the next connect to `addr`.
    pub fn plan_connect(&self, addr: &str, plan: ConnectPlan) {
        self.inner
            .borrow_mut()
            .plans
            .entry(addr.to_string())
            .or_default()
            .push_back(plan);
    }

    /// Queue a successful connect whose far end is driven by `serve`.
    pub fn serve_with<F, Fut>(&self, addr: &str, serve: F)
    where
        F: FnOnce(DuplexStream) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.plan_connect(
            addr,
            ConnectPlan::Serve(Box::new(move |stream| Box::pin(serve(stream)))),
        );
    }

    /// Addresses connected to so far, in order.
    pub fn connect_log(&self) -> Vec<String> {
        self.inner.borrow().connect_log.clone()
    }

    /// Push an inbound connection into a bound listener, returning the
    /// client half for the test to drive.
    pub fn dial_in(&self, addr: &str, peer: &str) -> io::Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let inner = self.inner.borrow();
        let tx = inner
            .listeners
            .get(addr)
            .ok_or_else(|| io::Error::other(format!("no listener on {addr}")))?;
        tx.send((server, peer.to_string()))
            .map_err(|_| io::Error::other("listener dropped"))?;
        Ok(client)
    }
}

#[async_trait(?Send)]
impl NetworkProvider for ScriptedNet {
    type TcpStream = DuplexStream;
    type TcpListener = ScriptedListener;

    async fn bind(&self, addr: &str) -> io::Result<Self::TcpListener> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .borrow_mut()
            .listeners
            .insert(addr.to_string(), tx);
        Ok(ScriptedListener {
            local: addr.to_string(),
            rx: RefCell::new(rx),
        })
    }

    async fn connect(&self, addr: &str) -> io::Result<Self::TcpStream> {
        let plan = {
            let mut inner = self.inner.borrow_mut();
            inner.connect_log.push(addr.to_string());
            inner.plans.get_mut(addr).and_then(VecDeque::pop_front)
        };
        match plan {
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no connect plan for {addr}"),
            )),
            Some(ConnectPlan::Refuse) => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused by plan",
            )),
            Some(ConnectPlan::Hang) => std::future::pending().await,
            Some(ConnectPlan::Serve(serve)) => {
                let (client, server) = tokio::io::duplex(64 * 1024);
                tokio::task::spawn_local(serve(server));
                Ok(client)
            }
        }
    }
}

/// Listener fed by [`ScriptedNet::dial_in`].
pub struct ScriptedListener {
    local: String,
    rx: RefCell<mpsc::UnboundedReceiver<(DuplexStream, String)>>,
}

#[async_trait(?Send)]
impl TcpListenerTrait for ScriptedListener {
    type TcpStream = DuplexStream;

    async fn accept(&self) -> io::Result<(Self::TcpStream, String)> {
        self.rx
            .borrow_mut()
            .recv()
            .await
            .ok_or_else(|| io::Error::other("listener closed"))
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(self.local.clone())
    }
}

#[derive(Default)]
struct EtherInner {
    sockets: HashMap<String, mpsc::UnboundedSender<(Vec<u8>, String)>>,
    black_holes: HashSet<String>,
    next_ephemeral: u64,
}

/// In-memory datagram fabric.
#[derive(Clone, Default)]
pub struct MockEther {
    inner: Rc<RefCell<EtherInner>>,
}

impl MockEther {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `addr` swallow every packet sent to it (nothing is delivered,
    /// the send still succeeds). Used to exercise reply timeouts.
    pub fn black_hole(&self, addr: &str) {
        self.inner.borrow_mut().black_holes.insert(addr.to_string());
    }

    fn register(&self, addr: &str) -> mpsc::UnboundedReceiver<(Vec<u8>, String)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .borrow_mut()
            .sockets
            .insert(addr.to_string(), tx);
        rx
    }

    fn deliver(&self, dest: &str, payload: Vec<u8>, from: &str) -> io::Result<usize> {
        let len = payload.len();
        let inner = self.inner.borrow();
        if inner.black_holes.contains(dest) {
            return Ok(len);
        }
        let tx = inner.sockets.get(dest).ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no socket at {dest}"))
        })?;
        tx.send((payload, from.to_string()))
            .map_err(|_| io::Error::other("socket closed"))?;
        Ok(len)
    }
}

#[async_trait(?Send)]
impl DatagramProvider for MockEther {
    type Socket = MockDatagramSocket;

    async fn bind_datagram(&self, addr: &str) -> io::Result<Self::Socket> {
        let rx = self.register(addr);
        Ok(MockDatagramSocket {
            ether: self.clone(),
            local: addr.to_string(),
            peer: None,
            rx: RefCell::new(rx),
        })
    }

    async fn connect_datagram(&self, addr: &str) -> io::Result<Self::Socket> {
        let local = {
            let mut inner = self.inner.borrow_mut();
            inner.next_ephemeral += 1;
            format!("ephemeral-{}", inner.next_ephemeral)
        };
        let rx = self.register(&local);
        Ok(MockDatagramSocket {
            ether: self.clone(),
            local,
            peer: Some(addr.to_string()),
            rx: RefCell::new(rx),
        })
    }
}

/// One endpoint on the mock ether.
pub struct MockDatagramSocket {
    ether: MockEther,
    local: String,
    peer: Option<String>,
    rx: RefCell<mpsc::UnboundedReceiver<(Vec<u8>, String)>>,
}

#[async_trait(?Send)]
impl DatagramSocketTrait for MockDatagramSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, String)> {
        let (payload, from) = self
            .rx
            .borrow_mut()
            .recv()
            .await
            .ok_or_else(|| io::Error::other("socket closed"))?;
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((len, from))
    }

    async fn send_to(&self, buf: &[u8], dest: &str) -> io::Result<usize> {
        self.ether.deliver(dest, buf.to_vec(), &self.local)
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, _) = self.recv_from(buf).await?;
        Ok(len)
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        match &self.peer {
            Some(peer) => self.ether.deliver(peer, buf.to_vec(), &self.local),
            None => Err(io::Error::other("socket has no peer")),
        }
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(self.local.clone())
    }
}

/// Resolver backed by a map; unmapped names resolve to themselves.
#[derive(Clone, Default)]
pub struct MapResolver {
    inner: Rc<RefCell<HashMap<String, Result<String, String>>>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, name: &str, addr: &str) {
        self.inner
            .borrow_mut()
            .insert(name.to_string(), Ok(addr.to_string()));
    }

    pub fn fail(&self, name: &str) {
        self.inner
            .borrow_mut()
            .insert(name.to_string(), Err(format!("cannot resolve {name}")));
    }
}

#[async_trait(?Send)]
impl ResolveProvider for MapResolver {
    async fn resolve(&self, name: &str) -> io::Result<String> {
        match self.inner.borrow().get(name) {
            Some(Ok(addr)) => Ok(addr.clone()),
            Some(Err(message)) => Err(io::Error::other(message.clone())),
            None => Ok(name.to_string()),
        }
    }
}

/// Provider bundle wired to the scripted implementations.
#[derive(Clone)]
pub struct TestProviders {
    pub net: ScriptedNet,
    pub ether: MockEther,
    pub time: TokioTimeProvider,
    pub task: TokioTaskProvider,
    pub resolver: MapResolver,
}

impl TestProviders {
    pub fn new() -> Self {
        Self {
            net: ScriptedNet::new(),
            ether: MockEther::new(),
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
            resolver: MapResolver::new(),
        }
    }
}

impl Providers for TestProviders {
    type Network = ScriptedNet;
    type Datagram = MockEther;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;
    type Resolve = MapResolver;

    fn network(&self) -> &Self::Network {
        &self.net
    }

    fn datagram(&self) -> &Self::Datagram {
        &self.ether
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn resolve(&self) -> &Self::Resolve {
        &self.resolver
    }
}

/// Processor driven by a closure over the request payload.
pub struct FnProcessor<F> {
    process: F,
    fallback: Option<Vec<u8>>,
}

impl<F> FnProcessor<F>
where
    F: Fn(RequestContext<'_>) -> ProcessOutcome,
{
    pub fn new(process: F) -> Self {
        Self {
            process,
            fallback: None,
        }
    }

    /// Reply synthesized when proxying fails.
    pub fn with_fallback(mut self, reply: &[u8]) -> Self {
        self.fallback = Some(reply.to_vec());
        self
    }
}

#[async_trait(?Send)]
impl<F> RequestProcessor for FnProcessor<F>
where
    F: Fn(RequestContext<'_>) -> ProcessOutcome,
{
    async fn process(&self, request: RequestContext<'_>) -> ProcessOutcome {
        (self.process)(request)
    }

    fn fallback_reply(&self, request: &[u8]) -> Option<Vec<u8>> {
        let _ = request;
        self.fallback.clone()
    }
}
