//! Transport provider abstractions for stream and datagram endpoints.
//!
//! Trait-based networking so the service core can run against real Tokio
//! sockets in production and scripted in-memory transports in tests.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Provider trait for creating stream connections and listeners.
///
/// Single-core design - no Send bounds needed.
/// Clone allows sharing providers across many sessions efficiently.
#[async_trait(?Send)]
pub trait NetworkProvider: Clone {
    /// The stream type for this provider.
    type TcpStream: AsyncRead + AsyncWrite + Unpin + 'static;
    /// The listener type for this provider.
    type TcpListener: TcpListenerTrait<TcpStream = Self::TcpStream> + 'static;

    /// Create a listener bound to the given address.
    async fn bind(&self, addr: &str) -> io::Result<Self::TcpListener>;

    /// Connect to a remote address.
    async fn connect(&self, addr: &str) -> io::Result<Self::TcpStream>;
}

/// Trait for listeners that can accept stream connections.
#[async_trait(?Send)]
pub trait TcpListenerTrait {
    /// The stream type that this listener produces.
    type TcpStream: AsyncRead + AsyncWrite + Unpin + 'static;

    /// Accept a single incoming connection.
    ///
    /// Returns the connected stream and the peer address.
    async fn accept(&self) -> io::Result<(Self::TcpStream, String)>;

    /// Get the local address this listener is bound to.
    fn local_addr(&self) -> io::Result<String>;
}

/// Provider trait for creating datagram endpoints.
///
/// A datagram socket carries one PDU per packet with no framing. Sockets are
/// either unbound-peer (server side, `recv_from`/`send_to`) or peer-bound
/// (proxy sub-transports, `send`/`recv`).
#[async_trait(?Send)]
pub trait DatagramProvider: Clone {
    /// The socket type for this provider.
    type Socket: DatagramSocketTrait + 'static;

    /// Create a datagram socket bound to the given local address.
    async fn bind_datagram(&self, addr: &str) -> io::Result<Self::Socket>;

    /// Create a fresh socket bound to an ephemeral local address and
    /// connected to the given peer.
    async fn connect_datagram(&self, addr: &str) -> io::Result<Self::Socket>;
}

/// Trait for connectionless packet sockets.
#[async_trait(?Send)]
pub trait DatagramSocketTrait {
    /// Receive a single datagram, returning its size and source address.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, String)>;

    /// Send a single datagram to the given destination address.
    async fn send_to(&self, buf: &[u8], dest: &str) -> io::Result<usize>;

    /// Receive a single datagram on a peer-bound socket.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send a single datagram on a peer-bound socket.
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Get the local address this socket is bound to.
    fn local_addr(&self) -> io::Result<String>;
}

/// Real Tokio networking implementation.
#[derive(Debug, Clone)]
pub struct TokioNetworkProvider;

impl TokioNetworkProvider {
    /// Create a new Tokio network provider.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioNetworkProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl NetworkProvider for TokioNetworkProvider {
    type TcpStream = tokio::net::TcpStream;
    type TcpListener = TokioTcpListener;

    async fn bind(&self, addr: &str) -> io::Result<Self::TcpListener> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        Ok(TokioTcpListener { inner: listener })
    }

    async fn connect(&self, addr: &str) -> io::Result<Self::TcpStream> {
        tokio::net::TcpStream::connect(addr).await
    }
}

/// Wrapper for Tokio TcpListener to implement our trait.
#[derive(Debug)]
pub struct TokioTcpListener {
    inner: tokio::net::TcpListener,
}

#[async_trait(?Send)]
impl TcpListenerTrait for TokioTcpListener {
    type TcpStream = tokio::net::TcpStream;

    async fn accept(&self) -> io::Result<(Self::TcpStream, String)> {
        let (stream, addr) = self.inner.accept().await?;
        Ok((stream, addr.to_string()))
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(self.inner.local_addr()?.to_string())
    }
}

/// Real Tokio datagram implementation over UDP.
#[derive(Debug, Clone)]
pub struct TokioDatagramProvider;

impl TokioDatagramProvider {
    /// Create a new Tokio datagram provider.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioDatagramProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl DatagramProvider for TokioDatagramProvider {
    type Socket = TokioDatagramSocket;

    async fn bind_datagram(&self, addr: &str) -> io::Result<Self::Socket> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        Ok(TokioDatagramSocket { inner: socket })
    }

    async fn connect_datagram(&self, addr: &str) -> io::Result<Self::Socket> {
        // Pick the wildcard of the peer's address family.
        let wildcard = if addr.starts_with('[') {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = tokio::net::UdpSocket::bind(wildcard).await?;
        socket.connect(addr).await?;
        Ok(TokioDatagramSocket { inner: socket })
    }
}

/// Wrapper for Tokio UdpSocket to implement our trait.
#[derive(Debug)]
pub struct TokioDatagramSocket {
    inner: tokio::net::UdpSocket,
}

#[async_trait(?Send)]
impl DatagramSocketTrait for TokioDatagramSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, String)> {
        let (len, addr) = self.inner.recv_from(buf).await?;
        Ok((len, addr.to_string()))
    }

    async fn send_to(&self, buf: &[u8], dest: &str) -> io::Result<usize> {
        self.inner.send_to(buf, dest).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf).await
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf).await
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(self.inner.local_addr()?.to_string())
    }
}
