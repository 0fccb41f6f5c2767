//! # tidepool-core
//!
//! Provider traits and production implementations for the tidepool service
//! framework.
//!
//! The framework runs arbitrarily many connections on a single-threaded
//! cooperative runtime; everything here is `?Send` and providers are cheap
//! `Clone` handles:
//!
//! - [`NetworkProvider`]: stream transport creation (listeners, connects)
//! - [`DatagramProvider`]: connectionless transport creation
//! - [`TimeProvider`]: sleep, timeout, and time queries
//! - [`TaskProvider`]: spawning named local tasks
//! - [`ResolveProvider`]: peer name resolution
//!
//! The [`Providers`] bundle collapses the five type parameters into one so
//! downstream code can be written as `fn serve<P: Providers>(...)`.
//!
//! Production code uses [`TokioProviders`]; tests substitute scripted
//! in-memory providers without touching real sockets.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod network;
mod providers;
mod resolve;
mod task;
mod time;

pub use network::{
    DatagramProvider, DatagramSocketTrait, NetworkProvider, TcpListenerTrait,
    TokioDatagramProvider, TokioDatagramSocket, TokioNetworkProvider, TokioTcpListener,
};
pub use providers::{Providers, TokioProviders};
pub use resolve::{ResolveProvider, TokioResolveProvider};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
