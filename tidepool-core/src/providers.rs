//! Provider bundle trait for simplified type parameters.
//!
//! Without bundling, service code must carry five separate type parameters:
//!
//! ```text
//! struct MyServer<N, D, T, TP, R>
//! where
//!     N: NetworkProvider + 'static,
//!     D: DatagramProvider + 'static,
//!     T: TimeProvider + 'static,
//!     TP: TaskProvider + 'static,
//!     R: ResolveProvider + 'static,
//! ```
//!
//! With bundling, this simplifies to:
//!
//! ```text
//! struct MyServer<P: Providers>
//! ```

use crate::{
    DatagramProvider, NetworkProvider, ResolveProvider, TaskProvider, TimeProvider,
    TokioDatagramProvider, TokioNetworkProvider, TokioResolveProvider, TokioTaskProvider,
    TokioTimeProvider,
};

/// Bundle of all provider types for a runtime environment.
///
/// The trait uses associated types to preserve type information at compile
/// time without runtime dispatch. Accessor methods give convenient access to
/// individual providers while maintaining the bundle.
///
/// ## Implementations
///
/// - [`TokioProviders`]: production providers using the real Tokio runtime
/// - scripted test bundles live next to the tests that use them
pub trait Providers: Clone + 'static {
    /// Network provider type for stream connections and listeners.
    type Network: NetworkProvider + 'static;

    /// Datagram provider type for connectionless sockets.
    type Datagram: DatagramProvider + 'static;

    /// Time provider type for sleep, timeout, and time queries.
    type Time: TimeProvider + 'static;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider + 'static;

    /// Resolver type for candidate name resolution.
    type Resolve: ResolveProvider + 'static;

    /// Get the network provider instance.
    fn network(&self) -> &Self::Network;

    /// Get the datagram provider instance.
    fn datagram(&self) -> &Self::Datagram;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;

    /// Get the resolver instance.
    fn resolve(&self) -> &Self::Resolve;
}

/// Production providers using the Tokio runtime.
#[derive(Clone)]
pub struct TokioProviders {
    network: TokioNetworkProvider,
    datagram: TokioDatagramProvider,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
    resolve: TokioResolveProvider,
}

impl TokioProviders {
    /// Create a new production providers bundle.
    pub fn new() -> Self {
        Self {
            network: TokioNetworkProvider::new(),
            datagram: TokioDatagramProvider::new(),
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
            resolve: TokioResolveProvider::new(),
        }
    }
}

impl Default for TokioProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl Providers for TokioProviders {
    type Network = TokioNetworkProvider;
    type Datagram = TokioDatagramProvider;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;
    type Resolve = TokioResolveProvider;

    fn network(&self) -> &Self::Network {
        &self.network
    }

    fn datagram(&self) -> &Self::Datagram {
        &self.datagram
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn resolve(&self) -> &Self::Resolve {
        &self.resolve
    }
}
