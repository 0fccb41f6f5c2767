//! Name resolution abstraction.
//!
//! The proxy dispatcher resolves each candidate name just before connecting
//! to it; a resolution failure skips that candidate rather than failing the
//! whole request. Abstracting the resolver keeps that path testable without
//! DNS.

use async_trait::async_trait;
use std::io;

/// Provider trait for resolving peer names to connectable addresses.
#[async_trait(?Send)]
pub trait ResolveProvider: Clone {
    /// Resolve a `host:port` name to a concrete `address:port` string.
    async fn resolve(&self, name: &str) -> io::Result<String>;
}

/// Real resolver using Tokio's host lookup.
#[derive(Debug, Clone)]
pub struct TokioResolveProvider;

impl TokioResolveProvider {
    /// Create a new Tokio resolver.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioResolveProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ResolveProvider for TokioResolveProvider {
    async fn resolve(&self, name: &str) -> io::Result<String> {
        let mut addrs = tokio::net::lookup_host(name).await?;
        match addrs.next() {
            Some(addr) => Ok(addr.to_string()),
            None => Err(io::Error::other(format!("no addresses for {name}"))),
        }
    }
}
