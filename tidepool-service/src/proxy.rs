//! Proxy dispatch with sequential candidate failover.
//!
//! When a processor reports it cannot handle a request locally, the request
//! bytes are forwarded verbatim to an ordered list of remote candidates.
//! Each attempt gets a fresh sub-transport and a fresh timeout; the first
//! well-formed reply wins. The cursor over the candidate list only advances,
//! so no candidate is ever retried within one logical request.

use crate::error::ServiceError;
use crate::framing::{frame_pdu, read_framed_pdu, DEFAULT_MAX_PDU_SIZE};
use std::time::Duration;
use thiserror::Error;
use tidepool_core::{
    DatagramProvider, DatagramSocketTrait, NetworkProvider, Providers, ResolveProvider,
    TimeProvider,
};
use tokio::io::AsyncWriteExt;

/// Largest datagram reply a proxy attempt will accept.
const MAX_DATAGRAM_REPLY: usize = 64 * 1024;

/// Proxy failure visible to the owning session.
///
/// Never fatal: sessions downgrade this to a synthesized error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Every candidate was exhausted without producing a reply.
    #[error("no proxy server available")]
    NoServersAvailable,
}

/// How requests are forwarded to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyVariant {
    /// Full connect per attempt; request and reply use the 4-byte
    /// big-endian length-prefix framing of the primary protocol.
    Stream,

    /// Fresh peer-bound socket per attempt; request and reply are single
    /// unframed datagrams.
    Datagram,
}

/// Configuration for proxy dispatch.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Ordered candidate names, tried in turn. Immutable once built.
    pub candidates: Vec<String>,

    /// Timeout per attempt, reset for every candidate (never cumulative).
    pub attempt_timeout: Duration,

    /// Transport variant used for the sub-transports.
    pub variant: ProxyVariant,

    /// Upper bound on a stream reply payload.
    pub max_reply_size: usize,
}

impl ProxyConfig {
    /// Create a config with the default attempt timeout and reply bound.
    pub fn new(candidates: Vec<String>, variant: ProxyVariant) -> Self {
        Self {
            candidates,
            attempt_timeout: Duration::from_secs(5),
            variant,
            max_reply_size: DEFAULT_MAX_PDU_SIZE,
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// Forward a request to the configured candidates in turn.
///
/// Resolution failures skip the candidate. A send error, timeout, receive
/// error or malformed reply closes that attempt's sub-transport and moves to
/// the next candidate. The first well-formed reply short-circuits.
///
/// # Errors
///
/// [`ProxyError::NoServersAvailable`] when the candidate list is empty or
/// exhausted.
pub async fn proxy_request<P: Providers>(
    providers: &P,
    config: &ProxyConfig,
    request: &[u8],
) -> Result<Vec<u8>, ProxyError> {
    if config.candidates.is_empty() {
        return Err(ProxyError::NoServersAvailable);
    }

    for (attempt, candidate) in config.candidates.iter().enumerate() {
        let address = match providers.resolve().resolve(candidate).await {
            Ok(address) => address,
            Err(e) => {
                tracing::debug!(candidate = %candidate, error = %e, "candidate resolution failed, skipping");
                continue;
            }
        };

        tracing::debug!(attempt, candidate = %candidate, address = %address, "proxy attempt");

        let outcome = match config.variant {
            ProxyVariant::Stream => {
                providers
                    .time()
                    .timeout(
                        config.attempt_timeout,
                        stream_attempt(providers, &address, request, config.max_reply_size),
                    )
                    .await
            }
            ProxyVariant::Datagram => {
                providers
                    .time()
                    .timeout(
                        config.attempt_timeout,
                        datagram_attempt(providers, &address, request),
                    )
                    .await
            }
        };

        match outcome {
            Ok(Ok(reply)) => {
                tracing::debug!(attempt, candidate = %candidate, reply_len = reply.len(), "proxy attempt succeeded");
                return Ok(reply);
            }
            Ok(Err(e)) => {
                tracing::debug!(attempt, candidate = %candidate, error = %e, "proxy attempt failed");
            }
            Err(_) => {
                tracing::debug!(attempt, candidate = %candidate, "proxy attempt timed out");
            }
        }
        // The failed sub-transport is dropped here; the next candidate gets
        // a fresh one.
    }

    Err(ProxyError::NoServersAvailable)
}

async fn stream_attempt<P: Providers>(
    providers: &P,
    address: &str,
    request: &[u8],
    max_reply_size: usize,
) -> Result<Vec<u8>, ServiceError> {
    let mut stream = providers.network().connect(address).await?;
    stream.write_all(&frame_pdu(request)?).await?;
    read_framed_pdu(&mut stream, max_reply_size).await
}

async fn datagram_attempt<P: Providers>(
    providers: &P,
    address: &str,
    request: &[u8],
) -> Result<Vec<u8>, ServiceError> {
    let socket = providers.datagram().connect_datagram(address).await?;
    socket.send(request).await?;
    let mut buf = vec![0u8; MAX_DATAGRAM_REPLY];
    let len = socket.recv(&mut buf).await?;
    buf.truncate(len);
    Ok(buf)
}
