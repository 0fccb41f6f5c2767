//! Per-transport session loops.
//!
//! A session exclusively owns its transport and the send queue wrapping it.
//! Stream sessions run one loop per connection; datagram sessions run one
//! loop per socket. Both hand payloads to the pluggable
//! [`RequestProcessor`](crate::RequestProcessor) and optionally fall back to
//! proxy dispatch.

mod datagram;
mod stream;

pub use datagram::run_datagram_session;
pub use stream::run_stream_session;

use crate::framing::DEFAULT_MAX_PDU_SIZE;
use crate::proxy::ProxyConfig;

/// Whether a session may forward unhandled requests to remote peers.
///
/// Proxying is a role decision: a secondary/read-only service forwards what
/// it cannot answer, an authoritative one treats the same signal as fatal.
#[derive(Debug, Clone)]
pub enum ProxyPolicy {
    /// `Proxy` outcomes are a processing failure.
    Deny,

    /// `Proxy` outcomes are forwarded per the given configuration.
    Forward(ProxyConfig),
}

/// Configuration shared by stream and datagram sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a single inbound PDU payload.
    pub max_pdu_size: usize,

    /// Proxy role of this session.
    pub proxy: ProxyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            proxy: ProxyPolicy::Deny,
        }
    }
}

impl SessionConfig {
    /// Permit proxying with the given configuration.
    pub fn with_proxy(mut self, config: ProxyConfig) -> Self {
        self.proxy = ProxyPolicy::Forward(config);
        self
    }
}
