//! Pluggable request processing.
//!
//! The service core hands every complete PDU payload to a
//! [`RequestProcessor`] and acts on the outcome. Processors decode and
//! answer protocol requests; the core never inspects payload bytes itself.

use async_trait::async_trait;

/// One request as seen by a processor.
///
/// The payload has any transport framing already stripped: for stream
/// transports the 4-byte length prefix is gone, for datagram transports the
/// whole packet is the payload.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// The request payload.
    pub payload: &'a [u8],
    /// Address the request arrived from.
    pub source: &'a str,
    /// Local address the request arrived on.
    pub local: &'a str,
    /// True when the transport is a datagram socket.
    pub datagram: bool,
}

/// Outcome of processing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A reply payload to send back to the caller, unframed.
    Reply(Vec<u8>),

    /// The request is valid but cannot be handled locally; forward it to a
    /// remote peer. Only honored when the session's role permits proxying.
    Proxy,

    /// Unrecoverable failure. Fatal on a stream connection; drops the
    /// packet on a datagram socket.
    Failed(String),
}

/// Decodes PDU payloads and produces replies.
///
/// `process` is called from the event loop and must not block the thread;
/// any suspension is the processor's own concern and happens at its own
/// await points.
#[async_trait(?Send)]
pub trait RequestProcessor {
    /// Process one request.
    async fn process(&self, request: RequestContext<'_>) -> ProcessOutcome;

    /// Synthesize a protocol-level "service unavailable" reply for a
    /// request whose proxying failed.
    ///
    /// Returning `Some` guarantees the caller still receives a response
    /// when every proxy candidate has failed. The default of `None` makes
    /// proxy exhaustion terminate a stream session and drop a datagram.
    fn fallback_reply(&self, request: &[u8]) -> Option<Vec<u8>> {
        let _ = request;
        None
    }
}
