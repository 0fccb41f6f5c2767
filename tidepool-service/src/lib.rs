//! # tidepool-service
//!
//! An asynchronous, length-prefixed request/response service core for
//! stream and datagram transports.
//!
//! The crate provides the machinery shared by a family of small network
//! services: generic PDU framing over byte streams, per-transport write
//! serialization, per-connection session loops, and proxying of requests a
//! service cannot answer locally to an ordered list of remote candidates
//! with per-attempt timeouts.
//!
//! ## Architecture
//!
//! - [`framing`]: reads one PDU from a stream by growing a buffer under a
//!   completion predicate; the stream protocol is a 4-byte big-endian length
//!   prefix followed by an opaque payload.
//! - [`SendQueue`]: a writer actor that serializes all writers on one
//!   transport into strictly ordered sequential writes.
//! - [`run_stream_session`] / [`run_datagram_session`]: per-transport loops
//!   driving read, process, optional proxy, and reply.
//! - [`proxy_request`]: sequential candidate failover with a fresh
//!   sub-transport and a reset timeout per attempt.
//! - [`StreamServer`] / [`DatagramServer`]: front-ends owning the listener,
//!   the live-session registry and the lifecycle hooks.
//!
//! Everything is single-threaded and cooperative: all I/O suspends at await
//! points, protocol processing must return rather than block, and no type
//! here carries a `Send` bound.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod framing;
pub mod processor;
pub mod proxy;
pub mod send_queue;
pub mod server;
pub mod session;

pub use error::ServiceError;
pub use framing::{
    frame_header, frame_pdu, length_prefixed, read_framed_pdu, read_pdu, FrameError, PduStatus,
    DEFAULT_MAX_PDU_SIZE, LENGTH_PREFIX_SIZE,
};
pub use processor::{ProcessOutcome, RequestContext, RequestProcessor};
pub use proxy::{proxy_request, ProxyConfig, ProxyError, ProxyVariant};
pub use send_queue::{SendQueue, SendQueueError};
pub use server::{ConnectionId, DatagramServer, NullHooks, SessionHooks, StreamServer};
pub use session::{run_datagram_session, run_stream_session, ProxyPolicy, SessionConfig};
