//! PDU framing for stream transports.
//!
//! Stream protocol: `[length:4 BE][payload:N]` where the prefix counts the
//! payload only. [`read_pdu`] is the generic reader: it grows an owned
//! buffer under a caller-supplied completion predicate, which supports both
//! the fixed-header-then-length protocol used here and protocols that
//! discover their length one byte at a time.

use crate::error::ServiceError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the big-endian length prefix on stream PDUs.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default upper bound on a single PDU, header included.
///
/// The protocols this core serves exchange small request/response messages;
/// bounding the buffer keeps a malformed or hostile length field from
/// growing an allocation without limit.
pub const DEFAULT_MAX_PDU_SIZE: usize = 4 * 1024 * 1024;

/// Framing violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A completion function requested a next size that does not grow the
    /// buffer. Rejected to prevent an infinite read loop.
    #[error("invalid buffer size: requested {requested} bytes but buffer already holds {current}")]
    InvalidBufferSize {
        /// Bytes currently buffered.
        current: usize,
        /// The size the completion function asked for.
        requested: usize,
    },

    /// The PDU would exceed the configured maximum size.
    #[error("pdu too large: {size} bytes (max {max})")]
    PduTooLarge {
        /// The size the PDU claimed or grew to.
        size: usize,
        /// The configured bound.
        max: usize,
    },
}

/// Verdict of a completion function over the bytes read so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduStatus {
    /// The buffer holds exactly one complete PDU.
    Complete,

    /// More bytes are needed: `Some(n)` grows the buffer to exactly `n`
    /// total bytes, `None` grows it by a single byte (length not yet
    /// discoverable).
    NeedMore(Option<usize>),
}

/// Read one PDU from a stream transport.
///
/// Reads exactly `initial_size` bytes first, then calls `completion` after
/// every read until it reports [`PduStatus::Complete`]. Returns full
/// ownership of the completed buffer.
///
/// # Errors
///
/// - the transport's `io::Error` on a short read
/// - [`FrameError::InvalidBufferSize`] if `completion` requests a size that
///   is not strictly larger than the current buffer
/// - [`FrameError::PduTooLarge`] if the buffer would exceed `max_size`
pub async fn read_pdu<S, F>(
    stream: &mut S,
    initial_size: usize,
    max_size: usize,
    mut completion: F,
) -> Result<Vec<u8>, ServiceError>
where
    S: AsyncRead + Unpin,
    F: FnMut(&[u8]) -> Result<PduStatus, FrameError>,
{
    if initial_size > max_size {
        return Err(FrameError::PduTooLarge {
            size: initial_size,
            max: max_size,
        }
        .into());
    }

    let mut buf = vec![0u8; initial_size];
    stream.read_exact(&mut buf).await?;

    loop {
        let target = match completion(&buf)? {
            PduStatus::Complete => return Ok(buf),
            PduStatus::NeedMore(Some(target)) => {
                if target <= buf.len() {
                    return Err(FrameError::InvalidBufferSize {
                        current: buf.len(),
                        requested: target,
                    }
                    .into());
                }
                target
            }
            PduStatus::NeedMore(None) => buf.len() + 1,
        };

        if target > max_size {
            return Err(FrameError::PduTooLarge {
                size: target,
                max: max_size,
            }
            .into());
        }

        let filled = buf.len();
        buf.resize(target, 0);
        stream.read_exact(&mut buf[filled..]).await?;
    }
}

/// Completion function for the 4-byte big-endian length-prefix protocol.
///
/// After the prefix is buffered, requests growth to `4 + length` and reports
/// completion once the payload is fully present.
pub fn length_prefixed(buf: &[u8]) -> Result<PduStatus, FrameError> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(PduStatus::NeedMore(Some(LENGTH_PREFIX_SIZE)));
    }

    let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let total = LENGTH_PREFIX_SIZE + payload_len;
    if buf.len() < total {
        Ok(PduStatus::NeedMore(Some(total)))
    } else {
        Ok(PduStatus::Complete)
    }
}

/// Read one length-prefixed PDU and return the payload, header stripped.
///
/// `max_size` bounds the payload; the 4-byte header is accounted for
/// internally.
pub async fn read_framed_pdu<S>(stream: &mut S, max_size: usize) -> Result<Vec<u8>, ServiceError>
where
    S: AsyncRead + Unpin,
{
    let mut pdu = read_pdu(
        stream,
        LENGTH_PREFIX_SIZE,
        max_size.saturating_add(LENGTH_PREFIX_SIZE),
        length_prefixed,
    )
    .await?;
    pdu.drain(..LENGTH_PREFIX_SIZE);
    Ok(pdu)
}

/// Encode the 4-byte big-endian length prefix for a payload.
///
/// # Errors
///
/// [`FrameError::PduTooLarge`] when the length does not fit the 32-bit
/// prefix; a truncated prefix would put a corrupt frame on the wire.
pub fn frame_header(payload_len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], FrameError> {
    match u32::try_from(payload_len) {
        Ok(len) => Ok(len.to_be_bytes()),
        Err(_) => Err(FrameError::PduTooLarge {
            size: payload_len,
            max: u32::MAX as usize,
        }),
    }
}

/// Frame a payload as a single contiguous `[length:4 BE][payload]` buffer.
///
/// Used by the proxy dispatcher when forwarding a request over a stream
/// sub-transport; the primary reply path submits header and payload as a
/// two-part write instead.
///
/// # Errors
///
/// [`FrameError::PduTooLarge`] when the payload length does not fit the
/// 32-bit prefix.
pub fn frame_pdu(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&frame_header(payload.len())?);
    framed.extend_from_slice(payload);
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_is_big_endian() {
        assert_eq!(frame_header(5).expect("header"), [0, 0, 0, 5]);
        assert_eq!(frame_header(0x0102_0304).expect("header"), [1, 2, 3, 4]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn frame_header_rejects_length_exceeding_prefix() {
        let oversized = u32::MAX as usize + 1;
        assert_eq!(
            frame_header(oversized),
            Err(FrameError::PduTooLarge {
                size: oversized,
                max: u32::MAX as usize,
            })
        );
    }

    #[test]
    fn frame_pdu_prepends_header() {
        assert_eq!(frame_pdu(b"hello").expect("framed"), b"\x00\x00\x00\x05hello");
        assert_eq!(frame_pdu(b"").expect("framed"), b"\x00\x00\x00\x00");
    }

    #[test]
    fn length_prefixed_reports_total_size() {
        assert_eq!(
            length_prefixed(b"\x00\x00\x00\x05").expect("status"),
            PduStatus::NeedMore(Some(9))
        );
        assert_eq!(
            length_prefixed(b"\x00\x00\x00\x05hello").expect("status"),
            PduStatus::Complete
        );
    }

    #[test]
    fn length_prefixed_empty_payload_is_complete() {
        assert_eq!(
            length_prefixed(b"\x00\x00\x00\x00").expect("status"),
            PduStatus::Complete
        );
    }
}
