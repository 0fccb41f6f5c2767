//! Stream connection session.

use crate::error::ServiceError;
use crate::framing::{frame_header, read_framed_pdu};
use crate::processor::{ProcessOutcome, RequestContext, RequestProcessor};
use crate::proxy::proxy_request;
use crate::send_queue::SendQueue;
use crate::session::{ProxyPolicy, SessionConfig};
use std::io;
use std::rc::Rc;
use tidepool_core::Providers;
use tokio::io::{AsyncRead, AsyncWrite};

/// Drive one stream connection until it terminates.
///
/// The loop reads one length-prefixed PDU at a time, hands the payload to
/// the processor, optionally proxies, and submits the framed reply to the
/// connection's send queue. The next read is scheduled as soon as the reply
/// is submitted, not when it finishes writing, so the transport is
/// pipelined; write failures arrive on the send queue's error channel and
/// terminate the session.
///
/// Returns `Ok(())` when the peer closes the connection, or the fatal error
/// otherwise. Termination is never retried here; the peer must reconnect.
pub async fn run_stream_session<P, S, H>(
    providers: P,
    stream: S,
    peer: String,
    local: String,
    processor: Rc<H>,
    config: SessionConfig,
) -> Result<(), ServiceError>
where
    P: Providers,
    S: AsyncRead + AsyncWrite + Unpin + 'static,
    H: RequestProcessor + ?Sized + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let mut queue = SendQueue::for_stream(providers.task(), writer);
    let mut write_errors = match queue.take_error_channel() {
        Some(rx) => rx,
        // for_stream always provides an error channel
        None => return Err(ServiceError::Cancelled),
    };

    loop {
        let pdu = tokio::select! {
            res = read_framed_pdu(&mut reader, config.max_pdu_size) => match res {
                Ok(pdu) => pdu,
                Err(ServiceError::Transport(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::debug!(peer = %peer, "connection closed by peer");
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
            err = write_errors.recv() => {
                return Err(err.map_or(ServiceError::Cancelled, ServiceError::from));
            }
        };

        let outcome = processor
            .process(RequestContext {
                payload: &pdu,
                source: &peer,
                local: &local,
                datagram: false,
            })
            .await;

        let reply = match outcome {
            ProcessOutcome::Reply(reply) => reply,
            ProcessOutcome::Failed(reason) => {
                return Err(ServiceError::Processing(reason));
            }
            ProcessOutcome::Proxy => match &config.proxy {
                ProxyPolicy::Deny => {
                    return Err(ServiceError::Processing(
                        "proxying not permitted for this role".to_string(),
                    ));
                }
                ProxyPolicy::Forward(proxy_config) => {
                    match proxy_request(&providers, proxy_config, &pdu).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "proxy failed, synthesizing reply");
                            match processor.fallback_reply(&pdu) {
                                Some(reply) => reply,
                                None => {
                                    return Err(ServiceError::Processing(format!(
                                        "proxy failed with no fallback reply: {e}"
                                    )));
                                }
                            }
                        }
                    }
                }
            },
        };

        // Two-part write: length header, then payload. Submission only;
        // the next read starts immediately.
        queue.submit(vec![frame_header(reply.len())?.to_vec(), reply])?;
    }
}
