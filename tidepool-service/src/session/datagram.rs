//! Datagram socket session.

use crate::processor::{ProcessOutcome, RequestContext, RequestProcessor};
use crate::proxy::proxy_request;
use crate::send_queue::SendQueue;
use crate::session::{ProxyPolicy, SessionConfig};
use std::rc::Rc;
use tidepool_core::{DatagramSocketTrait, Providers, TaskProvider};

/// Largest datagram the receive loop will accept.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Drive one datagram socket forever.
///
/// The whole datagram is the PDU; its source address is captured for the
/// reply. The next receive is re-armed as soon as the current packet is
/// handed to its own processing task, so a slow request (proxy failover in
/// particular) never blocks the socket. Nothing that happens to one packet
/// stops the loop: failures drop that packet silently.
///
/// Replies, real or synthesized, go through the socket's shared send queue
/// as a single send-to to the captured source.
pub async fn run_datagram_session<P, D, H>(
    providers: P,
    socket: D,
    local: String,
    processor: Rc<H>,
    config: SessionConfig,
) where
    P: Providers,
    D: DatagramSocketTrait + 'static,
    H: RequestProcessor + ?Sized + 'static,
{
    let socket = Rc::new(socket);
    let queue = Rc::new(SendQueue::for_datagram(providers.task(), socket.clone()));
    let config = Rc::new(config);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::debug!(local = %local, error = %e, "datagram receive failed, dropping");
                providers.task().yield_now().await;
                continue;
            }
        };

        let payload = buf[..len].to_vec();
        providers.task().spawn_task(
            "datagram_call",
            handle_datagram_call(
                providers.clone(),
                processor.clone(),
                queue.clone(),
                config.clone(),
                payload,
                source,
                local.clone(),
            ),
        );
    }
}

/// Process one datagram to completion and send the reply, if any.
async fn handle_datagram_call<P, H>(
    providers: P,
    processor: Rc<H>,
    queue: Rc<SendQueue>,
    config: Rc<SessionConfig>,
    payload: Vec<u8>,
    source: String,
    local: String,
) where
    P: Providers,
    H: RequestProcessor + ?Sized + 'static,
{
    let outcome = processor
        .process(RequestContext {
            payload: &payload,
            source: &source,
            local: &local,
            datagram: true,
        })
        .await;

    let reply = match outcome {
        ProcessOutcome::Reply(reply) => reply,
        ProcessOutcome::Failed(reason) => {
            tracing::debug!(source = %source, reason = %reason, "dropping datagram");
            return;
        }
        ProcessOutcome::Proxy => match &config.proxy {
            ProxyPolicy::Deny => {
                tracing::debug!(source = %source, "proxying not permitted, dropping datagram");
                return;
            }
            ProxyPolicy::Forward(proxy_config) => {
                match proxy_request(&providers, proxy_config, &payload).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(source = %source, error = %e, "proxy failed, synthesizing reply");
                        match processor.fallback_reply(&payload) {
                            Some(reply) => reply,
                            None => {
                                tracing::debug!(source = %source, "no fallback reply, dropping datagram");
                                return;
                            }
                        }
                    }
                }
            }
        },
    };

    if let Err(e) = queue.submit_to(reply, source.clone()) {
        tracing::debug!(source = %source, error = %e, "reply submission failed");
    }
}
