//! Per-transport write serialization.
//!
//! A [`SendQueue`] owns the write side of one transport and drains queued
//! operations FIFO from a single background task, so concurrent writers
//! never interleave on the wire and order of admission is order of
//! transmission. The queue is owned by its session and torn down with it;
//! writers still queued at teardown observe [`SendQueueError::Cancelled`].

use std::rc::Rc;
use thiserror::Error;
use tidepool_core::{DatagramSocketTrait, TaskProvider};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Errors surfaced to writers on a send queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendQueueError {
    /// The queue was torn down before the write completed.
    #[error("send queue torn down before the write completed")]
    Cancelled,

    /// The transport write failed; the queue accepts no further writes.
    #[error("transport write failed: {0}")]
    Io(String),
}

struct SendOp {
    /// Buffers written back to back as one logical operation.
    bufs: Vec<Vec<u8>>,
    /// Destination for datagram queues; `None` on stream queues.
    dest: Option<String>,
    /// Completion signal for awaited writes; dropped receivers are fine.
    done: Option<oneshot::Sender<Result<(), SendQueueError>>>,
}

/// FIFO of pending write operations on one transport.
///
/// At most one write is in flight per transport; submission order is
/// preserved as wire order. Dropping the queue aborts the writer task, which
/// cancels every still-queued operation.
pub struct SendQueue {
    tx: mpsc::UnboundedSender<SendOp>,
    err_rx: Option<mpsc::UnboundedReceiver<SendQueueError>>,
    writer: JoinHandle<()>,
}

impl SendQueue {
    /// Create a send queue owning the write half of a stream transport.
    ///
    /// A write error is fatal to the queue: the failed operation and every
    /// queued one observe the error, and it is pushed on the error channel
    /// for the owning session to act on.
    pub fn for_stream<W, TP>(task: &TP, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + 'static,
        TP: TaskProvider,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let handle = task.spawn_task("send_queue_stream", stream_writer(writer, rx, err_tx));
        Self {
            tx,
            err_rx: Some(err_rx),
            writer: handle,
        }
    }

    /// Create a send queue sharing a datagram socket.
    ///
    /// A send error on a datagram socket costs that packet only; the queue
    /// keeps draining.
    pub fn for_datagram<D, TP>(task: &TP, socket: Rc<D>) -> Self
    where
        D: DatagramSocketTrait + 'static,
        TP: TaskProvider,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = task.spawn_task("send_queue_datagram", datagram_writer(socket, rx));
        Self {
            tx,
            err_rx: None,
            writer: handle,
        }
    }

    /// Queue a multi-part write and wait until it reaches the transport.
    pub async fn write(&self, bufs: Vec<Vec<u8>>) -> Result<(), SendQueueError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(SendOp {
                bufs,
                dest: None,
                done: Some(done_tx),
            })
            .map_err(|_| SendQueueError::Cancelled)?;
        done_rx.await.map_err(|_| SendQueueError::Cancelled)?
    }

    /// Queue a multi-part write without waiting for completion.
    ///
    /// The pipelined session path uses this: the next read is scheduled as
    /// soon as the reply is submitted, and write failures arrive on the
    /// error channel instead.
    pub fn submit(&self, bufs: Vec<Vec<u8>>) -> Result<(), SendQueueError> {
        self.tx
            .send(SendOp {
                bufs,
                dest: None,
                done: None,
            })
            .map_err(|_| SendQueueError::Cancelled)
    }

    /// Queue a single datagram to the given destination without waiting.
    pub fn submit_to(&self, buf: Vec<u8>, dest: String) -> Result<(), SendQueueError> {
        self.tx
            .send(SendOp {
                bufs: vec![buf],
                dest: Some(dest),
                done: None,
            })
            .map_err(|_| SendQueueError::Cancelled)
    }

    /// Take the error channel for the owning session to select on.
    ///
    /// Returns `None` if already taken, or on datagram queues where send
    /// errors cost one packet and are only logged.
    pub fn take_error_channel(&mut self) -> Option<mpsc::UnboundedReceiver<SendQueueError>> {
        self.err_rx.take()
    }
}

impl Drop for SendQueue {
    fn drop(&mut self) {
        // Cancels the in-flight write and drops every queued op, failing
        // their completion channels.
        self.writer.abort();
    }
}

async fn stream_writer<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<SendOp>,
    err_tx: mpsc::UnboundedSender<SendQueueError>,
) where
    W: AsyncWrite + Unpin + 'static,
{
    while let Some(op) = rx.recv().await {
        let mut result = Ok(());
        for buf in &op.bufs {
            if let Err(e) = writer.write_all(buf).await {
                result = Err(SendQueueError::Io(e.to_string()));
                break;
            }
        }

        let failure = result.clone().err();
        if let Some(done) = op.done {
            let _ = done.send(result);
        }

        if let Some(err) = failure {
            tracing::debug!(error = %err, "stream write failed, tearing down send queue");
            let _ = err_tx.send(err.clone());
            // Fail everything still queued, then stop accepting writes.
            rx.close();
            while let Ok(op) = rx.try_recv() {
                if let Some(done) = op.done {
                    let _ = done.send(Err(err.clone()));
                }
            }
            return;
        }
    }
}

async fn datagram_writer<D>(socket: Rc<D>, mut rx: mpsc::UnboundedReceiver<SendOp>)
where
    D: DatagramSocketTrait + 'static,
{
    while let Some(op) = rx.recv().await {
        let result = match &op.dest {
            Some(dest) => {
                let mut result = Ok(());
                for buf in &op.bufs {
                    if let Err(e) = socket.send_to(buf, dest).await {
                        // One lost datagram, not a dead socket.
                        tracing::debug!(dest = %dest, error = %e, "datagram send failed");
                        result = Err(SendQueueError::Io(e.to_string()));
                        break;
                    }
                }
                result
            }
            None => Err(SendQueueError::Io(
                "datagram write requires a destination".to_string(),
            )),
        };

        if let Some(done) = op.done {
            let _ = done.send(result);
        }
    }
}
