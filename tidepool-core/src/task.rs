//! Task spawning abstraction for single-threaded execution.

use async_trait::async_trait;
use std::future::Future;
use tokio::task::JoinHandle;

/// Provider for spawning local tasks in a single-threaded context.
///
/// Tasks are spawned with `spawn_local` semantics to maintain the
/// single-threaded execution guarantees the service core relies on; futures
/// carry no `Send` bound.
#[async_trait(?Send)]
pub trait TaskProvider: Clone {
    /// Spawn a named task that runs on the current thread.
    fn spawn_task<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static;

    /// Yield control to allow other tasks to run.
    async fn yield_now(&self);
}

/// Production task provider using Tokio's local task facilities.
///
/// Must be used from within a `tokio::task::LocalSet` context.
#[derive(Debug, Clone)]
pub struct TokioTaskProvider;

#[async_trait(?Send)]
impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        tracing::trace!(task = name, "spawning local task");
        tokio::task::spawn_local(future)
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}
