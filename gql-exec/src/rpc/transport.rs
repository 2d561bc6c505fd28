//! The wire transport: given a method descriptor and a request
//! message, return a response message or an error. Must be safe for
//! concurrent calls. In Rust terms this is gRPC over `tonic`; the core
//! only depends on the [`Transport`] trait, never on `tonic` directly,
//! so tests can supply an in-memory fixture.

use crate::error::TransportError;
use crate::rpc::registry::MethodDescriptor;
use crate::value::TypedMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A single request's cancellation signal, threaded through the sync,
/// batch, and leaf-serialization runtime
/// entries. Cloning shares the same underlying flag; firing it wakes
/// every clone waiting in [`CancellationSignal::cancelled`].
#[derive(Clone, Default)]
pub struct CancellationSignal(Arc<CancellationInner>);

#[derive(Default)]
struct CancellationInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        CancellationSignal::default()
    }

    /// Fires the signal. In-flight wire calls should observe
    /// [`CancellationSignal::is_cancelled`] and unwind as a
    /// [`TransportError::Cancelled`]; already-completed writes to the
    /// response tree are left in place.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has fired. A no-op future if it
    /// already had, so callers can `select!` against it without racing
    /// a cancellation that landed just before the wait began.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0.notify.notified().await;
    }
}

/// Single entry point: given a method descriptor and a request
/// message, return a response message or an error. One logical wire
/// call; the bridge is responsible for batching tasks into a single
/// request message before calling this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        method: &MethodDescriptor,
        request: Arc<dyn TypedMessage>,
        cancel: &CancellationSignal,
    ) -> Result<Arc<dyn TypedMessage>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_wakes_waiters() {
        let signal = CancellationSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        signal.cancel();
        handle.await.unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_does_not_block() {
        let signal = CancellationSignal::new();
        signal.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), signal.cancelled())
            .await
            .expect("cancelled() must resolve immediately once already fired");
    }
}
