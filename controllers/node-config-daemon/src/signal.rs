//! Stop signal shared between the bootstrap and the reconciliation engine.
//!
//! A [`StopSignal`] closes at most once. It is closed by whichever comes
//! first: a [`StopTrigger`] (process shutdown), an explicit [`StopSignal::close`],
//! or dropping the [`StopSignal`]. Engines observe it through [`StopHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;

struct Inner {
    closed: AtomicBool,
    tx: watch::Sender<bool>,
}

impl Inner {
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send_replace(true);
        true
    }
}

/// Owner side of the stop signal; closes it on drop.
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                closed: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Handle for the engine to wait on.
    pub fn handle(&self) -> StopHandle {
        StopHandle { rx: self.inner.tx.subscribe() }
    }

    /// Cloneable closer for shutdown listeners.
    pub fn trigger(&self) -> StopTrigger {
        StopTrigger { inner: Arc::clone(&self.inner) }
    }

    /// Closes the signal. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.inner.close()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        if self.inner.close() {
            debug!("stop signal closed on drop");
        }
    }
}

/// Closes a [`StopSignal`] from elsewhere, e.g. a SIGTERM handler.
#[derive(Clone)]
pub struct StopTrigger {
    inner: Arc<Inner>,
}

impl StopTrigger {
    /// Closes the signal. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.inner.close()
    }
}

/// Receiver side of the stop signal.
#[derive(Clone)]
pub struct StopHandle {
    rx: watch::Receiver<bool>,
}

impl StopHandle {
    /// Resolves once the signal is closed.
    pub async fn stopped(&mut self) {
        // An error means the sender is gone, which only happens after close.
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            debug!("stop signal sender dropped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}
