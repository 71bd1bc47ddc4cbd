//! Run-wide cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cloneable cancellation signal shared by every driver and resolver of
/// a run.
///
/// Once cancelled, drivers stop requesting pages, resolvers stop requesting
/// details and no further rows are emitted.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    parent: Option<Arc<Inner>>,
}

impl Inner {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

impl CancelSignal {
    /// Creates a signal that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every holder of this signal.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// A signal that is cancelled on its own or when `self` is.
    ///
    /// Cancelling the child leaves `self` untouched.
    pub(crate) fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.inner.clone()),
                ..Inner::default()
            }),
        }
    }

    /// Clears this signal's own flag. A parent's flag is not touched.
    pub(crate) fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true once [`CancelSignal::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Completes when the signal is cancelled.
    pub async fn cancelled(&self) {
        let mut chain = Vec::new();
        let mut next = Some(&*self.inner);
        while let Some(inner) = next {
            chain.push(Box::pin(wait_for(inner)));
            next = inner.parent.as_deref();
        }
        futures::future::select_all(chain).await;
    }
}

/// Waits for `inner`'s own flag.
async fn wait_for(inner: &Inner) {
    loop {
        let notified = inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel()
        // cannot slip between the check and the await.
        notified.as_mut().enable();
        if inner.cancelled.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flag_lifecycle() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());

        let clone = signal.clone();
        clone.cancel();
        assert!(signal.is_cancelled());

        signal.reset();
        assert!(!clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let signal = CancelSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn child_follows_parent() {
        let parent = CancelSignal::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        let waiter = {
            let other = other.clone();
            tokio::spawn(async move { other.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("child waiter should wake")
            .unwrap();
        assert!(other.is_cancelled());

        parent.reset();
        assert!(!other.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let signal = CancelSignal::new();
        signal.cancel();
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("should not block");
    }
}
