//! Context implementation for request-scoped cancellation and deadlines
//!
//! Every RPC handler receives a Context derived from the server's root
//! context. Stopping the provider cancels the root, and cancellation flows
//! down to every context derived from it. Long running work (activation
//! polling, for example) derives a child with `with_timeout` and waits on
//! `cancelled()` between steps.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// Reason a context finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("context canceled")]
    Canceled,
}

/// Context carries cancellation signals and deadlines across async boundaries
/// CRITICAL: Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Sender<Option<ContextError>>,
}

impl ContextInner {
    fn finish(&self, reason: ContextError) {
        self.done.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl Context {
    /// Root context with no deadline
    pub fn new() -> Self {
        Self::with_deadline_inner(None)
    }

    fn with_deadline_inner(deadline: Option<Instant>) -> Self {
        let (done, _) = watch::channel(None);
        Self {
            inner: Arc::new(ContextInner { deadline, done }),
        }
    }

    /// Derive a child that is cancelled together with this context
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Derive a child whose deadline is the earlier of this context's
    /// deadline and `now + timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Self::with_deadline_inner(deadline);

        if let Some(reason) = self.err() {
            child.inner.finish(reason);
            return child;
        }

        let weak: Weak<ContextInner> = Arc::downgrade(&child.inner);
        let mut parent_rx = self.inner.done.subscribe();
        let mut own_rx = child.inner.done.subscribe();

        tokio::spawn(async move {
            let parent_done = async {
                let reason = parent_rx
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .map(|state| *state);
                match reason {
                    Some(Some(reason)) => reason,
                    _ => std::future::pending().await,
                }
            };
            let expired = async {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline.into()).await,
                    None => std::future::pending().await,
                }
            };

            let reason = tokio::select! {
                _ = expired => ContextError::DeadlineExceeded,
                reason = parent_done => reason,
                // child finished on its own or was dropped
                _ = own_rx.changed() => return,
            };

            if let Some(inner) = weak.upgrade() {
                inner.finish(reason);
            }
        });

        child
    }

    /// Why the context finished, or None while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if let Some(reason) = *self.inner.done.borrow() {
            return Some(reason);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) -> ContextError {
        if let Some(reason) = self.err() {
            return reason;
        }

        let mut rx = self.inner.done.subscribe();
        let expired = async {
            match self.inner.deadline {
                Some(deadline) => time::sleep_until(deadline.into()).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = expired => ContextError::DeadlineExceeded,
            reason = async {
                rx.wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|state| *state)
                    .unwrap_or(ContextError::Canceled)
            } => reason,
        }
    }

    /// Returns a channel that holds the finish reason once work done on
    /// behalf of this context should stop
    pub fn done(&self) -> watch::Receiver<Option<ContextError>> {
        self.inner.done.subscribe()
    }

    pub fn cancel(&self) {
        self.inner.finish(ContextError::Canceled);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));

        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(150)).await;

        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();

        assert!(!ctx.is_cancelled());

        ctx.cancel();

        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn parent_cancel_reaches_children() {
        let root = Context::new();
        let child = root.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        root.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(1), grandchild.cancelled())
            .await
            .unwrap();
        assert_eq!(reason, ContextError::Canceled);
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancel_leaves_parent_live() {
        let root = Context::new();
        let child = root.child();

        child.cancel();

        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn child_deadline_never_exceeds_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(3600));

        assert!(child.deadline().unwrap() <= parent.deadline().unwrap());
    }

    #[tokio::test]
    async fn cancelled_resolves_on_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));

        let reason = ctx.cancelled().await;

        assert_eq!(reason, ContextError::DeadlineExceeded);
    }

    #[tokio::test]
    async fn derived_from_finished_context_is_finished() {
        let root = Context::new();
        root.cancel();

        let child = root.with_timeout(Duration::from_secs(10));

        assert_eq!(child.err(), Some(ContextError::Canceled));
    }
}
