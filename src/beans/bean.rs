//! # Bean: one supervised computation with stable identity.
//!
//! A [`Bean`] is a cheap, cloneable handle. The pod's registry owns the canonical copy;
//! clones handed out by lookups observe the same state.
//!
//! ## State
//! ```text
//! Pending ──► Succeeded   (computation returned Ok)
//!        ├──► Failed      (computation returned Err or panicked)
//!        └──► Cancelled   (pod cancelled it, or it returned BeanError::Canceled)
//! ```
//! The transition happens exactly once, inside the pod's completion bookkeeping.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::BeanContext;

/// Unique bean identity, assigned by the pod at instantiation (starting at 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(u64);

impl BeanId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion state of a bean.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BeanState {
    /// Still running.
    Pending,
    /// Finished on its own with `Ok(())`.
    Succeeded,
    /// Returned an error or panicked.
    Failed(Arc<str>),
    /// Cancelled by the pod (or reported cancellation itself).
    Cancelled,
}

impl BeanState {
    /// True for every state except [`BeanState::Pending`].
    pub fn is_finished(&self) -> bool {
        !matches!(self, BeanState::Pending)
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BeanState::Pending => "pending",
            BeanState::Succeeded => "succeeded",
            BeanState::Failed(_) => "failed",
            BeanState::Cancelled => "cancelled",
        }
    }
}

struct BeanInner {
    ctx: BeanContext,
    cancel: CancellationToken,
    state: watch::Sender<BeanState>,
}

/// Handle to one supervised computation.
#[derive(Clone)]
pub struct Bean {
    inner: Arc<BeanInner>,
}

impl Bean {
    pub(crate) fn new(ctx: BeanContext) -> Self {
        let (state, _) = watch::channel(BeanState::Pending);
        Self {
            inner: Arc::new(BeanInner {
                ctx,
                cancel: CancellationToken::new(),
                state,
            }),
        }
    }

    /// Returns the bean id.
    pub fn id(&self) -> BeanId {
        self.inner.ctx.id()
    }

    /// Returns the bean label, if any.
    pub fn label(&self) -> Option<&str> {
        self.inner.ctx.label()
    }

    /// Returns the context the bean was built with.
    pub fn context(&self) -> &BeanContext {
        &self.inner.ctx
    }

    /// Returns a snapshot of the completion state.
    pub fn state(&self) -> BeanState {
        self.inner.state.borrow().clone()
    }

    /// True once the bean has succeeded, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.inner.state.borrow().is_finished()
    }

    /// Waits until the bean has finished and returns its final state.
    ///
    /// Returns immediately for a bean that already finished.
    pub async fn wait(&self) -> BeanState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(BeanState::is_finished).await {
            Ok(state) => (*state).clone(),
            // The sender lives in `self`, so it cannot be dropped while we wait.
            Err(_) => self.state(),
        }
    }

    /// Token cancelled when the pod force-stops this bean.
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Requests forced cancellation.
    pub(crate) fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Records the final state and wakes waiters. Returns `false` if already finished.
    pub(crate) fn record(&self, outcome: BeanState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.is_finished() {
                return false;
            }
            *state = outcome;
            true
        })
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("id", &self.id())
            .field("label", &self.label())
            .field("state", &self.inner.state.borrow().as_label())
            .finish()
    }
}
