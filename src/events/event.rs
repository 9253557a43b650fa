//! # Lifecycle events emitted by the pod.
//!
//! ```text
//! PodStarted
//!   └─► BeanStarted (one per bean, registration order)
//!         └─► BeanFinished | BeanFailed | BeanCancelled (completion order)
//! StopRequested (signal?)
//!   └─► GraceExceeded (only if beans were still pending at the deadline)
//! PodStopped
//! ```
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use beanpod::{BeanId, Event, EventKind};
//!
//! let ev = Event::new(EventKind::BeanFailed)
//!     .with_bean(BeanId::new(3))
//!     .with_label("worker")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::BeanFailed);
//! assert_eq!(ev.bean, Some(BeanId::new(3)));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::beans::BeanId;
use crate::signals::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `run()` started; beans are about to be instantiated.
    PodStarted,
    /// A bean was instantiated and spawned.
    ///
    /// Sets: `bean`, `label`
    BeanStarted,
    /// A bean completed successfully.
    ///
    /// Sets: `bean`, `label`
    BeanFinished,
    /// A bean returned an error or panicked.
    ///
    /// Sets: `bean`, `label`, `reason`
    BeanFailed,
    /// A bean was cancelled.
    ///
    /// Sets: `bean`, `label`
    BeanCancelled,
    /// The stop sequence started.
    ///
    /// Sets: `signal` (if one is dispatched)
    StopRequested,
    /// The grace period ran out with beans still pending.
    ///
    /// Sets: `reason` (number of beans cancelled)
    GraceExceeded,
    /// The pod reached its terminal state.
    PodStopped,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Bean the event is about, if applicable.
    pub bean: Option<BeanId>,
    /// Label of that bean, if it has one.
    pub label: Option<Arc<str>>,
    /// Signal dispatched with a stop request.
    pub signal: Option<Signal>,
    /// Human-readable reason (failure message, counts).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            bean: None,
            label: None,
            signal: None,
            reason: None,
        }
    }

    /// Attaches a bean id.
    #[inline]
    pub fn with_bean(mut self, id: BeanId) -> Self {
        self.bean = Some(id);
        self
    }

    /// Attaches a bean label.
    #[inline]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches the dispatched signal.
    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
