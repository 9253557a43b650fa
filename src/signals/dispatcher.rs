//! # Keyed signal dispatcher with sender filters.
//!
//! [`SignalDispatcher`] maps a [`Signal`] to the handlers subscribed under it. Each
//! subscription optionally carries a sender filter (a set of [`BeanId`]s).
//!
//! ## Matching
//! ```text
//! publish(key, None)        → every subscription under key
//! publish(key, Some(S))     → subscriptions with no filter
//!                             + subscriptions whose filter overlaps S
//! ```
//!
//! ## Delivery
//! ```text
//! publish(key, senders, payload)
//!     │  snapshot matching handlers (lock released before any await)
//!     ├──► handler 1 ──► catch_unwind ──► outcome 1
//!     ├──► handler 2 ──► catch_unwind ──► outcome 2
//!     └──► handler N ──► catch_unwind ──► outcome N
//!                    join all ──► Vec<HandlerOutcome>
//! ```
//!
//! ## Rules
//! - **Fan-out-then-join**: handlers are polled concurrently; the publisher returns when all finish.
//! - **Isolation**: an error or panic in one handler is recorded in its outcome only.
//! - **Snapshot**: handlers subscribed after a publish started are not part of that publish;
//!   handlers may subscribe, unsubscribe or publish from inside a delivery.
//! - **Identity**: `(key, handler, filter)` with the same `Arc` is registered at most once.
//!
//! **Warning**: `AssertUnwindSafe` is used; a handler that panics while holding a lock on
//! shared state may leave that state inconsistent.

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;

use super::{HandlerRef, Payload, Signal};
use crate::beans::BeanId;
use crate::error::{HandlerError, panic_message};

/// Set of bean identities used as a sender filter.
pub type SenderSet = BTreeSet<BeanId>;

/// Result of one handler invocation during a publish.
#[derive(Debug)]
pub struct HandlerOutcome {
    /// Handler name ([`SignalHandler::name`](super::SignalHandler::name)).
    pub handler: String,
    /// What the handler returned, or why it failed.
    pub result: Result<Value, HandlerError>,
}

impl HandlerOutcome {
    /// True if the handler returned `Ok`.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct Subscription {
    handler: HandlerRef,
    senders: Option<SenderSet>,
}

impl Subscription {
    fn matches(&self, senders: Option<&SenderSet>) -> bool {
        match (&self.senders, senders) {
            (None, _) | (_, None) => true,
            (Some(own), Some(sent)) => !own.is_disjoint(sent),
        }
    }

    fn is(&self, handler: &HandlerRef, senders: Option<&SenderSet>) -> bool {
        same_handler(&self.handler, handler) && self.senders.as_ref() == senders
    }
}

/// Compares handlers by the address of their shared allocation.
fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Publish/subscribe registry keyed by [`Signal`].
#[derive(Default)]
pub struct SignalDispatcher {
    subs: Mutex<HashMap<Signal, Vec<Subscription>>>,
}

impl SignalDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `key`, optionally filtered to `senders`.
    ///
    /// Re-registering the same handler with the same filter is a no-op.
    pub fn subscribe(&self, key: impl Into<Signal>, handler: HandlerRef, senders: Option<SenderSet>) {
        let key = key.into();
        let mut subs = self.subs.lock();
        let entries = subs.entry(key).or_default();
        if entries.iter().any(|s| s.is(&handler, senders.as_ref())) {
            return;
        }
        entries.push(Subscription { handler, senders });
    }

    /// Removes a previously registered `(key, handler, senders)` subscription.
    ///
    /// Returns `false` (and does nothing) if it was not registered.
    pub fn unsubscribe(
        &self,
        key: impl Into<Signal>,
        handler: &HandlerRef,
        senders: Option<&SenderSet>,
    ) -> bool {
        let key = key.into();
        let mut subs = self.subs.lock();
        let Some(entries) = subs.get_mut(&key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|s| !s.is(handler, senders));
        let removed = entries.len() != before;
        if entries.is_empty() {
            subs.remove(&key);
        }
        removed
    }

    /// Returns the number of subscriptions under `key`.
    pub fn handler_count(&self, key: &Signal) -> usize {
        self.subs.lock().get(key).map_or(0, Vec::len)
    }

    /// Invokes every matching handler under `key` and collects their outcomes.
    ///
    /// The order of outcomes follows subscription order; handlers themselves run concurrently.
    pub async fn publish(
        &self,
        key: impl Into<Signal>,
        senders: Option<&SenderSet>,
        payload: Payload,
    ) -> Vec<HandlerOutcome> {
        let key = key.into();
        let handlers: Vec<HandlerRef> = {
            let subs = self.subs.lock();
            subs.get(&key)
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|s| s.matches(senders))
                        .map(|s| Arc::clone(&s.handler))
                        .collect()
                })
                .unwrap_or_default()
        };

        tracing::trace!(signal = %key, handlers = handlers.len(), "publishing");

        let key = &key;
        let payload = &payload;
        join_all(handlers.into_iter().map(|h| async move {
            let result = match AssertUnwindSafe(h.on_signal(key, payload))
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(HandlerError::Failed(e)),
                Err(panic) => Err(HandlerError::Panicked(panic_message(panic))),
            };
            HandlerOutcome {
                handler: h.name().to_string(),
                result,
            }
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BeanError;
    use crate::signals::HandlerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(name: &'static str, hits: Arc<AtomicUsize>) -> HandlerRef {
        HandlerFn::arc(name, move |_sig: Signal, _p: Payload| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BeanError>(Value::Null)
            }
        })
    }

    fn ids(raw: &[u64]) -> SenderSet {
        raw.iter().copied().map(BeanId::new).collect()
    }

    #[tokio::test]
    async fn test_unfiltered_publish_reaches_everyone() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        d.subscribe("reload", counting("a", hits.clone()), None);
        d.subscribe("reload", counting("b", hits.clone()), Some(ids(&[1])));
        d.subscribe("reload", counting("c", hits.clone()), Some(ids(&[2])));

        let out = d.publish("reload", None, Payload::new()).await;
        assert_eq!(out.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_filtered_publish_matches_overlap_and_unfiltered() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        d.subscribe("reload", counting("open", hits.clone()), None);
        d.subscribe("reload", counting("one", hits.clone()), Some(ids(&[1])));
        d.subscribe("reload", counting("three", hits.clone()), Some(ids(&[3])));

        let out = d.publish("reload", Some(&ids(&[1, 2])), Payload::new()).await;
        let names: Vec<_> = out.iter().map(|o| o.handler.as_str()).collect();
        assert_eq!(names, vec!["open", "one"]);
    }

    #[tokio::test]
    async fn test_other_keys_are_untouched() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        d.subscribe(Signal::TERMINATE, counting("term", hits.clone()), None);

        let out = d.publish(Signal::INTERRUPT, None, Payload::new()).await;
        assert!(out.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_does_not_duplicate() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = counting("once", hits.clone());
        d.subscribe("k", Arc::clone(&h), None);
        d.subscribe("k", Arc::clone(&h), None);
        assert_eq!(d.handler_count(&Signal::from("k")), 1);

        d.publish("k", None, Payload::new()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_absent_is_noop() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = counting("h", hits.clone());
        assert!(!d.unsubscribe("k", &h, None));

        d.subscribe("k", Arc::clone(&h), Some(ids(&[4])));
        assert!(!d.unsubscribe("k", &h, None), "filter is part of the identity");
        assert!(d.unsubscribe("k", &h, Some(&ids(&[4]))));
        assert_eq!(d.handler_count(&Signal::from("k")), 0);
    }

    struct Panicky;

    #[async_trait::async_trait]
    impl crate::signals::SignalHandler for Panicky {
        async fn on_signal(&self, _s: &Signal, _p: &Payload) -> Result<Value, BeanError> {
            panic!("kaboom")
        }

        fn name(&self) -> &str {
            "panics"
        }
    }

    #[tokio::test]
    async fn test_failing_and_panicking_handlers_are_isolated() {
        let d = SignalDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        d.subscribe(
            "k",
            HandlerFn::arc("fails", |_s: Signal, _p: Payload| async {
                Err::<Value, _>(BeanError::fail("nope"))
            }),
            None,
        );
        d.subscribe("k", Arc::new(Panicky), None);
        d.subscribe("k", counting("ok", hits.clone()), None);

        let out = d.publish("k", None, Payload::new()).await;
        assert_eq!(out.len(), 3);
        assert!(matches!(out[0].result, Err(HandlerError::Failed(_))));
        assert!(matches!(&out[1].result, Err(HandlerError::Panicked(m)) if m == "kaboom"));
        assert!(out[2].is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handlers_run_concurrently() {
        let d = SignalDispatcher::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<&'static str>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let tx = Arc::new(Mutex::new(Some(tx)));

        // Registered first and blocks until the second handler runs.
        d.subscribe(
            "k",
            HandlerFn::arc("waits", move |_s: Signal, _p: Payload| {
                let rx = rx.lock().take();
                async move {
                    let got = match rx {
                        Some(rx) => rx.await.map_err(BeanError::fail)?,
                        None => "missing",
                    };
                    Ok::<_, BeanError>(Value::from(got))
                }
            }),
            None,
        );
        d.subscribe(
            "k",
            HandlerFn::arc("sends", move |_s: Signal, _p: Payload| {
                let tx = tx.lock().take();
                async move {
                    if let Some(tx) = tx {
                        let _ = tx.send("hello");
                    }
                    Ok::<_, BeanError>(Value::Null)
                }
            }),
            None,
        );

        let out = tokio::time::timeout(Duration::from_secs(1), d.publish("k", None, Payload::new()))
            .await
            .expect("handlers must not be serialized");
        assert_eq!(out[0].result.as_ref().ok(), Some(&Value::from("hello")));
        assert!(out[1].is_ok());
    }

    #[tokio::test]
    async fn test_payload_is_delivered() {
        let d = SignalDispatcher::new();
        d.subscribe(
            "echo",
            HandlerFn::arc("echo", |_s: Signal, p: Payload| async move {
                Ok::<_, BeanError>(p.get("n").cloned().unwrap_or(Value::Null))
            }),
            None,
        );
        let mut payload = Payload::new();
        payload.insert("n".into(), Value::from(7));

        let out = d.publish("echo", None, payload).await;
        assert_eq!(out[0].result.as_ref().ok(), Some(&Value::from(7)));
    }
}
