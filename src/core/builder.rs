use std::sync::Arc;

use super::config::PodConfig;
use super::pod::{Pod, PodShared, Registration};
use crate::beans::{BeanFactory, Params};
use crate::signals::{HandlerRef, SenderSet, Signal, SignalDispatcher};

/// Builder for constructing a [`Pod`] with pre-registered beans and signal handlers.
///
/// ```
/// use std::sync::Arc;
/// use beanpod::{BeanError, BeanFactory, HandlerFn, Params, Payload, Pod, PodConfig, Signal};
///
/// let on_term = HandlerFn::arc("audit", |sig: Signal, _payload: Payload| async move {
///     Ok::<_, BeanError>(serde_json::json!({ "seen": sig.as_str() }))
/// });
///
/// let pod = Pod::builder(PodConfig::default())
///     .with_handler(Signal::TERMINATE, on_term)
///     .with_bean(BeanFactory::ready(async { Ok(()) }), Some("quick"), Params::new())
///     .build();
///
/// assert_eq!(pod.signals().handler_count(&Signal::TERMINATE), 1);
/// ```
pub struct PodBuilder {
    cfg: PodConfig,
    handlers: Vec<(Signal, HandlerRef, Option<SenderSet>)>,
    beans: Vec<Registration>,
}

impl PodBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PodConfig) -> Self {
        Self {
            cfg,
            handlers: Vec::new(),
            beans: Vec::new(),
        }
    }

    /// Subscribes an unfiltered handler to `sig`.
    pub fn with_handler(mut self, sig: impl Into<Signal>, handler: HandlerRef) -> Self {
        self.handlers.push((sig.into(), handler, None));
        self
    }

    /// Subscribes a handler to `sig`, filtered to the given senders.
    pub fn with_filtered_handler(
        mut self,
        sig: impl Into<Signal>,
        handler: HandlerRef,
        senders: SenderSet,
    ) -> Self {
        self.handlers.push((sig.into(), handler, Some(senders)));
        self
    }

    /// Queues a bean, as [`Pod::register`] would.
    pub fn with_bean(mut self, factory: BeanFactory, label: Option<&str>, params: Params) -> Self {
        self.beans.push(Registration {
            factory,
            label: label.map(str::to_string),
            params,
        });
        self
    }

    /// Builds the idle pod.
    pub fn build(self) -> Pod {
        let signals = SignalDispatcher::new();
        for (sig, handler, senders) in self.handlers {
            signals.subscribe(sig, handler, senders);
        }

        let shared = Arc::new(PodShared::new(self.cfg, signals, self.beans));
        Pod::from_shared(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::{BeanId, BeanState};
    use crate::error::BeanError;
    use crate::signals::{HandlerFn, Payload};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_queued_beans_run_in_order() {
        let pod = PodBuilder::new(PodConfig::default())
            .with_bean(BeanFactory::ready(async { Ok(()) }), Some("first"), Params::new())
            .with_bean(BeanFactory::ready(async { Ok(()) }), None, Params::new())
            .build();

        pod.run().await.unwrap();

        let beans = pod.beans();
        assert_eq!(beans.len(), 2);
        assert_eq!(beans[0].label(), Some("first"));
        assert_eq!(beans[1].label(), None);
        for bean in beans {
            assert_eq!(bean.state(), BeanState::Succeeded);
        }
    }

    #[tokio::test]
    async fn test_filtered_handler_only_sees_its_senders() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        let handler: HandlerRef = HandlerFn::arc("count", move |_sig: Signal, _p: Payload| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BeanError>(Value::Null) }
        });

        let pod = PodBuilder::new(PodConfig::default())
            .with_filtered_handler("tick", handler, SenderSet::from([BeanId::new(1)]))
            .build();

        let from_one = SenderSet::from([BeanId::new(1)]);
        let from_two = SenderSet::from([BeanId::new(2)]);
        pod.signals().publish("tick", Some(&from_two), Payload::new()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        pod.signals().publish("tick", Some(&from_one), Payload::new()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
