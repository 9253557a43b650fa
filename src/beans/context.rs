//! # BeanContext: a bean's capability-scoped view of its pod.
//!
//! Every bean gets one context. It carries the bean identity, the pod configuration and a
//! **weak** reference to the pod, so a context never keeps its pod alive.
//!
//! ## Capabilities
//! ```text
//! BeanContext
//!   ├─► config()                     read-only PodConfig
//!   ├─► siblings(id | label)         lookup (NotFound if unknown)
//!   ├─► wait_for(id | label)         barrier over the resolved beans
//!   ├─► subscribe/unsubscribe(sig)   filter auto-scoped to this bean's id
//!   ├─► publish(sig, Senders, ..)    labels resolved to ids before delegating
//!   ├─► stop(timeout, sig)           request the pod stop sequence
//!   └─► stopping()                   token cancelled once the pod starts stopping
//! ```
//! Registry mutation is never exposed here.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{Bean, BeanId};
use crate::core::{PodConfig, PodShared};
use crate::error::PodError;
use crate::signals::{HandlerOutcome, HandlerRef, Payload, SenderSet, Signal};

/// Reference to one bean (by id) or a group of beans (by label).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BeanRef {
    /// A single bean.
    Id(BeanId),
    /// Every bean registered under the label, in registration order.
    Label(String),
}

impl fmt::Display for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanRef::Id(id) => write!(f, "{id}"),
            BeanRef::Label(label) => write!(f, "label {label:?}"),
        }
    }
}

impl From<BeanId> for BeanRef {
    fn from(id: BeanId) -> Self {
        BeanRef::Id(id)
    }
}

impl From<&str> for BeanRef {
    fn from(label: &str) -> Self {
        BeanRef::Label(label.to_string())
    }
}

impl From<String> for BeanRef {
    fn from(label: String) -> Self {
        BeanRef::Label(label)
    }
}

/// Sender selection for [`BeanContext::publish`].
#[derive(Clone, Debug, Default)]
pub enum Senders {
    /// Unfiltered publish: every subscriber of the key.
    #[default]
    All,
    /// Subscribers scoped to any of these ids (plus unfiltered ones).
    Ids(SenderSet),
    /// Subscribers scoped to any bean carrying one of these labels (plus unfiltered ones).
    Labels(Vec<String>),
}

struct ContextInner {
    id: BeanId,
    label: Option<Arc<str>>,
    cfg: Arc<PodConfig>,
    pod: Weak<PodShared>,
    instance: OnceLock<Arc<dyn Any + Send + Sync>>,
}

/// Handle a running bean receives from its pod.
#[derive(Clone)]
pub struct BeanContext {
    inner: Arc<ContextInner>,
}

impl BeanContext {
    pub(crate) fn new(
        id: BeanId,
        label: Option<Arc<str>>,
        cfg: Arc<PodConfig>,
        pod: Weak<PodShared>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id,
                label,
                cfg,
                pod,
                instance: OnceLock::new(),
            }),
        }
    }

    /// Returns the id of the bean this context belongs to.
    pub fn id(&self) -> BeanId {
        self.inner.id
    }

    /// Returns the label of the bean this context belongs to.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Returns the pod configuration.
    pub fn config(&self) -> &Arc<PodConfig> {
        &self.inner.cfg
    }

    /// Returns the handler instance built for this bean, if it was registered as a
    /// handler type and `T` matches.
    pub fn instance<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let any = Arc::clone(self.inner.instance.get()?);
        any.downcast::<T>().ok()
    }

    pub(crate) fn set_instance(&self, instance: Arc<dyn Any + Send + Sync>) {
        let _ = self.inner.instance.set(instance);
    }

    fn pod(&self) -> Result<Arc<PodShared>, PodError> {
        self.inner.pod.upgrade().ok_or(PodError::Detached)
    }

    fn own_filter(&self) -> SenderSet {
        SenderSet::from([self.inner.id])
    }

    /// Resolves one or more sibling beans.
    ///
    /// Fails with [`PodError::NotFound`] for an unknown id or label.
    pub fn siblings(&self, target: impl Into<BeanRef>) -> Result<Vec<Bean>, PodError> {
        self.pod()?.resolve(&target.into())
    }

    /// Resolves a single sibling by id.
    pub fn bean(&self, id: BeanId) -> Result<Bean, PodError> {
        self.pod()?
            .registry()
            .get(id)
            .ok_or_else(|| PodError::not_found(id))
    }

    /// Resolves every sibling registered under `label`, in registration order.
    pub fn beans_by_label(&self, label: &str) -> Result<Vec<Bean>, PodError> {
        self.siblings(label)
    }

    /// Waits until every resolved sibling has finished (succeeded, failed or cancelled).
    pub async fn wait_for(&self, target: impl Into<BeanRef>) -> Result<(), PodError> {
        let beans = self.siblings(target)?;
        for bean in &beans {
            bean.wait().await;
        }
        Ok(())
    }

    /// Subscribes `handler` to `sig`, scoped to this bean as sender.
    pub fn subscribe(&self, sig: impl Into<Signal>, handler: HandlerRef) -> Result<(), PodError> {
        self.pod()?
            .signals()
            .subscribe(sig, handler, Some(self.own_filter()));
        Ok(())
    }

    /// Removes a subscription made with [`BeanContext::subscribe`].
    pub fn unsubscribe(&self, sig: impl Into<Signal>, handler: &HandlerRef) -> Result<bool, PodError> {
        let filter = self.own_filter();
        Ok(self.pod()?.signals().unsubscribe(sig, handler, Some(&filter)))
    }

    /// Publishes `sig` to the selected senders and returns every handler outcome.
    pub async fn publish(
        &self,
        sig: impl Into<Signal>,
        senders: Senders,
        payload: Payload,
    ) -> Result<Vec<HandlerOutcome>, PodError> {
        let pod = self.pod()?;
        let filter = match senders {
            Senders::All => None,
            Senders::Ids(ids) => Some(ids),
            Senders::Labels(labels) => Some(pod.registry().ids_by_labels(&labels)?),
        };
        Ok(pod.signals().publish(sig, filter.as_ref(), payload).await)
    }

    /// Requests the pod stop sequence.
    ///
    /// A stop already in progress makes this a no-op.
    pub fn stop(&self, timeout: Option<Duration>, sig: Option<Signal>) -> Result<(), PodError> {
        self.pod()?.stop(timeout, sig)
    }

    /// Token cancelled when the pod enters its stop sequence.
    ///
    /// Beans can select on it to drain before the grace period runs out.
    pub fn stopping(&self) -> Result<CancellationToken, PodError> {
        Ok(self.pod()?.stopping_token())
    }
}

impl fmt::Debug for BeanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanContext")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}
