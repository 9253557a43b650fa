//! # Signal handlers.
//!
//! [`SignalHandler`] is the extension point for reacting to published signals; [`HandlerFn`]
//! wraps a closure. Handlers are shared as [`HandlerRef`] (`Arc<dyn SignalHandler>`), and
//! the `Arc` identity is what the dispatcher uses to recognise a handler on
//! re-subscribe/unsubscribe.
//!
//! ## Example
//! ```rust
//! use serde_json::Value;
//! use beanpod::{BeanError, HandlerFn, HandlerRef, Payload, Signal};
//!
//! let h: HandlerRef = HandlerFn::arc("drain", |sig: Signal, _payload: Payload| async move {
//!     Ok::<_, BeanError>(Value::String(format!("draining on {sig}")))
//! });
//! assert_eq!(h.name(), "drain");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Signal;
use crate::error::BeanError;

/// Free-form keyword payload carried by a publish.
pub type Payload = serde_json::Map<String, Value>;

/// Shared handler reference.
pub type HandlerRef = Arc<dyn SignalHandler>;

/// Reacts to a published signal.
///
/// Handlers may suspend. A handler's error or panic is isolated to its own outcome.
#[async_trait]
pub trait SignalHandler: Send + Sync + 'static {
    /// Handles one delivery and returns a result collected by the publisher.
    async fn on_signal(&self, signal: &Signal, payload: &Payload) -> Result<Value, BeanError>;

    /// Returns the handler name used in logs and publish outcomes.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed signal handler.
///
/// The closure receives owned copies of the signal and payload, so the returned
/// future can be `'static`.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new closure-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared [`HandlerRef`]-compatible `Arc`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> SignalHandler for HandlerFn<F>
where
    F: Fn(Signal, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BeanError>> + Send + 'static,
{
    async fn on_signal(&self, signal: &Signal, payload: &Payload) -> Result<Value, BeanError> {
        (self.f)(signal.clone(), payload.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
