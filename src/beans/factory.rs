//! # Bean factories.
//!
//! A [`BeanFactory`] is classified once, when it is built, into one of three shapes:
//!
//! ```text
//! Ready(fut)           an already-built computation; params are ignored
//! Producer(f)          f(params) → computation
//! Handler(ctor)        ctor(ctx, params) → computation
//!                        ├─ BeanFactory::handler::<H>()   H::build(ctx), then H::call(params)
//!                        ├─ BeanFactory::server::<S>()    startup → run → cleanup
//!                        └─ BeanFactory::with_context(f)  f(ctx, params)
//! ```
//!
//! The pod evaluates the factory at `run()` with a fresh [`BeanContext`] and never
//! inspects its shape again.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use super::BeanContext;
use super::server::{Server, serve};
use crate::error::BeanError;

/// Keyword parameters passed to producers and handlers.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// A bean computation.
pub type BeanFuture = BoxFuture<'static, Result<(), BeanError>>;

type ProducerFn = Box<dyn FnOnce(Params) -> BeanFuture + Send>;
type ConstructorFn = Box<dyn FnOnce(BeanContext, Params) -> BeanFuture + Send>;

/// Constructible handler type: built with the bean's context, then invoked with params.
///
/// The built instance is cached in the context and can be fetched back with
/// [`BeanContext::instance`].
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use beanpod::{BeanContext, BeanError, BeanFactory, BeanHandler, Params};
///
/// struct Hello {
///     ctx: BeanContext,
/// }
///
/// #[async_trait]
/// impl BeanHandler for Hello {
///     fn build(ctx: BeanContext) -> Self {
///         Self { ctx }
///     }
///
///     async fn call(&self, params: Params) -> Result<(), BeanError> {
///         println!("hello from {} with {params:?}", self.ctx.id());
///         Ok(())
///     }
/// }
///
/// let _factory = BeanFactory::handler::<Hello>();
/// ```
#[async_trait]
pub trait BeanHandler: Send + Sync + 'static {
    /// Builds the handler for one bean.
    fn build(ctx: BeanContext) -> Self
    where
        Self: Sized;

    /// Runs the bean computation.
    async fn call(&self, params: Params) -> Result<(), BeanError>;
}

/// How a bean's computation is obtained.
pub enum BeanFactory {
    /// Already-constructed computation.
    Ready(BeanFuture),
    /// Computation producer taking the registration params.
    Producer(ProducerFn),
    /// Context-aware constructor taking the context and the registration params.
    Handler(ConstructorFn),
}

impl BeanFactory {
    /// Wraps an already-constructed computation.
    pub fn ready<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<(), BeanError>> + Send + 'static,
    {
        BeanFactory::Ready(fut.boxed())
    }

    /// Wraps a producer called with the registration params.
    pub fn producer<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Params) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BeanError>> + Send + 'static,
    {
        BeanFactory::Producer(Box::new(move |params| f(params).boxed()))
    }

    /// Wraps a closure that also receives the bean context.
    pub fn with_context<F, Fut>(f: F) -> Self
    where
        F: FnOnce(BeanContext, Params) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BeanError>> + Send + 'static,
    {
        BeanFactory::Handler(Box::new(move |ctx, params| f(ctx, params).boxed()))
    }

    /// Uses the handler type `H`.
    pub fn handler<H: BeanHandler>() -> Self {
        BeanFactory::Handler(Box::new(|ctx: BeanContext, params| {
            let instance = Arc::new(H::build(ctx.clone()));
            ctx.set_instance(instance.clone());
            async move { instance.call(params).await }.boxed()
        }))
    }

    /// Uses the server type `S` (see [`Server`]).
    pub fn server<S: Server>() -> Self {
        BeanFactory::Handler(Box::new(|ctx: BeanContext, params| {
            let server = Arc::new(S::build(ctx.clone()));
            ctx.set_instance(server.clone());
            serve(server, ctx, params).boxed()
        }))
    }

    /// Returns a short stable label for the factory shape.
    pub fn kind(&self) -> &'static str {
        match self {
            BeanFactory::Ready(_) => "ready",
            BeanFactory::Producer(_) => "producer",
            BeanFactory::Handler(_) => "handler",
        }
    }

    /// Turns the factory into the computation for the bean owning `ctx`.
    pub(crate) fn into_future(self, ctx: BeanContext, params: Params) -> BeanFuture {
        match self {
            BeanFactory::Ready(fut) => fut,
            BeanFactory::Producer(f) => f(params),
            BeanFactory::Handler(ctor) => ctor(ctx, params),
        }
    }
}

impl fmt::Debug for BeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BeanFactory").field(&self.kind()).finish()
    }
}
