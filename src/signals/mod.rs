//! Signal bus: keyed publish/subscribe with sender filters.
//!
//! ## Contents
//! - [`Signal`] signal key (OS-style names or free-form user keys)
//! - [`SignalHandler`], [`HandlerFn`], [`HandlerRef`] handler abstraction
//! - [`SignalDispatcher`] the registry with fan-out-then-join publish
//!
//! The pod owns one dispatcher. Beans reach it through
//! [`BeanContext`](crate::BeanContext), which scopes subscriptions to the calling bean.

mod dispatcher;
mod handler;
mod signal;

pub use dispatcher::{HandlerOutcome, SenderSet, SignalDispatcher};
pub use handler::{HandlerFn, HandlerRef, Payload, SignalHandler};
pub use signal::Signal;
