//! # beanpod
//!
//! **beanpod** is an in-process supervisor for independently running async units of work
//! ("beans").
//!
//! A [`Pod`] starts every registered bean, groups them by label, lets them coordinate
//! through a keyed [`SignalDispatcher`], and stops them with a two-phase protocol:
//! publish a stop signal, wait a grace period, then cancel whatever is still running.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ BeanFactory  │   │ BeanFactory  │   │ BeanCatalog  │◄── BeanConfig { core, .. }
//!     │ (ready)      │   │ (handler)    │   │ (by name)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ register()       ▼                  ▼ register_descriptor()
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Pod (Idle → Running → Stopping → Stopped)                        │
//! │  - Registry (ids, label index, pending/finished)                  │
//! │  - SignalDispatcher (keyed pub/sub with sender filters)           │
//! │  - Bus (lifecycle events)                                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Bean #1      │   │ Bean #2      │   │ Bean #3      │
//!     │ BeanContext ─┼───┼► siblings,   │   │              │
//!     │              │   │  wait_for,   │   │              │
//!     │              │   │  publish,    │   │              │
//!     │              │   │  stop        │   │              │
//!     └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ### Stop protocol
//! ```text
//! stop(timeout, sig)
//!   ├─► publish sig to every subscriber (handlers run concurrently, errors isolated)
//!   ├─► wait until all beans finished, at most until request + timeout
//!   └─► cancel every bean still pending ──► Stopped
//! ```
//!
//! ## Features
//! | Area               | Description                                             | Key types                                 |
//! |--------------------|---------------------------------------------------------|-------------------------------------------|
//! | **Supervision**    | Register, run and stop a set of beans.                  | [`Pod`], [`PodBuilder`], [`PodState`]     |
//! | **Beans**          | Computations, their identity and completion state.      | [`Bean`], [`BeanId`], [`BeanState`]       |
//! | **Factories**      | How a computation is obtained.                          | [`BeanFactory`], [`BeanHandler`], [`Server`] |
//! | **Context**        | Lookup, barriers, signals and stop from inside a bean.  | [`BeanContext`], [`BeanRef`], [`Senders`] |
//! | **Signals**        | Keyed pub/sub with sender filters.                      | [`SignalDispatcher`], [`SignalHandler`]   |
//! | **Events**         | Lifecycle events for observation.                       | [`Event`], [`EventKind`]                  |
//! | **Configuration**  | Serde-deserializable pod and bean descriptors.          | [`PodConfig`], [`BeanConfig`]             |
//! | **Errors**         | Typed errors for the pod API and computations.          | [`PodError`], [`BeanError`]               |
//!
//! ## Optional features
//! - `logging` (default): [`launch`] installs a `tracing-subscriber` fmt subscriber.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use beanpod::{BeanContext, BeanError, BeanFactory, Params, Pod, PodConfig, Senders, Signal};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pod = Pod::new(PodConfig::default());
//!
//!     for _ in 0..2 {
//!         pod.register(
//!             BeanFactory::with_context(|ctx: BeanContext, _params| async move {
//!                 // Leave as soon as the pod starts stopping.
//!                 let stopping = ctx.stopping().map_err(BeanError::fail)?;
//!                 stopping.cancelled().await;
//!                 Ok(())
//!             }),
//!             Some("worker"),
//!             Params::new(),
//!         )?;
//!     }
//!
//!     pod.register(
//!         BeanFactory::with_context(|ctx: BeanContext, _params| async move {
//!             let workers = ctx.siblings("worker").map_err(BeanError::fail)?;
//!             assert_eq!(workers.len(), 2);
//!             ctx.publish("hello", Senders::Labels(vec!["worker".into()]), Params::new())
//!                 .await
//!                 .map_err(BeanError::fail)?;
//!             ctx.stop(Some(Duration::from_secs(1)), Some(Signal::TERMINATE))
//!                 .map_err(BeanError::fail)
//!         }),
//!         None,
//!         Params::new(),
//!     )?;
//!
//!     pod.run().await?;
//!     assert!(pod.pending().is_empty());
//!     Ok(())
//! }
//! ```
mod beans;
mod core;
mod error;
mod events;
mod launch;
mod signals;

// ---- Public re-exports ----

pub use beans::{
    Bean, BeanCatalog, BeanContext, BeanFactory, BeanFuture, BeanHandler, BeanId, BeanRef,
    BeanState, Params, Senders, Server,
};
pub use crate::core::{BeanConfig, LogLevel, LoopType, Pod, PodBuilder, PodConfig, PodState};
pub use error::{BeanError, HandlerError, PodError};
pub use events::{Event, EventKind};
pub use launch::launch;
pub use signals::{
    HandlerFn, HandlerOutcome, HandlerRef, Payload, SenderSet, Signal, SignalDispatcher,
    SignalHandler,
};
