//! Pod lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Events are for observation only; the pod never reads them back. Obtain a receiver with
//! [`Pod::events`](crate::Pod::events) **before** calling `run()` to see the full sequence.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
