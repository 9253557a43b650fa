//! # Beans: supervised computations, their contexts and factories.
//!
//! - [`Bean`], [`BeanId`], [`BeanState`] identity and completion state
//! - [`BeanContext`], [`BeanRef`], [`Senders`] the capability handle a bean receives
//! - [`BeanFactory`], [`BeanHandler`], [`Params`] how a computation is obtained
//! - [`Server`] startup/run/cleanup bean shape
//! - [`BeanCatalog`] named factories for config-driven registration

mod bean;
mod catalog;
mod context;
mod factory;
mod server;

pub use bean::{Bean, BeanId, BeanState};
pub use catalog::BeanCatalog;
pub use context::{BeanContext, BeanRef, Senders};
pub use factory::{BeanFactory, BeanFuture, BeanHandler, Params};
pub use server::Server;
