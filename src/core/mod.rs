//! Runtime core: pod lifecycle and bean bookkeeping.
//!
//! The public API from this module is [`Pod`] (with [`PodBuilder`] and [`PodState`]) and
//! the configuration types.
//!
//! Internal modules:
//! - [`pod`]: state machine, bean instantiation, stop sequence;
//! - [`registry`]: ids, label index, pending/finished sets;
//! - [`runner`]: drives one bean computation to its final state;
//! - [`shutdown`]: cross-platform OS signal handling;
//! - [`builder`]: pre-run wiring of handlers and beans.

mod builder;
mod config;
mod pod;
mod registry;
mod runner;
mod shutdown;

pub use builder::PodBuilder;
pub use config::{BeanConfig, LogLevel, LoopType, PodConfig};
pub use pod::{Pod, PodState};

pub(crate) use pod::PodShared;
pub(crate) use registry::Registry;
