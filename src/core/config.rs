//! # Pod configuration.
//!
//! Provides [`PodConfig`], the already-validated settings the pod runs with, and
//! [`BeanConfig`], one bean descriptor. Loading and merging configuration files is the
//! caller's business; this module only defines the shape (deserializable with serde).
//!
//! ## Sentinel values
//! - `stop_wait_time = None` → wait indefinitely for beans during stop
//! - `stop_wait_time = Some(0)` → cancel pending beans immediately
//! - `bus_capacity = 0` → clamped to 1
//!
//! ## Example
//! ```rust
//! use beanpod::{LogLevel, PodConfig};
//!
//! let cfg: PodConfig = serde_json::from_str(r#"{
//!     "beans": [
//!         { "core": "app.Hello", "label": "greeter", "greeting": "hi" }
//!     ],
//!     "log_level": "debug",
//!     "stop_wait_time": 5
//! }"#).unwrap();
//!
//! assert_eq!(cfg.beans[0].core, "app.Hello");
//! assert_eq!(cfg.beans[0].extra["greeting"], "hi");
//! assert_eq!(cfg.log_level, LogLevel::Debug);
//! assert_eq!(cfg.stop_timeout(), Some(std::time::Duration::from_secs(5)));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::beans::Params;

/// Bean descriptor.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BeanConfig {
    /// Catalog identifier of the bean implementation.
    pub core: String,
    /// Optional group label.
    #[serde(default)]
    pub label: Option<String>,
    /// Optional bean-specific config file, passed to the bean as the `config` param.
    #[serde(default)]
    pub config: Option<PathBuf>,
    /// Every other key, passed to the bean as params.
    #[serde(flatten)]
    pub extra: Params,
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only (alias of `Error` for tracing).
    Critical,
    /// Errors.
    Error,
    /// Warnings and above.
    Warning,
    /// Informational and above.
    #[default]
    Info,
    /// Everything the pod logs.
    Debug,
}

impl LogLevel {
    /// Maps the level onto a `tracing` level.
    pub const fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Critical | LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// Scheduler flavour used by [`launch`](crate::launch).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    /// Single-threaded scheduler.
    CurrentThread,
    /// Work-stealing multi-threaded scheduler.
    MultiThread,
    /// Let the runtime decide (currently single-threaded).
    #[default]
    Auto,
}

/// Configuration of one pod.
///
/// ## Field semantics
/// - `beans`: ordered bean descriptors, registered by [`launch`](crate::launch)
/// - `log_level`: verbosity for the tracing subscriber installed by `launch`
/// - `loop_type`: scheduler flavour built by `launch`
/// - `debug`: forces debug-level logging
/// - `stop_wait_time`: grace period in seconds for OS-signal-triggered stops (`None` = forever)
/// - `handle_os_signals`: map SIGINT/SIGTERM/SIGQUIT to `stop()` while running
/// - `bus_capacity`: lifecycle event bus ring buffer size
///
/// ## Notes
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    /// Bean descriptors, in registration order.
    pub beans: Vec<BeanConfig>,
    /// Log verbosity.
    pub log_level: LogLevel,
    /// Scheduler flavour.
    pub loop_type: LoopType,
    /// Debug mode.
    pub debug: bool,
    /// Grace period in seconds for signal-triggered stops.
    pub stop_wait_time: Option<u64>,
    /// Whether `run()` listens for OS termination signals.
    pub handle_os_signals: bool,
    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,
}

impl PodConfig {
    /// Returns the grace period as a `Duration` (`None` = wait indefinitely).
    #[inline]
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_wait_time.map(Duration::from_secs)
    }

    /// Returns the effective log level (`debug` forces [`LogLevel::Debug`]).
    #[inline]
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PodConfig {
    /// Default configuration:
    ///
    /// - no beans
    /// - `log_level = info`, `loop_type = auto`, `debug = false`
    /// - `stop_wait_time = None` (wait indefinitely)
    /// - `handle_os_signals = false`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            beans: Vec::new(),
            log_level: LogLevel::default(),
            loop_type: LoopType::default(),
            debug: false,
            stop_wait_time: None,
            handle_os_signals: false,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PodConfig::default();
        assert!(cfg.beans.is_empty());
        assert_eq!(cfg.stop_timeout(), None);
        assert_eq!(cfg.effective_log_level(), LogLevel::Info);
        assert_eq!(cfg.loop_type, LoopType::Auto);
    }

    #[test]
    fn test_debug_forces_debug_level() {
        let cfg = PodConfig {
            debug: true,
            log_level: LogLevel::Error,
            ..PodConfig::default()
        };
        assert_eq!(cfg.effective_log_level(), LogLevel::Debug);
        assert_eq!(
            cfg.effective_log_level().as_tracing_level(),
            tracing::Level::DEBUG
        );
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = PodConfig {
            bus_capacity: 0,
            ..PodConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_descriptor_extras_are_params() {
        let cfg: PodConfig = serde_json::from_value(serde_json::json!({
            "beans": [
                { "core": "a" },
                { "core": "b", "label": "worker", "config": "b.toml", "workers": 4 }
            ],
            "loop_type": "multi_thread",
            "stop_wait_time": 0
        }))
        .unwrap();

        assert_eq!(cfg.beans.len(), 2);
        assert!(cfg.beans[0].label.is_none());
        assert!(cfg.beans[0].extra.is_empty());
        assert_eq!(cfg.beans[1].label.as_deref(), Some("worker"));
        assert_eq!(cfg.beans[1].config, Some(PathBuf::from("b.toml")));
        assert_eq!(cfg.beans[1].extra["workers"], 4);
        assert!(!cfg.beans[1].extra.contains_key("label"));
        assert_eq!(cfg.loop_type, LoopType::MultiThread);
        assert_eq!(cfg.stop_timeout(), Some(Duration::ZERO));
    }
}
