//! # Named bean factories.
//!
//! Bean descriptors in [`PodConfig`](crate::PodConfig) name their implementation with a
//! `core` identifier. A [`BeanCatalog`] maps those identifiers to factory builders; the
//! pod resolves them at registration time, so an unknown identifier is rejected before
//! anything runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::BeanFactory;
use crate::error::PodError;

type Builder = Arc<dyn Fn() -> BeanFactory + Send + Sync>;

/// Registry of factory builders keyed by `core` identifier.
#[derive(Clone, Default)]
pub struct BeanCatalog {
    entries: HashMap<String, Builder>,
}

impl BeanCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an entry, builder style.
    pub fn with<F>(mut self, core: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> BeanFactory + Send + Sync + 'static,
    {
        self.insert(core, build);
        self
    }

    /// Adds (or replaces) an entry.
    pub fn insert<F>(&mut self, core: impl Into<String>, build: F)
    where
        F: Fn() -> BeanFactory + Send + Sync + 'static,
    {
        self.entries.insert(core.into(), Arc::new(build));
    }

    /// True if `core` is known.
    pub fn contains(&self, core: &str) -> bool {
        self.entries.contains_key(core)
    }

    /// Builds a fresh factory for `core`.
    ///
    /// Fails with [`PodError::InvalidBeanType`] for an unknown identifier.
    pub fn resolve(&self, core: &str) -> Result<BeanFactory, PodError> {
        self.entries
            .get(core)
            .map(|build| build())
            .ok_or_else(|| PodError::InvalidBeanType {
                core: core.to_string(),
            })
    }
}

impl fmt::Debug for BeanCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cores: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        cores.sort_unstable();
        f.debug_struct("BeanCatalog").field("cores", &cores).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_core() {
        let catalog = BeanCatalog::new().with("noop", || BeanFactory::ready(async { Ok(()) }));
        assert!(catalog.contains("noop"));
        assert_eq!(catalog.resolve("noop").map(|f| f.kind()).ok(), Some("ready"));
    }

    #[test]
    fn test_resolve_unknown_core_is_invalid_type() {
        let catalog = BeanCatalog::new();
        match catalog.resolve("app.Missing") {
            Err(PodError::InvalidBeanType { core }) => assert_eq!(core, "app.Missing"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_each_resolve_builds_a_fresh_factory() {
        let catalog = BeanCatalog::new().with("p", || {
            BeanFactory::producer(|_params| async { Ok(()) })
        });
        assert!(catalog.resolve("p").is_ok());
        assert!(catalog.resolve("p").is_ok());
    }
}
