//! # Bean registry: ids, labels and pending/finished bookkeeping.
//!
//! The registry owns the canonical [`Bean`] handles and the indexes derived from them.
//!
//! ## Layout
//! ```text
//! RegistryState (one parking_lot::Mutex, never held across an await)
//!   ├─ next_id   u64, monotonically increasing, first id = 1
//!   ├─ beans     BTreeMap<BeanId, Bean>        (ids increase → registration order)
//!   ├─ labels    HashMap<label, Vec<BeanId>>   (registration order per label)
//!   ├─ pending   BTreeSet<BeanId>
//!   └─ finished  BTreeSet<BeanId>
//! ```
//!
//! ## Rules
//! - Every id is in exactly one of `pending` / `finished`.
//! - An id moves pending → finished once, in [`Registry::complete`], under a single guard.
//! - Every id in `labels[L]` exists in `beans` with label `L`; unlabeled ids never appear.
//! - Only the pod mutates the registry; everyone else reads through accessors.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::beans::{Bean, BeanId, BeanRef, BeanState};
use crate::error::PodError;
use crate::signals::SenderSet;

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    beans: BTreeMap<BeanId, Bean>,
    labels: HashMap<Arc<str>, Vec<BeanId>>,
    pending: BTreeSet<BeanId>,
    finished: BTreeSet<BeanId>,
}

/// Registry of instantiated beans.
#[derive(Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocates the next bean id.
    pub(crate) fn next_id(&self) -> BeanId {
        let mut st = self.state.lock();
        st.next_id += 1;
        BeanId::new(st.next_id)
    }

    /// Inserts a freshly built bean as pending and indexes its label.
    pub(crate) fn insert(&self, bean: Bean) {
        let id = bean.id();
        let label: Option<Arc<str>> = bean.label().map(Arc::from);

        let mut st = self.state.lock();
        if let Some(label) = label {
            st.labels.entry(label).or_default().push(id);
        }
        st.pending.insert(id);
        st.beans.insert(id, bean);
    }

    /// Moves `id` from pending to finished and records `outcome` on the bean.
    ///
    /// Returns the bean if this call performed the move, `None` if it was already finished
    /// (or unknown).
    pub(crate) fn complete(&self, id: BeanId, outcome: BeanState) -> Option<Bean> {
        let mut st = self.state.lock();
        if !st.pending.remove(&id) {
            return None;
        }
        st.finished.insert(id);
        let bean = st.beans.get(&id).cloned()?;
        bean.record(outcome);
        Some(bean)
    }

    pub(crate) fn get(&self, id: BeanId) -> Option<Bean> {
        self.state.lock().beans.get(&id).cloned()
    }

    /// Beans registered under `label`, in registration order.
    pub(crate) fn by_label(&self, label: &str) -> Option<Vec<Bean>> {
        let st = self.state.lock();
        let ids = st.labels.get(label)?;
        Some(ids.iter().filter_map(|id| st.beans.get(id).cloned()).collect())
    }

    /// Resolves a [`BeanRef`] to one or more beans.
    pub(crate) fn resolve(&self, target: &BeanRef) -> Result<Vec<Bean>, PodError> {
        match target {
            BeanRef::Id(id) => self
                .get(*id)
                .map(|bean| vec![bean])
                .ok_or_else(|| PodError::not_found(target)),
            BeanRef::Label(label) => self
                .by_label(label)
                .ok_or_else(|| PodError::not_found(target)),
        }
    }

    /// Collects the ids of every bean carrying one of `labels`.
    pub(crate) fn ids_by_labels(&self, labels: &[String]) -> Result<SenderSet, PodError> {
        let st = self.state.lock();
        let mut ids = SenderSet::new();
        for label in labels {
            let found = st
                .labels
                .get(label.as_str())
                .ok_or_else(|| PodError::not_found(BeanRef::Label(label.clone())))?;
            ids.extend(found.iter().copied());
        }
        Ok(ids)
    }

    /// Every bean, in registration order.
    pub(crate) fn all(&self) -> Vec<Bean> {
        self.state.lock().beans.values().cloned().collect()
    }

    pub(crate) fn pending_ids(&self) -> Vec<BeanId> {
        self.state.lock().pending.iter().copied().collect()
    }

    pub(crate) fn finished_ids(&self) -> Vec<BeanId> {
        self.state.lock().finished.iter().copied().collect()
    }

    /// Beans still pending at this instant.
    pub(crate) fn pending_beans(&self) -> Vec<Bean> {
        let st = self.state.lock();
        st.pending
            .iter()
            .filter_map(|id| st.beans.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::BeanContext;
    use crate::core::PodConfig;
    use std::sync::Weak;

    fn bean(reg: &Registry, label: Option<&str>) -> Bean {
        let id = reg.next_id();
        let ctx = BeanContext::new(
            id,
            label.map(Arc::from),
            Arc::new(PodConfig::default()),
            Weak::new(),
        );
        let bean = Bean::new(ctx);
        reg.insert(bean.clone());
        bean
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let reg = Registry::new();
        let ids: Vec<u64> = (0..4).map(|_| bean(&reg, None).id().get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pending_and_finished_partition() {
        let reg = Registry::new();
        let a = bean(&reg, None);
        let b = bean(&reg, None);
        assert_eq!(reg.pending_ids(), vec![a.id(), b.id()]);

        assert!(reg.complete(a.id(), BeanState::Succeeded).is_some());
        assert_eq!(reg.pending_ids(), vec![b.id()]);
        assert_eq!(reg.finished_ids(), vec![a.id()]);
        assert_eq!(a.state(), BeanState::Succeeded);

        // Second completion is ignored and does not overwrite the state.
        assert!(reg.complete(a.id(), BeanState::Cancelled).is_none());
        assert_eq!(a.state(), BeanState::Succeeded);
        assert_eq!(reg.pending_ids().len() + reg.finished_ids().len(), 2);
    }

    #[test]
    fn test_label_index() {
        let reg = Registry::new();
        let w1 = bean(&reg, Some("worker"));
        let _plain = bean(&reg, None);
        let w2 = bean(&reg, Some("worker"));
        let m = bean(&reg, Some("monitor"));

        let workers: Vec<BeanId> = reg
            .by_label("worker")
            .unwrap()
            .iter()
            .map(Bean::id)
            .collect();
        assert_eq!(workers, vec![w1.id(), w2.id()]);
        assert!(reg.by_label("nobody").is_none());

        let ids = reg
            .ids_by_labels(&["worker".to_string(), "monitor".to_string()])
            .unwrap();
        assert_eq!(ids, SenderSet::from([w1.id(), w2.id(), m.id()]));

        for label in ["worker", "monitor"] {
            for b in reg.by_label(label).unwrap() {
                assert_eq!(b.label(), Some(label));
            }
        }
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let reg = Registry::new();
        bean(&reg, Some("worker"));
        assert!(matches!(
            reg.resolve(&BeanRef::Id(BeanId::new(99))),
            Err(PodError::NotFound { .. })
        ));
        assert!(matches!(
            reg.resolve(&BeanRef::from("ghost")),
            Err(PodError::NotFound { .. })
        ));
        assert!(matches!(
            reg.ids_by_labels(&["worker".into(), "ghost".into()]),
            Err(PodError::NotFound { .. })
        ));
    }
}
