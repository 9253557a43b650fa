//! # Pod: registers beans, runs them, and drives the stop sequence.
//!
//! The [`Pod`] owns the bean registry, the [`SignalDispatcher`], the lifecycle event bus
//! and the pod configuration. It spawns one driver per bean and coordinates shutdown.
//!
//! ## State machine
//! ```text
//! Idle ──run()──► Running ──stop()──► Stopping ──(stop sequence done)──► Stopped
//!   │                │                   │
//!   register()       all beans done      stop() again = no-op
//!                    └─► stop(None, None)
//! ```
//!
//! ## run()
//! ```text
//! Idle → Running, publish PodStarted
//!   ├─ instantiate every registration (id, context, computation, registry insert)
//!   ├─ spawn one driver per bean: run_bean(..) ──► complete(bean, state)
//!   ├─ optional OS signal listener ──► stop(stop_wait_time, Some(signal))
//!   ├─ join all drivers ──► `finished` token
//!   ├─ no stop in progress? ──► stop(None, None)
//!   └─ await `stopped` token ──► Stopped, publish PodStopped
//! ```
//!
//! ## Stop sequence
//! ```text
//! stop(timeout, sig)  (requested_at = now)
//!   ├─ Running → Stopping, cancel `stopping` token, publish StopRequested
//!   └─ spawn:
//!        ├─ sig given? publish it unfiltered, log the aggregate
//!        ├─ wait for `finished` until requested_at + timeout (None = forever)
//!        ├─ cancel every bean still pending (GraceExceeded if any)
//!        └─ cancel `stopped` token
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use beanpod::{BeanFactory, BeanState, Params, Pod, PodConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), beanpod::PodError> {
//!     let pod = Pod::new(PodConfig::default());
//!
//!     pod.register(BeanFactory::ready(async { Ok(()) }), Some("quick"), Params::new())?;
//!     pod.register(
//!         BeanFactory::with_context(|ctx, _params| async move {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!             ctx.stop(Some(Duration::from_millis(20)), None).ok();
//!             std::future::pending::<()>().await;
//!             Ok(())
//!         }),
//!         None,
//!         Params::new(),
//!     )?;
//!
//!     pod.run().await?;
//!
//!     let states: Vec<BeanState> = pod.beans().iter().map(|b| b.state()).collect();
//!     assert_eq!(states, vec![BeanState::Succeeded, BeanState::Cancelled]);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::builder::PodBuilder;
use super::registry::Registry;
use super::runner::run_bean;
use super::shutdown;
use crate::beans::{
    Bean, BeanCatalog, BeanContext, BeanFactory, BeanFuture, BeanId, BeanRef, BeanState, Params,
};
use crate::core::{BeanConfig, PodConfig};
use crate::error::{BeanError, PodError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::signals::{Payload, Signal, SignalDispatcher};

/// Lifecycle state of a [`Pod`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodState {
    /// Accepting registrations; `run()` not called yet.
    Idle,
    /// Beans are running.
    Running,
    /// The stop sequence is in progress.
    Stopping,
    /// Terminal state.
    Stopped,
}

impl PodState {
    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            PodState::Idle => "idle",
            PodState::Running => "running",
            PodState::Stopping => "stopping",
            PodState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A queued registration, instantiated at `run()`.
pub(crate) struct Registration {
    pub(crate) factory: BeanFactory,
    pub(crate) label: Option<String>,
    pub(crate) params: Params,
}

struct Lifecycle {
    state: PodState,
    registrations: Vec<Registration>,
    /// Runtime `run()` executes on; the stop sequence is spawned there.
    runtime: Option<Handle>,
}

/// State shared by the pod handle, bean drivers and bean contexts.
pub(crate) struct PodShared {
    cfg: Arc<PodConfig>,
    bus: Bus,
    signals: SignalDispatcher,
    registry: Registry,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<PodState>,
    /// Cancelled once every registered bean is in the registry.
    started: CancellationToken,
    /// Cancelled when the stop sequence starts.
    stopping: CancellationToken,
    /// Cancelled when every bean has finished.
    finished: CancellationToken,
    /// Cancelled when the stop sequence is complete.
    stopped: CancellationToken,
}

impl PodShared {
    pub(crate) fn new(
        cfg: PodConfig,
        signals: SignalDispatcher,
        registrations: Vec<Registration>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (state_tx, _) = watch::channel(PodState::Idle);
        Self {
            cfg: Arc::new(cfg),
            bus,
            signals,
            registry: Registry::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: PodState::Idle,
                registrations,
                runtime: None,
            }),
            state_tx,
            started: CancellationToken::new(),
            stopping: CancellationToken::new(),
            finished: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn signals(&self) -> &SignalDispatcher {
        &self.signals
    }

    pub(crate) fn resolve(&self, target: &BeanRef) -> Result<Vec<Bean>, PodError> {
        self.registry.resolve(target)
    }

    pub(crate) fn stopping_token(&self) -> CancellationToken {
        self.stopping.clone()
    }

    fn state(&self) -> PodState {
        self.lifecycle.lock().state
    }

    fn transition(&self, lc: &mut Lifecycle, next: PodState) {
        debug!(from = %lc.state, to = %next, "pod state");
        lc.state = next;
        self.state_tx.send_replace(next);
    }

    pub(crate) fn register(&self, reg: Registration) -> Result<(), PodError> {
        let mut lc = self.lifecycle.lock();
        if lc.state != PodState::Idle {
            return Err(PodError::InvalidState {
                op: "register",
                state: lc.state,
            });
        }
        debug!(kind = reg.factory.kind(), label = ?reg.label, "bean registered");
        lc.registrations.push(reg);
        Ok(())
    }

    /// Idle → Running; hands out the queued registrations.
    fn begin_run(&self) -> Result<Vec<Registration>, PodError> {
        let mut lc = self.lifecycle.lock();
        if lc.state != PodState::Idle {
            return Err(PodError::InvalidState {
                op: "run",
                state: lc.state,
            });
        }
        lc.runtime = Some(Handle::current());
        self.transition(&mut lc, PodState::Running);
        Ok(std::mem::take(&mut lc.registrations))
    }

    /// Builds every bean, then spawns their drivers.
    ///
    /// All beans are in the registry before the first driver is polled, so sibling
    /// lookups made at the start of a computation see the whole pod.
    fn instantiate(self: &Arc<Self>, registrations: Vec<Registration>) -> JoinSet<()> {
        let mut built = Vec::with_capacity(registrations.len());
        for reg in registrations {
            let id = self.registry.next_id();
            let label: Option<Arc<str>> = reg.label.as_deref().map(Arc::from);
            let ctx = BeanContext::new(
                id,
                label,
                Arc::clone(&self.cfg),
                Arc::downgrade(self),
            );
            let fut = build_computation(reg.factory, ctx.clone(), reg.params);
            let bean = Bean::new(ctx);
            self.registry.insert(bean.clone());
            built.push((bean, fut));
        }

        let mut drivers = JoinSet::new();
        for (bean, fut) in built {
            debug!(bean = %bean.id(), label = ?bean.label(), "bean started");
            self.bus.publish(bean_event(EventKind::BeanStarted, &bean));

            let shared = Arc::clone(self);
            drivers.spawn(async move {
                let state = run_bean(fut, bean.cancel_token()).await;
                shared.complete(&bean, state);
            });
        }
        drivers
    }

    /// Records a bean's final state, logs it and publishes the matching event.
    fn complete(&self, bean: &Bean, state: BeanState) {
        if self.registry.complete(bean.id(), state.clone()).is_none() {
            return;
        }
        let ev = match &state {
            BeanState::Succeeded => {
                debug!(bean = %bean.id(), label = ?bean.label(), "bean finished");
                bean_event(EventKind::BeanFinished, bean)
            }
            BeanState::Failed(reason) => {
                error!(bean = %bean.id(), label = ?bean.label(), reason = %reason, "bean failed");
                bean_event(EventKind::BeanFailed, bean).with_reason(Arc::clone(reason))
            }
            BeanState::Cancelled => {
                debug!(bean = %bean.id(), label = ?bean.label(), "bean cancelled");
                bean_event(EventKind::BeanCancelled, bean)
            }
            BeanState::Pending => return,
        };
        self.bus.publish(ev);
    }

    /// Maps the first OS termination signal onto `stop()`.
    fn spawn_os_signal_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.cfg.handle_os_signals {
            return None;
        }
        let pod = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            match shutdown::wait_for_os_signal().await {
                Ok(sig) => {
                    let Some(pod) = pod.upgrade() else {
                        return;
                    };
                    info!(signal = %sig, "os signal received");
                    if let Err(e) = pod.stop(pod.cfg.stop_timeout(), Some(sig)) {
                        debug!(error = %e, "os signal ignored");
                    }
                }
                Err(e) => warn!(error = %e, "failed to install os signal handlers"),
            }
        }))
    }

    /// Starts the stop sequence; a no-op when one is already running.
    pub(crate) fn stop(
        self: &Arc<Self>,
        timeout: Option<Duration>,
        sig: Option<Signal>,
    ) -> Result<(), PodError> {
        let requested_at = Instant::now();
        let runtime = {
            let mut lc = self.lifecycle.lock();
            match lc.state {
                PodState::Running => {}
                PodState::Stopping => return Ok(()),
                state => return Err(PodError::InvalidState { op: "stop", state }),
            }
            self.transition(&mut lc, PodState::Stopping);
            lc.runtime.clone()
        };
        self.stopping.cancel();

        info!(timeout = ?timeout, signal = ?sig.as_ref().map(Signal::as_str), "pod stop requested");
        let mut ev = Event::new(EventKind::StopRequested);
        if let Some(sig) = &sig {
            ev = ev.with_signal(sig.clone());
        }
        self.bus.publish(ev);

        let sequence = Arc::clone(self).stop_sequence(requested_at, timeout, sig);
        match runtime {
            Some(handle) => drop(handle.spawn(sequence)),
            None => drop(tokio::spawn(sequence)),
        }
        Ok(())
    }

    async fn stop_sequence(
        self: Arc<Self>,
        requested_at: Instant,
        timeout: Option<Duration>,
        sig: Option<Signal>,
    ) {
        // A stop requested from a constructor must still see every bean.
        self.started.cancelled().await;

        if let Some(sig) = sig {
            let outcomes = self.signals.publish(sig.clone(), None, Payload::new()).await;
            let mut failed = 0usize;
            for outcome in &outcomes {
                if let Err(e) = &outcome.result {
                    failed += 1;
                    warn!(signal = %sig, handler = %outcome.handler, error = %e, "signal handler failed");
                }
            }
            debug!(signal = %sig, handlers = outcomes.len(), failed, "stop signal dispatched");
        }

        let finished = self.finished.cancelled();
        // A deadline past the clock's range is the same as waiting indefinitely.
        match timeout.and_then(|grace| requested_at.checked_add(grace)) {
            None => finished.await,
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, finished).await.is_err() {
                    debug!(grace = ?timeout, "grace period elapsed");
                }
            }
        }

        let pending = self.registry.pending_beans();
        if !pending.is_empty() {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_reason(format!("{} beans cancelled", pending.len())),
            );
        }
        for bean in pending {
            warn!(bean = %bean.id(), label = ?bean.label(), "cancelling bean");
            bean.cancel();
        }
        self.stopped.cancel();
    }

    async fn run(self: &Arc<Self>) -> Result<(), PodError> {
        let registrations = self.begin_run()?;
        info!(beans = registrations.len(), "pod started");
        self.bus.publish(Event::new(EventKind::PodStarted));

        let mut drivers = self.instantiate(registrations);
        self.started.cancel();
        let listener = self.spawn_os_signal_listener();

        while drivers.join_next().await.is_some() {}
        self.finished.cancel();
        debug!("all beans finished");

        self.stop(None, None)?;
        self.stopped.cancelled().await;

        if let Some(listener) = listener {
            listener.abort();
        }
        {
            let mut lc = self.lifecycle.lock();
            self.transition(&mut lc, PodState::Stopped);
            lc.runtime = None;
        }
        info!(
            finished = self.registry.finished_ids().len(),
            "pod stopped"
        );
        self.bus.publish(Event::new(EventKind::PodStopped));
        Ok(())
    }
}

/// Evaluates a factory, turning a panicking constructor into a failing computation.
fn build_computation(factory: BeanFactory, ctx: BeanContext, params: Params) -> BeanFuture {
    std::panic::catch_unwind(AssertUnwindSafe(|| factory.into_future(ctx, params)))
        .unwrap_or_else(|panic| {
            let err = BeanError::fail(format!("constructor panicked: {}", panic_message(panic)));
            future::ready(Err(err)).boxed()
        })
}

fn bean_event(kind: EventKind, bean: &Bean) -> Event {
    let ev = Event::new(kind).with_bean(bean.id());
    match bean.label() {
        Some(label) => ev.with_label(label),
        None => ev,
    }
}

/// Supervisor of a set of beans.
///
/// `Pod` is a cheap handle; clones drive and observe the same pod.
#[derive(Clone)]
pub struct Pod {
    shared: Arc<PodShared>,
}

impl Pod {
    /// Creates a pod with the given configuration.
    pub fn new(cfg: PodConfig) -> Self {
        PodBuilder::new(cfg).build()
    }

    /// Returns a builder for a pod with pre-subscribed signal handlers.
    pub fn builder(cfg: PodConfig) -> PodBuilder {
        PodBuilder::new(cfg)
    }

    pub(crate) fn from_shared(shared: Arc<PodShared>) -> Self {
        Self { shared }
    }

    /// Queues a bean for instantiation at `run()`.
    ///
    /// Fails with [`PodError::InvalidState`] unless the pod is idle.
    pub fn register(
        &self,
        factory: BeanFactory,
        label: Option<&str>,
        params: Params,
    ) -> Result<(), PodError> {
        self.shared.register(Registration {
            factory,
            label: label.map(str::to_string),
            params,
        })
    }

    /// Queues the bean described by `desc`, resolving its `core` in `catalog`.
    ///
    /// Descriptor extras become params; `desc.config` is passed as the `config` param.
    pub fn register_descriptor(
        &self,
        desc: &BeanConfig,
        catalog: &BeanCatalog,
    ) -> Result<(), PodError> {
        let factory = catalog.resolve(&desc.core)?;
        let mut params = desc.extra.clone();
        if let Some(path) = &desc.config {
            params.insert(
                "config".to_string(),
                Value::String(path.to_string_lossy().into_owned()),
            );
        }
        self.register(factory, desc.label.as_deref(), params)
    }

    /// Runs every registered bean until they finish or a stop completes.
    ///
    /// Bean failures and forced cancellations are not errors; inspect the beans for
    /// their final state. Fails with [`PodError::InvalidState`] unless the pod is idle.
    pub async fn run(&self) -> Result<(), PodError> {
        self.shared.run().await
    }

    /// Requests the stop sequence.
    ///
    /// - `timeout`: grace period measured from this call (`None` = wait indefinitely,
    ///   zero = cancel pending beans immediately)
    /// - `sig`: signal published to every subscriber before waiting
    ///
    /// A no-op while already stopping; fails with [`PodError::InvalidState`] when idle
    /// or stopped.
    pub fn stop(&self, timeout: Option<Duration>, sig: Option<Signal>) -> Result<(), PodError> {
        self.shared.stop(timeout, sig)
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> PodState {
        self.shared.state()
    }

    /// Returns a receiver observing lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<PodState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribes to lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Returns the bean with the given id.
    pub fn bean(&self, id: BeanId) -> Result<Bean, PodError> {
        self.shared
            .registry
            .get(id)
            .ok_or_else(|| PodError::not_found(id))
    }

    /// Returns every instantiated bean, in registration order.
    pub fn beans(&self) -> Vec<Bean> {
        self.shared.registry.all()
    }

    /// Returns the beans registered under `label`, in registration order.
    pub fn beans_by_label(&self, label: &str) -> Result<Vec<Bean>, PodError> {
        self.shared.resolve(&BeanRef::from(label))
    }

    /// Ids of beans still running.
    pub fn pending(&self) -> Vec<BeanId> {
        self.shared.registry.pending_ids()
    }

    /// Ids of beans that finished, in id order.
    pub fn finished(&self) -> Vec<BeanId> {
        self.shared.registry.finished_ids()
    }

    /// Returns the pod's signal dispatcher.
    pub fn signals(&self) -> &SignalDispatcher {
        &self.shared.signals
    }

    /// Returns the pod configuration.
    pub fn config(&self) -> &Arc<PodConfig> {
        &self.shared.cfg
    }
}

impl fmt::Debug for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pod")
            .field("state", &self.state())
            .field("pending", &self.pending().len())
            .field("finished", &self.finished().len())
            .finish()
    }
}
