//! # Server: a bean with a startup/run/cleanup lifecycle.
//!
//! A [`Server`] bean subscribes [`Server::on_stop`] to `SIGTERM` and `SIGINT` (scoped to
//! itself) for as long as it runs, then runs `startup`, `run` and `cleanup` in order. Any
//! phase returning an error ends the bean as failed; `cleanup` is skipped in that case.
//!
//! ```text
//! subscribe on_stop ──► startup(params) ──► run(params) ──► cleanup(params)
//!        └──────────── unsubscribed when the bean ends (any outcome) ────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{BeanContext, Params};
use crate::error::BeanError;
use crate::signals::{HandlerRef, Payload, Signal, SignalHandler};

/// Long-running service bean.
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Builds the server for one bean.
    fn build(ctx: BeanContext) -> Self
    where
        Self: Sized;

    /// Called when the pod publishes `SIGTERM` or `SIGINT`.
    fn on_stop(&self, _signal: &Signal, _payload: &Payload) {}

    /// Prepares resources.
    async fn startup(&self, _params: &Params) -> Result<(), BeanError> {
        Ok(())
    }

    /// Serves until done.
    async fn run(&self, _params: &Params) -> Result<(), BeanError> {
        Ok(())
    }

    /// Releases resources after a successful run.
    async fn cleanup(&self, _params: &Params) -> Result<(), BeanError> {
        Ok(())
    }
}

/// Forwards termination signals to [`Server::on_stop`].
struct StopForwarder<S>(Arc<S>);

#[async_trait]
impl<S: Server> SignalHandler for StopForwarder<S> {
    async fn on_signal(&self, signal: &Signal, payload: &Payload) -> Result<Value, BeanError> {
        self.0.on_stop(signal, payload);
        Ok(Value::Null)
    }

    fn name(&self) -> &str {
        "server_on_stop"
    }
}

const STOP_SIGNALS: [Signal; 2] = [Signal::TERMINATE, Signal::INTERRUPT];

/// Keeps the stop forwarder subscribed for as long as the server bean runs.
struct StopSubscription {
    ctx: BeanContext,
    forwarder: HandlerRef,
}

impl StopSubscription {
    fn new(ctx: &BeanContext, forwarder: HandlerRef) -> Result<Self, BeanError> {
        let sub = Self {
            ctx: ctx.clone(),
            forwarder,
        };
        for sig in STOP_SIGNALS {
            sub.ctx
                .subscribe(sig, Arc::clone(&sub.forwarder))
                .map_err(BeanError::fail)?;
        }
        Ok(sub)
    }
}

impl Drop for StopSubscription {
    fn drop(&mut self) {
        for sig in STOP_SIGNALS {
            // A detached context has no dispatcher left to clean.
            self.ctx.unsubscribe(sig, &self.forwarder).ok();
        }
    }
}

pub(crate) async fn serve<S: Server>(
    server: Arc<S>,
    ctx: BeanContext,
    params: Params,
) -> Result<(), BeanError> {
    let forwarder: HandlerRef = Arc::new(StopForwarder(Arc::clone(&server)));
    let _subscription = StopSubscription::new(&ctx, forwarder)?;

    server.startup(&params).await?;
    server.run(&params).await?;
    server.cleanup(&params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::{BeanFactory, BeanState};
    use crate::core::{Pod, PodConfig};

    struct BrokenStartup;

    #[async_trait]
    impl Server for BrokenStartup {
        fn build(_ctx: BeanContext) -> Self {
            BrokenStartup
        }

        async fn startup(&self, _params: &Params) -> Result<(), BeanError> {
            Err(BeanError::fail("port in use"))
        }
    }

    struct Quick;

    #[async_trait]
    impl Server for Quick {
        fn build(_ctx: BeanContext) -> Self {
            Quick
        }
    }

    #[tokio::test]
    async fn test_forwarder_is_removed_after_failure() {
        let pod = Pod::new(PodConfig::default());
        pod.register(BeanFactory::server::<BrokenStartup>(), None, Params::new())
            .unwrap();
        pod.run().await.unwrap();

        assert_eq!(
            pod.beans()[0].state(),
            BeanState::Failed("execution failed: port in use".into())
        );
        for sig in STOP_SIGNALS {
            assert_eq!(pod.signals().handler_count(&sig), 0);
        }
    }

    #[tokio::test]
    async fn test_forwarder_is_removed_after_success() {
        let pod = Pod::new(PodConfig::default());
        pod.register(BeanFactory::server::<Quick>(), None, Params::new())
            .unwrap();
        pod.run().await.unwrap();

        assert_eq!(pod.beans()[0].state(), BeanState::Succeeded);
        for sig in STOP_SIGNALS {
            assert_eq!(pod.signals().handler_count(&sig), 0);
        }
    }
}
