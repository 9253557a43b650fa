//! # Process surface: run a configured pod on its own runtime.
//!
//! ```text
//! launch(config, catalog)
//!   ├─ install fmt tracing subscriber (feature `logging`, level from config)
//!   ├─ build tokio runtime per `loop_type`
//!   ├─ block_on:
//!   │    ├─ Pod::new(config)
//!   │    ├─ register_descriptor(..) for every bean descriptor
//!   │    └─ pod.run()
//!   └─ shut the runtime down (bounded)
//! ```

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::beans::BeanCatalog;
use crate::core::{LoopType, Pod, PodConfig};
use crate::error::PodError;

/// Upper bound for runtime teardown once the pod has stopped.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Builds a runtime, runs a pod over `config.beans` to completion and tears the runtime down.
///
/// Returns the stopped pod so callers can inspect bean outcomes. Fails with
/// [`PodError::Runtime`] if the runtime cannot be built and with
/// [`PodError::InvalidBeanType`] if a descriptor names an unknown `core`; in the latter
/// case no bean is started.
///
/// Must not be called from within an async runtime.
///
/// ```no_run
/// use beanpod::{BeanCatalog, BeanFactory, PodConfig};
///
/// let catalog = BeanCatalog::new()
///     .with("app.Hello", || BeanFactory::producer(|params| async move {
///         println!("hello {params:?}");
///         Ok(())
///     }));
///
/// let cfg: PodConfig = serde_json::from_str(r#"{ "beans": [{ "core": "app.Hello" }] }"#)?;
/// let pod = beanpod::launch(cfg, &catalog)?;
/// assert!(pod.pending().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn launch(config: PodConfig, catalog: &BeanCatalog) -> Result<Pod, PodError> {
    if let Err(error) = init_tracing_subscriber(&config) {
        eprintln!("failed to set tracing subscriber:");
        eprintln!("    {error}");
    }

    let runtime = build_runtime(config.loop_type)?;
    let descriptors = config.beans.clone();

    let result = runtime.block_on(async move {
        let pod = Pod::new(config);
        for desc in &descriptors {
            pod.register_descriptor(desc, catalog)?;
        }
        pod.run().await?;
        Ok::<_, PodError>(pod)
    });

    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    info!("runtime stopped");
    result
}

fn build_runtime(loop_type: LoopType) -> Result<Runtime, PodError> {
    let mut builder = match loop_type {
        LoopType::MultiThread => Builder::new_multi_thread(),
        LoopType::CurrentThread | LoopType::Auto => Builder::new_current_thread(),
    };
    Ok(builder.enable_all().build()?)
}

/// Installs the global fmt subscriber at the configured level.
#[cfg(feature = "logging")]
fn init_tracing_subscriber(config: &PodConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::FmtSubscriber;
    use tracing_subscriber::fmt::format;
    use tracing_subscriber::util::SubscriberInitExt;

    FmtSubscriber::builder()
        .event_format(format().compact())
        .with_level(true)
        .with_target(config.debug)
        .with_max_level(config.effective_log_level().as_tracing_level())
        .finish()
        .try_init()
}

#[cfg(not(feature = "logging"))]
fn init_tracing_subscriber(_config: &PodConfig) -> Result<(), std::convert::Infallible> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::BeanFactory;
    use crate::beans::BeanState;

    #[test]
    fn test_launch_runs_descriptors() {
        let catalog = BeanCatalog::new().with("quick", || BeanFactory::ready(async { Ok(()) }));
        let cfg: PodConfig = serde_json::from_value(serde_json::json!({
            "beans": [{ "core": "quick", "label": "q" }, { "core": "quick" }],
            "loop_type": "multi_thread"
        }))
        .unwrap();

        let pod = launch(cfg, &catalog).unwrap();
        let states: Vec<BeanState> = pod.beans().iter().map(|b| b.state()).collect();
        assert_eq!(states, vec![BeanState::Succeeded, BeanState::Succeeded]);
        assert_eq!(pod.beans_by_label("q").unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_launch_keeps_first_subscriber() {
        let catalog = BeanCatalog::new().with("quick", || BeanFactory::ready(async { Ok(()) }));
        let cfg: PodConfig = serde_json::from_value(serde_json::json!({
            "beans": [{ "core": "quick" }]
        }))
        .unwrap();

        // The second call cannot install a subscriber; it reports that and still runs.
        for _ in 0..2 {
            let pod = launch(cfg.clone(), &catalog).unwrap();
            assert_eq!(pod.beans()[0].state(), BeanState::Succeeded);
        }
    }

    #[test]
    fn test_launch_rejects_unknown_core() {
        let catalog = BeanCatalog::new();
        let cfg: PodConfig = serde_json::from_value(serde_json::json!({
            "beans": [{ "core": "ghost" }]
        }))
        .unwrap();

        assert!(matches!(
            launch(cfg, &catalog),
            Err(PodError::InvalidBeanType { core }) if core == "ghost"
        ));
    }
}
