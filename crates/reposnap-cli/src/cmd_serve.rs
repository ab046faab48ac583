use std::sync::Arc;

use reposnap_conductor::{GitActivities, LocalConnector, WorkflowRegistry};
use reposnap_serve::ServeConfig;
use tokio_util::sync::CancellationToken;

use crate::engine_args::EngineArgs;

pub fn execute(engine: &EngineArgs, bind: &str, port: u16) -> anyhow::Result<()> {
    let config = engine.resolve()?;
    let activities = Arc::new(GitActivities::from_config(&config));
    let connector = Arc::new(LocalConnector::new(config.clone(), activities));
    let registry = Arc::new(WorkflowRegistry::new(connector, &config));
    let serve_config = ServeConfig {
        bind: bind.to_string(),
        port,
        result_wait: config.result_wait(),
    };

    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    tokio::runtime::Runtime::new()?.block_on(async move {
        // Resume unfinished workflows right away; on failure the registry
        // retries on the first request.
        if let Err(e) = registry.connect().await {
            tracing::warn!(error = %e, "executor not available yet");
        }
        reposnap_serve::serve(registry, serve_config, cancel).await
    })
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}
