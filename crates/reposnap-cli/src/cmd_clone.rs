use std::sync::Arc;

use reposnap_conductor::{GitActivities, LocalConnector, WorkflowRegistry};
use reposnap_core::CloneRequest;

use crate::engine_args::EngineArgs;

pub fn execute(engine: &EngineArgs, repo_url: &str, git_ref: &str, json: bool) -> anyhow::Result<()> {
    let config = engine.resolve()?;
    let activities = Arc::new(GitActivities::from_config(&config));
    let connector = Arc::new(LocalConnector::new(config.clone(), activities));
    let registry = Arc::new(WorkflowRegistry::new(connector, &config));

    let rt = tokio::runtime::Runtime::new()?;
    let (id, outcome) = rt.block_on(async {
        let id = registry
            .start(CloneRequest::new(repo_url, git_ref))
            .await?;
        let outcome = registry.get_handle(id.clone()).result().await;
        Ok::<_, anyhow::Error>((id, outcome))
    })?;

    let result = outcome.map_err(|e| {
        anyhow::anyhow!(
            "workflow {id} failed: {}",
            reposnap_git::mask_secrets(&e.to_string())
        )
    })?;

    if json {
        let out = serde_json::json!({
            "workflowId": id,
            "sha": result.sha,
            "path": result.path,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}  {}", result.sha, result.path.display());
    }
    Ok(())
}
