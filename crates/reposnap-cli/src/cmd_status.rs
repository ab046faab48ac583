use std::sync::Arc;

use reposnap_conductor::{poll_status, EngineConfig, JournalConnector, WorkflowRegistry};
use reposnap_core::{CloneStatus, WorkflowId};

use crate::engine_args::EngineArgs;

pub fn execute(engine: &EngineArgs, workflow_id: &str, json: bool) -> anyhow::Result<()> {
    let config = engine.resolve()?;
    let id = WorkflowId::parse(workflow_id)?;
    let status = tokio::runtime::Runtime::new()?.block_on(lookup(&config, id));

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", render_line(&status));
    }
    Ok(())
}

/// Read-only: answers from the journal without running anything.
async fn lookup(config: &EngineConfig, id: WorkflowId) -> CloneStatus {
    let connector = Arc::new(JournalConnector::new(&config.state_dir));
    let registry = Arc::new(WorkflowRegistry::new(connector, config));
    poll_status(&registry.get_handle(id), config.result_wait()).await
}

fn render_line(status: &CloneStatus) -> String {
    match status {
        CloneStatus::Started { workflow_id } => format!("{workflow_id}  started"),
        CloneStatus::Running { workflow_id } => format!("{workflow_id}  running"),
        CloneStatus::Completed {
            workflow_id,
            result,
        } => format!("{workflow_id}  completed  {}", result.sha),
        CloneStatus::Failed { workflow_id, error } => {
            format!("{workflow_id}  failed  {}", error.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposnap_conductor::{LocalConnector, MockActivities};
    use reposnap_core::{CloneRequest, ErrorClass};

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            state_dir: dir.join("workflows"),
            bind_attempts: 1,
            bind_backoff_ms: 1,
            result_wait_ms: 100,
            ..Default::default()
        }
    }

    #[test]
    fn render_line_formats() {
        let id = WorkflowId::parse("clone-abc").unwrap();
        assert_eq!(
            render_line(&CloneStatus::Running {
                workflow_id: id.clone()
            }),
            "clone-abc  running"
        );
        assert_eq!(
            render_line(&CloneStatus::failed(id, ErrorClass::InvalidRef)),
            "clone-abc  failed  invalid ref"
        );
    }

    #[tokio::test]
    async fn reads_finished_workflow_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let registry = Arc::new(WorkflowRegistry::new(
            Arc::new(LocalConnector::new(
                config.clone(),
                Arc::new(MockActivities::new()),
            )),
            &config,
        ));
        let id = registry
            .start(CloneRequest::new("https://example/repo.git", "main"))
            .await
            .unwrap();
        registry.get_handle(id.clone()).result().await.unwrap();

        let status = lookup(&config, id.clone()).await;
        assert!(matches!(status, CloneStatus::Completed { ref workflow_id, .. } if *workflow_id == id));
    }

    #[tokio::test]
    async fn missing_journal_is_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let status = lookup(&config(dir.path()), WorkflowId::generate()).await;
        assert_eq!(status.error_class(), Some(ErrorClass::ServiceUnavailable));
    }
}
