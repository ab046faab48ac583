use std::path::PathBuf;

use reposnap_conductor::EngineConfig;

/// Engine settings shared by every subcommand. Flags and env vars win over
/// the config file, which wins over built-in defaults.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct EngineArgs {
    /// JSON engine config file
    #[arg(long, env = "REPOSNAP_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory holding workflow journals
    #[arg(long, env = "REPOSNAP_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
    /// Task queue workflows are routed to
    #[arg(long, env = "REPOSNAP_TASK_QUEUE")]
    pub task_queue: Option<String>,
    /// Root directory for fetched snapshots
    #[arg(long, env = "REPOSNAP_WORKDIR_ROOT")]
    pub workdir_root: Option<PathBuf>,
}

impl EngineArgs {
    pub fn resolve(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(queue) = &self.task_queue {
            config.task_queue = queue.clone();
        }
        if let Some(root) = &self.workdir_root {
            config.workdir_root = root.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_overrides_is_defaults() {
        assert_eq!(EngineArgs::default().resolve().unwrap(), EngineConfig::default());
    }

    #[test]
    fn flags_beat_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("engine.json");
        std::fs::write(
            &file,
            r#"{ "task_queue": "from-file", "git_timeout_secs": 5, "state_dir": "/from/file" }"#,
        )
        .unwrap();
        let args = EngineArgs {
            config: Some(file),
            state_dir: Some(dir.path().join("flag-state")),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.task_queue, "from-file");
        assert_eq!(config.git_timeout_secs, 5);
        assert_eq!(config.state_dir, dir.path().join("flag-state"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = EngineArgs {
            config: Some(PathBuf::from("/definitely/not/here.json")),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
