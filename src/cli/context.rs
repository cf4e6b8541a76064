use std::path::Path;
use crate::config::{parse_config, AuditConfig};
use crate::db::RunStore;
use crate::errors::AuditError;
use crate::pipeline::RunOrchestrator;
use tracing::{debug, info};

/// Config and store shared by every subcommand.
pub struct CliContext {
    pub config: AuditConfig,
    pub store: RunStore,
}

impl CliContext {
    pub async fn load(config_path: Option<&str>) -> Result<Self, AuditError> {
        let config = match config_path {
            Some(path) => {
                let config = parse_config(Path::new(path)).await?;
                info!(path = %path, "Loaded configuration");
                config
            }
            None => {
                debug!("No config file given, using defaults");
                AuditConfig::default()
            }
        };
        let store = RunStore::open(&config.store.path)?;
        Ok(Self { config, store })
    }

    pub fn orchestrator(&self) -> RunOrchestrator {
        RunOrchestrator::new(self.store.clone(), self.config.orchestrator_options())
    }
}
