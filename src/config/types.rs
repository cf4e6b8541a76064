use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::gaps::{default_targets, Targets};
use crate::models::{IngestionSettings, ScoringConfig};
use crate::pipeline::OrchestratorOptions;
use crate::planning::PlanSettings;

pub const DEFAULT_STORE_PATH: &str = "covaudit.db";
pub const DEFAULT_TOKEN_ENV: &str = "COVAUDIT_CATALOG_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
    pub ingestion: IngestionSettings,
    pub scoring: ScoringConfig,
    pub targets: Targets,
    pub plan: PlanSettings,
    pub orchestrator: OrchestratorConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            catalog: CatalogConfig::default(),
            ingestion: IngestionSettings::default(),
            scoring: ScoringConfig::default(),
            targets: default_targets(),
            plan: PlanSettings::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            allow_failed_runs: self.orchestrator.allow_failed_runs,
            targets: self.targets.clone(),
            plan: self.plan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(DEFAULT_STORE_PATH) }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    /// Name of the environment variable holding the bearer token. The token
    /// itself never lives in the config file.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub allow_failed_runs: bool,
}
