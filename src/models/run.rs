use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::errors::AuditError;
use super::evidence::SignalType;

pub const DEFAULT_ASSET_LIMIT: usize = 1_000;
pub const MAX_ASSET_LIMIT: usize = 100_000;

/// Lifecycle state of an assessment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Created,
    Ingesting,
    Scoring,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Ingesting => "INGESTING",
            Self::Scoring => "SCORING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "INGESTING" => Some(Self::Ingesting),
            "SCORING" => Some(Self::Scoring),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which assets a run covers. Filters match the catalog's qualified names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScope {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub connector: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Hard cap on the number of assets ingested.
    #[serde(default = "default_asset_limit")]
    pub asset_limit: usize,
}

fn default_asset_limit() -> usize {
    DEFAULT_ASSET_LIMIT
}

impl Default for RunScope {
    fn default() -> Self {
        Self {
            database: None,
            schema: None,
            connector: None,
            domain: None,
            asset_limit: DEFAULT_ASSET_LIMIT,
        }
    }
}

impl RunScope {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.asset_limit == 0 || self.asset_limit > MAX_ASSET_LIMIT {
            return Err(AuditError::Validation(format!(
                "asset_limit must be between 1 and {}, got {}",
                MAX_ASSET_LIMIT, self.asset_limit
            )));
        }
        for (name, value) in [
            ("database", &self.database),
            ("schema", &self.schema),
            ("connector", &self.connector),
            ("domain", &self.domain),
        ] {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    return Err(AuditError::Validation(format!("scope filter '{}' is empty", name)));
                }
            }
        }
        if self.schema.is_some() && self.database.is_none() {
            return Err(AuditError::Validation("scope filter 'schema' requires 'database'".into()));
        }
        Ok(())
    }

    /// Short human label, e.g. `snowflake/ANALYTICS.PUBLIC`.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(c) = &self.connector {
            parts.push(c.clone());
        }
        match (&self.database, &self.schema) {
            (Some(db), Some(s)) => parts.push(format!("{}.{}", db, s)),
            (Some(db), None) => parts.push(db.clone()),
            _ => {}
        }
        if let Some(d) = &self.domain {
            parts.push(format!("domain:{}", d));
        }
        if parts.is_empty() {
            "all assets".to_string()
        } else {
            parts.join("/")
        }
    }
}

/// Quality scoring methodology, fixed at run creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Methodology {
    #[default]
    WeightedDimensions,
    DimensionTriplet,
    BinaryChecklist,
    MaturityLevels,
}

impl Methodology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedDimensions => "weighted_dimensions",
            Self::DimensionTriplet => "dimension_triplet",
            Self::BinaryChecklist => "binary_checklist",
            Self::MaturityLevels => "maturity_levels",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "weighted_dimensions" | "weighted" => Some(Self::WeightedDimensions),
            "dimension_triplet" | "triplet" => Some(Self::DimensionTriplet),
            "binary_checklist" | "checklist" => Some(Self::BinaryChecklist),
            "maturity_levels" | "maturity" => Some(Self::MaturityLevels),
            _ => None,
        }
    }
}

impl std::fmt::Display for Methodology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub methodology: Methodology,
    #[serde(default = "default_impact_threshold")]
    pub impact_threshold: f64,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
}

fn default_impact_threshold() -> f64 {
    0.5
}

fn default_quality_threshold() -> f64 {
    0.7
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            methodology: Methodology::default(),
            impact_threshold: default_impact_threshold(),
            quality_threshold: default_quality_threshold(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), AuditError> {
        for (name, v) in [
            ("impact_threshold", self.impact_threshold),
            ("quality_threshold", self.quality_threshold),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(AuditError::Validation(format!("{} must be within [0, 1], got {}", name, v)));
            }
        }
        Ok(())
    }
}

/// Run-scoped ingestion knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestionSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_page_retries")]
    pub max_page_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_lineage_concurrency")]
    pub lineage_concurrency: usize,
    /// Fraction of failed lineage lookups above which the run fails.
    #[serde(default = "default_lineage_failure_ceiling")]
    pub lineage_failure_ceiling: f64,
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_lineage_concurrency() -> usize {
    8
}

fn default_lineage_failure_ceiling() -> f64 {
    0.5
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_retries: default_max_page_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            lineage_concurrency: default_lineage_concurrency(),
            lineage_failure_ceiling: default_lineage_failure_ceiling(),
        }
    }
}

impl IngestionSettings {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.page_size == 0 || self.page_size > 1_000 {
            return Err(AuditError::Validation(format!("page_size must be between 1 and 1000, got {}", self.page_size)));
        }
        if self.max_page_retries > 10 {
            return Err(AuditError::Validation("max_page_retries must be at most 10".into()));
        }
        if self.lineage_concurrency == 0 || self.lineage_concurrency > 64 {
            return Err(AuditError::Validation(format!(
                "lineage_concurrency must be between 1 and 64, got {}",
                self.lineage_concurrency
            )));
        }
        if !self.lineage_failure_ceiling.is_finite() || !(0.0..=1.0).contains(&self.lineage_failure_ceiling) {
            return Err(AuditError::Validation("lineage_failure_ceiling must be within [0, 1]".into()));
        }
        Ok(())
    }
}

/// Parameters for a run that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub scope: RunScope,
    pub capabilities: BTreeSet<SignalType>,
    pub scoring: ScoringConfig,
    pub ingestion: IngestionSettings,
}

impl NewRun {
    pub fn validate(&self) -> Result<(), AuditError> {
        self.scope.validate()?;
        self.scoring.validate()?;
        self.ingestion.validate()?;
        if self.capabilities.is_empty() {
            return Err(AuditError::Validation("at least one capability must be selected".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scope: RunScope,
    pub capabilities: BTreeSet<SignalType>,
    pub scoring: ScoringConfig,
    pub ingestion: IngestionSettings,
    pub status: RunStatus,
    /// Message of the failure that moved the run to FAILED.
    pub error: Option<String>,
}

impl Run {
    pub fn has_capability(&self, signal: SignalType) -> bool {
        self.capabilities.contains(&signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_round_trip() {
        for status in [
            RunStatus::Created,
            RunStatus::Ingesting,
            RunStatus::Scoring,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("queued"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Ingesting.is_terminal());
    }

    #[test]
    fn test_scope_rejects_zero_limit() {
        let scope = RunScope { asset_limit: 0, ..Default::default() };
        assert!(matches!(scope.validate(), Err(AuditError::Validation(_))));
    }

    #[test]
    fn test_scope_schema_requires_database() {
        let scope = RunScope { schema: Some("PUBLIC".into()), ..Default::default() };
        assert!(scope.validate().is_err());
    }

    #[test]
    fn test_scope_label() {
        let scope = RunScope {
            connector: Some("snowflake".into()),
            database: Some("ANALYTICS".into()),
            schema: Some("PUBLIC".into()),
            ..Default::default()
        };
        assert_eq!(scope.label(), "snowflake/ANALYTICS.PUBLIC");
        assert_eq!(RunScope::default().label(), "all assets");
    }

    #[test]
    fn test_scoring_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.impact_threshold, 0.5);
        assert_eq!(config.quality_threshold, 0.7);
        assert_eq!(config.methodology, Methodology::WeightedDimensions);
    }

    #[test]
    fn test_scoring_rejects_out_of_range() {
        let config = ScoringConfig { quality_threshold: 1.5, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_methodology_parse_aliases() {
        assert_eq!(Methodology::parse("maturity"), Some(Methodology::MaturityLevels));
        assert_eq!(Methodology::parse("binary-checklist"), Some(Methodology::BinaryChecklist));
        assert_eq!(Methodology::parse("nope"), None);
    }

    #[test]
    fn test_new_run_requires_capability() {
        let new_run = NewRun {
            scope: RunScope::default(),
            capabilities: BTreeSet::new(),
            scoring: ScoringConfig::default(),
            ingestion: IngestionSettings::default(),
        };
        assert!(new_run.validate().is_err());
    }
}
