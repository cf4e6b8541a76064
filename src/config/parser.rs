use std::path::Path;
use crate::errors::AuditError;
use crate::gaps::validate_targets;
use super::types::AuditConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<AuditConfig, AuditError> {
    if !path.exists() {
        return Err(AuditError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(AuditError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse YAML text into a validated config. An empty document yields the
/// defaults.
pub fn parse_config_str(content: &str) -> Result<AuditConfig, AuditError> {
    if content.len() as u64 > MAX_CONFIG_BYTES {
        return Err(AuditError::Config("Config file exceeds 1MB limit".into()));
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| AuditError::Config(format!("Invalid YAML: {}", e)))?;
    if yaml.is_null() {
        return Ok(AuditConfig::default());
    }

    // JSON Schema validation
    validate_schema(&yaml)?;

    // Parse into typed config
    let config: AuditConfig = serde_yaml::from_value(yaml)
        .map_err(|e| AuditError::Config(e.to_string()))?;

    // Range and consistency checks
    validate_semantics(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), AuditError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| AuditError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| AuditError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory; the typed parse and semantic checks below are authoritative
        for e in errors {
            warn!(validation_error = %e, path = %e.instance_path, "Config schema warning");
        }
    }

    Ok(())
}

fn validate_semantics(config: &AuditConfig) -> Result<(), AuditError> {
    let section = |name: &str, result: Result<(), AuditError>| {
        result.map_err(|e| match e {
            AuditError::Validation(msg) => AuditError::Config(format!("{}: {}", name, msg)),
            other => other,
        })
    };

    section("ingestion", config.ingestion.validate())?;
    section("scoring", config.scoring.validate())?;
    section("targets", validate_targets(&config.targets))?;
    section("plan", config.plan.validate())?;

    if config.store.path.as_os_str().is_empty() {
        return Err(AuditError::Config("store: path must not be empty".into()));
    }
    if let Some(url) = &config.catalog.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AuditError::Config(format!("catalog: base_url must be http(s), got '{}'", url)));
        }
    }
    if config.catalog.timeout_secs == 0 {
        return Err(AuditError::Config("catalog: timeout_secs must be at least 1".into()));
    }
    if config.targets.is_empty() {
        warn!("No coverage targets configured; gap detection will report nothing");
    }

    Ok(())
}
