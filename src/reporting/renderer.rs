use sha2::{Digest, Sha256};
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::models::{Artifact, ArtifactType, Run};
use super::csv_report::render_csv;
use super::data::ReportData;
use super::json_report::render_json;
use super::markdown::render_markdown;
use tracing::info;

/// Bumped whenever rendered output changes for the same stored data.
pub const RENDERER_VERSION: &str = "covaudit-render/1";

pub fn content_sha256(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

pub struct ArtifactRenderer {
    store: RunStore,
}

impl ArtifactRenderer {
    pub fn new(store: RunStore) -> Self {
        Self { store }
    }

    /// Render the run's current gaps, scores and plan without storing them.
    pub fn render_content(&self, run: &Run, artifact_type: ArtifactType) -> Result<String, AuditError> {
        let data = ReportData::load(&self.store, run)?;
        match artifact_type {
            ArtifactType::Csv => render_csv(&data),
            ArtifactType::Json => render_json(&data),
            ArtifactType::Markdown => Ok(render_markdown(&data)),
        }
    }

    /// Render and store the artifact, replacing any earlier one of the same type.
    pub fn render(&self, run: &Run, artifact_type: ArtifactType) -> Result<Artifact, AuditError> {
        let content_text = self.render_content(run, artifact_type)?;
        let artifact = Artifact {
            id: String::new(),
            run_id: run.id.clone(),
            artifact_type,
            content_sha256: content_sha256(&content_text),
            content_text,
            renderer_version: RENDERER_VERSION.to_string(),
        };
        let filter = Filter::run(&run.id).kind(artifact_type.as_str());
        let artifact = self
            .store
            .replace_many(&filter, vec![artifact])?
            .pop()
            .ok_or_else(|| AuditError::Internal("artifact insert returned no row".into()))?;
        info!(
            run_id = %run.id,
            artifact_type = %artifact_type,
            bytes = artifact.content_text.len(),
            sha256 = %artifact.content_sha256,
            "Artifact rendered"
        );
        Ok(artifact)
    }
}
