use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::{Artifact, ArtifactType};
use super::entity::{parse_column, Entity};

impl Entity for Artifact {
    const TABLE: &'static str = "artifacts";
    const COLUMNS: &'static [&'static str] = &["artifact_type", "content_text", "content_sha256", "renderer_version"];
    const SUBJECT_COLUMN: &'static str = "id";
    const KIND_COLUMN: Option<&'static str> = Some("artifact_type");
    const ORDER_BY: &'static str = "artifact_type";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn validate(&self) -> Result<(), AuditError> {
        if self.content_sha256.len() != 64 {
            return Err(AuditError::Validation("artifact content_sha256 must be a hex SHA-256".into()));
        }
        if self.renderer_version.is_empty() {
            return Err(AuditError::Validation("artifact renderer_version is required".into()));
        }
        Ok(())
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(self.artifact_type.as_str().to_string()),
            Value::Text(self.content_text.clone()),
            Value::Text(self.content_sha256.clone()),
            Value::Text(self.renderer_version.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Artifact {
            id: row.get(0)?,
            run_id: row.get(1)?,
            artifact_type: parse_column(row, 2, ArtifactType::parse)?,
            content_text: row.get(3)?,
            content_sha256: row.get(4)?,
            renderer_version: row.get(5)?,
        })
    }
}
