use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::{Gap, GapKind, Severity, SubjectType};
use super::entity::{json_column, parse_column, Entity};

impl Entity for Gap {
    const TABLE: &'static str = "gaps";
    const COLUMNS: &'static [&'static str] = &[
        "field",
        "kind",
        "subject_type",
        "subject_id",
        "severity",
        "current_coverage",
        "target_coverage",
        "effort_hours",
        "evidence_refs_json",
        "explanation",
    ];
    const SUBJECT_COLUMN: &'static str = "subject_id";
    const KIND_COLUMN: Option<&'static str> = Some("kind");
    const ORDER_BY: &'static str = "severity, field, kind, subject_id";

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
        Gap::validate(self)
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(self.field.clone()),
            Value::Text(self.kind.as_str().to_string()),
            Value::Text(self.subject_type.as_str().to_string()),
            Value::Text(self.subject_id.clone()),
            Value::Text(self.severity.as_str().to_string()),
            Value::Real(self.current_coverage),
            Value::Real(self.target_coverage),
            Value::Real(self.effort_hours),
            Value::Text(serde_json::to_string(&self.evidence_refs)?),
            Value::Text(self.explanation.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Gap {
            id: row.get(0)?,
            run_id: row.get(1)?,
            field: row.get(2)?,
            kind: parse_column(row, 3, GapKind::parse)?,
            subject_type: parse_column(row, 4, SubjectType::parse)?,
            subject_id: row.get(5)?,
            severity: parse_column(row, 6, Severity::parse)?,
            current_coverage: row.get(7)?,
            target_coverage: row.get(8)?,
            effort_hours: row.get(9)?,
            evidence_refs: json_column(row, 10)?,
            explanation: row.get(11)?,
        })
    }
}
