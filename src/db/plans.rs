use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::Plan;
use super::entity::{json_column, Entity};

impl Entity for Plan {
    const TABLE: &'static str = "plans";
    const COLUMNS: &'static [&'static str] = &["phases_json", "total_weeks"];
    const SUBJECT_COLUMN: &'static str = "id";
    const KIND_COLUMN: Option<&'static str> = None;
    const ORDER_BY: &'static str = "id";

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
        Plan::validate(self)
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(serde_json::to_string(&self.phases)?),
            Value::Integer(self.total_weeks as i64),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Plan {
            id: row.get(0)?,
            run_id: row.get(1)?,
            phases: json_column(row, 2)?,
            total_weeks: row.get::<_, i64>(3)? as u32,
        })
    }
}
