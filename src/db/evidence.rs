use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::{EvidenceSignal, SignalType, SignalValue};
use super::entity::{parse_column, Entity};

/// Decode a stored value. Anything that does not parse, or parses into the
/// wrong variant, comes back as `Unreadable` so one bad row cannot fail a read.
fn decode_value(raw: &str, signal_type: SignalType) -> SignalValue {
    match serde_json::from_str::<SignalValue>(raw) {
        Ok(value) if value.signal_type() == Some(signal_type) => value,
        Ok(value) => SignalValue::Unreadable {
            reason: format!(
                "stored value kind {:?} does not match signal type {}",
                value.signal_type(),
                signal_type
            ),
        },
        Err(e) => SignalValue::Unreadable { reason: format!("undecodable {} value: {}", signal_type, e) },
    }
}

impl Entity for EvidenceSignal {
    const TABLE: &'static str = "evidence";
    const COLUMNS: &'static [&'static str] = &["asset_guid", "signal_type", "value_json", "observed_at", "source"];
    const SUBJECT_COLUMN: &'static str = "asset_guid";
    const KIND_COLUMN: Option<&'static str> = Some("signal_type");
    const ORDER_BY: &'static str = "asset_guid, signal_type, observed_at, id";

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
        if self.asset_guid.trim().is_empty() {
            return Err(AuditError::Validation("evidence asset_guid is required".into()));
        }
        if self.source.trim().is_empty() {
            return Err(AuditError::Validation("evidence source is required".into()));
        }
        self.value.validate(self.signal_type)
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(self.asset_guid.clone()),
            Value::Text(self.signal_type.as_str().to_string()),
            Value::Text(serde_json::to_string(&self.value)?),
            Value::Text(self.observed_at.to_rfc3339()),
            Value::Text(self.source.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let signal_type = parse_column(row, 3, SignalType::parse)?;
        let raw_value: String = row.get(4)?;
        let observed_raw: String = row.get(5)?;
        let observed_at = DateTime::parse_from_rfc3339(&observed_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;
        Ok(EvidenceSignal {
            id: row.get(0)?,
            run_id: row.get(1)?,
            asset_guid: row.get(2)?,
            signal_type,
            value: decode_value(&raw_value, signal_type),
            observed_at,
            source: row.get(6)?,
        })
    }
}
