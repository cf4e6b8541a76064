use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::{Methodology, Quadrant, Score, SubjectType};
use super::entity::{json_column, parse_column, Entity};

impl Entity for Score {
    const TABLE: &'static str = "scores";
    const COLUMNS: &'static [&'static str] = &[
        "subject_type",
        "subject_id",
        "impact_score",
        "quality_score",
        "quality_unknown",
        "quadrant",
        "methodology",
        "explanations_json",
    ];
    const SUBJECT_COLUMN: &'static str = "subject_id";
    const KIND_COLUMN: Option<&'static str> = Some("subject_type");
    const ORDER_BY: &'static str = "subject_type, subject_id";

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
        if self.subject_id.trim().is_empty() {
            return Err(AuditError::Validation("score subject_id is required".into()));
        }
        Score::validate(self)
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(self.subject_type.as_str().to_string()),
            Value::Text(self.subject_id.clone()),
            Value::Real(self.impact_score),
            self.quality_score.map_or(Value::Null, Value::Real),
            Value::Integer(self.quality_unknown as i64),
            Value::Text(self.quadrant.code().to_string()),
            Value::Text(self.methodology.as_str().to_string()),
            Value::Text(serde_json::to_string(&self.explanations)?),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Score {
            id: row.get(0)?,
            run_id: row.get(1)?,
            subject_type: parse_column(row, 2, SubjectType::parse)?,
            subject_id: row.get(3)?,
            impact_score: row.get(4)?,
            quality_score: row.get(5)?,
            quality_unknown: row.get::<_, i64>(6)? != 0,
            quadrant: parse_column(row, 7, Quadrant::parse)?,
            methodology: parse_column(row, 8, Methodology::parse)?,
            explanations: json_column(row, 9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Filter, RunStore};
    use crate::db::runs::tests::new_run;
    use crate::models::Explanation;

    fn score(run_id: &str, subject: &str, quality: Option<f64>) -> Score {
        let quadrant = if quality.is_some() { Quadrant::LL } else { Quadrant::LU };
        Score::new(
            run_id,
            SubjectType::Asset,
            subject,
            0.25,
            quality,
            quadrant,
            Methodology::WeightedDimensions,
            vec![Explanation::new("OWNERSHIP", 0.0, "absent")],
        )
    }

    #[test]
    fn test_round_trip_null_quality() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        store.create_many(&run.id, vec![score(&run.id, "a", Some(0.5)), score(&run.id, "b", None)]).unwrap();

        let rows: Vec<Score> = store.find_many(&Filter::run(&run.id)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].quality_score, Some(0.5));
        assert!(!rows[0].quality_unknown);
        assert_eq!(rows[1].quality_score, None);
        assert!(rows[1].quality_unknown);
        assert_eq!(rows[1].explanations[0].note, "absent");
    }

    #[test]
    fn test_store_rejects_inconsistent_score() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let mut bad = score(&run.id, "a", Some(0.5));
        bad.quality_unknown = true;
        assert!(store.create(bad).is_err());
    }

    #[test]
    fn test_replace_many_replaces_not_appends() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let filter = Filter::run(&run.id);
        store.replace_many(&filter, vec![score(&run.id, "a", Some(0.1)), score(&run.id, "b", None)]).unwrap();
        store.replace_many(&filter, vec![score(&run.id, "a", Some(0.9))]).unwrap();

        let rows: Vec<Score> = store.find_many(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quality_score, Some(0.9));
    }

    #[test]
    fn test_replace_many_rejects_foreign_rows() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let other = store.create_run(new_run()).unwrap();
        store.replace_many(&Filter::run(&run.id), vec![score(&run.id, "a", None)]).unwrap();

        let result = store.replace_many(&Filter::run(&run.id), vec![score(&other.id, "x", None)]);
        assert!(result.is_err());
        // Original rows untouched
        assert_eq!(store.count::<Score>(&Filter::run(&run.id)).unwrap(), 1);
    }
}
