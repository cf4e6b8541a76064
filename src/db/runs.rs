use chrono::{DateTime, Utc};
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::{NewRun, Run, RunStatus};
use super::entity::{json_column, new_id, parse_column};
use super::schema::DEPENDENT_TABLES;
use super::RunStore;

const RUN_COLUMNS: &str =
    "id, created_at, updated_at, scope_json, capabilities_json, scoring_json, ingestion_json, status, error";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    let timestamp = |idx: usize| -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(idx)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
    };
    Ok(Run {
        id: row.get(0)?,
        created_at: timestamp(1)?,
        updated_at: timestamp(2)?,
        scope: json_column(row, 3)?,
        capabilities: json_column(row, 4)?,
        scoring: json_column(row, 5)?,
        ingestion: json_column(row, 6)?,
        status: parse_column(row, 7, RunStatus::parse)?,
        error: row.get(8)?,
    })
}

impl RunStore {
    /// Persist a new run in CREATED. Parameters are validated before any write.
    pub fn create_run(&self, new_run: NewRun) -> Result<Run, AuditError> {
        new_run.validate()?;
        let now = Utc::now();
        let run = Run {
            id: new_id(),
            created_at: now,
            updated_at: now,
            scope: new_run.scope,
            capabilities: new_run.capabilities,
            scoring: new_run.scoring,
            ingestion: new_run.ingestion,
            status: RunStatus::Created,
            error: None,
        };

        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", RUN_COLUMNS),
            rusqlite::params![
                run.id,
                run.created_at.to_rfc3339(),
                run.updated_at.to_rfc3339(),
                serde_json::to_string(&run.scope)?,
                serde_json::to_string(&run.capabilities)?,
                serde_json::to_string(&run.scoring)?,
                serde_json::to_string(&run.ingestion)?,
                run.status.as_str(),
                run.error,
            ],
        ).map_err(|e| AuditError::db("Failed to create run", e))?;
        Ok(run)
    }

    pub fn get_run(&self, id: &str) -> Result<Option<Run>, AuditError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))
            .map_err(|e| AuditError::db("Query failed", e))?;

        match stmt.query_row(rusqlite::params![id], run_from_row) {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AuditError::db("Query error", e)),
        }
    }

    /// Like `get_run`, but a missing run is an error.
    pub fn require_run(&self, id: &str) -> Result<Run, AuditError> {
        self.get_run(id)?.ok_or_else(|| AuditError::NotFound(format!("run {}", id)))
    }

    pub fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<Run>, AuditError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
            RUN_COLUMNS
        )).map_err(|e| AuditError::db("Query failed", e))?;

        let rows = stmt.query_map(rusqlite::params![limit as i64, offset as i64], run_from_row)
            .map_err(|e| AuditError::db("Query error", e))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| AuditError::db("Row error", e))?);
        }
        Ok(results)
    }

    /// Set the run's status. `error` is stored alongside (cleared when `None`).
    pub fn update_run_status(&self, id: &str, status: RunStatus, error: Option<&str>) -> Result<(), AuditError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE runs SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            rusqlite::params![id, status.as_str(), error, Utc::now().to_rfc3339()],
        ).map_err(|e| AuditError::db("Update failed", e))?;
        if affected == 0 {
            return Err(AuditError::NotFound(format!("run {}", id)));
        }
        Ok(())
    }

    /// Delete a run and every row that belongs to it in one transaction.
    pub fn delete_run(&self, id: &str) -> Result<bool, AuditError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| AuditError::db("Failed to begin transaction", e))?;
        for table in DEPENDENT_TABLES {
            tx.execute(&format!("DELETE FROM {} WHERE run_id = ?1", table), rusqlite::params![id])
                .map_err(|e| AuditError::db(&format!("Delete on {} failed", table), e))?;
        }
        let affected = tx.execute("DELETE FROM runs WHERE id = ?1", rusqlite::params![id])
            .map_err(|e| AuditError::db("Delete failed", e))?;
        tx.commit().map_err(|e| AuditError::db("Failed to commit", e))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::models::{IngestionSettings, Methodology, RunScope, ScoringConfig, SignalType};

    pub(crate) fn new_run() -> NewRun {
        NewRun {
            scope: RunScope { database: Some("ANALYTICS".into()), asset_limit: 50, ..Default::default() },
            capabilities: SignalType::ALL.into_iter().collect::<BTreeSet<_>>(),
            scoring: ScoringConfig::default(),
            ingestion: IngestionSettings::default(),
        }
    }

    #[test]
    fn test_create_and_get_run() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();

        let loaded = store.get_run(&run.id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Created);
        assert_eq!(loaded.scope.database.as_deref(), Some("ANALYTICS"));
        assert_eq!(loaded.scope.asset_limit, 50);
        assert_eq!(loaded.capabilities.len(), 6);
        assert_eq!(loaded.scoring.methodology, Methodology::WeightedDimensions);
    }

    #[test]
    fn test_create_run_rejects_invalid_before_write() {
        let store = RunStore::in_memory().unwrap();
        let mut bad = new_run();
        bad.scope.asset_limit = 0;
        assert!(matches!(store.create_run(bad), Err(AuditError::Validation(_))));
        assert!(store.list_runs(10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_get_nonexistent_run() {
        let store = RunStore::in_memory().unwrap();
        assert!(store.get_run("missing").unwrap().is_none());
        assert!(matches!(store.require_run("missing"), Err(AuditError::NotFound(_))));
    }

    #[test]
    fn test_update_status_with_error() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        store.update_run_status(&run.id, RunStatus::Failed, Some("page 3 failed")).unwrap();

        let loaded = store.require_run(&run.id).unwrap();
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("page 3 failed"));
    }

    #[test]
    fn test_update_status_unknown_run() {
        let store = RunStore::in_memory().unwrap();
        assert!(store.update_run_status("nope", RunStatus::Ingesting, None).is_err());
    }

    #[test]
    fn test_list_runs_pagination() {
        let store = RunStore::in_memory().unwrap();
        for _ in 0..5 {
            store.create_run(new_run()).unwrap();
        }
        assert_eq!(store.list_runs(10, 0).unwrap().len(), 5);
        assert_eq!(store.list_runs(2, 0).unwrap().len(), 2);
        assert_eq!(store.list_runs(10, 4).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_run() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        assert!(store.delete_run(&run.id).unwrap());
        assert!(store.get_run(&run.id).unwrap().is_none());
        assert!(!store.delete_run(&run.id).unwrap());
    }
}
