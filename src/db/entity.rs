use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use crate::errors::AuditError;
use super::RunStore;

/// A table whose rows belong to a run. Implementors describe their columns;
/// the store provides the typed CRUD on top.
pub trait Entity: Sized {
    const TABLE: &'static str;
    /// Columns after `id` and `run_id`, in the order produced by `to_values`
    /// and read by `from_row` (starting at index 2).
    const COLUMNS: &'static [&'static str];
    /// Column matched by `Filter::subjects`.
    const SUBJECT_COLUMN: &'static str;
    /// Column matched by `Filter::kind`, if the entity has one.
    const KIND_COLUMN: Option<&'static str>;
    const ORDER_BY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn run_id(&self) -> &str;
    fn validate(&self) -> Result<(), AuditError>;
    fn to_values(&self) -> Result<Vec<Value>, AuditError>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Row selection for `find_many` / `delete_many`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub run_id: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub kind: Option<String>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn run(run_id: &str) -> Self {
        Self { run_id: Some(run_id.to_string()), ..Default::default() }
    }

    /// Restrict to rows whose subject column is in `ids`. An empty list matches nothing.
    pub fn subjects<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    fn where_clause<E: Entity>(&self) -> Result<(String, Vec<Value>), AuditError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(run_id) = &self.run_id {
            values.push(Value::Text(run_id.clone()));
            clauses.push(format!("run_id = ?{}", values.len()));
        }
        if let Some(subjects) = &self.subjects {
            if subjects.is_empty() {
                clauses.push("1 = 0".to_string());
            } else {
                // One JSON-array parameter keeps large id sets under the bind limit.
                values.push(Value::Text(serde_json::to_string(subjects)?));
                clauses.push(format!(
                    "{} IN (SELECT value FROM json_each(?{}))",
                    E::SUBJECT_COLUMN,
                    values.len()
                ));
            }
        }
        if let Some(kind) = &self.kind {
            let column = E::KIND_COLUMN.ok_or_else(|| {
                AuditError::Validation(format!("table {} has no kind column", E::TABLE))
            })?;
            values.push(Value::Text(kind.clone()));
            clauses.push(format!("{} = ?{}", column, values.len()));
        }

        if clauses.is_empty() {
            Ok((String::new(), values))
        } else {
            Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
        }
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn ensure_run(conn: &Connection, run_id: &str) -> Result<(), AuditError> {
    let exists: bool = conn
        .query_row("SELECT EXISTS(SELECT 1 FROM runs WHERE id = ?1)", [run_id], |row| row.get(0))
        .map_err(|e| AuditError::db("Run lookup failed", e))?;
    if exists {
        Ok(())
    } else {
        Err(AuditError::NotFound(format!("run {}", run_id)))
    }
}

fn insert_row<E: Entity>(conn: &Connection, row: &E) -> Result<(), AuditError> {
    let mut values = vec![Value::Text(row.id().to_string()), Value::Text(row.run_id().to_string())];
    values.extend(row.to_values()?);
    let columns: Vec<&str> = ["id", "run_id"].iter().chain(E::COLUMNS.iter()).copied().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        E::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values))
        .map_err(|e| AuditError::db(&format!("Failed to insert into {}", E::TABLE), e))?;
    Ok(())
}

fn prepare_rows<E: Entity>(rows: &mut [E], run_id: Option<&str>) -> Result<(), AuditError> {
    for row in rows.iter() {
        row.validate()?;
        if let Some(expected) = run_id {
            if row.run_id() != expected {
                return Err(AuditError::Validation(format!(
                    "{} row for run {} cannot be written under run {}",
                    E::TABLE,
                    row.run_id(),
                    expected
                )));
            }
        }
    }
    for row in rows.iter_mut() {
        row.set_id(new_id());
    }
    Ok(())
}

impl RunStore {
    /// Validate and insert one row, assigning its id.
    pub fn create<E: Entity>(&self, mut row: E) -> Result<E, AuditError> {
        row.validate()?;
        let conn = self.lock()?;
        ensure_run(&conn, row.run_id())?;
        row.set_id(new_id());
        insert_row(&conn, &row)?;
        Ok(row)
    }

    /// Insert rows of one run in a single transaction. Nothing is written if
    /// any row fails validation.
    pub fn create_many<E: Entity>(&self, run_id: &str, mut rows: Vec<E>) -> Result<Vec<E>, AuditError> {
        prepare_rows(&mut rows, Some(run_id))?;
        let mut conn = self.lock()?;
        ensure_run(&conn, run_id)?;
        let tx = conn.transaction().map_err(|e| AuditError::db("Failed to begin transaction", e))?;
        for row in &rows {
            insert_row(&tx, row)?;
        }
        tx.commit().map_err(|e| AuditError::db("Failed to commit", e))?;
        Ok(rows)
    }

    pub fn find_many<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>, AuditError> {
        let (where_sql, values) = filter.where_clause::<E>()?;
        let columns: Vec<&str> = ["id", "run_id"].iter().chain(E::COLUMNS.iter()).copied().collect();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            columns.join(", "),
            E::TABLE,
            where_sql,
            E::ORDER_BY
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)
            .map_err(|e| AuditError::db(&format!("Query on {} failed", E::TABLE), e))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), |row| E::from_row(row))
            .map_err(|e| AuditError::db(&format!("Query on {} failed", E::TABLE), e))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| AuditError::db(&format!("Row error in {}", E::TABLE), e))?);
        }
        Ok(results)
    }

    pub fn count<E: Entity>(&self, filter: &Filter) -> Result<usize, AuditError> {
        let (where_sql, values) = filter.where_clause::<E>()?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", E::TABLE, where_sql);
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&sql, rusqlite::params_from_iter(values), |row| row.get(0))
            .map_err(|e| AuditError::db(&format!("Count on {} failed", E::TABLE), e))?;
        Ok(count as usize)
    }

    /// Delete matching rows in one statement. Returns the number removed.
    pub fn delete_many<E: Entity>(&self, filter: &Filter) -> Result<usize, AuditError> {
        let (where_sql, values) = filter.where_clause::<E>()?;
        let sql = format!("DELETE FROM {}{}", E::TABLE, where_sql);
        let conn = self.lock()?;
        conn.execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|e| AuditError::db(&format!("Delete on {} failed", E::TABLE), e))
    }

    /// Atomically delete the rows matched by `filter` (which must name a run)
    /// and insert `rows` in their place. Readers never observe a mix.
    pub fn replace_many<E: Entity>(&self, filter: &Filter, mut rows: Vec<E>) -> Result<Vec<E>, AuditError> {
        let run_id = filter.run_id.clone().ok_or_else(|| {
            AuditError::Validation(format!("replacing {} rows requires a run filter", E::TABLE))
        })?;
        prepare_rows(&mut rows, Some(&run_id))?;
        let (where_sql, values) = filter.where_clause::<E>()?;

        let mut conn = self.lock()?;
        ensure_run(&conn, &run_id)?;
        let tx = conn.transaction().map_err(|e| AuditError::db("Failed to begin transaction", e))?;
        tx.execute(&format!("DELETE FROM {}{}", E::TABLE, where_sql), rusqlite::params_from_iter(values))
            .map_err(|e| AuditError::db(&format!("Delete on {} failed", E::TABLE), e))?;
        for row in &rows {
            insert_row(&tx, row)?;
        }
        tx.commit().map_err(|e| AuditError::db("Failed to commit", e))?;
        Ok(rows)
    }

    /// Replace every `E` row of the run.
    pub fn replace_for_run<E: Entity>(&self, run_id: &str, rows: Vec<E>) -> Result<Vec<E>, AuditError> {
        self.replace_many(&Filter::run(run_id), rows)
    }
}

/// Read a TEXT column and parse it into an enum, reporting unknown values as
/// conversion failures.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value '{}'", raw).into(),
        )
    })
}

/// Read a TEXT column holding JSON.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(v) => Value::Text(v.clone()),
        None => Value::Null,
    }
}
