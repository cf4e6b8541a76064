use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Partial ingestion after {pages_completed} page(s), {assets_ingested} asset(s): {reason}")]
    PartialIngestion {
        pages_completed: usize,
        assets_ingested: usize,
        reason: String,
    },

    #[error("Lineage coverage degraded: {failed}/{attempted} lookups failed (ceiling {ceiling:.2})")]
    LineageDegraded {
        failed: usize,
        attempted: usize,
        ceiling: f64,
    },

    #[error("Computation error for {subject}: {reason}")]
    Computation { subject: String, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    pub(crate) fn db(context: &str, err: rusqlite::Error) -> Self {
        AuditError::Database(format!("{}: {}", context, err))
    }
}
