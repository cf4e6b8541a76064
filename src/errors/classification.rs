use super::types::AuditError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
    /// Whether the orchestrator moves the run to FAILED when a stage returns this error.
    pub fails_run: bool,
}

impl AuditError {
    /// Classify this error to determine its type, whether it can be retried,
    /// and whether it is fatal to the run that raised it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable fetch errors
            AuditError::TransientFetch(_) => ErrorClassification {
                error_type: "TransientFetchError",
                retryable: true,
                fails_run: true,
            },
            AuditError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
                fails_run: true,
            },

            // Rejected before any mutation; run status is untouched
            AuditError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
                fails_run: false,
            },
            AuditError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
                fails_run: false,
            },
            AuditError::InvalidState(_) => ErrorClassification {
                error_type: "InvalidStateError",
                retryable: false,
                fails_run: false,
            },
            AuditError::NotFound(_) => ErrorClassification {
                error_type: "NotFoundError",
                retryable: false,
                fails_run: false,
            },
            AuditError::Conflict(_) => ErrorClassification {
                error_type: "ConflictError",
                retryable: false,
                fails_run: false,
            },
            // Cancellation leaves the run resumable
            AuditError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
                fails_run: false,
            },
            // Isolated to one subject by the scoring engine
            AuditError::Computation { .. } => ErrorClassification {
                error_type: "ComputationError",
                retryable: false,
                fails_run: false,
            },

            // Unrecoverable
            AuditError::Fetch(_) => ErrorClassification {
                error_type: "FetchError",
                retryable: false,
                fails_run: true,
            },
            AuditError::PartialIngestion { .. } => ErrorClassification {
                error_type: "PartialIngestionError",
                retryable: false,
                fails_run: true,
            },
            AuditError::LineageDegraded { .. } => ErrorClassification {
                error_type: "LineageDegradedError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Csv(_) => ErrorClassification {
                error_type: "CsvError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                retryable: false,
                fails_run: true,
            },
            AuditError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
                fails_run: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_fetch_is_retryable() {
        let err = AuditError::TransientFetch("connection reset".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "TransientFetchError");
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = AuditError::RateLimit("429".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_fetch_error_not_retryable() {
        let err = AuditError::Fetch("401 unauthorized".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert!(class.fails_run);
    }

    #[test]
    fn test_validation_does_not_fail_run() {
        let err = AuditError::Validation("asset_limit must be positive".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert!(!class.fails_run);
    }

    #[test]
    fn test_cancelled_does_not_fail_run() {
        let err = AuditError::Cancelled("run-1".into());
        assert!(!err.classify().fails_run);
    }

    #[test]
    fn test_partial_ingestion_fails_run() {
        let err = AuditError::PartialIngestion {
            pages_completed: 2,
            assets_ingested: 200,
            reason: "timeout".into(),
        };
        let class = err.classify();
        assert!(class.fails_run);
        assert_eq!(class.error_type, "PartialIngestionError");
    }

    #[test]
    fn test_lineage_degraded_message() {
        let err = AuditError::LineageDegraded { failed: 6, attempted: 10, ceiling: 0.5 };
        assert_eq!(
            err.to_string(),
            "Lineage coverage degraded: 6/10 lookups failed (ceiling 0.50)"
        );
    }
}
