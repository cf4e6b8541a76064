use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::errors::AuditError;

/// Kind of metadata evidence collected for an asset. Also used as the unit of
/// capability selection on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Ownership,
    Semantics,
    Lineage,
    Sensitivity,
    Trust,
    Usage,
}

impl SignalType {
    pub const ALL: [SignalType; 6] = [
        SignalType::Ownership,
        SignalType::Semantics,
        SignalType::Lineage,
        SignalType::Sensitivity,
        SignalType::Trust,
        SignalType::Usage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "OWNERSHIP",
            Self::Semantics => "SEMANTICS",
            Self::Lineage => "LINEAGE",
            Self::Sensitivity => "SENSITIVITY",
            Self::Trust => "TRUST",
            Self::Usage => "USAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed evidence payload. Each variant records whether the signal is present;
/// a stored row with `present: false` is observed absence. Unknown evidence is
/// represented by the absence of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalValue {
    Ownership {
        present: bool,
        owner_users: Vec<String>,
        owner_groups: Vec<String>,
    },
    Semantics {
        present: bool,
        has_user_description: bool,
        term_count: u32,
        has_readme: bool,
    },
    Lineage {
        present: bool,
        upstream_count: u32,
        downstream_count: u32,
    },
    Sensitivity {
        present: bool,
        classifications: Vec<String>,
        certificate_status: Option<String>,
    },
    Trust {
        present: bool,
        certificate_status: String,
    },
    Usage {
        present: bool,
        popularity: f64,
        query_count: u64,
        query_user_count: u64,
    },
    /// A stored value that could not be decoded. Never accepted on insert.
    Unreadable { reason: String },
}

impl SignalValue {
    pub fn signal_type(&self) -> Option<SignalType> {
        match self {
            Self::Ownership { .. } => Some(SignalType::Ownership),
            Self::Semantics { .. } => Some(SignalType::Semantics),
            Self::Lineage { .. } => Some(SignalType::Lineage),
            Self::Sensitivity { .. } => Some(SignalType::Sensitivity),
            Self::Trust { .. } => Some(SignalType::Trust),
            Self::Usage { .. } => Some(SignalType::Usage),
            Self::Unreadable { .. } => None,
        }
    }

    pub fn is_present(&self) -> bool {
        match self {
            Self::Ownership { present, .. }
            | Self::Semantics { present, .. }
            | Self::Lineage { present, .. }
            | Self::Sensitivity { present, .. }
            | Self::Trust { present, .. }
            | Self::Usage { present, .. } => *present,
            Self::Unreadable { .. } => false,
        }
    }

    /// Check the payload against the row's declared signal type.
    pub fn validate(&self, expected: SignalType) -> Result<(), AuditError> {
        match self.signal_type() {
            None => {
                return Err(AuditError::Validation("unreadable evidence value cannot be stored".into()));
            }
            Some(actual) if actual != expected => {
                return Err(AuditError::Validation(format!(
                    "evidence value of kind {} stored under signal type {}",
                    actual, expected
                )));
            }
            Some(_) => {}
        }
        if let Self::Usage { popularity, .. } = self {
            if !popularity.is_finite() || *popularity < 0.0 {
                return Err(AuditError::Validation(format!("usage popularity must be finite and non-negative, got {}", popularity)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSignal {
    pub id: String,
    pub run_id: String,
    pub asset_guid: String,
    pub signal_type: SignalType,
    pub value: SignalValue,
    pub observed_at: DateTime<Utc>,
    /// Collaborator that produced the evidence, e.g. `catalog` or `lineage`.
    pub source: String,
}

impl EvidenceSignal {
    /// Build an unsaved signal; the store assigns the id. Fails for
    /// `Unreadable` values since they have no signal type.
    pub fn new(run_id: &str, asset_guid: &str, value: SignalValue, source: &str) -> Result<Self, AuditError> {
        let signal_type = value
            .signal_type()
            .ok_or_else(|| AuditError::Validation("evidence value has no signal type".into()))?;
        Ok(Self {
            id: String::new(),
            run_id: run_id.to_string(),
            asset_guid: asset_guid.to_string(),
            signal_type,
            value,
            observed_at: Utc::now(),
            source: source.to_string(),
        })
    }
}
