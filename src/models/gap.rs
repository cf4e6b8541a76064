use serde::{Deserialize, Serialize};
use crate::errors::AuditError;
use super::score::SubjectType;

/// Remediation priority, P0 most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    P0,
    P1,
    P2,
    P3,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::P0, Severity::P1, Severity::P2, Severity::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::P0 => "Critical",
            Self::P1 => "High",
            Self::P2 => "Medium",
            Self::P3 => "Low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapKind {
    /// Observed coverage is below target.
    Coverage,
    /// Evidence was never observed for some subjects.
    CoverageUnknown,
}

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coverage => "COVERAGE",
            Self::CoverageUnknown => "COVERAGE_UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COVERAGE" => Some(Self::Coverage),
            "COVERAGE_UNKNOWN" => Some(Self::CoverageUnknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub run_id: String,
    pub field: String,
    pub kind: GapKind,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub severity: Severity,
    pub current_coverage: f64,
    pub target_coverage: f64,
    pub effort_hours: f64,
    /// Asset guids backing this gap, sorted.
    pub evidence_refs: Vec<String>,
    pub explanation: String,
}

impl Gap {
    pub fn gap_percent(&self) -> f64 {
        (self.target_coverage - self.current_coverage).max(0.0)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.field.trim().is_empty() {
            return Err(AuditError::Validation("gap field is required".into()));
        }
        for (name, v) in [("current_coverage", self.current_coverage), ("target_coverage", self.target_coverage)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(AuditError::Validation(format!("gap {} {} out of [0, 1]", self.field, name)));
            }
        }
        if !self.effort_hours.is_finite() || self.effort_hours < 0.0 {
            return Err(AuditError::Validation(format!("gap {} effort_hours must be non-negative", self.field)));
        }
        Ok(())
    }
}
