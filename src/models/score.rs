use serde::{Deserialize, Serialize};
use crate::errors::AuditError;
use super::run::Methodology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    Asset,
    Domain,
    AssetType,
    /// Whole-run aggregate, used by coverage gaps.
    Run,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Domain => "DOMAIN",
            Self::AssetType => "ASSET_TYPE",
            Self::Run => "RUN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASSET" => Some(Self::Asset),
            "DOMAIN" => Some(Self::Domain),
            "ASSET_TYPE" => Some(Self::AssetType),
            "RUN" => Some(Self::Run),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact × quality bucket. `HU`/`LU` mark subjects whose quality is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    HH,
    HL,
    LH,
    LL,
    HU,
    LU,
}

impl Quadrant {
    pub const ALL: [Quadrant; 6] = [Quadrant::HH, Quadrant::HL, Quadrant::LH, Quadrant::LL, Quadrant::HU, Quadrant::LU];

    /// Internal audit code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HH => "HH",
            Self::HL => "HL",
            Self::LH => "LH",
            Self::LL => "LL",
            Self::HU => "HU",
            Self::LU => "LU",
        }
    }

    /// Label shown to users; both unknown-quality codes collapse.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::HH => "HIGH_IMPACT_HIGH_QUALITY",
            Self::HL => "HIGH_IMPACT_LOW_QUALITY",
            Self::LH => "LOW_IMPACT_HIGH_QUALITY",
            Self::LL => "LOW_IMPACT_LOW_QUALITY",
            Self::HU | Self::LU => "QUALITY_UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.code() == s)
    }

    pub fn is_quality_unknown(&self) -> bool {
        matches!(self, Self::HU | Self::LU)
    }
}

/// One line of a score's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub signal: String,
    pub contribution: f64,
    pub note: String,
}

impl Explanation {
    pub fn new(signal: impl Into<String>, contribution: f64, note: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            contribution,
            note: note.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: String,
    pub run_id: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub impact_score: f64,
    pub quality_score: Option<f64>,
    pub quality_unknown: bool,
    pub quadrant: Quadrant,
    pub methodology: Methodology,
    pub explanations: Vec<Explanation>,
}

impl Score {
    /// Build an unsaved score. `quality_unknown` is derived from `quality_score`
    /// so the two cannot disagree.
    pub fn new(
        run_id: &str,
        subject_type: SubjectType,
        subject_id: &str,
        impact_score: f64,
        quality_score: Option<f64>,
        quadrant: Quadrant,
        methodology: Methodology,
        explanations: Vec<Explanation>,
    ) -> Self {
        Self {
            id: String::new(),
            run_id: run_id.to_string(),
            subject_type,
            subject_id: subject_id.to_string(),
            impact_score,
            quality_unknown: quality_score.is_none(),
            quality_score,
            quadrant,
            methodology,
            explanations,
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.quality_unknown != self.quality_score.is_none() {
            return Err(AuditError::Validation(format!(
                "score for {} {}: quality_unknown must be set exactly when quality_score is null",
                self.subject_type, self.subject_id
            )));
        }
        if self.quality_unknown != self.quadrant.is_quality_unknown() {
            return Err(AuditError::Validation(format!(
                "score for {} {}: quadrant {} disagrees with quality_unknown",
                self.subject_type, self.subject_id, self.quadrant.code()
            )));
        }
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(self.impact_score) || !self.quality_score.map_or(true, in_range) {
            return Err(AuditError::Validation(format!(
                "score for {} {} out of [0, 1]",
                self.subject_type, self.subject_id
            )));
        }
        Ok(())
    }
}
