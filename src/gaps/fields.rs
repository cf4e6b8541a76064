use serde::{Deserialize, Serialize};
use crate::models::{Severity, SignalType, SignalValue};

/// Remediation workstream. Declaration order is the tie-break order when
/// phases share a top severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workstream {
    Ownership,
    Documentation,
    Classification,
    Lineage,
    Certification,
    Instrumentation,
}

impl Workstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::Documentation => "documentation",
            Self::Classification => "classification",
            Self::Lineage => "lineage",
            Self::Certification => "certification",
            Self::Instrumentation => "instrumentation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Ownership => "Assign Ownership",
            Self::Documentation => "Document Assets",
            Self::Classification => "Classify Sensitive Data",
            Self::Lineage => "Capture Lineage",
            Self::Certification => "Certify Trusted Assets",
            Self::Instrumentation => "Close Evidence Blind Spots",
        }
    }

    pub fn milestone(&self) -> &'static str {
        match self {
            Self::Ownership => "Every targeted asset has an owner",
            Self::Documentation => "Targeted assets carry descriptions and glossary links",
            Self::Classification => "Sensitive assets are tagged",
            Self::Lineage => "Lineage is captured for targeted assets",
            Self::Certification => "Trusted assets are certified",
            Self::Instrumentation => "All tracked signals are observable",
        }
    }
}

/// A metadata field whose coverage is measured against a target.
#[derive(Clone, Copy)]
pub struct TrackedField {
    pub name: &'static str,
    pub signal: SignalType,
    /// Business weight in [0, 1]; selects the priority tier.
    pub impact_weight: f64,
    /// Remediation hours per asset missing the field.
    pub hours_per_asset: f64,
    pub workstream: Workstream,
    /// Whether an observed value satisfies the field.
    pub satisfied_by: fn(&SignalValue) -> bool,
    /// Target applied when none is configured. `None` leaves the field out
    /// of the default targets.
    pub default_target: Option<f64>,
}

fn has_terms(value: &SignalValue) -> bool {
    matches!(value, SignalValue::Semantics { term_count, .. } if *term_count > 0)
}

fn has_readme(value: &SignalValue) -> bool {
    matches!(value, SignalValue::Semantics { has_readme: true, .. })
}

pub static TRACKED_FIELDS: [TrackedField; 7] = [
    TrackedField {
        name: "ownership",
        signal: SignalType::Ownership,
        impact_weight: 0.9,
        hours_per_asset: 0.25,
        workstream: Workstream::Ownership,
        satisfied_by: SignalValue::is_present,
        default_target: Some(0.8),
    },
    TrackedField {
        name: "description",
        signal: SignalType::Semantics,
        impact_weight: 0.8,
        hours_per_asset: 0.5,
        workstream: Workstream::Documentation,
        satisfied_by: SignalValue::is_present,
        default_target: Some(0.8),
    },
    TrackedField {
        name: "glossary_terms",
        signal: SignalType::Semantics,
        impact_weight: 0.5,
        hours_per_asset: 0.5,
        workstream: Workstream::Documentation,
        satisfied_by: has_terms,
        default_target: Some(0.8),
    },
    TrackedField {
        name: "readme",
        signal: SignalType::Semantics,
        impact_weight: 0.3,
        hours_per_asset: 1.0,
        workstream: Workstream::Documentation,
        satisfied_by: has_readme,
        default_target: None,
    },
    TrackedField {
        name: "lineage",
        signal: SignalType::Lineage,
        impact_weight: 0.7,
        hours_per_asset: 1.0,
        workstream: Workstream::Lineage,
        satisfied_by: SignalValue::is_present,
        default_target: Some(0.8),
    },
    TrackedField {
        name: "classification",
        signal: SignalType::Sensitivity,
        impact_weight: 0.75,
        hours_per_asset: 0.25,
        workstream: Workstream::Classification,
        satisfied_by: SignalValue::is_present,
        default_target: Some(0.8),
    },
    TrackedField {
        name: "certification",
        signal: SignalType::Trust,
        impact_weight: 0.4,
        hours_per_asset: 0.5,
        workstream: Workstream::Certification,
        satisfied_by: SignalValue::is_present,
        default_target: Some(0.5),
    },
];

/// Pseudo-field carrying subjects whose quality could not be scored.
pub const QUALITY_FIELD: &str = "quality";

/// Hours to instrument one asset whose evidence was never observed.
pub const INSTRUMENTATION_HOURS_PER_ASSET: f64 = 0.1;

pub fn tracked_field(name: &str) -> Option<&'static TrackedField> {
    TRACKED_FIELDS.iter().find(|f| f.name == name)
}

/// Workstream a gap on `field` belongs to. Unknown-coverage gaps are always
/// instrumentation work.
pub fn workstream_for(field: &str, unknown: bool) -> Workstream {
    if unknown {
        return Workstream::Instrumentation;
    }
    tracked_field(field).map_or(Workstream::Instrumentation, |f| f.workstream)
}

/// Priority from the gap size bucket and the field's weight tier.
pub fn priority(gap: f64, impact_weight: f64) -> Severity {
    // Bucket rows: large, medium, small, minor. Tier columns: high, medium, low.
    const TABLE: [[Severity; 3]; 4] = [
        [Severity::P0, Severity::P1, Severity::P2],
        [Severity::P1, Severity::P1, Severity::P2],
        [Severity::P1, Severity::P2, Severity::P3],
        [Severity::P2, Severity::P3, Severity::P3],
    ];
    let bucket = if gap >= 0.5 {
        0
    } else if gap >= 0.25 {
        1
    } else if gap >= 0.1 {
        2
    } else {
        3
    };
    let tier = if impact_weight >= 0.75 {
        0
    } else if impact_weight >= 0.5 {
        1
    } else {
        2
    };
    TABLE[bucket][tier]
}
