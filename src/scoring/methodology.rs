use crate::models::{Explanation, Methodology, SignalType, SignalValue};

/// Governance signals a quality methodology reads. Only dimensions that were
/// both selected for the run and observed for the subject are populated.
#[derive(Debug, Default, Clone, Copy)]
pub struct GovernanceView<'a> {
    pub ownership: Option<&'a SignalValue>,
    pub semantics: Option<&'a SignalValue>,
    pub sensitivity: Option<&'a SignalValue>,
    pub trust: Option<&'a SignalValue>,
}

impl<'a> GovernanceView<'a> {
    pub fn get(&self, signal: SignalType) -> Option<&'a SignalValue> {
        match signal {
            SignalType::Ownership => self.ownership,
            SignalType::Semantics => self.semantics,
            SignalType::Sensitivity => self.sensitivity,
            SignalType::Trust => self.trust,
            SignalType::Lineage | SignalType::Usage => None,
        }
    }

    pub fn set(&mut self, signal: SignalType, value: &'a SignalValue) {
        match signal {
            SignalType::Ownership => self.ownership = Some(value),
            SignalType::Semantics => self.semantics = Some(value),
            SignalType::Sensitivity => self.sensitivity = Some(value),
            SignalType::Trust => self.trust = Some(value),
            SignalType::Lineage | SignalType::Usage => {}
        }
    }

    fn dimensions(&self) -> Vec<(SignalType, &'a SignalValue)> {
        GOVERNANCE_SIGNALS
            .iter()
            .filter_map(|s| self.get(*s).map(|v| (*s, v)))
            .collect()
    }

    fn has_description(&self) -> Option<bool> {
        self.semantics.map(SignalValue::is_present)
    }

    fn has_terms(&self) -> Option<bool> {
        match self.semantics {
            Some(SignalValue::Semantics { term_count, .. }) => Some(*term_count > 0),
            _ => None,
        }
    }
}

/// Signals that feed quality, in explanation order.
pub const GOVERNANCE_SIGNALS: [SignalType; 4] = [
    SignalType::Ownership,
    SignalType::Semantics,
    SignalType::Sensitivity,
    SignalType::Trust,
];

/// Computes a quality score in [0, 1] from fully observed governance signals.
pub trait QualityMethodology: Send + Sync {
    fn kind(&self) -> Methodology;
    fn quality(&self, view: &GovernanceView<'_>) -> (f64, Vec<Explanation>);
}

pub fn methodology_for(kind: Methodology) -> Box<dyn QualityMethodology> {
    match kind {
        Methodology::WeightedDimensions => Box::new(WeightedDimensions),
        Methodology::DimensionTriplet => Box::new(DimensionTriplet),
        Methodology::BinaryChecklist => Box::new(BinaryChecklist),
        Methodology::MaturityLevels => Box::new(MaturityLevels),
    }
}

/// Graded 0..1 value of one dimension.
fn dimension_points(value: &SignalValue) -> f64 {
    match value {
        SignalValue::Semantics { present, term_count, has_readme, .. } => {
            let mut points = 0.0;
            if *present {
                points += 0.6;
            }
            if *term_count > 0 {
                points += 0.3;
            }
            if *has_readme {
                points += 0.1;
            }
            points
        }
        SignalValue::Trust { certificate_status, .. } => match certificate_status.as_str() {
            "VERIFIED" => 1.0,
            "DRAFT" => 0.5,
            _ => 0.0,
        },
        other if other.is_present() => 1.0,
        _ => 0.0,
    }
}

fn dimension_weight(signal: SignalType) -> f64 {
    match signal {
        SignalType::Ownership => 0.3,
        SignalType::Semantics => 0.3,
        SignalType::Sensitivity => 0.2,
        SignalType::Trust => 0.2,
        SignalType::Lineage | SignalType::Usage => 0.0,
    }
}

pub struct WeightedDimensions;

impl QualityMethodology for WeightedDimensions {
    fn kind(&self) -> Methodology {
        Methodology::WeightedDimensions
    }

    fn quality(&self, view: &GovernanceView<'_>) -> (f64, Vec<Explanation>) {
        let dims = view.dimensions();
        let total_weight: f64 = dims.iter().map(|(s, _)| dimension_weight(*s)).sum();
        if total_weight == 0.0 {
            return (0.0, vec![]);
        }
        let mut quality = 0.0;
        let mut explanations = Vec::with_capacity(dims.len());
        for (signal, value) in dims {
            let weight = dimension_weight(signal) / total_weight;
            let points = dimension_points(value);
            let contribution = weight * points;
            quality += contribution;
            explanations.push(Explanation::new(
                signal.as_str(),
                contribution,
                format!("{:.2} of weight {:.2}", points, weight),
            ));
        }
        (quality, explanations)
    }
}

/// Mean of completeness, consistency and accuracy.
///
/// Completeness is the share of dimensions present. Consistency is the share
/// of applicable cross-field rules that hold. Accuracy is the certification
/// grade, or completeness when trust is not tracked.
pub struct DimensionTriplet;

impl QualityMethodology for DimensionTriplet {
    fn kind(&self) -> Methodology {
        Methodology::DimensionTriplet
    }

    fn quality(&self, view: &GovernanceView<'_>) -> (f64, Vec<Explanation>) {
        let dims = view.dimensions();
        if dims.is_empty() {
            return (0.0, vec![]);
        }
        let present = dims.iter().filter(|(_, v)| v.is_present()).count();
        let completeness = present as f64 / dims.len() as f64;

        let owned = view.ownership.map(SignalValue::is_present);
        // (antecedent, consequent) pairs; a rule applies when its antecedent holds.
        let rules = [
            (view.trust.map(SignalValue::is_present), owned),
            (view.sensitivity.map(SignalValue::is_present), owned),
            (view.has_description(), view.has_terms()),
        ];
        let mut applicable = 0;
        let mut satisfied = 0;
        for (antecedent, consequent) in rules {
            if let (Some(true), Some(holds)) = (antecedent, consequent) {
                applicable += 1;
                if holds {
                    satisfied += 1;
                }
            }
        }
        let consistency = if applicable == 0 { 1.0 } else { satisfied as f64 / applicable as f64 };

        let accuracy = view.trust.map(dimension_points).unwrap_or(completeness);

        let quality = (completeness + consistency + accuracy) / 3.0;
        let explanations = vec![
            Explanation::new("COMPLETENESS", completeness / 3.0, format!("{} of {} dimensions present", present, dims.len())),
            Explanation::new("CONSISTENCY", consistency / 3.0, format!("{} of {} rules hold", satisfied, applicable)),
            Explanation::new("ACCURACY", accuracy / 3.0, format!("accuracy {:.2}", accuracy)),
        ];
        (quality, explanations)
    }
}

pub struct BinaryChecklist;

impl QualityMethodology for BinaryChecklist {
    fn kind(&self) -> Methodology {
        Methodology::BinaryChecklist
    }

    fn quality(&self, view: &GovernanceView<'_>) -> (f64, Vec<Explanation>) {
        let dims = view.dimensions();
        if dims.is_empty() {
            return (0.0, vec![]);
        }
        let share = 1.0 / dims.len() as f64;
        let mut passed = 0;
        let mut explanations = Vec::with_capacity(dims.len());
        for (signal, value) in &dims {
            let ok = value.is_present();
            if ok {
                passed += 1;
            }
            explanations.push(Explanation::new(
                signal.as_str(),
                if ok { share } else { 0.0 },
                if ok { "pass" } else { "fail" },
            ));
        }
        (passed as f64 / dims.len() as f64, explanations)
    }
}

/// Cumulative levels: owned, described, classified, glossary-linked, certified.
/// A level counts only when every level below it is met. Levels whose signal
/// is not tracked for the run are left out of the ladder.
pub struct MaturityLevels;

impl QualityMethodology for MaturityLevels {
    fn kind(&self) -> Methodology {
        Methodology::MaturityLevels
    }

    fn quality(&self, view: &GovernanceView<'_>) -> (f64, Vec<Explanation>) {
        let ladder: Vec<(&str, Option<bool>)> = vec![
            ("OWNED", view.ownership.map(SignalValue::is_present)),
            ("DESCRIBED", view.has_description()),
            ("CLASSIFIED", view.sensitivity.map(SignalValue::is_present)),
            ("GLOSSARY_LINKED", view.has_terms()),
            ("CERTIFIED", view.trust.map(SignalValue::is_present)),
        ];
        let tracked: Vec<(&str, bool)> = ladder
            .into_iter()
            .filter_map(|(name, met)| met.map(|m| (name, m)))
            .collect();
        if tracked.is_empty() {
            return (0.0, vec![]);
        }

        let level = tracked.iter().take_while(|(_, met)| *met).count();
        let quality = level as f64 / tracked.len() as f64;
        let reached = if level == 0 { "none" } else { tracked[level - 1].0 };
        let mut explanations = vec![Explanation::new(
            "MATURITY",
            quality,
            format!("level {} of {} ({})", level, tracked.len(), reached),
        )];
        if let Some((blocked, _)) = tracked.get(level) {
            explanations.push(Explanation::new(*blocked, 0.0, "next level not met"));
        }
        (quality, explanations)
    }
}
