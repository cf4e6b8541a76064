use std::collections::BTreeMap;
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::models::{
    AssetRecord, EvidenceSignal, Explanation, Run, Score, SignalType, SignalValue, SubjectType,
};
use super::aggregate::aggregate_scores;
use super::methodology::{methodology_for, GovernanceView, QualityMethodology, GOVERNANCE_SIGNALS};
use super::quadrant::{classify, round4};
use tracing::{info, warn};

const USAGE_WEIGHT: f64 = 0.5;
const LINEAGE_WEIGHT: f64 = 0.3;
const SENSITIVITY_WEIGHT: f64 = 0.2;

/// Saturation points for log scaling.
const QUERY_COUNT_SATURATION: f64 = 1_000.0;
const QUERY_USER_SATURATION: f64 = 100.0;
const DOWNSTREAM_SATURATION: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringReport {
    pub assets_scored: usize,
    pub quality_unknown: usize,
    pub computation_errors: usize,
    pub aggregate_scores: usize,
}

/// Evidence for one asset, keyed by signal type. When several rows exist for
/// the same type the latest observation wins.
pub type AssetEvidence = BTreeMap<SignalType, SignalValue>;

pub struct ScoringEngine {
    store: RunStore,
}

impl ScoringEngine {
    pub fn new(store: RunStore) -> Self {
        Self { store }
    }

    /// Score every asset of `run`, then the domain and asset-type rollups.
    /// Replaces any scores from a previous pass.
    pub fn score(&self, run: &Run) -> Result<ScoringReport, AuditError> {
        let filter = Filter::run(&run.id);
        let assets: Vec<AssetRecord> = self.store.find_many(&filter)?;
        let evidence: Vec<EvidenceSignal> = self.store.find_many(&filter)?;

        let mut by_asset: BTreeMap<String, AssetEvidence> = BTreeMap::new();
        for signal in evidence {
            if !run.has_capability(signal.signal_type) {
                continue;
            }
            by_asset.entry(signal.asset_guid).or_default().insert(signal.signal_type, signal.value);
        }

        let methodology = methodology_for(run.scoring.methodology);
        let mut report = ScoringReport::default();
        let mut scores = Vec::with_capacity(assets.len());
        let empty = AssetEvidence::new();

        for asset in &assets {
            let signals = by_asset.get(&asset.asset_guid).unwrap_or(&empty);
            let score = match score_asset(run, &asset.asset_guid, signals, methodology.as_ref()) {
                Ok(score) => score,
                Err(e) => {
                    warn!(run_id = %run.id, guid = %asset.asset_guid, error = %e, "Scoring failed for asset, quality left unknown");
                    report.computation_errors += 1;
                    fallback_score(run, &asset.asset_guid, signals, &e)
                }
            };
            if score.quality_unknown {
                report.quality_unknown += 1;
            }
            scores.push(score);
        }
        report.assets_scored = scores.len();

        let aggregates = aggregate_scores(run, &assets, &scores);
        report.aggregate_scores = aggregates.len();
        scores.extend(aggregates);
        scores.sort_by(|a, b| (a.subject_type, &a.subject_id).cmp(&(b.subject_type, &b.subject_id)));

        self.store.replace_for_run(&run.id, scores)?;
        info!(
            run_id = %run.id,
            methodology = %run.scoring.methodology,
            assets = report.assets_scored,
            quality_unknown = report.quality_unknown,
            computation_errors = report.computation_errors,
            "Scoring complete"
        );
        Ok(report)
    }
}

fn log_scale(value: f64, saturation: f64) -> f64 {
    ((1.0 + value.max(0.0)).ln() / (1.0 + saturation).ln()).min(1.0)
}

/// Impact from whichever of usage, lineage fan-out and sensitivity are known,
/// with weights renormalized over the known ones.
pub fn impact(run: &Run, signals: &AssetEvidence) -> (f64, Vec<Explanation>) {
    let mut parts: Vec<(SignalType, f64, f64, String)> = Vec::new();

    if run.has_capability(SignalType::Usage) {
        if let Some(SignalValue::Usage { popularity, query_count, query_user_count, .. }) = signals.get(&SignalType::Usage) {
            let value = log_scale(*query_count as f64, QUERY_COUNT_SATURATION)
                .max(log_scale(*query_user_count as f64, QUERY_USER_SATURATION))
                .max(popularity.clamp(0.0, 1.0));
            parts.push((SignalType::Usage, USAGE_WEIGHT, value, format!("{} queries by {} users", query_count, query_user_count)));
        }
    }
    if run.has_capability(SignalType::Lineage) {
        if let Some(SignalValue::Lineage { downstream_count, .. }) = signals.get(&SignalType::Lineage) {
            let value = log_scale(*downstream_count as f64, DOWNSTREAM_SATURATION);
            parts.push((SignalType::Lineage, LINEAGE_WEIGHT, value, format!("{} downstream assets", downstream_count)));
        }
    }
    if run.has_capability(SignalType::Sensitivity) {
        let sensitivity = signals
            .get(&SignalType::Sensitivity)
            .filter(|v| matches!(v, SignalValue::Sensitivity { .. }));
        if let Some(value) = sensitivity {
            let sensitive = value.is_present();
            parts.push((
                SignalType::Sensitivity,
                SENSITIVITY_WEIGHT,
                if sensitive { 1.0 } else { 0.0 },
                if sensitive { "classified".to_string() } else { "unclassified".to_string() },
            ));
        }
    }

    if parts.is_empty() {
        return (0.0, vec![Explanation::new("IMPACT", 0.0, "no impact signal observed")]);
    }
    let total: f64 = parts.iter().map(|(_, w, _, _)| w).sum();
    let mut impact = 0.0;
    let mut explanations = Vec::with_capacity(parts.len());
    for (signal, weight, value, note) in parts {
        let contribution = round4(weight / total * value);
        impact += weight / total * value;
        explanations.push(Explanation::new(format!("IMPACT:{}", signal), contribution, note));
    }
    (round4(impact.clamp(0.0, 1.0)), explanations)
}

fn score_asset(
    run: &Run,
    guid: &str,
    signals: &AssetEvidence,
    methodology: &dyn QualityMethodology,
) -> Result<Score, AuditError> {
    let unreadable: Vec<String> = signals
        .iter()
        .filter_map(|(signal, value)| match value {
            SignalValue::Unreadable { reason } => Some(format!("{}: {}", signal, reason)),
            _ => None,
        })
        .collect();
    if !unreadable.is_empty() {
        return Err(AuditError::Computation {
            subject: guid.to_string(),
            reason: format!("unreadable evidence ({})", unreadable.join("; ")),
        });
    }

    let (impact_score, mut explanations) = impact(run, signals);

    let required: Vec<SignalType> = GOVERNANCE_SIGNALS.into_iter().filter(|s| run.has_capability(*s)).collect();
    let missing: Vec<&str> = required.iter().filter(|s| !signals.contains_key(*s)).map(|s| s.as_str()).collect();

    let quality = if required.is_empty() {
        explanations.push(Explanation::new("QUALITY", 0.0, "no governance capability selected"));
        None
    } else if !missing.is_empty() {
        explanations.push(Explanation::new("QUALITY", 0.0, format!("never observed: {}", missing.join(", "))));
        None
    } else {
        let mut view = GovernanceView::default();
        for signal in &required {
            if let Some(value) = signals.get(signal) {
                view.set(*signal, value);
            }
        }
        let (q, quality_explanations) = methodology.quality(&view);
        if !q.is_finite() {
            return Err(AuditError::Computation {
                subject: guid.to_string(),
                reason: format!("{} produced a non-finite quality", methodology.kind()),
            });
        }
        explanations.extend(
            quality_explanations
                .into_iter()
                .map(|e| Explanation::new(e.signal, round4(e.contribution), e.note)),
        );
        Some(round4(q.clamp(0.0, 1.0)))
    };

    Ok(Score::new(
        &run.id,
        SubjectType::Asset,
        guid,
        impact_score,
        quality,
        classify(impact_score, quality, &run.scoring),
        run.scoring.methodology,
        explanations,
    ))
}

fn fallback_score(run: &Run, guid: &str, signals: &AssetEvidence, error: &AuditError) -> Score {
    let readable: AssetEvidence = signals
        .iter()
        .filter(|(_, v)| !matches!(v, SignalValue::Unreadable { .. }))
        .map(|(k, v)| (*k, v.clone()))
        .collect();
    let (impact_score, mut explanations) = impact(run, &readable);
    explanations.push(Explanation::new("QUALITY", 0.0, format!("computation error: {}", error)));
    Score::new(
        &run.id,
        SubjectType::Asset,
        guid,
        impact_score,
        None,
        classify(impact_score, None, &run.scoring),
        run.scoring.methodology,
        explanations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::runs::tests::new_run;
    use crate::models::{Methodology, Quadrant};

    fn run() -> Run {
        let store = RunStore::in_memory().unwrap();
        store.create_run(new_run()).unwrap()
    }

    fn full_governance(present: bool) -> AssetEvidence {
        let mut e = AssetEvidence::new();
        e.insert(SignalType::Ownership, SignalValue::Ownership {
            present,
            owner_users: if present { vec!["a".into()] } else { vec![] },
            owner_groups: vec![],
        });
        e.insert(SignalType::Semantics, SignalValue::Semantics {
            present,
            has_user_description: false,
            term_count: if present { 1 } else { 0 },
            has_readme: present,
        });
        e.insert(SignalType::Sensitivity, SignalValue::Sensitivity {
            present,
            classifications: vec![],
            certificate_status: None,
        });
        e.insert(SignalType::Trust, SignalValue::Trust {
            present,
            certificate_status: if present { "VERIFIED".into() } else { "NONE".into() },
        });
        e
    }

    #[test]
    fn test_impact_without_signals() {
        let (impact, explanations) = impact(&run(), &AssetEvidence::new());
        assert_eq!(impact, 0.0);
        assert_eq!(explanations[0].note, "no impact signal observed");
    }

    #[test]
    fn test_impact_renormalizes_known_signals() {
        let mut e = AssetEvidence::new();
        e.insert(SignalType::Sensitivity, SignalValue::Sensitivity {
            present: true,
            classifications: vec!["PII".into()],
            certificate_status: None,
        });
        // Sensitivity alone carries the full weight
        assert_eq!(impact(&run(), &e).0, 1.0);
    }

    #[test]
    fn test_usage_log_scaled() {
        let mut e = AssetEvidence::new();
        e.insert(SignalType::Usage, SignalValue::Usage {
            present: true,
            popularity: 0.0,
            query_count: 1_000,
            query_user_count: 0,
        });
        assert_eq!(impact(&run(), &e).0, 1.0);
    }

    #[test]
    fn test_missing_governance_signal_makes_quality_unknown() {
        let run = run();
        let mut e = full_governance(true);
        e.remove(&SignalType::Trust);
        let score = score_asset(&run, "g1", &e, methodology_for(Methodology::WeightedDimensions).as_ref()).unwrap();
        assert!(score.quality_unknown);
        assert_eq!(score.quality_score, None);
        assert!(score.quadrant.is_quality_unknown());
        assert!(score.explanations.iter().any(|x| x.note.contains("TRUST")));
    }

    #[test]
    fn test_observed_absence_scores_zero_quality() {
        let run = run();
        let score = score_asset(&run, "g1", &full_governance(false), methodology_for(Methodology::WeightedDimensions).as_ref()).unwrap();
        assert_eq!(score.quality_score, Some(0.0));
        assert_eq!(score.quadrant, Quadrant::LL);
    }

    #[test]
    fn test_unreadable_evidence_is_computation_error() {
        let run = run();
        let mut e = full_governance(true);
        e.insert(SignalType::Ownership, SignalValue::Unreadable { reason: "bad json".into() });
        let err = score_asset(&run, "g1", &e, methodology_for(Methodology::BinaryChecklist).as_ref()).unwrap_err();
        assert!(matches!(err, AuditError::Computation { .. }));

        let fallback = fallback_score(&run, "g1", &e, &err);
        assert!(fallback.quality_unknown);
        assert!(fallback.validate().is_ok());
    }

    #[test]
    fn test_uncaptured_capability_not_required() {
        let store = RunStore::in_memory().unwrap();
        let mut new = new_run();
        new.capabilities = [SignalType::Ownership].into_iter().collect();
        let run = store.create_run(new).unwrap();

        let mut e = AssetEvidence::new();
        e.insert(SignalType::Ownership, SignalValue::Ownership {
            present: true,
            owner_users: vec!["a".into()],
            owner_groups: vec![],
        });
        let score = score_asset(&run, "g1", &e, methodology_for(Methodology::BinaryChecklist).as_ref()).unwrap();
        assert_eq!(score.quality_score, Some(1.0));
    }
}
