use std::collections::{BTreeMap, BTreeSet, HashMap};
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::models::{
    AssetRecord, EvidenceSignal, Gap, GapKind, Run, Score, SignalType, SignalValue, SubjectType,
};
use crate::scoring::quadrant::round4;
use super::fields::{priority, tracked_field, TrackedField, INSTRUMENTATION_HOURS_PER_ASSET, QUALITY_FIELD, TRACKED_FIELDS};
use tracing::{debug, info};

/// Target coverage fraction per tracked field name.
pub type Targets = BTreeMap<String, f64>;

/// Weight tier used for the quality pseudo-field.
const QUALITY_WEIGHT: f64 = 0.6;

pub fn default_targets() -> Targets {
    TRACKED_FIELDS
        .iter()
        .filter_map(|f| f.default_target.map(|target| (f.name.to_string(), target)))
        .collect()
}

pub fn validate_targets(targets: &Targets) -> Result<(), AuditError> {
    for (field, target) in targets {
        if tracked_field(field).is_none() {
            let known: Vec<&str> = TRACKED_FIELDS.iter().map(|f| f.name).collect();
            return Err(AuditError::Validation(format!(
                "unknown target field '{}' (known: {})",
                field,
                known.join(", ")
            )));
        }
        if !target.is_finite() || !(0.0..=1.0).contains(target) {
            return Err(AuditError::Validation(format!("target for '{}' must be within [0, 1], got {}", field, target)));
        }
    }
    Ok(())
}

/// Per-field coverage split over a run's assets.
#[derive(Debug, Default)]
struct Coverage {
    present: usize,
    missing: Vec<String>,
    unknown: Vec<String>,
}

fn measure(field: &TrackedField, guids: &[String], evidence: &HashMap<(String, SignalType), SignalValue>) -> Coverage {
    let mut coverage = Coverage::default();
    for guid in guids {
        match evidence.get(&(guid.clone(), field.signal)) {
            None | Some(SignalValue::Unreadable { .. }) => {
                coverage.unknown.push(guid.clone());
                coverage.missing.push(guid.clone());
            }
            Some(value) if (field.satisfied_by)(value) => coverage.present += 1,
            Some(_) => coverage.missing.push(guid.clone()),
        }
    }
    coverage
}

pub struct GapDetector {
    store: RunStore,
}

impl GapDetector {
    pub fn new(store: RunStore) -> Self {
        Self { store }
    }

    /// Compare field coverage against `targets` and replace the run's gaps.
    pub fn detect_gaps(&self, run: &Run, targets: &Targets) -> Result<Vec<Gap>, AuditError> {
        validate_targets(targets)?;
        let filter = Filter::run(&run.id);

        let assets: Vec<AssetRecord> = self.store.find_many(&filter)?;
        let guids: Vec<String> = assets.iter().map(|a| a.asset_guid.clone()).collect::<BTreeSet<_>>().into_iter().collect();
        let mut evidence: HashMap<(String, SignalType), SignalValue> = HashMap::new();
        for signal in self.store.find_many::<EvidenceSignal>(&filter)? {
            evidence.insert((signal.asset_guid, signal.signal_type), signal.value);
        }

        let mut gaps = Vec::new();
        let total = guids.len();

        for field in TRACKED_FIELDS.iter() {
            let Some(&target) = targets.get(field.name) else {
                continue;
            };
            if !run.has_capability(field.signal) {
                debug!(run_id = %run.id, field = field.name, "Field skipped, capability not selected");
                continue;
            }
            if total == 0 {
                continue;
            }

            let coverage = measure(field, &guids, &evidence);
            let current = round4(coverage.present as f64 / total as f64);

            if current < target {
                let gap = target - current;
                gaps.push(Gap {
                    id: String::new(),
                    run_id: run.id.clone(),
                    field: field.name.to_string(),
                    kind: GapKind::Coverage,
                    subject_type: SubjectType::Run,
                    subject_id: run.id.clone(),
                    severity: priority(gap, field.impact_weight),
                    current_coverage: current,
                    target_coverage: target,
                    effort_hours: round4(coverage.missing.len() as f64 * field.hours_per_asset),
                    explanation: format!(
                        "{} coverage {:.1}% is below target {:.1}% ({} of {} assets)",
                        field.name,
                        current * 100.0,
                        target * 100.0,
                        coverage.present,
                        total
                    ),
                    evidence_refs: coverage.missing,
                });
            }

            if !coverage.unknown.is_empty() {
                let observed = round4((total - coverage.unknown.len()) as f64 / total as f64);
                gaps.push(Gap {
                    id: String::new(),
                    run_id: run.id.clone(),
                    field: field.name.to_string(),
                    kind: GapKind::CoverageUnknown,
                    subject_type: SubjectType::Run,
                    subject_id: run.id.clone(),
                    severity: priority(1.0 - observed, field.impact_weight),
                    current_coverage: observed,
                    target_coverage: 1.0,
                    effort_hours: round4(coverage.unknown.len() as f64 * INSTRUMENTATION_HOURS_PER_ASSET),
                    explanation: format!(
                        "{} was never observed for {} of {} assets",
                        field.signal,
                        coverage.unknown.len(),
                        total
                    ),
                    evidence_refs: coverage.unknown,
                });
            }
        }

        if let Some(gap) = self.quality_gap(run)? {
            gaps.push(gap);
        }

        gaps.sort_by(|a, b| {
            (a.severity, &a.field, a.kind, &a.subject_id).cmp(&(b.severity, &b.field, b.kind, &b.subject_id))
        });
        let stored = self.store.replace_for_run(&run.id, gaps)?;
        info!(run_id = %run.id, gaps = stored.len(), assets = total, "Gap detection complete");
        Ok(stored)
    }

    /// One COVERAGE_UNKNOWN gap listing asset subjects scored with unknown quality.
    fn quality_gap(&self, run: &Run) -> Result<Option<Gap>, AuditError> {
        let scores: Vec<Score> = self.store.find_many(&Filter::run(&run.id).kind(SubjectType::Asset.as_str()))?;
        if scores.is_empty() {
            return Ok(None);
        }
        let unknown: Vec<String> = scores
            .iter()
            .filter(|s| s.quality_unknown)
            .map(|s| s.subject_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unknown.is_empty() {
            return Ok(None);
        }
        let known_share = round4((scores.len() - unknown.len()) as f64 / scores.len() as f64);
        Ok(Some(Gap {
            id: String::new(),
            run_id: run.id.clone(),
            field: QUALITY_FIELD.to_string(),
            kind: GapKind::CoverageUnknown,
            subject_type: SubjectType::Run,
            subject_id: run.id.clone(),
            severity: priority(1.0 - known_share, QUALITY_WEIGHT),
            current_coverage: known_share,
            target_coverage: 1.0,
            effort_hours: round4(unknown.len() as f64 * INSTRUMENTATION_HOURS_PER_ASSET),
            explanation: format!(
                "quality could not be scored for {} of {} assets",
                unknown.len(),
                scores.len()
            ),
            evidence_refs: unknown,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::runs::tests::new_run;
    use crate::models::Severity;

    fn seed(store: &RunStore, run: &Run, owners: &[(&str, Option<bool>)]) {
        let assets: Vec<AssetRecord> = owners
            .iter()
            .map(|(guid, _)| AssetRecord {
                id: String::new(),
                run_id: run.id.clone(),
                asset_guid: guid.to_string(),
                name: guid.to_string(),
                asset_type: "Table".into(),
                qualified_name: format!("db/{}", guid),
                domain: None,
                source_system: None,
                deep_link_url: None,
            })
            .collect();
        store.create_many(&run.id, assets).unwrap();

        let evidence: Vec<EvidenceSignal> = owners
            .iter()
            .filter_map(|(guid, owned)| owned.map(|present| (guid, present)))
            .map(|(guid, present)| {
                let value = SignalValue::Ownership {
                    present,
                    owner_users: if present { vec!["alice".into()] } else { vec![] },
                    owner_groups: vec![],
                };
                EvidenceSignal::new(&run.id, guid, value, "catalog").unwrap()
            })
            .collect();
        store.create_many(&run.id, evidence).unwrap();
    }

    fn ownership_target(target: f64) -> Targets {
        [("ownership".to_string(), target)].into_iter().collect()
    }

    #[test]
    fn test_coverage_gap_below_target() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        seed(&store, &run, &[("a", Some(true)), ("b", Some(true)), ("c", Some(false))]);

        let gaps = GapDetector::new(store.clone()).detect_gaps(&run, &ownership_target(0.8)).unwrap();
        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.kind, GapKind::Coverage);
        assert_eq!(gap.current_coverage, 0.6667);
        assert_eq!(gap.severity, Severity::P1);
        assert_eq!(gap.evidence_refs, vec!["c".to_string()]);
        assert_eq!(gap.effort_hours, 0.25);
    }

    #[test]
    fn test_no_gap_at_target() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        seed(&store, &run, &[("a", Some(true)), ("b", Some(false))]);

        let gaps = GapDetector::new(store).detect_gaps(&run, &ownership_target(0.5)).unwrap();
        assert!(gaps.is_empty());
    }

    #[test]
    fn test_unknown_assets_get_their_own_gap() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        seed(&store, &run, &[("a", Some(true)), ("b", None), ("c", None), ("d", Some(true))]);

        let gaps = GapDetector::new(store).detect_gaps(&run, &ownership_target(0.9)).unwrap();
        let unknown = gaps.iter().find(|g| g.kind == GapKind::CoverageUnknown).unwrap();
        assert_eq!(unknown.evidence_refs, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(unknown.current_coverage, 0.5);

        let coverage = gaps.iter().find(|g| g.kind == GapKind::Coverage).unwrap();
        // Unknown assets count as missing for remediation effort
        assert_eq!(coverage.evidence_refs.len(), 2);
        assert_eq!(coverage.severity, Severity::P1);
    }

    #[test]
    fn test_rerun_replaces_gaps() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        seed(&store, &run, &[("a", Some(false))]);
        let detector = GapDetector::new(store.clone());

        let first = detector.detect_gaps(&run, &ownership_target(1.0)).unwrap();
        let second = detector.detect_gaps(&run, &ownership_target(1.0)).unwrap();
        let strip = |gaps: &[Gap]| gaps.iter().map(|g| { let mut g = g.clone(); g.id.clear(); g }).collect::<Vec<_>>();
        assert_eq!(strip(&first), strip(&second));
        assert_eq!(store.count::<Gap>(&Filter::run(&run.id)).unwrap(), 1);
    }

    #[test]
    fn test_rejects_unknown_target_field() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let targets: Targets = [("owner".to_string(), 0.5)].into_iter().collect();
        assert!(matches!(GapDetector::new(store).detect_gaps(&run, &targets), Err(AuditError::Validation(_))));
    }

    #[test]
    fn test_readme_gap_only_when_targeted() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        seed(&store, &run, &[("a", Some(true)), ("b", Some(true)), ("c", Some(true)), ("d", Some(true))]);
        let semantics: Vec<EvidenceSignal> = [("a", true), ("b", false), ("c", false), ("d", false)]
            .into_iter()
            .map(|(guid, has_readme)| {
                let value = SignalValue::Semantics { present: true, has_user_description: false, term_count: 1, has_readme };
                EvidenceSignal::new(&run.id, guid, value, "catalog").unwrap()
            })
            .collect();
        store.create_many(&run.id, semantics).unwrap();
        let detector = GapDetector::new(store);

        let defaults = detector.detect_gaps(&run, &default_targets()).unwrap();
        assert!(defaults.iter().all(|g| g.field != "readme"));

        let targets: Targets = [("readme".to_string(), 0.5)].into_iter().collect();
        let gaps = detector.detect_gaps(&run, &targets).unwrap();
        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.field, "readme");
        assert_eq!(gap.kind, GapKind::Coverage);
        assert_eq!(gap.current_coverage, 0.25);
        assert_eq!(gap.severity, Severity::P2);
        assert_eq!(gap.evidence_refs, vec!["b".to_string(), "c".to_string(), "d".to_string()]);
        assert_eq!(gap.effort_hours, 3.0);
    }

    #[test]
    fn test_unselected_capability_skipped() {
        let store = RunStore::in_memory().unwrap();
        let mut new = new_run();
        new.capabilities = [SignalType::Trust].into_iter().collect();
        let run = store.create_run(new).unwrap();
        seed(&store, &run, &[("a", None)]);

        let gaps = GapDetector::new(store).detect_gaps(&run, &default_targets()).unwrap();
        assert!(gaps.iter().all(|g| g.field == "certification"));
    }
}
