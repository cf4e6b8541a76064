use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::gaps::fields::workstream_for;
use crate::gaps::Workstream;
use crate::models::{Gap, GapKind, Plan, PlanPhase, Run, Severity};
use tracing::info;

/// Team capacity used to turn effort hours into weeks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    #[serde(default = "default_team_size")]
    pub team_size: u32,
    #[serde(default = "default_hours_per_person_week")]
    pub hours_per_person_week: f64,
}

fn default_team_size() -> u32 {
    1
}

fn default_hours_per_person_week() -> f64 {
    40.0
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            team_size: default_team_size(),
            hours_per_person_week: default_hours_per_person_week(),
        }
    }
}

impl PlanSettings {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.team_size == 0 {
            return Err(AuditError::Validation("plan team_size must be at least 1".into()));
        }
        if !self.hours_per_person_week.is_finite() || self.hours_per_person_week <= 0.0 {
            return Err(AuditError::Validation("plan hours_per_person_week must be positive".into()));
        }
        Ok(())
    }

    /// Whole weeks needed for `effort_hours`, never less than one.
    pub fn weeks_for(&self, effort_hours: f64) -> u32 {
        let capacity = self.hours_per_person_week * self.team_size as f64;
        ((effort_hours / capacity).ceil() as u32).max(1)
    }
}

struct PhaseDraft<'a> {
    workstream: Workstream,
    top_severity: Severity,
    effort_hours: f64,
    gaps: Vec<&'a Gap>,
}

/// Build phases from gaps: one per workstream, most severe first.
pub fn build_phases(gaps: &[Gap], settings: &PlanSettings) -> Vec<PlanPhase> {
    let mut drafts: BTreeMap<Workstream, PhaseDraft<'_>> = BTreeMap::new();
    for gap in gaps {
        let workstream = workstream_for(&gap.field, gap.kind == GapKind::CoverageUnknown);
        let draft = drafts.entry(workstream).or_insert_with(|| PhaseDraft {
            workstream,
            top_severity: gap.severity,
            effort_hours: 0.0,
            gaps: Vec::new(),
        });
        draft.top_severity = draft.top_severity.min(gap.severity);
        draft.effort_hours += gap.effort_hours;
        draft.gaps.push(gap);
    }

    let mut ordered: Vec<PhaseDraft<'_>> = drafts.into_values().collect();
    ordered.sort_by_key(|d| (d.top_severity, d.workstream));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, draft)| {
            let mut fields: Vec<String> = draft.gaps.iter().map(|g| g.field.clone()).collect();
            fields.sort();
            fields.dedup();
            let counts: BTreeMap<Severity, usize> = draft.gaps.iter().fold(BTreeMap::new(), |mut acc, g| {
                *acc.entry(g.severity).or_default() += 1;
                acc
            });
            let summary: Vec<String> = counts.iter().map(|(s, n)| format!("{} {}", n, s)).collect();
            PlanPhase {
                name: format!("Phase {}: {}", i + 1, draft.workstream.title()),
                description: format!(
                    "Close {} gap(s) ({}) across {}, about {:.1} hours of work.",
                    draft.gaps.len(),
                    summary.join(", "),
                    fields.join(", "),
                    draft.effort_hours
                ),
                fields,
                estimated_weeks: settings.weeks_for(draft.effort_hours),
                milestone: draft.workstream.milestone().to_string(),
            }
        })
        .collect()
}

pub struct PlanSynthesizer {
    store: RunStore,
}

impl PlanSynthesizer {
    pub fn new(store: RunStore) -> Self {
        Self { store }
    }

    /// Build and store the run's plan, replacing any previous one.
    pub fn generate_plan(&self, run: &Run, settings: &PlanSettings) -> Result<Plan, AuditError> {
        settings.validate()?;
        let filter = Filter::run(&run.id);
        let gaps: Vec<Gap> = self.store.find_many(&filter)?;
        if gaps.is_empty() {
            return Err(AuditError::InvalidState(format!(
                "run {} has no gaps; run gap detection first or nothing needs remediation",
                run.id
            )));
        }

        let plan = Plan::new(&run.id, build_phases(&gaps, settings));
        let mut stored = self.store.replace_for_run(&run.id, vec![plan])?;
        let plan = stored
            .pop()
            .ok_or_else(|| AuditError::Internal("plan insert returned no row".into()))?;
        info!(run_id = %run.id, phases = plan.phases.len(), total_weeks = plan.total_weeks, "Plan generated");
        Ok(plan)
    }
}
