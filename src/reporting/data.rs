use std::collections::BTreeMap;
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::models::{Gap, Plan, Quadrant, Run, Score, SubjectType};

/// Everything a renderer reads, loaded once and sorted by stable keys.
pub struct ReportData<'a> {
    pub run: &'a Run,
    pub gaps: Vec<Gap>,
    pub scores: Vec<Score>,
    pub plan: Option<Plan>,
}

impl<'a> ReportData<'a> {
    pub fn load(store: &RunStore, run: &'a Run) -> Result<Self, AuditError> {
        let filter = Filter::run(&run.id);
        let mut gaps: Vec<Gap> = store.find_many(&filter)?;
        gaps.sort_by(|a, b| {
            (a.severity, &a.field, a.kind, &a.subject_id).cmp(&(b.severity, &b.field, b.kind, &b.subject_id))
        });
        let mut scores: Vec<Score> = store.find_many(&filter)?;
        scores.sort_by(|a, b| (a.subject_type, &a.subject_id).cmp(&(b.subject_type, &b.subject_id)));
        let plan = store.find_many::<Plan>(&filter)?.into_iter().next();
        Ok(Self { run, gaps, scores, plan })
    }

    /// Asset-level quadrant counts by display label. Both unknown-quality
    /// codes land in one bucket.
    pub fn quadrant_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> = Quadrant::ALL
            .iter()
            .map(|q| (q.display_label(), 0))
            .collect();
        for score in self.scores.iter().filter(|s| s.subject_type == SubjectType::Asset) {
            *counts.entry(score.quadrant.display_label()).or_default() += 1;
        }
        counts
    }
}

/// Subject shown in exports. Whole-run gaps print as `RUN` so no generated
/// identifier reaches the content.
pub fn subject_label(gap: &Gap) -> &str {
    match gap.subject_type {
        SubjectType::Run => "RUN",
        _ => &gap.subject_id,
    }
}

pub fn capability_list(run: &Run) -> Vec<&'static str> {
    run.capabilities.iter().map(|c| c.as_str()).collect()
}
