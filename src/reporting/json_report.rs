use serde_json::{json, Value};
use crate::errors::AuditError;
use super::data::{capability_list, subject_label, ReportData};

pub const JSON_SCHEMA_VERSION: &str = "covaudit/v1";

pub fn render_json(data: &ReportData<'_>) -> Result<String, AuditError> {
    let run = data.run;

    let gaps: Vec<Value> = data
        .gaps
        .iter()
        .map(|g| {
            json!({
                "severity": g.severity.as_str(),
                "priority": g.severity.label(),
                "field": g.field,
                "kind": g.kind.as_str(),
                "subject_type": g.subject_type.as_str(),
                "subject": subject_label(g),
                "current_coverage": g.current_coverage,
                "target_coverage": g.target_coverage,
                "effort_hours": g.effort_hours,
                "evidence_refs": g.evidence_refs,
                "explanation": g.explanation,
            })
        })
        .collect();

    let scores: Vec<Value> = data
        .scores
        .iter()
        .map(|s| {
            json!({
                "subject_type": s.subject_type.as_str(),
                "subject": s.subject_id,
                "impact_score": s.impact_score,
                "quality_score": s.quality_score,
                "quality_unknown": s.quality_unknown,
                "quadrant": s.quadrant.code(),
                "quadrant_label": s.quadrant.display_label(),
            })
        })
        .collect();

    let plan = data.plan.as_ref().map(|p| {
        json!({
            "total_weeks": p.total_weeks,
            "phases": p.phases,
        })
    });

    let doc = json!({
        "schema_version": JSON_SCHEMA_VERSION,
        "run": {
            "scope": run.scope,
            "capabilities": capability_list(run),
            "methodology": run.scoring.methodology.as_str(),
            "impact_threshold": run.scoring.impact_threshold,
            "quality_threshold": run.scoring.quality_threshold,
        },
        "gaps": gaps,
        "score_summary": {
            "quadrant_counts": data.quadrant_counts(),
            "scores": scores,
        },
        "plan": plan,
    });

    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}
