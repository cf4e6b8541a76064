use std::fmt::Write as _;
use crate::models::{Gap, Plan, Severity};
use super::data::{subject_label, ReportData};

fn format_gap_row(gap: &Gap) -> String {
    format!(
        "| {} | {} | {} | {:.1}% | {:.1}% | {:.1} | {} |\n",
        gap.field,
        gap.kind.as_str(),
        subject_label(gap),
        gap.current_coverage * 100.0,
        gap.target_coverage * 100.0,
        gap.effort_hours,
        gap.evidence_refs.len(),
    )
}

fn format_quadrant_summary(data: &ReportData<'_>) -> String {
    let mut out = String::from("## Quadrant Summary\n\n| Quadrant | Assets |\n|---|---|\n");
    let counts = data.quadrant_counts();
    let total: usize = counts.values().sum();
    for (label, count) in counts {
        let _ = writeln!(out, "| {} | {} |", label, count);
    }
    let _ = writeln!(out, "| **Total** | **{}** |", total);
    out
}

fn format_gaps(gaps: &[Gap]) -> String {
    let mut out = String::from("## Gaps by Priority\n\n");
    if gaps.is_empty() {
        out.push_str("No gaps against the configured targets.\n");
        return out;
    }
    for severity in Severity::ALL {
        let group: Vec<&Gap> = gaps.iter().filter(|g| g.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {} ({})\n", severity, severity.label());
        out.push_str("| Field | Kind | Subject | Current | Target | Effort (h) | Assets |\n|---|---|---|---|---|---|---|\n");
        for gap in group {
            out.push_str(&format_gap_row(gap));
        }
        out.push('\n');
    }
    out
}

fn format_plan(plan: Option<&Plan>) -> String {
    let mut out = String::from("## Remediation Plan\n\n");
    let Some(plan) = plan else {
        out.push_str("No plan has been generated for this run.\n");
        return out;
    };
    let _ = writeln!(
        out,
        "The plan runs for {} week(s) in {} sequential phase(s).\n",
        plan.total_weeks,
        plan.phases.len()
    );
    let mut start = 1;
    for phase in &plan.phases {
        let end = start + phase.estimated_weeks - 1;
        let _ = writeln!(out, "### {}\n", phase.name);
        let _ = writeln!(
            out,
            "Weeks {} to {} ({} week(s)). {}\n",
            start, end, phase.estimated_weeks, phase.description
        );
        let _ = writeln!(out, "- Fields: {}", phase.fields.join(", "));
        let _ = writeln!(out, "- Milestone: {}\n", phase.milestone);
        start = end + 1;
    }
    out
}

pub fn render_markdown(data: &ReportData<'_>) -> String {
    let run = data.run;
    let mut out = String::from("# Metadata Coverage Audit\n\n");
    let _ = writeln!(out, "- Scope: {}", run.scope.label());
    let _ = writeln!(out, "- Methodology: {}", run.scoring.methodology);
    let _ = writeln!(
        out,
        "- Thresholds: impact {:.2}, quality {:.2}\n",
        run.scoring.impact_threshold, run.scoring.quality_threshold
    );
    out.push_str(&format_quadrant_summary(data));
    out.push('\n');
    out.push_str(&format_gaps(&data.gaps));
    out.push_str(&format_plan(data.plan.as_ref()));
    out
}
