use crate::errors::AuditError;
use super::data::{subject_label, ReportData};

pub const CSV_HEADER: [&str; 12] = [
    "severity",
    "field",
    "kind",
    "subject_type",
    "subject",
    "current_coverage",
    "target_coverage",
    "gap",
    "effort_hours",
    "asset_count",
    "evidence_refs",
    "explanation",
];

/// One row per gap, fixed column order.
pub fn render_csv(data: &ReportData<'_>) -> Result<String, AuditError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for gap in &data.gaps {
        writer.write_record([
            gap.severity.as_str().to_string(),
            gap.field.clone(),
            gap.kind.as_str().to_string(),
            gap.subject_type.as_str().to_string(),
            subject_label(gap).to_string(),
            format!("{:.4}", gap.current_coverage),
            format!("{:.4}", gap.target_coverage),
            format!("{:.4}", gap.gap_percent()),
            format!("{:.2}", gap.effort_hours),
            gap.evidence_refs.len().to_string(),
            gap.evidence_refs.join(";"),
            gap.explanation.clone(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| AuditError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| AuditError::Internal(format!("CSV output is not UTF-8: {}", e)))
}
