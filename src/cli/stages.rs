use std::path::Path;
use crate::cli::commands::{GapsArgs, RenderArgs, RunIdArgs};
use crate::cli::context::CliContext;
use crate::errors::AuditError;
use crate::gaps::Targets;
use crate::models::ArtifactType;
use tracing::info;

/// Apply `FIELD=FRACTION` overrides on top of the configured targets.
pub(crate) fn apply_target_overrides(base: &Targets, overrides: &[String]) -> Result<Targets, AuditError> {
    let mut targets = base.clone();
    for raw in overrides {
        let (field, value) = raw
            .split_once('=')
            .ok_or_else(|| AuditError::Validation(format!("target '{}' must look like FIELD=FRACTION", raw)))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| AuditError::Validation(format!("target '{}' has a non-numeric fraction", raw)))?;
        targets.insert(field.trim().to_ascii_lowercase(), value);
    }
    Ok(targets)
}

pub async fn handle_gaps(ctx: &CliContext, args: GapsArgs) -> Result<(), AuditError> {
    let targets = apply_target_overrides(&ctx.config.targets, &args.targets)?;
    let gaps = ctx.orchestrator().detect_gaps(&args.run_id, Some(&targets)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&gaps)?);
        return Ok(());
    }
    if gaps.is_empty() {
        println!("No gaps: every targeted field meets its target.");
        return Ok(());
    }
    println!(
        "{:<4}  {:<16}  {:<17}  {:>8}  {:>8}  {:>9}  {:>6}",
        "SEV", "FIELD", "KIND", "CURRENT", "TARGET", "EFFORT(h)", "ASSETS"
    );
    for gap in &gaps {
        println!(
            "{:<4}  {:<16}  {:<17}  {:>7.1}%  {:>7.1}%  {:>9.1}  {:>6}",
            gap.severity.as_str(),
            gap.field,
            gap.kind.as_str(),
            gap.current_coverage * 100.0,
            gap.target_coverage * 100.0,
            gap.effort_hours,
            gap.evidence_refs.len()
        );
    }
    Ok(())
}

pub async fn handle_plan(ctx: &CliContext, args: RunIdArgs) -> Result<(), AuditError> {
    let plan = ctx.orchestrator().generate_plan(&args.run_id).await?;
    println!("Remediation plan: {} week(s), {} phase(s)\n", plan.total_weeks, plan.phases.len());
    for phase in &plan.phases {
        println!("{} ({} week(s))", phase.name, phase.estimated_weeks);
        println!("  {}", phase.description);
        println!("  Fields:    {}", phase.fields.join(", "));
        println!("  Milestone: {}", phase.milestone);
    }
    Ok(())
}

pub async fn handle_render(ctx: &CliContext, args: RenderArgs) -> Result<(), AuditError> {
    let artifact_type = ArtifactType::parse(&args.format)
        .ok_or_else(|| AuditError::Validation(format!("unknown format '{}' (csv, json, markdown)", args.format)))?;
    let artifact = ctx.orchestrator().render(&args.run_id, artifact_type).await?;

    match &args.output {
        Some(output) => {
            let path = Path::new(output);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, &artifact.content_text).await?;
            info!(path = %path.display(), sha256 = %artifact.content_sha256, "Wrote artifact");
            println!("{} ({} bytes, sha256 {})", path.display(), artifact.content_text.len(), artifact.content_sha256);
        }
        None => print!("{}", artifact.content_text),
    }
    Ok(())
}
