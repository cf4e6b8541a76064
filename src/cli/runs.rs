use std::collections::BTreeMap;
use serde_json::json;
use crate::cli::commands::{ListArgs, RunIdArgs, StatusArgs};
use crate::cli::context::CliContext;
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::models::{Artifact, AssetRecord, EvidenceSignal, Gap, Plan, Score};

/// Row counts per stored entity for one run.
pub(crate) fn run_counts(store: &RunStore, run_id: &str) -> Result<BTreeMap<&'static str, usize>, AuditError> {
    let filter = Filter::run(run_id);
    Ok(BTreeMap::from([
        ("assets", store.count::<AssetRecord>(&filter)?),
        ("evidence", store.count::<EvidenceSignal>(&filter)?),
        ("scores", store.count::<Score>(&filter)?),
        ("gaps", store.count::<Gap>(&filter)?),
        ("plans", store.count::<Plan>(&filter)?),
        ("artifacts", store.count::<Artifact>(&filter)?),
    ]))
}

pub async fn handle_status(ctx: &CliContext, args: StatusArgs) -> Result<(), AuditError> {
    let run = ctx.store.require_run(&args.run_id)?;
    let counts = run_counts(&ctx.store, &run.id)?;

    if args.json {
        let doc = json!({ "run": run, "counts": counts });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Run:          {}", run.id);
    println!("Status:       {}", run.status);
    println!("Scope:        {}", run.scope.label());
    println!("Methodology:  {}", run.scoring.methodology);
    println!(
        "Capabilities: {}",
        run.capabilities.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("Created:      {}", run.created_at.to_rfc3339());
    println!("Updated:      {}", run.updated_at.to_rfc3339());
    if let Some(error) = &run.error {
        println!("Error:        {}", error);
    }
    for (name, count) in counts {
        println!("  {:<10} {}", name, count);
    }
    Ok(())
}

pub async fn handle_list(ctx: &CliContext, args: ListArgs) -> Result<(), AuditError> {
    let runs = ctx.store.list_runs(args.limit, args.offset)?;
    if runs.is_empty() {
        println!("No runs.");
        return Ok(());
    }
    println!("{:<36}  {:<10}  {:<20}  SCOPE", "ID", "STATUS", "CREATED");
    for run in runs {
        println!(
            "{:<36}  {:<10}  {:<20}  {}",
            run.id,
            run.status.as_str(),
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.scope.label()
        );
    }
    Ok(())
}

pub async fn handle_delete(ctx: &CliContext, args: RunIdArgs) -> Result<(), AuditError> {
    if ctx.orchestrator().delete_run(&args.run_id).await? {
        println!("Deleted run {}", args.run_id);
        Ok(())
    } else {
        Err(AuditError::NotFound(format!("run {}", args.run_id)))
    }
}
