use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use crate::catalog::{CatalogApi, FixtureCatalog, HttpCatalog, LineageApi};
use crate::cli::commands::RunArgs;
use crate::cli::context::CliContext;
use crate::config::AuditConfig;
use crate::errors::AuditError;
use crate::models::{Methodology, NewRun, Run, RunScope, RunStatus, SignalType};
use crate::pipeline::RunOrchestrator;
use tracing::{info, warn};

type CatalogPair = (Arc<dyn CatalogApi>, Arc<dyn LineageApi>);

fn build_catalog(args: &RunArgs, config: &AuditConfig) -> Result<CatalogPair, AuditError> {
    if let Some(fixture) = &args.fixture {
        let catalog = Arc::new(FixtureCatalog::from_file(Path::new(fixture))?);
        info!(fixture = %fixture, "Using fixture catalog");
        return Ok((catalog.clone(), catalog));
    }
    let base_url = args
        .catalog_url
        .as_deref()
        .or(config.catalog.base_url.as_deref())
        .ok_or_else(|| AuditError::Config("no catalog: pass --catalog-url or --fixture, or set catalog.base_url".into()))?;
    let token = config.catalog.token();
    if token.is_none() {
        warn!(env = %config.catalog.token_env, "No catalog token in environment, sending unauthenticated requests");
    }
    let catalog = Arc::new(HttpCatalog::new(base_url, token, Duration::from_secs(config.catalog.timeout_secs))?);
    Ok((catalog.clone(), catalog))
}

pub(crate) fn parse_capabilities(raw: Option<&str>) -> Result<BTreeSet<SignalType>, AuditError> {
    let Some(raw) = raw else {
        return Ok(SignalType::ALL.into_iter().collect());
    };
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            SignalType::parse(s).ok_or_else(|| AuditError::Validation(format!("unknown capability '{}'", s.trim())))
        })
        .collect()
}

fn new_run(args: &RunArgs, config: &AuditConfig) -> Result<NewRun, AuditError> {
    let mut scoring = config.scoring;
    if let Some(m) = &args.methodology {
        scoring.methodology = Methodology::parse(m)
            .ok_or_else(|| AuditError::Validation(format!("unknown methodology '{}'", m)))?;
    }
    let scope = RunScope {
        database: args.database.clone(),
        schema: args.schema.clone(),
        connector: args.connector.clone(),
        domain: args.domain.clone(),
        asset_limit: args.limit.unwrap_or(RunScope::default().asset_limit),
    };
    Ok(NewRun {
        scope,
        capabilities: parse_capabilities(args.capabilities.as_deref())?,
        scoring,
        ingestion: config.ingestion,
    })
}

/// Drive the run to COMPLETED from whatever stage it is in.
async fn drive(orchestrator: &RunOrchestrator, run: &Run) -> Result<(), AuditError> {
    match run.status {
        RunStatus::Created | RunStatus::Ingesting => {
            orchestrator.execute(&run.id).await?;
        }
        RunStatus::Scoring | RunStatus::Completed => {
            orchestrator.score(&run.id).await?;
        }
        RunStatus::Failed => {
            return Err(AuditError::InvalidState(format!(
                "run {} failed: {}",
                run.id,
                run.error.as_deref().unwrap_or("unknown error")
            )));
        }
    }
    Ok(())
}

/// Signal the run's ingestion to stop. Returns whether one was in flight.
fn request_cancel(orchestrator: &RunOrchestrator, run_id: &str) -> bool {
    match orchestrator.cancel(run_id) {
        Ok(cancelled) => cancelled,
        Err(e) => {
            warn!(run_id = %run_id, error = %e, "Failed to cancel run");
            false
        }
    }
}

pub async fn handle_run(ctx: &CliContext, args: RunArgs) -> Result<(), AuditError> {
    let (catalog, lineage) = build_catalog(&args, &ctx.config)?;
    let orchestrator = Arc::new(ctx.orchestrator().with_catalog(catalog, lineage));

    let run = match &args.resume {
        Some(run_id) => {
            let run = ctx.store.require_run(run_id)?;
            info!(run_id = %run.id, status = %run.status, "Resuming run");
            run
        }
        None => orchestrator.create_run(new_run(&args, &ctx.config)?)?,
    };

    // Ctrl-C cancels ingestion cooperatively so the run stays resumable
    let watcher = {
        let orchestrator = orchestrator.clone();
        let run_id = run.id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(run_id = %run_id, "Interrupt received, cancelling");
                request_cancel(&orchestrator, &run_id);
            }
        })
    };
    let result = drive(&orchestrator, &run).await;
    watcher.abort();

    let run = ctx.store.require_run(&run.id)?;
    print_summary(ctx, &run, args.json)?;
    result
}

fn print_summary(ctx: &CliContext, run: &Run, as_json: bool) -> Result<(), AuditError> {
    let counts = super::runs::run_counts(&ctx.store, &run.id)?;
    if as_json {
        let doc = json!({
            "run_id": run.id,
            "status": run.status,
            "error": run.error,
            "scope": run.scope.label(),
            "counts": counts,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    println!("Run:     {}", run.id);
    println!("Status:  {}", run.status);
    println!("Scope:   {}", run.scope.label());
    for (name, count) in &counts {
        println!("{:<8} {}", format!("{}:", name), count);
    }
    if let Some(error) = &run.error {
        println!("Error:   {}", error);
    }
    if run.status == RunStatus::Ingesting {
        println!("Resume with: covaudit run --resume {}", run.id);
    }
    Ok(())
}
