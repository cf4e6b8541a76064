use std::sync::Arc;
use crate::catalog::{CatalogApi, LineageApi};
use crate::db::{Filter, RunStore};
use crate::errors::AuditError;
use crate::gaps::{default_targets, validate_targets, GapDetector, Targets};
use crate::ingest::{IngestionCoordinator, IngestionReport};
use crate::models::{Artifact, ArtifactType, AssetRecord, Gap, NewRun, Plan, Run, RunStatus};
use crate::planning::{PlanSettings, PlanSynthesizer};
use crate::reporting::ArtifactRenderer;
use crate::scoring::{ScoringEngine, ScoringReport};
use super::state::RunRegistry;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Let gap, plan and render stages read a FAILED run that still holds assets.
    pub allow_failed_runs: bool,
    pub targets: Targets,
    pub plan: PlanSettings,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            allow_failed_runs: false,
            targets: default_targets(),
            plan: PlanSettings::default(),
        }
    }
}

/// Counts from `execute`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub ingestion: IngestionReport,
    pub scoring: ScoringReport,
}

/// Sequences the stages of a run and owns its status transitions.
pub struct RunOrchestrator {
    store: RunStore,
    ingestion: Option<IngestionCoordinator>,
    scoring: ScoringEngine,
    gaps: GapDetector,
    planner: PlanSynthesizer,
    renderer: ArtifactRenderer,
    registry: Arc<RunRegistry>,
    options: OrchestratorOptions,
}

impl RunOrchestrator {
    pub fn new(store: RunStore, options: OrchestratorOptions) -> Self {
        Self {
            ingestion: None,
            scoring: ScoringEngine::new(store.clone()),
            gaps: GapDetector::new(store.clone()),
            planner: PlanSynthesizer::new(store.clone()),
            renderer: ArtifactRenderer::new(store.clone()),
            registry: Arc::new(RunRegistry::new()),
            store,
            options,
        }
    }

    /// Attach the catalog used by `ingest`. Runs that only need the stored
    /// evidence can skip this.
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogApi>, lineage: Arc<dyn LineageApi>) -> Self {
        self.ingestion = Some(IngestionCoordinator::new(self.store.clone(), catalog, lineage));
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn create_run(&self, new_run: NewRun) -> Result<Run, AuditError> {
        let run = self.store.create_run(new_run)?;
        info!(
            run_id = %run.id,
            scope = %run.scope.label(),
            methodology = %run.scoring.methodology,
            capabilities = run.capabilities.len(),
            "Run created"
        );
        Ok(run)
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<Run>, AuditError> {
        self.store.get_run(run_id)
    }

    pub fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<Run>, AuditError> {
        self.store.list_runs(limit, offset)
    }

    /// Ingest the run from the attached catalog. On success the run is left
    /// in SCORING. A second ingest of the same run while one is in flight is
    /// rejected with `Conflict`.
    pub async fn ingest(&self, run_id: &str) -> Result<IngestionReport, AuditError> {
        let coordinator = self
            .ingestion
            .as_ref()
            .ok_or_else(|| AuditError::Config("no catalog configured for ingestion".into()))?;

        let lock = self.registry.lock_for(run_id);
        let _guard = lock
            .try_lock_owned()
            .map_err(|_| AuditError::Conflict(format!("run {} is already being ingested", run_id)))?;

        let run = self.store.require_run(run_id)?;
        match run.status {
            RunStatus::Created => {}
            RunStatus::Ingesting => {
                warn!(run_id = %run.id, "Restarting interrupted ingestion");
            }
            other => {
                return Err(AuditError::InvalidState(format!(
                    "run {} is {}; ingest requires CREATED or INGESTING",
                    run.id, other
                )));
            }
        }

        self.transition(&run.id, RunStatus::Ingesting)?;
        let cancel = self.registry.begin_ingest(&run.id);
        let result = coordinator.ingest(&run, &cancel).await;
        self.registry.end_ingest(&run.id);

        match result {
            Ok(report) => {
                self.transition(&run.id, RunStatus::Scoring)?;
                Ok(report)
            }
            Err(e) => Err(self.fail_stage(&run.id, "ingest", e)),
        }
    }

    /// Score a run whose ingestion finished. Rescoring a COMPLETED run
    /// replaces its scores.
    pub async fn score(&self, run_id: &str) -> Result<ScoringReport, AuditError> {
        let lock = self.registry.lock_for(run_id);
        let _guard = lock.lock().await;

        let run = self.store.require_run(run_id)?;
        if !matches!(run.status, RunStatus::Scoring | RunStatus::Completed) {
            return Err(AuditError::InvalidState(format!(
                "run {} is {}; score requires SCORING or COMPLETED",
                run.id, run.status
            )));
        }

        match self.scoring.score(&run) {
            Ok(report) => {
                self.transition(&run.id, RunStatus::Completed)?;
                Ok(report)
            }
            Err(e) => Err(self.fail_stage(&run.id, "score", e)),
        }
    }

    /// Ingest then score.
    pub async fn execute(&self, run_id: &str) -> Result<ExecutionReport, AuditError> {
        let ingestion = self.ingest(run_id).await?;
        let scoring = self.score(run_id).await?;
        Ok(ExecutionReport { ingestion, scoring })
    }

    /// Detect gaps against `targets`, or the configured targets when `None`.
    pub async fn detect_gaps(&self, run_id: &str, targets: Option<&Targets>) -> Result<Vec<Gap>, AuditError> {
        let targets = targets.unwrap_or(&self.options.targets);
        validate_targets(targets)?;

        let lock = self.registry.lock_for(run_id);
        let _guard = lock.lock().await;
        let run = self.readable_run(run_id, "detect_gaps")?;
        self.gaps
            .detect_gaps(&run, targets)
            .map_err(|e| stage_error(&run.id, "detect_gaps", e))
    }

    pub async fn generate_plan(&self, run_id: &str) -> Result<Plan, AuditError> {
        self.options.plan.validate()?;

        let lock = self.registry.lock_for(run_id);
        let _guard = lock.lock().await;
        let run = self.readable_run(run_id, "generate_plan")?;
        self.planner
            .generate_plan(&run, &self.options.plan)
            .map_err(|e| stage_error(&run.id, "generate_plan", e))
    }

    pub async fn render(&self, run_id: &str, artifact_type: ArtifactType) -> Result<Artifact, AuditError> {
        let lock = self.registry.lock_for(run_id);
        let _guard = lock.lock().await;
        let run = self.readable_run(run_id, "render")?;
        self.renderer
            .render(&run, artifact_type)
            .map_err(|e| stage_error(&run.id, "render", e))
    }

    /// Stop the run's in-flight ingestion. Returns false when none was running.
    pub fn cancel(&self, run_id: &str) -> Result<bool, AuditError> {
        self.store.require_run(run_id)?;
        let cancelled = self.registry.cancel(run_id);
        if cancelled {
            info!(run_id = %run_id, "Cancellation requested");
        }
        Ok(cancelled)
    }

    /// Delete the run and all its rows. A live ingestion is cancelled and
    /// drained first.
    pub async fn delete_run(&self, run_id: &str) -> Result<bool, AuditError> {
        if self.registry.cancel(run_id) {
            info!(run_id = %run_id, "Cancelling ingestion before delete");
        }
        let lock = self.registry.lock_for(run_id);
        let deleted = {
            let _guard = lock.lock().await;
            self.store.delete_run(run_id)?
        };
        self.registry.forget(run_id);
        if deleted {
            info!(run_id = %run_id, "Run deleted");
        }
        Ok(deleted)
    }

    /// Gap, plan and render stages read COMPLETED runs, plus FAILED runs
    /// holding assets when `allow_failed_runs` is set.
    fn readable_run(&self, run_id: &str, stage: &str) -> Result<Run, AuditError> {
        let run = self.store.require_run(run_id)?;
        match run.status {
            RunStatus::Completed => Ok(run),
            RunStatus::Failed if self.options.allow_failed_runs => {
                let assets = self.store.count::<AssetRecord>(&Filter::run(&run.id))?;
                if assets == 0 {
                    return Err(AuditError::InvalidState(format!(
                        "run {} failed before any asset was ingested",
                        run.id
                    )));
                }
                warn!(run_id = %run.id, stage, assets, "Reading a FAILED run");
                Ok(run)
            }
            other => Err(AuditError::InvalidState(format!(
                "run {} is {}; {} requires COMPLETED",
                run.id, other, stage
            ))),
        }
    }

    fn transition(&self, run_id: &str, status: RunStatus) -> Result<(), AuditError> {
        self.store.update_run_status(run_id, status, None)?;
        info!(run_id = %run_id, status = %status, "Run status changed");
        Ok(())
    }

    /// Record an ingest or score failure. Errors classified as fatal move the
    /// run to FAILED with the message stored; the original error is returned.
    fn fail_stage(&self, run_id: &str, stage: &str, e: AuditError) -> AuditError {
        let class = e.classify();
        if !class.fails_run {
            warn!(run_id = %run_id, stage, error_type = class.error_type, error = %e, "Stage stopped");
            return e;
        }
        error!(run_id = %run_id, stage, error_type = class.error_type, error = %e, "Stage failed");
        let message = e.to_string();
        if let Err(status_err) = self.store.update_run_status(run_id, RunStatus::Failed, Some(&message)) {
            error!(run_id = %run_id, error = %status_err, "Failed to record run failure");
        }
        e
    }
}

/// Log a gap, plan or render failure. These stages read a finished run and
/// never touch its status or stored error.
fn stage_error(run_id: &str, stage: &str, e: AuditError) -> AuditError {
    let class = e.classify();
    if class.fails_run {
        error!(run_id = %run_id, stage, error_type = class.error_type, error = %e, "Stage failed");
    } else {
        warn!(run_id = %run_id, stage, error_type = class.error_type, error = %e, "Stage stopped");
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogAsset, FixtureCatalog};
    use crate::db::runs::tests::new_run;
    use crate::models::{EvidenceSignal, Score};

    fn asset(guid: &str, owned: bool) -> CatalogAsset {
        CatalogAsset {
            guid: guid.into(),
            type_name: "Table".into(),
            name: guid.to_uppercase(),
            qualified_name: format!("default/snowflake/ANALYTICS/PUBLIC/{}", guid),
            database_name: Some("ANALYTICS".into()),
            owner_users: Some(if owned { vec!["jdoe".into()] } else { vec![] }),
            owner_groups: Some(vec![]),
            description: Some(if owned { "orders".into() } else { String::new() }),
            ..Default::default()
        }
    }

    fn orchestrator_with(fixture: FixtureCatalog, options: OrchestratorOptions) -> (RunStore, RunOrchestrator) {
        let store = RunStore::in_memory().unwrap();
        let fixture = Arc::new(fixture);
        let orch = RunOrchestrator::new(store.clone(), options).with_catalog(fixture.clone(), fixture);
        (store, orch)
    }

    fn orchestrator() -> (RunStore, RunOrchestrator) {
        let fixture = FixtureCatalog::new(vec![asset("a", true), asset("b", false), asset("c", true)]);
        orchestrator_with(fixture, OrchestratorOptions::default())
    }

    fn fast_run() -> NewRun {
        let mut new_run = new_run();
        new_run.ingestion.retry_base_delay_ms = 0;
        new_run
    }

    #[tokio::test]
    async fn test_execute_moves_run_to_completed() {
        let (store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        assert_eq!(run.status, RunStatus::Created);

        let report = orch.execute(&run.id).await.unwrap();
        assert_eq!(report.ingestion.assets, 3);
        assert_eq!(report.scoring.assets_scored, 3);

        let run = orch.get_run(&run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error.is_none());
        assert!(store.count::<Score>(&Filter::run(&run.id)).unwrap() >= 3);
    }

    #[tokio::test]
    async fn test_stages_require_completed_run() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();

        assert!(matches!(orch.score(&run.id).await, Err(AuditError::InvalidState(_))));
        assert!(matches!(orch.detect_gaps(&run.id, None).await, Err(AuditError::InvalidState(_))));
        assert!(matches!(orch.generate_plan(&run.id).await, Err(AuditError::InvalidState(_))));
        assert!(matches!(orch.render(&run.id, ArtifactType::Json).await, Err(AuditError::InvalidState(_))));
        // Rejections leave the status untouched
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Created);
    }

    #[tokio::test]
    async fn test_full_stage_sequence() {
        let (store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.execute(&run.id).await.unwrap();

        let gaps = orch.detect_gaps(&run.id, None).await.unwrap();
        assert!(!gaps.is_empty());
        let plan = orch.generate_plan(&run.id).await.unwrap();
        assert!(plan.total_weeks >= 1);
        let artifact = orch.render(&run.id, ArtifactType::Markdown).await.unwrap();
        assert!(artifact.content_text.contains("## Remediation Plan"));

        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Completed);
        assert_eq!(store.count::<Gap>(&Filter::run(&run.id)).unwrap(), gaps.len());
    }

    #[tokio::test]
    async fn test_ingest_rejected_after_scoring() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.ingest(&run.id).await.unwrap();
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Scoring);
        assert!(matches!(orch.ingest(&run.id).await, Err(AuditError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_ingest_conflicts() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        let _held = orch.registry.lock_for(&run.id).try_lock_owned().unwrap();
        assert!(matches!(orch.ingest(&run.id).await, Err(AuditError::Conflict(_))));
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Created);
    }

    #[tokio::test]
    async fn test_ingest_on_interrupted_run_restarts() {
        let (store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        store.update_run_status(&run.id, RunStatus::Ingesting, None).unwrap();

        let report = orch.ingest(&run.id).await.unwrap();
        assert_eq!(report.assets, 3);
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_partial_ingestion_fails_run_and_keeps_pages() {
        let fixture = FixtureCatalog::new((0..6).map(|i| asset(&format!("g{}", i), true)).collect())
            .fail_page(3, 10, false);
        let (store, orch) = orchestrator_with(fixture, OrchestratorOptions::default());
        let mut new_run = fast_run();
        new_run.ingestion.page_size = 3;
        let run = orch.create_run(new_run).unwrap();

        let err = orch.execute(&run.id).await.unwrap_err();
        assert!(matches!(err, AuditError::PartialIngestion { pages_completed: 1, .. }));

        let run = orch.get_run(&run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("Partial ingestion"));
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 3);
        assert!(store.count::<EvidenceSignal>(&Filter::run(&run.id)).unwrap() > 0);

        assert!(matches!(orch.detect_gaps(&run.id, None).await, Err(AuditError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_allow_failed_runs_reads_partial_data() {
        let fixture = FixtureCatalog::new((0..6).map(|i| asset(&format!("g{}", i), i % 2 == 0)).collect())
            .fail_page(3, 10, false);
        let options = OrchestratorOptions { allow_failed_runs: true, ..Default::default() };
        let (_store, orch) = orchestrator_with(fixture, options);
        let mut new_run = fast_run();
        new_run.ingestion.page_size = 3;
        let run = orch.create_run(new_run).unwrap();

        assert!(orch.execute(&run.id).await.is_err());
        let gaps = orch.detect_gaps(&run.id, None).await.unwrap();
        assert!(!gaps.is_empty());
        // Stages never change the status of a FAILED run
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_targets_rejected_before_stage() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.execute(&run.id).await.unwrap();

        let mut targets = default_targets();
        targets.insert("ownership".into(), 1.5);
        assert!(matches!(orch.detect_gaps(&run.id, Some(&targets)).await, Err(AuditError::Validation(_))));
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_plan_without_gaps_is_invalid_state() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.execute(&run.id).await.unwrap();
        let err = orch.generate_plan(&run.id).await.unwrap_err();
        assert!(matches!(err, AuditError::InvalidState(_)));
        assert_eq!(orch.get_run(&run.id).unwrap().unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_store_error_in_render_keeps_status() {
        let (store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.execute(&run.id).await.unwrap();
        store.lock().unwrap().execute_batch("DROP TABLE artifacts").unwrap();

        let err = orch.render(&run.id, ArtifactType::Json).await.unwrap_err();
        assert!(err.classify().fails_run);

        let run = orch.get_run(&run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn test_failed_run_error_survives_later_stage_failure() {
        let fixture = FixtureCatalog::new((0..6).map(|i| asset(&format!("g{}", i), i % 2 == 0)).collect())
            .fail_page(3, 10, false);
        let options = OrchestratorOptions { allow_failed_runs: true, ..Default::default() };
        let (store, orch) = orchestrator_with(fixture, options);
        let mut new_run = fast_run();
        new_run.ingestion.page_size = 3;
        let run = orch.create_run(new_run).unwrap();
        assert!(orch.execute(&run.id).await.is_err());
        let original = orch.get_run(&run.id).unwrap().unwrap().error;

        store.lock().unwrap().execute_batch("DROP TABLE gaps").unwrap();
        assert!(orch.detect_gaps(&run.id, None).await.is_err());

        let run = orch.get_run(&run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error, original);
    }

    #[tokio::test]
    async fn test_cancel_without_ingest() {
        let (_store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        assert!(!orch.cancel(&run.id).unwrap());
        assert!(matches!(orch.cancel("missing"), Err(AuditError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_run() {
        let (store, orch) = orchestrator();
        let run = orch.create_run(fast_run()).unwrap();
        orch.execute(&run.id).await.unwrap();

        assert!(orch.delete_run(&run.id).await.unwrap());
        assert!(orch.get_run(&run.id).unwrap().is_none());
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 0);
        assert!(!orch.delete_run(&run.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ingest_without_catalog() {
        let store = RunStore::in_memory().unwrap();
        let orch = RunOrchestrator::new(store, OrchestratorOptions::default());
        let run = orch.create_run(fast_run()).unwrap();
        assert!(matches!(orch.ingest(&run.id).await, Err(AuditError::Config(_))));
    }
}
