use std::collections::HashSet;
use std::sync::Arc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use crate::catalog::{CatalogApi, CatalogAsset, LineageApi};
use crate::db::{Entity, Filter, RunStore};
use crate::errors::{with_retry, AuditError, RetryConfig};
use crate::models::{AssetRecord, EvidenceSignal, Run, SignalType};
use super::signals::{catalog_signals, lineage_signal};
use tracing::{debug, info, warn};

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionReport {
    pub pages: usize,
    pub assets: usize,
    pub evidence: usize,
    pub skipped_assets: usize,
    pub lineage_attempted: usize,
    pub lineage_failed: usize,
}

enum LineageOutcome {
    Found(EvidenceSignal),
    Failed,
    Skipped,
}

/// Pulls a run's assets from the catalog and stores the derived evidence.
pub struct IngestionCoordinator {
    store: RunStore,
    catalog: Arc<dyn CatalogApi>,
    lineage: Arc<dyn LineageApi>,
}

impl IngestionCoordinator {
    pub fn new(store: RunStore, catalog: Arc<dyn CatalogApi>, lineage: Arc<dyn LineageApi>) -> Self {
        Self { store, catalog, lineage }
    }

    /// Ingest `run` from scratch. Rows left by an earlier interrupted pass are
    /// cleared first. Pages are written as they arrive, so a failure part way
    /// leaves the completed pages queryable.
    pub async fn ingest(&self, run: &Run, cancel: &CancellationToken) -> Result<IngestionReport, AuditError> {
        let filter = Filter::run(&run.id);
        let cleared = self.store.delete_many::<EvidenceSignal>(&filter)? + self.store.delete_many::<AssetRecord>(&filter)?;
        if cleared > 0 {
            info!(run_id = %run.id, rows = cleared, "Cleared partial ingestion rows");
        }

        let settings = run.ingestion;
        let retry = RetryConfig::with_max_retries(settings.max_page_retries, settings.retry_base_delay_ms);
        let limit = run.scope.asset_limit;

        let mut report = IngestionReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut lineage_targets: Vec<String> = Vec::new();
        let mut offset = 0usize;

        info!(run_id = %run.id, scope = %run.scope.label(), asset_limit = limit, "Ingestion started");

        while report.assets < limit {
            if cancel.is_cancelled() {
                return Err(cancelled(run, &report));
            }
            let want = settings.page_size.min(limit - report.assets);
            let page = with_retry("list_assets", &retry, || self.catalog.list_assets(&run.scope, offset, want))
                .await
                .map_err(|e| AuditError::PartialIngestion {
                    pages_completed: report.pages,
                    assets_ingested: report.assets,
                    reason: e.to_string(),
                })?;

            let fetched = page.assets.len();
            offset += fetched;

            let mut batch = Vec::new();
            for asset in page.assets {
                if report.assets + batch.len() >= limit {
                    break;
                }
                if asset.guid.trim().is_empty() || !seen.insert(asset.guid.clone()) {
                    report.skipped_assets += 1;
                    continue;
                }
                batch.push(asset);
            }

            let (stored, written) = self.write_page(run, &batch)?;
            report.evidence += written;
            let stored_count = stored.len();
            report.assets += stored_count;
            report.skipped_assets += batch.len() - stored_count;
            report.pages += 1;
            if run.has_capability(SignalType::Lineage) {
                lineage_targets.extend(stored);
            }

            debug!(
                run_id = %run.id,
                page = report.pages,
                fetched,
                stored = stored_count,
                total = report.assets,
                approximate_count = ?page.approximate_count,
                "Page ingested"
            );

            if !page.has_more || fetched == 0 {
                break;
            }
        }

        if !lineage_targets.is_empty() {
            self.ingest_lineage(run, lineage_targets, &retry, cancel, &mut report).await?;
        }

        info!(
            run_id = %run.id,
            pages = report.pages,
            assets = report.assets,
            evidence = report.evidence,
            lineage_failed = report.lineage_failed,
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Store one page: asset rows first, then their evidence. Returns the
    /// guids stored and the number of evidence rows written.
    fn write_page(&self, run: &Run, assets: &[CatalogAsset]) -> Result<(Vec<String>, usize), AuditError> {
        let mut records = Vec::with_capacity(assets.len());
        let mut evidence = Vec::new();
        let source = self.catalog.source_name();

        for asset in assets {
            let record = AssetRecord {
                id: String::new(),
                run_id: run.id.clone(),
                asset_guid: asset.guid.clone(),
                name: asset.name.clone(),
                asset_type: asset.type_name.clone(),
                qualified_name: asset.qualified_name.clone(),
                domain: asset.domain.clone(),
                source_system: asset.connector_name.clone(),
                deep_link_url: self.catalog.deep_link(&asset.guid),
            };
            if let Err(e) = record.validate() {
                warn!(run_id = %run.id, guid = %asset.guid, error = %e, "Skipping malformed catalog asset");
                continue;
            }
            records.push(record);
            for value in catalog_signals(asset, &run.capabilities) {
                evidence.push(EvidenceSignal::new(&run.id, &asset.guid, value, source)?);
            }
        }

        let stored: Vec<String> = records.iter().map(|r| r.asset_guid.clone()).collect();
        self.store.create_many(&run.id, records)?;
        let written = evidence.len();
        self.store.create_many(&run.id, evidence)?;
        Ok((stored, written))
    }

    async fn ingest_lineage(
        &self,
        run: &Run,
        guids: Vec<String>,
        retry: &RetryConfig,
        cancel: &CancellationToken,
        report: &mut IngestionReport,
    ) -> Result<(), AuditError> {
        let concurrency = run.ingestion.lineage_concurrency.max(1);
        let outcomes: Vec<(String, LineageOutcome)> = stream::iter(guids)
            .map(|guid| {
                let lineage = self.lineage.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (guid, LineageOutcome::Skipped);
                    }
                    let result = with_retry("fetch_lineage", retry, || lineage.fetch_lineage(&guid)).await;
                    let outcome = match result {
                        Ok(summary) => match EvidenceSignal::new(&run.id, &guid, lineage_signal(summary), "lineage") {
                            Ok(signal) => LineageOutcome::Found(signal),
                            Err(_) => LineageOutcome::Failed,
                        },
                        Err(e) => {
                            warn!(run_id = %run.id, guid = %guid, error = %e, "Lineage lookup failed, leaving lineage unknown");
                            LineageOutcome::Failed
                        }
                    };
                    (guid, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut found = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                LineageOutcome::Found(signal) => {
                    report.lineage_attempted += 1;
                    found.push(signal);
                }
                LineageOutcome::Failed => {
                    report.lineage_attempted += 1;
                    report.lineage_failed += 1;
                }
                LineageOutcome::Skipped => {}
            }
        }
        found.sort_by(|a, b| a.asset_guid.cmp(&b.asset_guid));
        report.evidence += found.len();
        self.store.create_many(&run.id, found)?;

        if cancel.is_cancelled() {
            return Err(cancelled(run, report));
        }

        if report.lineage_failed > 0 {
            let rate = report.lineage_failed as f64 / report.lineage_attempted as f64;
            if rate > run.ingestion.lineage_failure_ceiling {
                return Err(AuditError::LineageDegraded {
                    failed: report.lineage_failed,
                    attempted: report.lineage_attempted,
                    ceiling: run.ingestion.lineage_failure_ceiling,
                });
            }
            warn!(
                run_id = %run.id,
                failed = report.lineage_failed,
                attempted = report.lineage_attempted,
                "Continuing with partial lineage coverage"
            );
        }
        Ok(())
    }
}

fn cancelled(run: &Run, report: &IngestionReport) -> AuditError {
    info!(run_id = %run.id, pages = report.pages, assets = report.assets, "Ingestion cancelled");
    AuditError::Cancelled(format!("ingestion of run {} cancelled after {} asset(s)", run.id, report.assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FixtureCatalog;
    use crate::db::runs::tests::new_run;
    use crate::models::SignalValue;

    fn asset(guid: &str) -> CatalogAsset {
        CatalogAsset {
            guid: guid.into(),
            type_name: "Table".into(),
            name: guid.into(),
            qualified_name: format!("db/{}", guid),
            owner_users: Some(vec!["alice".into()]),
            ..Default::default()
        }
    }

    fn setup(catalog: FixtureCatalog, asset_limit: usize, page_size: usize) -> (RunStore, Run, IngestionCoordinator, Arc<FixtureCatalog>) {
        let store = RunStore::in_memory().unwrap();
        let mut new = new_run();
        new.scope.database = None;
        new.scope.asset_limit = asset_limit;
        new.ingestion.page_size = page_size;
        new.ingestion.retry_base_delay_ms = 0;
        let run = store.create_run(new).unwrap();
        let catalog = Arc::new(catalog);
        let coordinator = IngestionCoordinator::new(store.clone(), catalog.clone(), catalog.clone());
        (store, run, coordinator, catalog)
    }

    #[tokio::test]
    async fn test_asset_limit_truncates_last_page() {
        let assets = (0..25).map(|i| asset(&format!("g{:02}", i))).collect();
        let (store, run, coordinator, catalog) = setup(FixtureCatalog::new(assets), 12, 5);

        let report = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.assets, 12);
        assert_eq!(report.pages, 3);
        assert_eq!(catalog.page_calls(), 3);
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 12);
    }

    #[tokio::test]
    async fn test_duplicate_guids_stored_once() {
        let (store, run, coordinator, _) = setup(FixtureCatalog::new(vec![asset("a"), asset("a"), asset("b")]), 100, 10);
        let report = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.assets, 2);
        assert_eq!(report.skipped_assets, 1);
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_transient_page_failure_is_retried() {
        let catalog = FixtureCatalog::new(vec![asset("a"), asset("b")]).fail_page(0, 2, true);
        let (_, run, coordinator, catalog) = setup(catalog, 100, 10);
        let report = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.assets, 2);
        assert_eq!(catalog.page_calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_completed_pages() {
        let assets = (0..6).map(|i| asset(&format!("g{}", i))).collect();
        let catalog = FixtureCatalog::new(assets).fail_page(3, u32::MAX, true);
        let (store, run, coordinator, _) = setup(catalog, 100, 3);

        let err = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap_err();
        match err {
            AuditError::PartialIngestion { pages_completed, assets_ingested, .. } => {
                assert_eq!(pages_completed, 1);
                assert_eq!(assets_ingested, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_lineage_leaves_no_row() {
        let catalog = FixtureCatalog::new(vec![asset("a"), asset("b"), asset("c")])
            .with_lineage("a", 1, 2)
            .fail_lineage("c");
        let (store, run, coordinator, _) = setup(catalog, 100, 10);

        let report = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.lineage_attempted, 3);
        assert_eq!(report.lineage_failed, 1);

        let lineage: Vec<EvidenceSignal> = store.find_many(&Filter::run(&run.id).kind("LINEAGE")).unwrap();
        let guids: Vec<_> = lineage.iter().map(|e| e.asset_guid.as_str()).collect();
        assert_eq!(guids, vec!["a", "b"]);
        assert!(matches!(lineage[1].value, SignalValue::Lineage { present: false, .. }));
    }

    #[tokio::test]
    async fn test_lineage_failure_ceiling() {
        let catalog = FixtureCatalog::new(vec![asset("a"), asset("b")]).fail_lineage("a").fail_lineage("b");
        let (store, run, coordinator, _) = setup(catalog, 100, 10);

        let err = coordinator.ingest(&run, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AuditError::LineageDegraded { failed: 2, attempted: 2, .. }));
        // Assets and catalog evidence stay
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let (store, run, coordinator, catalog) = setup(FixtureCatalog::new(vec![asset("a")]), 100, 10);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(coordinator.ingest(&run, &token).await, Err(AuditError::Cancelled(_))));
        assert_eq!(catalog.page_calls(), 0);
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reingest_replaces_partial_rows() {
        let (store, run, coordinator, _) = setup(FixtureCatalog::new(vec![asset("a"), asset("b")]), 100, 10);
        coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        coordinator.ingest(&run, &CancellationToken::new()).await.unwrap();
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 2);
        assert_eq!(store.count::<EvidenceSignal>(&Filter::run(&run.id).kind("OWNERSHIP")).unwrap(), 2);
    }
}
