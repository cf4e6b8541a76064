use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use async_trait::async_trait;
use serde::Deserialize;
use crate::errors::AuditError;
use crate::models::RunScope;
use super::provider::{CatalogApi, LineageApi};
use super::types::{AssetPage, CatalogAsset, LineageSummary};

/// On-disk fixture layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixtureFile {
    base_url: Option<String>,
    assets: Vec<CatalogAsset>,
    lineage: BTreeMap<String, LineageSummary>,
    failing_lineage: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct PageFailure {
    remaining: u32,
    transient: bool,
}

/// In-process catalog backed by a fixed asset list. Used for offline audits
/// and tests; page and lineage failures can be injected.
pub struct FixtureCatalog {
    base_url: Option<String>,
    assets: Vec<CatalogAsset>,
    lineage: HashMap<String, LineageSummary>,
    failing_lineage: HashSet<String>,
    page_failures: Mutex<HashMap<usize, PageFailure>>,
    page_calls: AtomicUsize,
    lineage_calls: AtomicUsize,
}

impl FixtureCatalog {
    pub fn new(assets: Vec<CatalogAsset>) -> Self {
        Self {
            base_url: None,
            assets,
            lineage: HashMap::new(),
            failing_lineage: HashSet::new(),
            page_failures: Mutex::new(HashMap::new()),
            page_calls: AtomicUsize::new(0),
            lineage_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AuditError> {
        let content = std::fs::read_to_string(path)?;
        let file: FixtureFile = serde_json::from_str(&content)?;
        let mut catalog = Self::new(file.assets);
        catalog.base_url = file.base_url.map(|u| u.trim_end_matches('/').to_string());
        catalog.lineage = file.lineage.into_iter().collect();
        catalog.failing_lineage = file.failing_lineage.into_iter().collect();
        Ok(catalog)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_lineage(mut self, guid: &str, upstream_count: u32, downstream_count: u32) -> Self {
        self.lineage.insert(guid.to_string(), LineageSummary { upstream_count, downstream_count });
        self
    }

    /// Every lineage lookup for `guid` fails with a transient error.
    pub fn fail_lineage(mut self, guid: &str) -> Self {
        self.failing_lineage.insert(guid.to_string());
        self
    }

    /// The page starting at `offset` fails `times` times before succeeding.
    pub fn fail_page(self, offset: usize, times: u32, transient: bool) -> Self {
        if let Ok(mut failures) = self.page_failures.lock() {
            failures.insert(offset, PageFailure { remaining: times, transient });
        }
        self
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn lineage_calls(&self) -> usize {
        self.lineage_calls.load(Ordering::SeqCst)
    }

    fn take_page_failure(&self, offset: usize) -> Result<Option<PageFailure>, AuditError> {
        let mut failures = self
            .page_failures
            .lock()
            .map_err(|_| AuditError::Internal("Fixture failure table poisoned".into()))?;
        match failures.get_mut(&offset) {
            Some(f) if f.remaining > 0 => {
                f.remaining -= 1;
                Ok(Some(*f))
            }
            _ => Ok(None),
        }
    }
}

fn matches(filter: &Option<String>, value: &Option<String>) -> bool {
    match (filter, value) {
        (None, _) => true,
        (Some(f), Some(v)) => f.eq_ignore_ascii_case(v),
        (Some(_), None) => false,
    }
}

fn in_scope(scope: &RunScope, asset: &CatalogAsset) -> bool {
    matches(&scope.database, &asset.database_name)
        && matches(&scope.schema, &asset.schema_name)
        && matches(&scope.connector, &asset.connector_name)
        && matches(&scope.domain, &asset.domain)
}

#[async_trait]
impl CatalogApi for FixtureCatalog {
    async fn list_assets(&self, scope: &RunScope, offset: usize, limit: usize) -> Result<AssetPage, AuditError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.take_page_failure(offset)? {
            let msg = format!("injected failure for page at offset {}", offset);
            return Err(if failure.transient {
                AuditError::TransientFetch(msg)
            } else {
                AuditError::Fetch(msg)
            });
        }

        let matching: Vec<&CatalogAsset> = self.assets.iter().filter(|a| in_scope(scope, a)).collect();
        let assets: Vec<CatalogAsset> = matching.iter().skip(offset).take(limit).map(|a| (*a).clone()).collect();
        Ok(AssetPage {
            has_more: offset + assets.len() < matching.len(),
            approximate_count: Some(matching.len() as u64),
            assets,
        })
    }

    fn deep_link(&self, guid: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}/assets/{}/overview", base, guid))
    }

    fn source_name(&self) -> &str {
        "catalog"
    }
}

#[async_trait]
impl LineageApi for FixtureCatalog {
    async fn fetch_lineage(&self, guid: &str) -> Result<LineageSummary, AuditError> {
        self.lineage_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_lineage.contains(guid) {
            return Err(AuditError::TransientFetch(format!("injected lineage failure for {}", guid)));
        }
        Ok(self.lineage.get(guid).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(guid: &str, database: &str) -> CatalogAsset {
        CatalogAsset {
            guid: guid.into(),
            type_name: "Table".into(),
            name: guid.into(),
            qualified_name: format!("{}/{}", database, guid),
            database_name: Some(database.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pages_through_scope() {
        let catalog = FixtureCatalog::new(vec![asset("a", "SALES"), asset("b", "HR"), asset("c", "SALES")]);
        let scope = RunScope { database: Some("sales".into()), ..Default::default() };

        let first = catalog.list_assets(&scope, 0, 1).await.unwrap();
        assert_eq!(first.assets[0].guid, "a");
        assert!(first.has_more);
        assert_eq!(first.approximate_count, Some(2));

        let second = catalog.list_assets(&scope, 1, 1).await.unwrap();
        assert_eq!(second.assets[0].guid, "c");
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_injected_page_failure_recovers() {
        let catalog = FixtureCatalog::new(vec![asset("a", "SALES")]).fail_page(0, 1, true);
        let scope = RunScope::default();
        assert!(matches!(catalog.list_assets(&scope, 0, 10).await, Err(AuditError::TransientFetch(_))));
        assert_eq!(catalog.list_assets(&scope, 0, 10).await.unwrap().assets.len(), 1);
        assert_eq!(catalog.page_calls(), 2);
    }

    #[tokio::test]
    async fn test_lineage_lookup() {
        let catalog = FixtureCatalog::new(vec![]).with_lineage("a", 2, 3).fail_lineage("b");
        assert_eq!(catalog.fetch_lineage("a").await.unwrap().downstream_count, 3);
        assert!(catalog.fetch_lineage("b").await.is_err());
        assert_eq!(catalog.fetch_lineage("z").await.unwrap(), LineageSummary::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{
            "base_url": "https://tenant.example.com/",
            "assets": [{"guid":"a","typeName":"View","name":"v","qualifiedName":"db/v"}],
            "lineage": {"a": {"upstream_count": 1, "downstream_count": 0}},
            "failing_lineage": ["b"]
        }"#).unwrap();

        let catalog = FixtureCatalog::from_file(&path).unwrap();
        assert_eq!(catalog.deep_link("a").as_deref(), Some("https://tenant.example.com/assets/a/overview"));
        assert!(catalog.failing_lineage.contains("b"));
        assert_eq!(catalog.lineage["a"].upstream_count, 1);
    }
}
