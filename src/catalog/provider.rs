use async_trait::async_trait;
use crate::errors::AuditError;
use crate::models::RunScope;
use super::types::{AssetPage, LineageSummary};

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch one page of assets matching `scope`, starting at `offset`.
    async fn list_assets(
        &self,
        scope: &RunScope,
        offset: usize,
        limit: usize,
    ) -> Result<AssetPage, AuditError>;

    /// Link to the asset's page in the catalog UI.
    fn deep_link(&self, guid: &str) -> Option<String>;

    /// Name used in logs and evidence `source`.
    fn source_name(&self) -> &str;
}

#[async_trait]
pub trait LineageApi: Send + Sync {
    async fn fetch_lineage(&self, guid: &str) -> Result<LineageSummary, AuditError>;
}
