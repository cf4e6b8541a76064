use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use crate::errors::AuditError;
use crate::models::RunScope;
use super::provider::{CatalogApi, LineageApi};
use super::types::{AssetPage, LineageSummary};
use tracing::debug;

/// Catalog and lineage client over the catalog's JSON REST API.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, AuditError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AuditError::Config(format!("catalog base_url must be http(s), got '{}'", base_url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url, token })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AuditError> {
        let resp = req.send().await.map_err(|e| classify_transport(what, e))?;
        check_status(what, resp.status())?;
        resp.json::<T>()
            .await
            .map_err(|e| AuditError::Fetch(format!("Failed to parse {} response: {}", what, e)))
    }
}

fn classify_transport(what: &str, err: reqwest::Error) -> AuditError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AuditError::TransientFetch(format!("{} request failed: {}", what, err))
    } else {
        AuditError::Fetch(format!("{} request failed: {}", what, err))
    }
}

fn check_status(what: &str, status: StatusCode) -> Result<(), AuditError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AuditError::RateLimit(format!("{} rate limited", what)));
    }
    if status.is_server_error() {
        return Err(AuditError::TransientFetch(format!("{} returned {}", what, status)));
    }
    Err(AuditError::Fetch(format!("{} returned {}", what, status)))
}

#[async_trait]
impl CatalogApi for HttpCatalog {
    async fn list_assets(&self, scope: &RunScope, offset: usize, limit: usize) -> Result<AssetPage, AuditError> {
        let mut query: Vec<(&str, String)> = vec![
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        for (key, value) in [
            ("database", &scope.database),
            ("schema", &scope.schema),
            ("connector", &scope.connector),
            ("domain", &scope.domain),
        ] {
            if let Some(v) = value {
                query.push((key, v.clone()));
            }
        }

        let page: AssetPage = self
            .get_json("Asset listing", self.request("/api/assets").query(&query))
            .await?;
        debug!(offset, returned = page.assets.len(), has_more = page.has_more, "Fetched asset page");
        Ok(page)
    }

    fn deep_link(&self, guid: &str) -> Option<String> {
        Some(format!("{}/assets/{}/overview", self.base_url, guid))
    }

    fn source_name(&self) -> &str {
        "catalog"
    }
}

#[async_trait]
impl LineageApi for HttpCatalog {
    async fn fetch_lineage(&self, guid: &str) -> Result<LineageSummary, AuditError> {
        self.get_json("Lineage", self.request(&format!("/api/assets/{}/lineage", guid))).await
    }
}
