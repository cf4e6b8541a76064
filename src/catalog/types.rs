use serde::{Deserialize, Serialize};

/// One asset as reported by the catalog listing.
///
/// Every governance attribute is optional: `None` means the catalog did not
/// report the attribute at all, which is different from reporting it empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAsset {
    pub guid: String,
    pub type_name: String,
    pub name: String,
    pub qualified_name: String,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub connector_name: Option<String>,
    pub domain: Option<String>,

    pub owner_users: Option<Vec<String>>,
    pub owner_groups: Option<Vec<String>>,
    pub description: Option<String>,
    pub user_description: Option<String>,
    /// Linked glossary term names.
    pub terms: Option<Vec<String>>,
    pub readme: Option<String>,
    pub classification_names: Option<Vec<String>>,
    pub certificate_status: Option<String>,
    pub popularity_score: Option<f64>,
    pub query_count: Option<u64>,
    pub query_user_count: Option<u64>,
}

/// One page of the asset listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPage {
    pub assets: Vec<CatalogAsset>,
    pub has_more: bool,
    #[serde(default)]
    pub approximate_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub upstream_count: u32,
    pub downstream_count: u32,
}
