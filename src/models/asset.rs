use serde::{Deserialize, Serialize};

/// Cached copy of a catalog asset as seen during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub run_id: String,
    /// Catalog identifier; unique within a run.
    pub asset_guid: String,
    pub name: String,
    pub asset_type: String,
    pub qualified_name: String,
    pub domain: Option<String>,
    /// Connector or source system name, e.g. `snowflake`.
    pub source_system: Option<String>,
    pub deep_link_url: Option<String>,
}
