pub mod provider;
pub mod http;
pub mod fixture;
pub mod types;

pub use provider::{CatalogApi, LineageApi};
pub use http::HttpCatalog;
pub use fixture::FixtureCatalog;
pub use types::{AssetPage, CatalogAsset, LineageSummary};
