pub mod csv_report;
pub mod data;
pub mod json_report;
pub mod markdown;
pub mod renderer;

pub use renderer::{content_sha256, ArtifactRenderer, RENDERER_VERSION};
