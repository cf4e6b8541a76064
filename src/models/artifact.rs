use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    Csv,
    Json,
    Markdown,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Markdown => "MARKDOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CSV" => Some(Self::Csv),
            "JSON" => Some(Self::Json),
            "MARKDOWN" | "MD" => Some(Self::Markdown),
            _ => None,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered export of a run's gaps, scores and plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub run_id: String,
    pub artifact_type: ArtifactType,
    pub content_text: String,
    /// Hex SHA-256 of `content_text`.
    pub content_sha256: String,
    pub renderer_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_type_parse() {
        assert_eq!(ArtifactType::parse("json"), Some(ArtifactType::Json));
        assert_eq!(ArtifactType::parse("md"), Some(ArtifactType::Markdown));
        assert_eq!(ArtifactType::parse("xml"), None);
    }
}
