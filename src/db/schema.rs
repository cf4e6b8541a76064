/// Bumped whenever a table definition changes. A store file written with a
/// different version is treated as unusable and quarantined on open.
pub const SCHEMA_VERSION: i64 = 1;

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    scope_json TEXT NOT NULL,
    capabilities_json TEXT NOT NULL,
    scoring_json TEXT NOT NULL,
    ingestion_json TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'CREATED',
    error TEXT
);

CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    asset_guid TEXT NOT NULL,
    name TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    domain TEXT,
    source_system TEXT,
    deep_link_url TEXT,
    UNIQUE (run_id, asset_guid)
);

CREATE TABLE IF NOT EXISTS evidence (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    asset_guid TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    value_json TEXT NOT NULL,
    observed_at TEXT NOT NULL,
    source TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scores (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    subject_type TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    impact_score REAL NOT NULL,
    quality_score REAL,
    quality_unknown INTEGER NOT NULL,
    quadrant TEXT NOT NULL,
    methodology TEXT NOT NULL,
    explanations_json TEXT NOT NULL,
    CHECK ((quality_unknown = 1) = (quality_score IS NULL))
);

CREATE TABLE IF NOT EXISTS gaps (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    kind TEXT NOT NULL,
    subject_type TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    current_coverage REAL NOT NULL,
    target_coverage REAL NOT NULL,
    effort_hours REAL NOT NULL,
    evidence_refs_json TEXT NOT NULL,
    explanation TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    phases_json TEXT NOT NULL,
    total_weeks INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    artifact_type TEXT NOT NULL,
    content_text TEXT NOT NULL,
    content_sha256 TEXT NOT NULL,
    renderer_version TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assets_run ON assets(run_id);
CREATE INDEX IF NOT EXISTS idx_evidence_run_asset ON evidence(run_id, asset_guid);
CREATE INDEX IF NOT EXISTS idx_scores_run_subject ON scores(run_id, subject_id);
CREATE INDEX IF NOT EXISTS idx_gaps_run ON gaps(run_id);
CREATE INDEX IF NOT EXISTS idx_plans_run ON plans(run_id);
CREATE INDEX IF NOT EXISTS idx_artifacts_run ON artifacts(run_id);
CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
";

/// Tables holding rows that belong to a run, in delete order.
pub const DEPENDENT_TABLES: [&str; 6] = ["artifacts", "plans", "gaps", "scores", "evidence", "assets"];
