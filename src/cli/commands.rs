use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "covaudit", version, about = "Catalog metadata coverage audit and remediation planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a run, ingest it from the catalog and score it
    Run(RunArgs),
    /// Detect coverage gaps for a completed run
    Gaps(GapsArgs),
    /// Build a phased remediation plan from a run's gaps
    Plan(RunIdArgs),
    /// Render a run's results as CSV, JSON or Markdown
    Render(RenderArgs),
    /// Show a run's status
    Status(StatusArgs),
    /// List runs, newest first
    List(ListArgs),
    /// Delete a run and everything derived from it
    Delete(RunIdArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Resume an existing run instead of creating one
    #[arg(long, conflicts_with_all = ["database", "schema", "connector", "domain", "limit", "capabilities", "methodology"])]
    pub resume: Option<String>,

    /// Catalog REST endpoint (overrides config)
    #[arg(long, conflicts_with = "fixture")]
    pub catalog_url: Option<String>,

    /// JSON fixture with assets and lineage, for offline runs
    #[arg(long)]
    pub fixture: Option<String>,

    /// Database name filter
    #[arg(long)]
    pub database: Option<String>,

    /// Schema name filter (requires --database)
    #[arg(long)]
    pub schema: Option<String>,

    /// Connector filter, e.g. snowflake
    #[arg(long)]
    pub connector: Option<String>,

    /// Business domain filter
    #[arg(long)]
    pub domain: Option<String>,

    /// Maximum number of assets to ingest
    #[arg(long)]
    pub limit: Option<usize>,

    /// Comma-separated capabilities (default: all)
    #[arg(long)]
    pub capabilities: Option<String>,

    /// Quality methodology: weighted_dimensions, dimension_triplet, binary_checklist, maturity_levels
    #[arg(long)]
    pub methodology: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct GapsArgs {
    /// Run ID
    pub run_id: String,

    /// Override a coverage target, e.g. --target ownership=0.9 (repeatable)
    #[arg(long = "target", value_name = "FIELD=FRACTION")]
    pub targets: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct RunIdArgs {
    /// Run ID
    pub run_id: String,
}

#[derive(Args, Clone)]
pub struct RenderArgs {
    /// Run ID
    pub run_id: String,

    /// Artifact format: csv, json, markdown
    #[arg(short, long, default_value = "markdown")]
    pub format: String,

    /// Write the artifact here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// Run ID
    pub run_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    /// Number of runs to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Number of runs to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from([
            "covaudit", "-vv", "run", "--fixture", "assets.json", "--database", "ANALYTICS", "--limit", "200",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.fixture.as_deref(), Some("assets.json"));
                assert_eq!(args.database.as_deref(), Some("ANALYTICS"));
                assert_eq!(args.limit, Some(200));
                assert!(args.resume.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_catalog_url_conflicts_with_fixture() {
        let result = Cli::try_parse_from([
            "covaudit", "run", "--fixture", "a.json", "--catalog-url", "https://catalog",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeated_targets() {
        let cli = Cli::parse_from([
            "covaudit", "--config", "audit.yaml", "gaps", "r1", "--target", "ownership=0.9", "--target", "lineage=0.5",
        ]);
        assert_eq!(cli.config.as_deref(), Some("audit.yaml"));
        match cli.command {
            Commands::Gaps(args) => assert_eq!(args.targets.len(), 2),
            _ => panic!("expected gaps"),
        }
    }
}
