use clap::Parser;
use covaudit::cli::{self, CliContext, Commands};
use covaudit::config;
use covaudit::errors::AuditError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("COVAUDIT_GIT_HASH"),
        built = env!("COVAUDIT_BUILD_TIMESTAMP"),
        "covaudit starting"
    );

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: cli::Cli) -> Result<(), AuditError> {
    if let Commands::Validate(args) = &cli.command {
        return handle_validate(args).await;
    }

    let ctx = CliContext::load(cli.config.as_deref()).await?;
    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(&ctx, args).await,
        Commands::Gaps(args) => cli::stages::handle_gaps(&ctx, args).await,
        Commands::Plan(args) => cli::stages::handle_plan(&ctx, args).await,
        Commands::Render(args) => cli::stages::handle_render(&ctx, args).await,
        Commands::Status(args) => cli::runs::handle_status(&ctx, args).await,
        Commands::List(args) => cli::runs::handle_list(&ctx, args).await,
        Commands::Delete(args) => cli::runs::handle_delete(&ctx, args).await,
        Commands::Validate(_) => Ok(()),
    };

    // Flush the store even when the command failed
    if let Err(e) = ctx.store.close() {
        tracing::warn!(error = %e, "Failed to flush store on shutdown");
    }
    result
}

fn exit_code(e: &AuditError) -> i32 {
    match e {
        AuditError::Config(_) => 2,
        AuditError::Validation(_) => 3,
        AuditError::NotFound(_) => 4,
        AuditError::InvalidState(_) | AuditError::Conflict(_) => 5,
        AuditError::Cancelled(_) => 130,
        AuditError::TransientFetch(_)
        | AuditError::RateLimit(_)
        | AuditError::Fetch(_)
        | AuditError::PartialIngestion { .. }
        | AuditError::LineageDegraded { .. } => 6,
        _ => 1,
    }
}

async fn handle_validate(args: &cli::commands::ValidateArgs) -> Result<(), AuditError> {
    let path = std::path::PathBuf::from(&args.path);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.path);
    Ok(())
}
