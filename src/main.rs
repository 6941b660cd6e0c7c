use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tenantry_core::{config::Config, migration, server, telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "tenantry-core", version, about = "Tenancy, authorization and SMS metering service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database if needed and apply migrations
    Migrate,
    /// Persist expiry for subscriptions whose period has ended
    ExpireSubscriptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::run(config).await,
        Command::Migrate => {
            telemetry::init(&config.telemetry)?;
            migration::run_migrations(&config).await
        }
        Command::ExpireSubscriptions => {
            telemetry::init(&config.telemetry)?;
            let pool = server::connect(&config).await?;
            let state = server::AppState::new(config, pool, None);
            let expired = state.subscription_service.expire_due(Utc::now()).await?;
            info!(count = expired, "Subscription expiry sweep finished");
            Ok(())
        }
    }
}
