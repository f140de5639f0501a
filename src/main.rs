mod cli;

use clap::Parser;
use meridian_core::{AppState, config, create_app, db};
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, CustomerCommands, DbCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = config::Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
        Some(Commands::Customer(CustomerCommands::Approve { customer_id })) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_customer_approve(&pool, customer_id).await
        }
    }
}

async fn serve(config: config::Config) -> anyhow::Result<()> {
    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(pool, config);
    let app = create_app(state);

    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
