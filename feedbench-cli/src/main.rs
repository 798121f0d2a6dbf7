//! feedbench CLI - schema administration and the HTTP facade
//!
//! - `create` / `drop` / `truncate` manage the feed database
//! - `serve` runs the JSON API over a Postgres-backed feed store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedbench_server::config::config_dir;
use feedbench_server::{FeedbenchConfig, PgFeedServer, SchemaManager};
use tracing::info;

mod tracing_setup;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "feedbench",
    author,
    version,
    about = "Social graph store: users, follows, posts, likes and paginated feeds"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ./feedbench.toml, then ~/.feedbench/config.toml)
    #[arg(long, global = true, env = "FEEDBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the feed database and its tables if missing
    Create,

    /// Drop the feed database
    Drop,

    /// Remove every row from every table, keeping the schema
    Truncate,

    /// Serve the HTTP API
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Listen host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Skip creating the schema before serving
    #[arg(long)]
    no_migrate: bool,
}

/// Load .env from the working directory, then ~/.feedbench/.env.
///
/// Variables already set are never overwritten, so the first source wins.
fn load_dotenv() {
    dotenvy::dotenv().ok();
    if let Some(dir) = config_dir() {
        dotenvy::from_path(dir.join(".env")).ok();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FeedbenchConfig> {
    let config = match path {
        Some(path) => {
            let mut config = FeedbenchConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        None => FeedbenchConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug }).ok();

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;
    let schema = SchemaManager::new(config.db.clone());
    let target = config.db.debug_conn_string(&config.db.database);

    match cli.command {
        Commands::Create => {
            schema
                .ensure_schema()
                .await
                .with_context(|| format!("Failed to create schema at {}", target))?;
            info!("Schema ready at {}", target);
        }
        Commands::Drop => {
            schema
                .drop_schema()
                .await
                .with_context(|| format!("Failed to drop {}", target))?;
            info!("Dropped {}", target);
        }
        Commands::Truncate => {
            schema
                .truncate_all()
                .await
                .with_context(|| format!("Failed to truncate {}", target))?;
            info!("Truncated all tables in {}", target);
        }
        Commands::Serve(args) => {
            if !args.no_migrate {
                schema
                    .ensure_schema()
                    .await
                    .with_context(|| format!("Failed to create schema at {}", target))?;
            }

            let mut http = config.http.clone();
            if let Some(host) = args.host {
                http.host = host;
            }
            if let Some(port) = args.port {
                http.port = port;
            }

            let server = PgFeedServer::connect(&config.db)
                .await
                .with_context(|| format!("Failed to connect to {}", target))?;
            info!("Connected to {}", target);

            let service = Arc::new(server.clone());
            feedbench_server::http::serve(&http, service).await?;
            server.close().await;
        }
    }

    Ok(())
}
