//! Inkbase Server
//!
//! Boots the multi-tenant studio backend: provisions every configured
//! tenant (database creation, migrations, owner bootstrap), builds the
//! routing table, and holds the credential and session store ready for the
//! transport layer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use inkbase_core::config::AppConfig;
use inkbase_core::tracing_init::init_tracing;
use inkbase_server::auth::{AuthService, JwtManager};
use inkbase_server::tenant;

#[derive(Parser, Debug)]
#[command(name = "inkbase-server")]
#[command(version, about = "Inkbase server - multi-tenant studio backend")]
struct Args {
    /// Path to the deployment TOML config.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// JWT secret key; overrides the config file value when set.
    #[arg(long, env = "INKBASE_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing("inkbase_server=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "Starting inkbase-server"
    );

    let mut config = AppConfig::load(&args.config)?;
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }

    let registry = Arc::new(tenant::provision(&config).await?);
    let jwt = Arc::new(JwtManager::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.access_ttl_secs,
    ));
    let _auth = AuthService::new(Arc::clone(&registry), Arc::clone(&jwt), &config.auth);

    info!(
        tenants = registry.len(),
        "All tenants provisioned; ready for transport layer"
    );

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    Ok(())
}
