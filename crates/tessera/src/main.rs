//! Tessera server
//!
//! Serves the tenant request boundary over HTTP.

use clap::Parser;
use tessera_rest::{AppState, ServerConfig, create_app_with_state, init_logging};
use tracing::info;

#[cfg(feature = "sqlite")]
use std::sync::Arc;
#[cfg(feature = "sqlite")]
use tessera_isolation::backends::sqlite::TenantPool;

/// Opens the tenant-scoped SQLite pool named by `database_url`, if any.
#[cfg(feature = "sqlite")]
fn attach_database(state: AppState, config: &ServerConfig) -> anyhow::Result<AppState> {
    let Some(db_path) = config.database_url.as_deref() else {
        return Ok(state);
    };
    info!(database = %db_path, "Opening SQLite tenant pool");

    let interceptor = Arc::clone(state.rewriter());
    let pool = if db_path == ":memory:" {
        TenantPool::in_memory(interceptor)?
    } else {
        TenantPool::open(db_path, interceptor)?
    };

    Ok(state.with_pool(pool))
}

/// Fallback when the sqlite feature is not enabled.
#[cfg(not(feature = "sqlite"))]
fn attach_database(state: AppState, config: &ServerConfig) -> anyhow::Result<AppState> {
    if config.database_url.is_some() {
        anyhow::bail!(
            "A database requires the 'sqlite' feature. \
             Build with: cargo build -p tessera --features sqlite"
        );
    }
    Ok(state)
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let policy = config
        .isolation_policy()
        .map_err(|e| anyhow::anyhow!("Invalid isolation configuration: {}", e))?;

    info!(
        port = config.port,
        host = %config.host,
        isolation_enabled = policy.is_enabled(),
        tenant_required = policy.is_required(),
        tenant_header = %policy.tenant_id_header(),
        "Starting Tessera"
    );

    let state = AppState::new(config.clone(), policy)?;
    let state = attach_database(state, &config)?;
    let app = create_app_with_state(state);

    serve(app, &config).await
}
