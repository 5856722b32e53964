//! # tessera-rest - HTTP request boundary for tenant isolation
//!
//! This crate puts the [`tessera_isolation`] layer behind an Axum router. Every
//! request that is not on an excluded path gets a tenant, resolved from the
//! request and bound to a [`TenantContext`](tessera_isolation::TenantContext)
//! for exactly as long as the request is in flight. Statements rewritten
//! anywhere below the boundary are scoped to that tenant.
//!
//! ## Features
//!
//! - **Tenant resolution**: header, authenticated identity and subdomain, with
//!   a configurable default
//! - **Request-scoped context**: cleared on completion, error, panic and
//!   cancellation
//! - **Row-filter validation**: screening of administrator-written filter
//!   expressions
//! - **Scoping preview**: shows how a statement is rewritten for the caller
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera_rest::{create_app, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig {
//!         tenant_enabled: Some(true),
//!         ..Default::default()
//!     };
//!     let app = create_app(config)?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | HTTP Method | URL Pattern |
//! |----------|-------------|-------------|
//! | health | GET | `/health` |
//! | liveness | GET | `/_liveness` |
//! | readiness | GET | `/_readiness` |
//! | tenant | GET | `/api/tenant` |
//! | row-filter validation | POST | `/api/row-filters/validate` |
//! | scoping preview | POST | `/api/sql/rewrite` |
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": code, "message": text}`:
//!
//! | HTTP Status | Code | Description |
//! |-------------|------|-------------|
//! | 400 | tenant-required | No tenant could be resolved and one is required |
//! | 400 | invalid | Bad request |
//! | 422 | unprocessable | Statement cannot be tenant-scoped (fail-closed) |
//! | 503 | unavailable | Backing service unavailable |
//! | 500 | exception | Internal server error |
//!
//! ## Architecture
//!
//! - [`error`] - Error types and JSON error bodies
//! - [`config`] - Server and isolation configuration
//! - [`state`] - Application state (policy, resolver, rewriter, validator)
//! - [`tenant`] - Multi-source tenant resolution
//! - [`middleware`] - The tenant boundary
//! - [`extractors`] - Axum extractors
//! - [`handlers`] - HTTP request handlers
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod state;
pub mod tenant;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use axum::Router;
use tessera_isolation::ConfigError;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application from configuration.
///
/// Builds the isolation policy from `config` (file plus overrides) and the
/// application state around it. For more control, build an [`AppState`]
/// yourself and use [`create_app_with_state`].
pub fn create_app(config: ServerConfig) -> Result<Router, ConfigError> {
    let policy = config.isolation_policy()?;
    let state = AppState::new(config, policy)?;
    Ok(create_app_with_state(state))
}

/// Creates the Axum application around an existing state.
///
/// # Example
///
/// ```rust
/// use tessera_rest::{create_app_with_state, AppState, ServerConfig};
///
/// let config = ServerConfig::for_testing();
/// let policy = config.isolation_policy().unwrap();
/// let app = create_app_with_state(AppState::new(config, policy).unwrap());
/// ```
pub fn create_app_with_state(state: AppState) -> Router {
    let config = state.config().clone();
    let policy = state.policy();
    info!(
        isolation_enabled = policy.is_enabled(),
        tenant_required = policy.is_required(),
        dialect = %policy.dialect(),
        "Creating Tessera request boundary"
    );

    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Tag requests with x-request-id and echo it on the response
    let router = if config.enable_request_id {
        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    } else {
        router
    };

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tessera={level},tessera_rest={level},tessera_isolation={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
