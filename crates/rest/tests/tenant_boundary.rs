//! Integration tests for the tenant request boundary.
//!
//! Tests tenant resolution precedence, excluded paths, the required/default
//! behavior, context lifetime and the administrative endpoints.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use axum_test::TestServer;
use parking_lot::Mutex;
use serde_json::json;
use tessera_isolation::{TenantContext, TenantId};
use tessera_rest::extractors::TenantExtractor;
use tessera_rest::middleware::tenant_boundary;
use tessera_rest::tenant::{AuthenticatedIdentity, StaticTenantDirectory};
use tessera_rest::{AppState, ServerConfig, create_app_with_state};

const X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");
const HOST: HeaderName = HeaderName::from_static("host");
const X_TEST_IDENTITY: HeaderName = HeaderName::from_static("x-test-identity");

/// Creates application state for the given configuration.
fn create_state(config: ServerConfig) -> AppState {
    let policy = config.isolation_policy().expect("Invalid isolation policy");
    let directory: StaticTenantDirectory = [("acme", TenantId::new(31).unwrap())]
        .into_iter()
        .collect();
    AppState::new(config, policy)
        .expect("Failed to create state")
        .with_directory(Arc::new(directory))
}

/// Stand-in for upstream authentication: turns `x-test-identity: <id>` into
/// an [`AuthenticatedIdentity`] extension.
async fn fake_authentication(mut request: Request, next: Next) -> Response {
    let tenant_id = request
        .headers()
        .get(&X_TEST_IDENTITY)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    if let Some(tenant_id) = tenant_id {
        request
            .extensions_mut()
            .insert(AuthenticatedIdentity::new("test-user", tenant_id));
    }
    next.run(request).await
}

fn create_test_server(config: ServerConfig) -> TestServer {
    let app = create_app_with_state(create_state(config))
        .layer(middleware::from_fn(fake_authentication));
    TestServer::new(app).expect("Failed to create test server")
}

fn tenant_header(value: &'static str) -> HeaderValue {
    HeaderValue::from_static(value)
}

// =============================================================================
// Resolution Precedence Tests
// =============================================================================

mod precedence {
    use super::*;

    #[tokio::test]
    async fn test_header_tenant_is_used() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 42);
        assert_eq!(body["source"], "header");
    }

    #[tokio::test]
    async fn test_header_beats_identity() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .add_header(X_TEST_IDENTITY, tenant_header("7"))
            .await;

        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 42);
        assert_eq!(body["source"], "header");
    }

    #[tokio::test]
    async fn test_invalid_header_falls_through_to_identity() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("acme"))
            .add_header(X_TEST_IDENTITY, tenant_header("7"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 7);
        assert_eq!(body["source"], "identity");
    }

    #[tokio::test]
    async fn test_subdomain_when_enabled() {
        let server = create_test_server(ServerConfig {
            subdomain_enabled: Some(true),
            ..ServerConfig::for_testing()
        });

        let response = server
            .get("/api/tenant")
            .add_header(HOST, tenant_header("acme.tessera.example"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 31);
        assert_eq!(body["source"], "subdomain");
    }

    #[tokio::test]
    async fn test_subdomain_ignored_when_disabled() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .get("/api/tenant")
            .add_header(HOST, tenant_header("acme.tessera.example"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_custom_header_name() {
        let server = create_test_server(ServerConfig {
            tenant_id_header: Some("X-Org-Id".to_string()),
            ..ServerConfig::for_testing()
        });

        let response = server
            .get("/api/tenant")
            .add_header(HeaderName::from_static("x-org-id"), tenant_header("5"))
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 5);

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("5"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Required / Default Tests
// =============================================================================

mod required_and_default {
    use super::*;

    #[tokio::test]
    async fn test_required_rejects_unresolved_request() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server.get("/api/tenant").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "tenant-required");
        assert!(body["message"].as_str().unwrap().contains("X-Tenant-Id"));
    }

    #[tokio::test]
    async fn test_default_tenant_when_optional() {
        let server = create_test_server(ServerConfig {
            tenant_required: Some(false),
            default_tenant_id: Some(3),
            ..ServerConfig::for_testing()
        });

        let response = server.get("/api/tenant").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["tenant_id"], 3);
        assert_eq!(body["source"], "default");
    }

    #[tokio::test]
    async fn test_disabled_isolation_binds_no_tenant() {
        let server = create_test_server(ServerConfig {
            tenant_enabled: Some(false),
            ..ServerConfig::for_testing()
        });

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["tenant_id"].is_null());
        assert_eq!(body["isolation_enabled"], false);
    }
}

// =============================================================================
// Excluded Path Tests
// =============================================================================

mod excluded_paths {
    use super::*;

    #[tokio::test]
    async fn test_health_needs_no_tenant() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_configured_prefix_is_excluded() {
        let server = create_test_server(ServerConfig {
            excluded_paths: Some(vec!["/api/**".to_string()]),
            ..ServerConfig::for_testing()
        });

        let response = server
            .get("/api/tenant")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .await;

        // Excluded paths are never resolved, even with a header present
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["tenant_id"].is_null());
    }

    #[tokio::test]
    async fn test_probes_outside_exclusions_need_tenant() {
        let server = create_test_server(ServerConfig::for_testing());

        server
            .get("/_liveness")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/_liveness")
            .add_header(X_TENANT_ID, tenant_header("1"))
            .await
            .assert_status_ok();
    }
}

// =============================================================================
// Context Lifetime Tests
// =============================================================================

mod context_lifetime {
    use super::*;

    type Seen = Arc<Mutex<Vec<TenantContext>>>;

    async fn remember_context(Extension(seen): Extension<Seen>, tenant: TenantExtractor) -> String {
        let during = TenantContext::current_tenant();
        seen.lock().push(tenant.into_context());
        during.map(|t| t.to_string()).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_context_is_cleared_after_request() {
        let state = create_state(ServerConfig::for_testing());
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/probe", get(remember_context))
            .layer(middleware::from_fn_with_state(state.clone(), tenant_boundary))
            .layer(Extension(Arc::clone(&seen)))
            .with_state(state);
        let server = TestServer::new(app).expect("Failed to create test server");

        let response = server
            .get("/probe")
            .add_header(X_TENANT_ID, tenant_header("9"))
            .await;

        response.assert_status_ok();
        response.assert_text("9");

        let contexts = seen.lock();
        assert_eq!(contexts.len(), 1);
        assert!(!contexts[0].has_tenant());
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_leak() {
        let server = Arc::new(create_test_server(ServerConfig::for_testing()));

        let mut handles = Vec::new();
        for id in 1..=16_i64 {
            let server = Arc::clone(&server);
            handles.push(tokio::spawn(async move {
                let response = server
                    .post("/api/sql/rewrite")
                    .add_header(X_TENANT_ID, HeaderValue::from(id))
                    .json(&json!({ "sql": "SELECT * FROM orders" }))
                    .await;
                let body: serde_json::Value = response.json();
                (id, body["sql"].as_str().unwrap().to_string())
            }));
        }

        for handle in handles {
            let (id, sql) = handle.await.unwrap();
            assert_eq!(sql, format!("SELECT * FROM orders WHERE orders.tenant_id = {id}"));
        }
    }
}

// =============================================================================
// Row-Filter Validation Endpoint Tests
// =============================================================================

mod row_filter_validation {
    use super::*;

    async fn validate(server: &TestServer, expression: &str) -> (StatusCode, serde_json::Value) {
        let response = server
            .post("/api/row-filters/validate")
            .add_header(X_TENANT_ID, tenant_header("1"))
            .json(&json!({ "expression": expression }))
            .await;
        (response.status_code(), response.json())
    }

    #[tokio::test]
    async fn test_valid_expression() {
        let server = create_test_server(ServerConfig::for_testing());

        let (status, body) = validate(&server, "region = 'EU' AND amount > 100").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "valid": true }));
    }

    #[tokio::test]
    async fn test_rejected_expressions() {
        let server = create_test_server(ServerConfig::for_testing());

        let cases = [
            (
                "1=1; DROP TABLE users",
                "Expression contains potentially dangerous patterns",
            ),
            (
                "id = 1 UNION SELECT password FROM users",
                "Expression contains forbidden keyword: UNION",
            ),
            ("SLEEP(10) = 0", "Expression contains forbidden function: SLEEP"),
        ];
        for (expression, message) in cases {
            let (status, body) = validate(&server, expression).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{expression}");
            assert_eq!(body["valid"], false);
            assert_eq!(body["message"], message, "{expression}");
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .post("/api/row-filters/validate")
            .add_header(X_TENANT_ID, tenant_header("1"))
            .json(&json!({ "filter": "x = 1" }))
            .await;

        assert!(response.status_code().is_client_error());
    }
}

// =============================================================================
// Scoping Preview Tests
// =============================================================================

mod rewrite_preview {
    use super::*;

    #[tokio::test]
    async fn test_statement_scoped_to_request_tenant() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .post("/api/sql/rewrite")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .json(&json!({ "sql": "SELECT * FROM orders AS o WHERE o.status = 'open'" }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(
            body["sql"],
            "SELECT * FROM orders AS o WHERE o.status = 'open' AND o.tenant_id = 42"
        );
        assert_eq!(body["predicates_added"], 1);
        assert_eq!(body["scoped"], true);
        assert!(body.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_excluded_table_unchanged() {
        let server = create_test_server(ServerConfig::for_testing());

        let response = server
            .post("/api/sql/rewrite")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .json(&json!({ "sql": "SELECT * FROM s2_tenant" }))
            .await;

        let body: serde_json::Value = response.json();
        assert_eq!(body["sql"], "SELECT * FROM s2_tenant");
        assert_eq!(body["scoped"], false);
        assert_eq!(body["reason"], "nothing_to_scope");
    }

    #[tokio::test]
    async fn test_fail_closed_policy_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isolation.json");
        std::fs::write(&path, r#"{"on_parse_failure": "fail_closed"}"#).unwrap();

        let server = create_test_server(ServerConfig {
            isolation_config: Some(path),
            ..ServerConfig::for_testing()
        });

        let response = server
            .post("/api/sql/rewrite")
            .add_header(X_TENANT_ID, tenant_header("42"))
            .json(&json!({ "sql": "SELEC * FROM orders" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "unprocessable");
    }
}

// =============================================================================
// Readiness Tests
// =============================================================================

#[cfg(feature = "sqlite")]
mod readiness {
    use super::*;
    use tessera_isolation::backends::sqlite::TenantPool;

    #[tokio::test]
    async fn test_readiness_without_database() {
        let server = create_test_server(ServerConfig {
            excluded_paths: Some(vec!["/_readiness".to_string()]),
            ..ServerConfig::for_testing()
        });

        let response = server.get("/_readiness").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["checks"]["database"], "not_configured");
    }

    #[tokio::test]
    async fn test_readiness_with_database() {
        let config = ServerConfig {
            excluded_paths: Some(vec!["/_readiness".to_string()]),
            ..ServerConfig::for_testing()
        };
        let state = create_state(config);
        let pool = TenantPool::in_memory(state.rewriter().clone()).expect("Failed to create pool");
        let app = create_app_with_state(state.with_pool(pool));
        let server = TestServer::new(app).expect("Failed to create test server");

        let response = server.get("/_readiness").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["database"], "ok");
    }
}

// =============================================================================
// Request ID Tests
// =============================================================================

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = create_test_server(ServerConfig {
        enable_request_id: true,
        ..ServerConfig::for_testing()
    });

    let response = server.get("/health").await;

    response.assert_status_ok();
    let request_id = response.header("x-request-id");
    assert!(!request_id.is_empty());
}
