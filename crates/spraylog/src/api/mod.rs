//! HTTP API for spraylog.
//!
//! Routes:
//!
//! - `GET /health` - Health check
//! - `GET /api/records` - List records, newest first
//! - `POST /api/records` - Create a record
//! - `DELETE /api/records/{id}` - Delete one record
//! - `DELETE /api/records` - Delete every record

mod handlers;

use axum::http::HeaderValue;
use axum::routing::{delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::storage::Storage;

/// Build the application router.
pub fn router(storage: Storage, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/records",
            get(handlers::list_records)
                .post(handlers::create_record)
                .delete(handlers::delete_all_records),
        )
        .route("/api/records/{id}", delete(handlers::delete_record))
        .with_state(storage)
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
}

/// CORS policy: any origin when none are configured.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = if server.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Open the database and serve the API until interrupted.
///
/// # Errors
///
/// Returns an error if the database cannot be initialized or the listener
/// cannot be bound.
pub async fn serve(config: &Config) -> Result<()> {
    let storage = Storage::open(config.database_path())?;
    let app = router(storage, &config.server);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr.as_str()).await?;
    if config.server.cors_origins.is_empty() {
        warn!("CORS allows any origin; expose only on a trusted network");
    }
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    struct TestApp {
        _dir: TempDir,
        app: Router,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_server(&ServerConfig::default())
        }

        fn with_server(server: &ServerConfig) -> Self {
            crate::logging::init_test_logging();
            let dir = tempfile::tempdir().unwrap();
            let storage = Storage::open(dir.path().join("data.db")).unwrap();
            Self {
                app: router(storage, server),
                _dir: dir,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
            self.post_raw(uri, body.to_string()).await
        }

        async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
            let request = Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        async fn delete(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::delete(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn create(&self, field: &str) -> Value {
            let (status, body) = self
                .post(
                    "/api/records",
                    &json!({
                        "date": "2024-05-01",
                        "field": field,
                        "product": "Glyphosate",
                        "dose": 1.5
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body
        }

        async fn list(&self) -> Vec<Value> {
            let (status, body) = self.get("/api/records").await;
            assert_eq!(status, StatusCode::OK);
            body.as_array().cloned().unwrap()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let app = TestApp::new();
        assert!(app.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_record() {
        let app = TestApp::new();
        let (status, body) = app
            .post(
                "/api/records",
                &json!({
                    "date": "2024-05-01",
                    "field": "North Plot",
                    "product": "Glyphosate",
                    "dose": 1.5
                }),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({
                "id": 1,
                "date": "2024-05-01",
                "field": "North Plot",
                "product": "Glyphosate",
                "dose": 1.5,
                "notes": ""
            })
        );
    }

    #[tokio::test]
    async fn test_create_normalizes_fields() {
        let app = TestApp::new();
        let (status, body) = app
            .post(
                "/api/records",
                &json!({
                    "date": "2024-05-01",
                    "field": "  South ",
                    "product": " Copper ",
                    "dose": 0,
                    "notes": 12
                }),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["field"], "South");
        assert_eq!(body["product"], "Copper");
        assert_eq!(body["notes"], "");
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let app = TestApp::new();
        let first = app.create("A").await;
        let second = app.create("B").await;

        assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());
        assert_eq!(app.list().await, vec![second, first]);
    }

    #[tokio::test]
    async fn test_list_order_newest_first() {
        let app = TestApp::new();
        app.create("A").await;
        app.create("B").await;
        app.create("C").await;

        let fields: Vec<_> = app
            .list()
            .await
            .into_iter()
            .map(|r| r["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_unprocessable_and_not_stored() {
        let app = TestApp::new();
        app.create("A").await;
        let before = app.list().await;

        let (status, body) = app
            .post(
                "/api/records",
                &json!({
                    "date": "2024-05-01",
                    "field": "",
                    "product": "Glyphosate",
                    "dose": -2
                }),
            )
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
        let fields: Vec<_> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["field", "dose"]);
        assert_eq!(app.list().await, before);
    }

    #[tokio::test]
    async fn test_malformed_json_is_unprocessable() {
        let app = TestApp::new();
        let (status, body) = app
            .post_raw("/api/records", "{\"date\": ".to_string())
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "body");
        assert!(app.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_record() {
        let app = TestApp::new();
        let a = app.create("A").await;
        let b = app.create("B").await;
        let c = app.create("C").await;

        let (status, body) = app
            .delete(&format!("/api/records/{}", b["id"]))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert_eq!(app.list().await, vec![c, a]);
    }

    #[tokio::test]
    async fn test_delete_missing_record() {
        let app = TestApp::new();
        let a = app.create("A").await;

        let (status, body) = app.delete("/api/records/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "record 42 not found");
        assert_eq!(app.list().await, vec![a]);
    }

    #[tokio::test]
    async fn test_delete_non_numeric_id() {
        let app = TestApp::new();
        let (status, _) = app.delete("/api/records/abc").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let app = TestApp::new();
        app.create("A").await;
        app.create("B").await;

        let (status, _) = app.delete("/api/records").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.list().await.is_empty());

        let (status, _) = app.delete("/api/records").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete_all() {
        let app = TestApp::new();
        let first = app.create("A").await;
        app.delete("/api/records").await;
        let second = app.create("B").await;
        assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/records")
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .unwrap();

        let response = app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let server = ServerConfig {
            cors_origins: vec!["http://farm.local".to_string()],
            ..ServerConfig::default()
        };
        let app = TestApp::with_server(&server);

        let allowed = Request::get("/api/records")
            .header(header::ORIGIN, "http://farm.local")
            .body(Body::empty())
            .unwrap();
        let response = app.app.clone().oneshot(allowed).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://farm.local"
        );

        let denied = Request::get("/api/records")
            .header(header::ORIGIN, "http://elsewhere.example")
            .body(Body::empty())
            .unwrap();
        let response = app.app.clone().oneshot(denied).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
