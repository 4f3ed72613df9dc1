use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::registry::{AdapterRegistry, SharedAdapter, describe, lock_adapter};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://127.0.0.1:8080";

/// Where the service listens and which browser origin may call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(registry: AdapterRegistry, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/adapters", get(list_adapters))
        .route("/adapters/{id}", get(get_adapter))
        .route("/adapters/{id}/read", get(read_adapter))
        .route("/adapters/{id}/{action}", post(adapter_action))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(cors)
        .with_state(registry)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_server(registry: AdapterRegistry, config: &ServerConfig) -> Result<()> {
    let origin = HeaderValue::from_str(&config.allowed_origin)
        .with_context(|| format!("invalid allowed origin: {}", config.allowed_origin))?;
    let app = build_router(registry, origin);
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("adapter service listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("adapter service shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn find(registry: &AdapterRegistry, id: &str, missing: &str) -> Result<SharedAdapter, AppError> {
    registry.get(id).ok_or_else(|| AppError::not_found(missing))
}

/// Empty or malformed bodies read as `{}`.
fn body_or_empty(body: &Bytes) -> Value {
    serde_json::from_slice::<Value>(body).unwrap_or_else(|_| json!({}))
}

async fn list_adapters(State(registry): State<AdapterRegistry>) -> Json<Vec<Value>> {
    Json(registry.descriptors())
}

async fn get_adapter(
    State(registry): State<AdapterRegistry>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let adapter = find(&registry, &id, "not found")?;
    let adapter = lock_adapter(&adapter);
    Ok(Json(describe(&**adapter)))
}

async fn read_adapter(
    State(registry): State<AdapterRegistry>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let adapter = find(&registry, &id, "adapter not found")?;
    let reading = lock_adapter(&adapter).read();
    Ok(Json(reading))
}

async fn adapter_action(
    State(registry): State<AdapterRegistry>,
    Path((id, action)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let adapter = find(&registry, &id, "adapter not found")?;
    let payload = body_or_empty(&body);
    let mut adapter = lock_adapter(&adapter);
    let response = match action.as_str() {
        "discover" => json!({ "devices": adapter.discover() }),
        "connect" => {
            let connected = adapter.connect(&payload);
            tracing::info!(adapter_id = %id, connected, "adapter connect");
            json!({ "connected": connected })
        }
        "write" => adapter.write(&payload),
        _ => return Err(AppError::not_found("not found")),
    };
    Ok(Json(response))
}

async fn not_found() -> AppError {
    AppError::not_found("not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn app(registry: &AdapterRegistry) -> Router {
        build_router(
            registry.clone(),
            HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN),
        )
    }

    async fn get_req(registry: &AdapterRegistry, uri: &str) -> axum::response::Response {
        app(registry)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_req(registry: &AdapterRegistry, uri: &str, body: &str) -> axum::response::Response {
        app(registry)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_adapters() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let resp = get_req(&registry, "/adapters").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json[0]["id"], "smart-glasses-mock");
        assert_eq!(json[0]["version"], "0.1.0");
    }

    #[tokio::test]
    async fn test_get_adapter_and_unknown() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let resp = get_req(&registry, "/adapters/smart-glasses-mock").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["name"], "Smart Glasses (Mock)");

        let resp = get_req(&registry, "/adapters/nope").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "not found"}));

        let resp = get_req(&registry, "/adapters/nope/read").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "adapter not found"}));
    }

    #[tokio::test]
    async fn test_read_before_and_after_connect() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let resp = get_req(&registry, "/adapters/smart-glasses-mock/read").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"error": "not connected"}));

        // Malformed body reads as {}.
        let resp = post_req(&registry, "/adapters/smart-glasses-mock/connect", "{oops").await;
        assert_eq!(body_json(resp).await, json!({"connected": true}));

        let json = body_json(get_req(&registry, "/adapters/smart-glasses-mock/read").await).await;
        assert_eq!(json["state"]["status"], "ready");
        assert!(json["state"]["imu.yaw"].is_number());
    }

    #[tokio::test]
    async fn test_discover_and_write() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let json = body_json(post_req(&registry, "/adapters/smart-glasses-mock/discover", "").await).await;
        assert_eq!(json["devices"][0]["model"], "VX-1");

        post_req(&registry, "/adapters/smart-glasses-mock/connect", "{}").await;
        let json = body_json(
            post_req(&registry, "/adapters/smart-glasses-mock/write", r#"{"cmd":"vibrate"}"#).await,
        )
        .await;
        assert_eq!(json, json!({"ok": true, "echo": {"cmd": "vibrate"}}));
    }

    #[tokio::test]
    async fn test_unknown_routes_are_json_404() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let resp = post_req(&registry, "/adapters/smart-glasses-mock/explode", "{}").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "not found"}));

        let resp = post_req(&registry, "/adapters/nope/connect", "{}").await;
        assert_eq!(body_json(resp).await, json!({"error": "adapter not found"}));

        let resp = get_req(&registry, "/elsewhere").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "not found"}));

        // Wrong method on a known path is a 404 too, not an empty 405.
        for resp in [
            post_req(&registry, "/adapters/smart-glasses-mock/read", "{}").await,
            get_req(&registry, "/adapters/smart-glasses-mock/connect").await,
            post_req(&registry, "/adapters", "{}").await,
        ] {
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            assert_eq!(body_json(resp).await, json!({"error": "not found"}));
        }
    }

    #[tokio::test]
    async fn test_cors_allows_host_origin() {
        let registry = AdapterRegistry::with_builtin_adapters();
        let resp = app(&registry)
            .oneshot(
                Request::builder()
                    .uri("/adapters")
                    .header("origin", DEFAULT_ALLOWED_ORIGIN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            DEFAULT_ALLOWED_ORIGIN
        );
    }
}
