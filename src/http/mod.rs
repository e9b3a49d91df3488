//! HTTP transport - maps requests on the child and assignment resources to
//! registry workflows.
//!
//! Requires the `http` feature. Uses axum for routing and tower-http for
//! CORS, panic recovery and request tracing.
//!
//! ## Routes
//!
//! - `GET /children` - list every child with id and version.
//! - `POST /children` - register a child (201).
//! - `PUT /children` - full replacement by business key.
//! - `PATCH /children` - mark a child as paid.
//! - `POST|PUT|DELETE /assignments` - assign, reposition, unassign.
//! - `GET /health` - liveness.
//!
//! Errors are answered with `{"error": <message>, "code": <outcome>}`.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sporttag::{http, registry::Registry, store::InMemoryStore};
//!
//! let registry = Arc::new(Registry::new(InMemoryStore::new(), deadline));
//! let app = http::router(registry, HeaderValue::from_static("https://sporttag.b4a.app"));
//! http::serve(app, "0.0.0.0:8080").await?;
//! ```

mod handlers;

use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::registry::{Registry, RegistryError};
use crate::store::DocumentStore;

/// Build an axum `Router` serving the registry.
///
/// `origin` is the one browser origin allowed by CORS.
pub fn router<S: DocumentStore + 'static>(registry: Arc<Registry<S>>, origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/children",
            get(handlers::list::<S>)
                .post(handlers::register::<S>)
                .put(handlers::replace::<S>)
                .patch(handlers::mark_paid::<S>),
        )
        .route(
            "/assignments",
            axum::routing::post(handlers::assign::<S>)
                .put(handlers::reposition::<S>)
                .delete(handlers::unassign::<S>),
        )
        .with_state(registry)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` at `addr` (e.g. `"0.0.0.0:8080"`) until Ctrl-C.
pub async fn serve(app: Router, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C, shutting down");
        return;
    }
    info!("received Ctrl-C, shutting down");
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        }
        let body = json!({ "error": self.to_string(), "code": self.code() });
        (status, Json(body)).into_response()
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "handler panicked");

    let body = json!({ "error": "internal server error", "code": "INTERNAL" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
