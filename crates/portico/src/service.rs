// File: src/service.rs
// Purpose: Mount an Application on axum as a single fallback handler

use crate::application::Application;
use crate::request::Request;
use crate::response::HttpResponse;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

/// Every method and path goes to the application's front controller
pub fn into_router(app: Arc<Application>) -> axum::Router {
    axum::Router::new().fallback(dispatch).with_state(app)
}

async fn dispatch(State(app): State<Arc<Application>>, request: axum::extract::Request) -> HttpResponse {
    let (parts, body) = request.into_parts();
    let server = &app.config().server;

    let bytes = match axum::body::to_bytes(body, server.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = server.max_body_bytes, "Rejected request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let request = Request::new(parts.method, request_uri, parts.headers)
        .with_mount_path(server.base_url.as_str())
        .with_default_host(app.config().bind_address())
        .with_secure_transport(server.tls)
        .with_body(&bytes);

    app.handle(request).await
}
