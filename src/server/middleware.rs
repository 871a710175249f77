use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::debug;

/// Log every incoming request path, enabled with `server.debug`.
pub async fn log_request(request: Request<Body>, next: Next) -> Response {
    debug!(method = %request.method(), uri = %request.uri(), "Request");
    next.run(request).await
}
