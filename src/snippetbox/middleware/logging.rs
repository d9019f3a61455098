use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{error, info};

use crate::snippetbox::errors::ErrorReport;

/// Log every request before dispatch and report internal errors on the way out.
pub async fn log_request(request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();

    info!(
        ip,
        proto = ?request.version(),
        %method,
        %uri,
        "received request"
    );

    let response = next.run(request).await;

    if let Some(ErrorReport(detail)) = response.extensions().get::<ErrorReport>() {
        error!(%method, %uri, "{detail}");
    }

    response
}
