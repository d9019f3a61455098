use axum::{
    extract::Request,
    http::{header::CACHE_CONTROL, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::identity::RequestContext;

pub const LOGIN_PATH: &str = "/user/login";

/// Protected routes only: anonymous requests are sent to the login page and
/// the handler never runs.
pub async fn require_authentication(
    context: RequestContext,
    request: Request,
    next: Next,
) -> Response {
    if !context.is_authenticated() {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
