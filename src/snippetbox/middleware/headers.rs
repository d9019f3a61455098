use axum::{
    extract::Request,
    http::{
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, SERVER, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};

use crate::APP_USER_AGENT;

const CSP: &str = "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com";

/// Security headers set on every response, errors included.
pub async fn common_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("origin-when-cross-origin"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("0"));
    headers.insert(SERVER, HeaderValue::from_static(APP_USER_AGENT));

    response
}
