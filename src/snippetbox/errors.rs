//! Error responses.
//!
//! Internal failures never leak detail to the client: the body is the generic
//! reason phrase and the error chain rides along as an [`ErrorReport`] response
//! extension so the request logger reports it once, next to method and URI.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Detail of an internal error, attached to the 500 response it produced.
#[derive(Clone, Debug)]
pub struct ErrorReport(pub String);

/// Internal error returned by handlers and middleware.
#[derive(Debug)]
pub struct ServerError(anyhow::Error);

impl<E> From<E> for ServerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let mut response = client_error(StatusCode::INTERNAL_SERVER_ERROR);
        response
            .extensions_mut()
            .insert(ErrorReport(format!("{:#}", self.0)));
        response
    }
}

/// Plain-text response carrying only the status reason phrase.
pub fn client_error(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn server_error_hides_detail_but_keeps_report() {
        let err = anyhow!("connection refused").context("failed to load snippets");
        let response = ServerError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().cloned();
        assert_eq!(
            report.map(|report| report.0),
            Some("failed to load snippets: connection refused".to_string())
        );
    }

    #[test]
    fn client_error_has_no_report() {
        let response = client_error(StatusCode::BAD_REQUEST);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }
}
