use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{SET_COOKIE, VARY},
        request::Parts,
        HeaderValue, Method,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::session::Session;
use crate::snippetbox::{errors::ServerError, AppState};

/// Static assets never touch the session store.
fn is_static_asset(request: &Request) -> bool {
    request.method() == Method::GET && request.uri().path().starts_with("/static/")
}

/// Load the session before the handler and commit it afterwards, whatever the
/// handler's status.
pub async fn load_and_save(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_static_asset(&request) {
        return next.run(request).await;
    }

    let session = match state.sessions.load_from_headers(request.headers()).await {
        Ok(session) => session,
        Err(err) => return ServerError::from(err.context("failed to load session")).into_response(),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    match state.sessions.commit(&session).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Ok(None) => {}
        Err(err) => {
            return ServerError::from(err.context("failed to commit session")).into_response()
        }
    }
    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Cookie"));
    response
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ServerError::from(anyhow!("session layer is not installed")))
    }
}
