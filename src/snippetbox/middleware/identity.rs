//! Request-scoped identity.
//!
//! The session only remembers a user id. Every request re-checks that id
//! against the user store, so a deleted account stops being signed in on its
//! very next request even though its session record still exists.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;

use crate::models::UserId;
use crate::session::{Session, AUTHENTICATED_USER_ID};
use crate::snippetbox::{errors::ServerError, AppState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

/// Typed per-request context. Absent from the request means anonymous.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub identity: Option<Identity>,
}

impl RequestContext {
    #[must_use]
    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            identity: Some(Identity { user_id }),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .copied()
            .unwrap_or_default())
    }
}

/// Resolve the session's user id into a [`RequestContext`].
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user_id = request
        .extensions()
        .get::<Session>()
        .and_then(|session| session.get::<UserId>(AUTHENTICATED_USER_ID))
        .unwrap_or(0);

    if user_id == 0 {
        return next.run(request).await;
    }

    match state.auth.user_exists(user_id).await {
        Ok(true) => {
            request
                .extensions_mut()
                .insert(RequestContext::authenticated(user_id));
        }
        Ok(false) => {}
        Err(err) => {
            return ServerError::from(err.context("failed to resolve session user")).into_response()
        }
    }

    next.run(request).await
}
