//! Signup, login and logout.
//!
//! Both privilege changes (login and logout) rotate the session token before
//! touching the authenticated user id, so a token observed before the change
//! cannot be replayed after it.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use super::{decode_form, render, template_data};
use crate::auth::{AuthError, RegisterError};
use crate::forms::{UserLoginForm, UserSignupForm};
use crate::render::{LOGIN_PAGE, SIGNUP_PAGE};
use crate::session::{Session, AUTHENTICATED_USER_ID, FLASH};
use crate::snippetbox::{
    errors::ServerError,
    middleware::{RequestContext, LOGIN_PATH},
    AppState,
};

pub async fn signup_page(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
) -> Result<Response, ServerError> {
    let data = template_data(&session, context).with_form(&UserSignupForm::default())?;
    render(&state, StatusCode::OK, SIGNUP_PAGE, &data)
}

pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
    body: Bytes,
) -> Result<Response, ServerError> {
    let mut form: UserSignupForm = match decode_form(&body) {
        Ok(form) => form,
        Err(response) => return Ok(response),
    };

    form.validate();
    if !form.validator.valid() {
        let data = template_data(&session, context).with_form(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, SIGNUP_PAGE, &data);
    }

    match state
        .auth
        .register(&form.name, &form.email, &form.password)
        .await
    {
        Ok(_) => {}
        Err(RegisterError::DuplicateEmail) => {
            form.validator
                .add_field_error("email", "Email address has already been used");
            let data = template_data(&session, context).with_form(&form)?;
            return render(&state, StatusCode::UNPROCESSABLE_ENTITY, SIGNUP_PAGE, &data);
        }
        Err(RegisterError::Internal(err)) => return Err(err.into()),
    }

    session.put(FLASH, "Your signup was successful. Please log in.");

    Ok(Redirect::to(LOGIN_PATH).into_response())
}

pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
) -> Result<Response, ServerError> {
    let data = template_data(&session, context).with_form(&UserLoginForm::default())?;
    render(&state, StatusCode::OK, LOGIN_PAGE, &data)
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
    body: Bytes,
) -> Result<Response, ServerError> {
    let mut form: UserLoginForm = match decode_form(&body) {
        Ok(form) => form,
        Err(response) => return Ok(response),
    };

    form.validate();
    if !form.validator.valid() {
        let data = template_data(&session, context).with_form(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, LOGIN_PAGE, &data);
    }

    let user_id = match state.auth.authenticate(&form.email, &form.password).await {
        Ok(user_id) => user_id,
        Err(AuthError::InvalidCredentials) => {
            form.validator
                .add_non_field_error("Email or password is incorrect");
            let data = template_data(&session, context).with_form(&form)?;
            return render(&state, StatusCode::UNPROCESSABLE_ENTITY, LOGIN_PAGE, &data);
        }
        Err(AuthError::Internal(err)) => return Err(err.into()),
    };

    session.renew_token()?;
    session.put(AUTHENTICATED_USER_ID, user_id);

    Ok(Redirect::to("/snippet/create").into_response())
}

pub async fn logout(session: Session) -> Result<Response, ServerError> {
    session.renew_token()?;
    session.remove(AUTHENTICATED_USER_ID);
    session.put(FLASH, "You've been logged out successfully!");

    Ok(Redirect::to("/").into_response())
}
