use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use super::{decode_form, render, template_data, NOT_FOUND_PATH};
use crate::forms::SnippetCreateForm;
use crate::models::{LookupError, SnippetId};
use crate::render::{CREATE_PAGE, HOME_PAGE, VIEW_PAGE};
use crate::session::{Session, FLASH};
use crate::snippetbox::{errors::ServerError, middleware::RequestContext, AppState};

pub async fn home(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
) -> Result<Response, ServerError> {
    let snippets = state.snippets.latest().await?;
    let mut data = template_data(&session, context);
    data.snippets = snippets;
    render(&state, StatusCode::OK, HOME_PAGE, &data)
}

/// Positive decimal ids only; anything else is treated as not found.
fn parse_id(raw: &str) -> Option<SnippetId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<SnippetId>().ok().filter(|id| *id > 0)
}

pub async fn snippet_view(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let Some(id) = parse_id(&id) else {
        return Ok(Redirect::to(NOT_FOUND_PATH).into_response());
    };

    let snippet = match state.snippets.get(id).await {
        Ok(snippet) => snippet,
        Err(LookupError::NotFound) => return Ok(Redirect::to(NOT_FOUND_PATH).into_response()),
        Err(LookupError::Other(err)) => return Err(err.into()),
    };

    let mut data = template_data(&session, context);
    data.snippet = Some(snippet);
    render(&state, StatusCode::OK, VIEW_PAGE, &data)
}

pub async fn snippet_create_page(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
) -> Result<Response, ServerError> {
    let data = template_data(&session, context).with_form(&SnippetCreateForm::blank())?;
    render(&state, StatusCode::OK, CREATE_PAGE, &data)
}

pub async fn snippet_create(
    State(state): State<AppState>,
    session: Session,
    context: RequestContext,
    body: Bytes,
) -> Result<Response, ServerError> {
    let mut form: SnippetCreateForm = match decode_form(&body) {
        Ok(form) => form,
        Err(response) => return Ok(response),
    };

    form.validate();
    if !form.validator.valid() {
        let data = template_data(&session, context).with_form(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, CREATE_PAGE, &data);
    }

    let id = state
        .snippets
        .insert(&form.title, &form.content, form.expires)
        .await?;

    session.put(FLASH, "Snippet successfully created!");

    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}
