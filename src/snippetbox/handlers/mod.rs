pub mod health;
pub use self::health::health;

pub mod snippets;
pub use self::snippets::{home, snippet_create, snippet_create_page, snippet_view};

pub mod users;
pub use self::users::{login, login_page, logout, signup, signup_page};

// common functions for the handlers
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::forms::{decode, Decode, FormValues};
use crate::render::TemplateData;
use crate::session::{Session, FLASH};
use crate::snippetbox::{
    errors::{client_error, ServerError},
    middleware::RequestContext,
    AppState,
};

pub const NOT_FOUND_PATH: &str = "/404";

/// Template data common to every page. Pops the pending flash message.
fn template_data(session: &Session, context: RequestContext) -> TemplateData {
    TemplateData::new(session.pop::<String>(FLASH), context.is_authenticated())
}

fn render(
    state: &AppState,
    status: StatusCode,
    page: &str,
    data: &TemplateData,
) -> Result<Response, ServerError> {
    Ok(state.renderer.render(status, page, data)?)
}

/// Decode a urlencoded body into `T`.
///
/// Malformed input is the client's fault (400). A binding error is a bug in
/// the form definition and panics so the recovery stage reports it.
fn decode_form<T: Decode>(body: &[u8]) -> Result<T, Response> {
    match decode::<T>(&FormValues::parse(body)) {
        Ok(form) => Ok(form),
        Err(err) if err.is_structural() => panic!("form binding error: {err}"),
        Err(err) => {
            debug!("rejecting form: {err}");
            Err(client_error(StatusCode::BAD_REQUEST))
        }
    }
}

// axum handler for /404 and unmatched routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "You are lost")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{Fields, SnippetCreateForm};

    #[derive(Debug, Default)]
    struct TwiceBound {
        title: String,
        heading: String,
    }

    impl Decode for TwiceBound {
        fn bind(&mut self, fields: &mut Fields<'_>) {
            fields.text("title", &mut self.title);
            fields.text("title", &mut self.heading);
        }
    }

    #[test]
    #[should_panic(expected = "form binding error")]
    fn decode_form_escalates_binding_errors() {
        let _ = decode_form::<TwiceBound>(b"title=hello");
    }

    #[test]
    fn decode_form_rejects_malformed_input_with_400() {
        let result = decode_form::<SnippetCreateForm>(b"title=a&content=b&expires=soon");
        assert!(matches!(result, Err(ref response) if response.status() == StatusCode::BAD_REQUEST));
    }
}
