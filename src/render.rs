//! Presentation collaborator.
//!
//! Handlers hand a page name and [`TemplateData`] to a [`Renderer`]; they never
//! build response bodies themselves. The shipped [`JsonRenderer`] serialises
//! `{"page": ..., "data": ...}` so the service can be driven by any front end.

use anyhow::{bail, Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::json;

use crate::models::Snippet;

pub const HOME_PAGE: &str = "home.html";
pub const VIEW_PAGE: &str = "view.html";
pub const CREATE_PAGE: &str = "create.html";
pub const SIGNUP_PAGE: &str = "signup.html";
pub const LOGIN_PAGE: &str = "login.html";

const PAGES: [&str; 5] = [HOME_PAGE, VIEW_PAGE, CREATE_PAGE, SIGNUP_PAGE, LOGIN_PAGE];

/// Everything a page may display.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub form: Option<serde_json::Value>,
}

impl TemplateData {
    #[must_use]
    pub fn new(flash: Option<String>, is_authenticated: bool) -> Self {
        Self {
            current_year: Utc::now().year(),
            flash,
            is_authenticated,
            ..Self::default()
        }
    }

    /// Attach a form (values plus its validator errors).
    ///
    /// # Errors
    /// Returns an error if the form cannot be serialised.
    pub fn with_form<F: Serialize>(mut self, form: &F) -> Result<Self> {
        self.form = Some(serde_json::to_value(form).context("failed to serialize form")?);
        Ok(self)
    }
}

pub trait Renderer: Send + Sync {
    /// Render `page` with `status`.
    ///
    /// # Errors
    /// Returns an error for unknown pages or when the page cannot be produced.
    fn render(&self, status: StatusCode, page: &str, data: &TemplateData) -> Result<Response>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, status: StatusCode, page: &str, data: &TemplateData) -> Result<Response> {
        if !PAGES.contains(&page) {
            bail!("the template {page} does not exist");
        }
        let body = serde_json::to_vec(&json!({ "page": page, "data": data }))
            .with_context(|| format!("failed to render {page}"))?;
        Ok((
            status,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::{Renderer, Response, Result, StatusCode, TemplateData};
    use std::sync::{Mutex, PoisonError};

    /// Renders through [`super::JsonRenderer`] and remembers every call.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        calls: Mutex<Vec<(StatusCode, String, TemplateData)>>,
    }

    impl RecordingRenderer {
        pub(crate) fn last(&self) -> Option<(StatusCode, String, TemplateData)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last()
                .cloned()
        }

        pub(crate) fn count(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, status: StatusCode, page: &str, data: &TemplateData) -> Result<Response> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((status, page.to_string(), data.clone()));
            super::JsonRenderer.render(status, page, data)
        }
    }
}
