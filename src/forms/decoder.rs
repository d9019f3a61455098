//! Maps submitted `application/x-www-form-urlencoded` pairs onto typed forms.
//!
//! Flow Overview: the handler parses the request body into [`FormValues`], then
//! [`decode`] builds a default form and lets it bind each of its fields to a
//! submission key through [`Fields`]. Absent keys keep the field's default value
//! and unknown keys are ignored.
//!
//! Two failure classes are kept apart on purpose:
//! - [`DecodeError::Malformed`] is bad user input (`expires=abc`) and becomes a `400`.
//! - [`DecodeError::Binding`] means the form type itself is wired wrong (an empty
//!   key or a key bound twice). That is a bug in this crate, not in the request.

use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("field `{field}` is malformed")]
    Malformed { field: String },
    #[error("invalid form binding: {0}")]
    Binding(String),
}

impl DecodeError {
    /// Structural errors are programming mistakes and must not reach the client
    /// as a `400`.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Binding(_))
    }
}

/// Submitted form values, every key mapped to all of its values in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormValues(HashMap<String, Vec<String>>);

impl FormValues {
    /// Parse a urlencoded body. Invalid UTF-8 sequences are replaced, never rejected.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in form_urlencoded::parse(body) {
            values
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self(values)
    }

    /// First submitted value for `key`.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.0.get(key).map_or(&[], Vec::as_slice)
    }
}

impl From<HashMap<String, Vec<String>>> for FormValues {
    fn from(values: HashMap<String, Vec<String>>) -> Self {
        Self(values)
    }
}

/// Implemented by every form type: bind each field to its submission key.
pub trait Decode: Default {
    fn bind(&mut self, fields: &mut Fields<'_>);
}

/// Binding context handed to [`Decode::bind`].
pub struct Fields<'a> {
    values: &'a FormValues,
    bound: HashSet<&'static str>,
    error: Option<DecodeError>,
}

impl<'a> Fields<'a> {
    fn new(values: &'a FormValues) -> Self {
        Self {
            values,
            bound: HashSet::new(),
            error: None,
        }
    }

    /// Copy the submitted value verbatim.
    pub fn text(&mut self, key: &'static str, destination: &mut String) {
        if let Some(value) = self.claim(key) {
            *destination = value.to_string();
        }
    }

    /// Like [`Fields::text`] but keeps the value out of `Debug` output.
    pub fn secret(&mut self, key: &'static str, destination: &mut SecretString) {
        if let Some(value) = self.claim(key) {
            *destination = SecretString::from(value.to_string());
        }
    }

    /// Strict decimal parsing: digits with an optional leading `-`, nothing else.
    pub fn integer<T: FromStr>(&mut self, key: &'static str, destination: &mut T) {
        let Some(value) = self.claim(key) else {
            return;
        };
        match parse_decimal(value) {
            Some(parsed) => *destination = parsed,
            None => self.fail(DecodeError::Malformed {
                field: key.to_string(),
            }),
        }
    }

    fn claim(&mut self, key: &'static str) -> Option<&'a str> {
        if key.is_empty() {
            self.fail(DecodeError::Binding("empty form key".to_string()));
            return None;
        }
        if !self.bound.insert(key) {
            self.fail(DecodeError::Binding(format!("form key `{key}` bound twice")));
            return None;
        }
        self.values.first(key)
    }

    // A binding error outranks malformed input so a wiring bug is never masked.
    fn fail(&mut self, error: DecodeError) {
        let keep_current = match &self.error {
            Some(DecodeError::Binding(_)) => true,
            Some(DecodeError::Malformed { .. }) => !error.is_structural(),
            None => false,
        };
        if !keep_current {
            self.error = Some(error);
        }
    }

    fn finish(self) -> Result<(), DecodeError> {
        self.error.map_or(Ok(()), Err)
    }
}

fn parse_decimal<T: FromStr>(value: &str) -> Option<T> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Decode `values` into a fresh `T`.
///
/// # Errors
/// Returns [`DecodeError::Malformed`] for unparsable user input and
/// [`DecodeError::Binding`] when `T`'s bindings are inconsistent.
pub fn decode<T: Decode>(values: &FormValues) -> Result<T, DecodeError> {
    let mut form = T::default();
    let mut fields = Fields::new(values);
    form.bind(&mut fields);
    fields.finish().map(|()| form)
}
