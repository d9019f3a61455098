//! Form decoding and validation.
//!
//! Every form type owns a [`Validator`] as a named field and runs its rules
//! against already-decoded values. Decoding problems (a non-numeric `expires`)
//! are reported by [`decoder`] before any rule runs; rule failures accumulate here.

pub mod decoder;
pub mod snippet;
pub mod user;

pub use decoder::{decode, Decode, DecodeError, Fields, FormValues};
pub use snippet::SnippetCreateForm;
pub use user::{UserLoginForm, UserSignupForm};

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Basic email shape: something, `@`, a dotted domain. No whitespace.
pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Accumulates field-scoped and form-wide error messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    field_errors: BTreeMap<String, Vec<String>>,
    non_field_errors: Vec<String>,
}

impl Validator {
    /// True when no field and no non-field errors have been recorded.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Record `message` against `field` unless `ok` holds.
    ///
    /// Errors are only ever appended, so several failing rules on one field all
    /// show up.
    pub fn check_field(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_field_error(field, message);
        }
    }

    pub fn add_field_error(&mut self, field: &str, message: &str) {
        self.field_errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    #[must_use]
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.field_errors.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }
}

/// Fails on empty or whitespace-only input.
#[must_use]
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Length is counted in characters, not bytes.
#[must_use]
pub fn max_chars(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

#[must_use]
pub fn min_chars(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}

/// Exact membership in `permitted`. An empty allow-list rejects everything.
#[must_use]
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.iter().any(|candidate| candidate == value)
}

/// Regex match; a pattern that fails to compile never matches.
#[must_use]
pub fn matches(value: &str, pattern: &str) -> bool {
    Regex::new(pattern).is_ok_and(|regex| regex.is_match(value))
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
