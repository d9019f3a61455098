//! Signup and login forms.
//!
//! Passwords are decoded straight into [`SecretString`] and skipped during
//! serialization, so a re-rendered form never echoes them back.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{
    decoder::Fields, matches, min_chars, not_blank, Decode, Validator, EMAIL_PATTERN,
};

const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Serialize)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: SecretString,
    pub validator: Validator,
}

impl Default for UserSignupForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            password: SecretString::from(String::new()),
            validator: Validator::default(),
        }
    }
}

impl UserSignupForm {
    pub fn validate(&mut self) {
        let password = self.password.expose_secret();
        let validator = &mut self.validator;
        validator.check_field(not_blank(&self.name), "name", "This field cannot be blank");
        validator.check_field(
            not_blank(&self.email),
            "email",
            "This field cannot be blank",
        );
        validator.check_field(
            matches(self.email.trim(), EMAIL_PATTERN),
            "email",
            "This field must be a valid email address",
        );
        validator.check_field(not_blank(password), "password", "This field cannot be blank");
        validator.check_field(
            min_chars(password, MIN_PASSWORD_CHARS),
            "password",
            "This field must be at least 8 characters long",
        );
    }
}

impl Decode for UserSignupForm {
    fn bind(&mut self, fields: &mut Fields<'_>) {
        fields.text("name", &mut self.name);
        fields.text("email", &mut self.email);
        fields.secret("password", &mut self.password);
    }
}

#[derive(Debug, Serialize)]
pub struct UserLoginForm {
    pub email: String,
    #[serde(skip)]
    pub password: SecretString,
    pub validator: Validator,
}

impl Default for UserLoginForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: SecretString::from(String::new()),
            validator: Validator::default(),
        }
    }
}

impl UserLoginForm {
    pub fn validate(&mut self) {
        let validator = &mut self.validator;
        validator.check_field(
            not_blank(&self.email),
            "email",
            "This field cannot be blank",
        );
        validator.check_field(
            matches(self.email.trim(), EMAIL_PATTERN),
            "email",
            "This field must be a valid email address",
        );
        validator.check_field(
            not_blank(self.password.expose_secret()),
            "password",
            "This field cannot be blank",
        );
    }
}

impl Decode for UserLoginForm {
    fn bind(&mut self, fields: &mut Fields<'_>) {
        fields.text("email", &mut self.email);
        fields.secret("password", &mut self.password);
    }
}
