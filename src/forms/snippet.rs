use serde::Serialize;

use super::{decoder::Fields, max_chars, not_blank, permitted_value, Decode, Validator};

pub const PERMITTED_EXPIRES: [i32; 3] = [1, 7, 365];
pub const DEFAULT_EXPIRES: i32 = 365;
const MAX_TITLE_CHARS: usize = 100;

#[derive(Clone, Debug, Default, Serialize)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    /// Lifetime in days.
    pub expires: i32,
    pub validator: Validator,
}

impl SnippetCreateForm {
    /// Blank form shown on the create page.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            expires: DEFAULT_EXPIRES,
            ..Self::default()
        }
    }

    pub fn validate(&mut self) {
        let validator = &mut self.validator;
        validator.check_field(
            not_blank(&self.title),
            "title",
            "This field cannot be blank",
        );
        validator.check_field(
            max_chars(&self.title, MAX_TITLE_CHARS),
            "title",
            "This field cannot be more than 100 characters long",
        );
        validator.check_field(
            not_blank(&self.content),
            "content",
            "This field cannot be blank",
        );
        validator.check_field(
            permitted_value(&self.expires, &PERMITTED_EXPIRES),
            "expires",
            "This field must equal 1, 7 or 365",
        );
    }
}

impl Decode for SnippetCreateForm {
    fn bind(&mut self, fields: &mut Fields<'_>) {
        fields.text("title", &mut self.title);
        fields.text("content", &mut self.content);
        fields.integer("expires", &mut self.expires);
    }
}
