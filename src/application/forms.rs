//! Public form payloads and their validation.
//!
//! Each form deserializes leniently (missing fields become empty strings) and
//! `validate` either yields a typed command or a [`FormErrors`] map so the
//! page can be rendered again with inline messages.

use std::collections::BTreeMap;

use lettre::Address;
use serde::Deserialize;

pub const COMMENT_NAME_MAX: usize = 80;
pub const EMAIL_MAX: usize = 254;
pub const SHARE_NAME_MAX: usize = 25;

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Enter a valid email address.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (*field, messages.as_slice()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

fn required(errors: &mut FormErrors, field: &'static str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    }
    trimmed.to_string()
}

fn max_chars(errors: &mut FormErrors, field: &'static str, value: &str, limit: usize) {
    let count = value.chars().count();
    if count > limit {
        errors.add(
            field,
            format!("Ensure this value has at most {limit} characters (it has {count})."),
        );
    }
}

fn valid_email(errors: &mut FormErrors, field: &'static str, value: &str) -> String {
    let value = required(errors, field, value);
    if value.is_empty() {
        return value;
    }
    if value.parse::<Address>().is_err() {
        errors.add(field, INVALID_EMAIL);
    }
    max_chars(errors, field, &value, EMAIL_MAX);
    value
}

/// Comment submitted from a post detail page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub name: String,
    pub email: String,
    pub body: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<NewComment, FormErrors> {
        let mut errors = FormErrors::default();
        let name = required(&mut errors, "name", &self.name);
        max_chars(&mut errors, "name", &name, COMMENT_NAME_MAX);
        let email = valid_email(&mut errors, "email", &self.email);
        let body = required(&mut errors, "body", &self.body);
        errors.into_result(|| NewComment { name, email, body })
    }
}

/// Request to recommend a post to someone by email.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailPostForm {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
}

impl EmailPostForm {
    pub fn validate(&self) -> Result<ShareRequest, FormErrors> {
        let mut errors = FormErrors::default();
        let name = required(&mut errors, "name", &self.name);
        max_chars(&mut errors, "name", &name, SHARE_NAME_MAX);
        let email = valid_email(&mut errors, "email", &self.email);
        let to = valid_email(&mut errors, "to", &self.to);
        let comments = self.comments.trim().to_string();
        errors.into_result(|| ShareRequest {
            name,
            email,
            to,
            comments,
        })
    }
}

/// Search box. `query` is `None` when the parameter was absent altogether.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SearchForm {
    pub fn is_submitted(&self) -> bool {
        self.query.is_some()
    }

    pub fn raw_query(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<SearchQuery, FormErrors> {
        let mut errors = FormErrors::default();
        let query = required(&mut errors, "query", self.raw_query());
        errors.into_result(|| SearchQuery(query))
    }
}
