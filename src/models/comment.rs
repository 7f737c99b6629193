use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::forms::{FormErrors, REQUIRED};

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// What happened to a comment submission. The view redirects to the post either way.
#[derive(Debug)]
pub enum CommentOutcome {
    Created(Comment),
    Rejected(FormErrors),
}

impl Comment {
    pub fn created_label(&self) -> String {
        self.created_at.format("%d %B %Y %H:%M").to_string()
    }
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();

        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }

        errors.into_result(self.text.clone())
    }
}
