use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Error body returned by the backend on a rejected request.
///
/// `errors` maps a form field name to its validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.errors.is_empty()
    }

    /// Parses a response body, falling back to treating plain text as the message.
    pub fn from_response_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        serde_json::from_str(trimmed).unwrap_or_else(|_| Self::new(trimmed))
    }
}
