use std::collections::BTreeMap;

use reqwest::StatusCode;
use shared::error::ApiErrorBody;
use thiserror::Error;

/// Failure of a read against the backend (`list`, `search`, `get`).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with {status}: {}", .body.message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        body: ApiErrorBody,
    },
    #[error("malformed response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether a single automatic retry may help.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Decode(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status,
                body: ApiErrorBody::default(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Failure of a create/update/delete, surfaced to the form that issued it.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
    #[error("{}", .message.as_deref().unwrap_or("the submitted data was rejected"))]
    Validation {
        message: Option<String>,
        errors: BTreeMap<String, Vec<String>>,
    },
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Fetch(FetchError),
}

impl MutationError {
    pub fn field_errors(&self, field: &str) -> &[String] {
        match self {
            MutationError::Validation { errors, .. } => {
                errors.get(field).map(Vec::as_slice).unwrap_or_default()
            }
            _ => &[],
        }
    }

    pub fn general_message(&self) -> String {
        match self {
            MutationError::Validation {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<FetchError> for MutationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND => {
                MutationError::NotFound
            }
            FetchError::Status { status, body }
                if status == StatusCode::BAD_REQUEST
                    || status == StatusCode::UNPROCESSABLE_ENTITY
                    || status == StatusCode::CONFLICT =>
            {
                MutationError::Validation {
                    message: body.message,
                    errors: body.errors,
                }
            }
            other => MutationError::Fetch(other),
        }
    }
}

impl From<reqwest::Error> for MutationError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::from(err).into()
    }
}
