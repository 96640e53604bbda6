// Admin console error types
use std::collections::HashMap;
use thiserror::Error;

use crate::content::approval::ApprovalError;
use crate::content::validate::SubmissionError;

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// Errors surfaced by taxonomy and content operations.
///
/// None of these are retried automatically; every recoverable failure is
/// handed back to the caller for a manual decision.
#[derive(Debug, Error)]
pub enum AdminError {
    // 400 / 422
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 401
    #[error("{0}")]
    Unauthorized(String),

    // 403
    #[error("{0}")]
    Forbidden(String),

    // 404
    #[error("{0}")]
    NotFound(String),

    // 409
    #[error("{0}")]
    Conflict(String),

    // Blocked before any request was made
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("{0} is already in progress")]
    InFlight(String),

    // 5xx, connection refused
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // Timeouts and other transport failures
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// How an error should be presented to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Shown next to the offending field
    Inline,
    /// Dismissible notification, no retry offered
    Dismissible,
    /// Generic "try again" notification
    RetryPrompt,
    /// Handed to the session layer (logout / re-login)
    SessionExpired,
}

impl AdminError {
    /// HTTP status this error corresponds to, when it came from the service
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdminError::Validation { .. } => Some(400),
            AdminError::Unauthorized(_) => Some(401),
            AdminError::Forbidden(_) => Some(403),
            AdminError::NotFound(_) => Some(404),
            AdminError::Conflict(_) => Some(409),
            AdminError::ServiceUnavailable(_) => Some(503),
            _ => None,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AdminError::Validation { .. } => "VALIDATION_ERROR",
            AdminError::Unauthorized(_) => "UNAUTHORIZED",
            AdminError::Forbidden(_) => "FORBIDDEN",
            AdminError::NotFound(_) => "NOT_FOUND",
            AdminError::Conflict(_) => "CONFLICT",
            AdminError::Submission(err) => err.error_code(),
            AdminError::Approval(_) => "INVALID_TRANSITION",
            AdminError::InFlight(_) => "IN_FLIGHT",
            AdminError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AdminError::Transport(_) => "TRANSPORT_ERROR",
            AdminError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            AdminError::Validation { .. } | AdminError::Submission(_) => Notice::Inline,
            AdminError::Unauthorized(_) => Notice::SessionExpired,
            AdminError::Forbidden(_)
            | AdminError::NotFound(_)
            | AdminError::Conflict(_)
            | AdminError::Approval(_)
            | AdminError::InFlight(_) => Notice::Dismissible,
            AdminError::ServiceUnavailable(_)
            | AdminError::Transport(_)
            | AdminError::InvalidResponse(_) => Notice::RetryPrompt,
        }
    }

    /// Per-field messages, empty unless this is a validation error
    pub fn field_errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            AdminError::Validation { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Map a non-success HTTP status and the service's message onto the taxonomy
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        let message = message.into();
        match status {
            400 | 422 => AdminError::Validation { message, field_errors },
            401 => AdminError::Unauthorized(message),
            403 => AdminError::Forbidden(message),
            404 => AdminError::NotFound(message),
            409 => AdminError::Conflict(message),
            408 | 504 => AdminError::Transport(message),
            500..=599 => AdminError::ServiceUnavailable(message),
            _ => AdminError::InvalidResponse(format!("unexpected status {}: {}", status, message)),
        }
    }

    /// Transport failures while reading shared state are reported as the service being unavailable
    pub fn into_unavailable(self) -> Self {
        match self {
            AdminError::Transport(msg) => AdminError::ServiceUnavailable(msg),
            other => other,
        }
    }
}

// Static constructor methods
impl AdminError {
    pub fn validation(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        AdminError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation error for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.into());
        AdminError::Validation {
            message: format!("Invalid field '{}'", field),
            field_errors,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AdminError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AdminError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AdminError::Unauthorized(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        AdminError::ServiceUnavailable(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        AdminError::InvalidResponse(message.into())
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdminError::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            AdminError::ServiceUnavailable(format!("connection failed: {}", err))
        } else if err.is_decode() {
            AdminError::InvalidResponse(err.to_string())
        } else {
            AdminError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::InvalidResponse(format!("malformed JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_error_taxonomy() {
        let none = HashMap::new;
        assert!(matches!(AdminError::from_status(409, "has children", none()), AdminError::Conflict(_)));
        assert!(matches!(AdminError::from_status(422, "bad", none()), AdminError::Validation { .. }));
        assert!(matches!(AdminError::from_status(401, "expired", none()), AdminError::Unauthorized(_)));
        assert!(matches!(AdminError::from_status(503, "down", none()), AdminError::ServiceUnavailable(_)));
        assert!(matches!(AdminError::from_status(504, "slow", none()), AdminError::Transport(_)));
        assert!(matches!(AdminError::from_status(302, "moved", none()), AdminError::InvalidResponse(_)));
    }

    #[test]
    fn field_error_carries_message() {
        let err = AdminError::field("slug", "Slug is required");
        assert_eq!(err.notice(), Notice::Inline);
        assert_eq!(err.field_errors().unwrap()["slug"], "Slug is required");
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn transport_becomes_unavailable_for_reads() {
        let err = AdminError::Transport("timed out".into()).into_unavailable();
        assert!(matches!(err, AdminError::ServiceUnavailable(_)));
        assert_eq!(err.notice(), Notice::RetryPrompt);
    }
}
