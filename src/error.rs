use axum::http::StatusCode;
use thiserror::Error;

use crate::constants::{BACKEND_FAILED, METHOD_NOT_ALLOWED};

/// Failure of a single text-generation call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend timeout: {0}")]
    Timeout(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("backend invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Timeouts and unavailability may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }
}

/// Everything that can go wrong while answering a formula request.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("{0}")]
    ClientInput(&'static str),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl FormulaError {
    pub fn status(&self) -> StatusCode {
        match self {
            FormulaError::ClientInput(_) => StatusCode::BAD_REQUEST,
            FormulaError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            FormulaError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The text returned to the caller. Backend detail never appears here.
    pub fn client_message(&self) -> &'static str {
        match self {
            FormulaError::ClientInput(message) => *message,
            FormulaError::MethodNotAllowed => METHOD_NOT_ALLOWED,
            FormulaError::Backend(_) => BACKEND_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROMPT_REQUIRED;

    #[test]
    fn only_timeouts_and_outages_are_transient() {
        assert!(BackendError::Unavailable("503".into()).is_transient());
        assert!(BackendError::Timeout("30s".into()).is_transient());
        assert!(!BackendError::Rejected("bad key".into()).is_transient());
        assert!(!BackendError::InvalidResponse("no candidates".into()).is_transient());
    }

    #[test]
    fn status_and_message_per_kind() {
        let input = FormulaError::ClientInput(PROMPT_REQUIRED);
        assert_eq!(input.status(), StatusCode::BAD_REQUEST);
        assert_eq!(input.client_message(), "Prompt is required");

        let method = FormulaError::MethodNotAllowed;
        assert_eq!(method.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(method.client_message(), "Method Not Allowed");

        let backend = FormulaError::from(BackendError::Rejected("API key not valid".into()));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.client_message(), "Failed to get formula from AI");
        assert!(backend.to_string().contains("API key not valid"));
    }
}
