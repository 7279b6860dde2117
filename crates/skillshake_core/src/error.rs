//! crates/skillshake_core/src/error.rs
//!
//! Error type returned by the booking lifecycle and catalog operations.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A payment was already recorded for this session.
    #[error("Session {0} is already paid")]
    AlreadyPaid(String),

    /// The requested transition is not legal from the current state.
    #[error("{0}")]
    InvalidState(String),

    /// Required input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The store failed in an unexpected way. The message is for logs only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::AlreadyPaid(_) => "ALREADY_PAID",
            BookingError::InvalidState(_) => "INVALID_STATE",
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        BookingError::Validation(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        BookingError::InvalidState(msg.into())
    }
}

impl From<PortError> for BookingError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => BookingError::NotFound(what),
            PortError::Conflict(what) => BookingError::Validation(what),
            PortError::Unexpected(msg) => BookingError::Internal(msg),
        }
    }
}

/// A convenience type alias for `Result<T, BookingError>`.
pub type BookingResult<T> = Result<T, BookingError>;
