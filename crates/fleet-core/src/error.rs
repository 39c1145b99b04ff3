use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Conflict,
    Unavailable,
    Upstream,
    Internal,
}

#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct FleetError {
    pub code: ErrorCode,
    pub message: String,
}

impl FleetError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
