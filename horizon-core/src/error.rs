//! Error types for fetches and the preference store.

use thiserror::Error;

/// Failure of a single fetch against the upstream API.
///
/// The variants are mutually exclusive and identical for both feeds, except
/// that only place-name weather lookups produce `NotFound`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("place not found")]
    NotFound,

    #[error("upstream returned status {0}")]
    UpstreamError(u16),

    #[error("empty response body")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Fixed, human-readable text shown to the user for this kind of failure.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::InvalidRequest(_) => "Invalid request. Please try again.".to_string(),
            FetchError::TransportFailure(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            FetchError::NotFound => {
                "City not found. Please ensure you have entered a valid city.".to_string()
            }
            FetchError::UpstreamError(code) => format!("Server error with status code: {code}"),
            FetchError::EmptyResponse => "No data received. Please try again.".to_string(),
            FetchError::MalformedResponse(_) => "Failed to parse data. Please try again.".to_string(),
        }
    }

    /// True when the failure says something about the query itself rather
    /// than about reaching the service.
    pub fn is_request_specific(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

/// Errors raised by the preference store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
