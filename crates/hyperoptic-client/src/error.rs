//! Error types for portal API calls

/// Errors from portal API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No valid token could be obtained, or the API rejected a fresh one.
    #[error(transparent)]
    Auth(#[from] hyperoptic_auth::Error),

    /// The API answered with an error status (anything >= 400 except the
    /// 401 the request guard already dealt with).
    #[error("HTTP {status}: {message} ({url})")]
    Api {
        status: u16,
        message: String,
        url: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status of an API error, if this is one.
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for portal API calls.
pub type Result<T> = std::result::Result<T, Error>;
