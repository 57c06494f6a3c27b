//! Error types for authentication operations
//!
//! Failures inside one grant strategy are `Http`, `TokenEndpoint`,
//! `InvalidResponse` or `BrowserFlow`. The session swallows those and only
//! surfaces `Authentication` once every strategy is exhausted. No variant
//! ever carries the account password.

/// Errors from authentication operations.
///
/// `Clone` so that callers waiting on an in-flight login can receive the
/// same failure as the caller that ran it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {}", .code.as_deref().unwrap_or("no error code"))]
    TokenEndpoint {
        status: u16,
        code: Option<String>,
        description: Option<String>,
    },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("browser login flow failed: {0}")]
    BrowserFlow(String),

    #[error("authentication failed: {detail}")]
    Authentication {
        status: Option<u16>,
        code: Option<String>,
        detail: String,
    },
}

impl Error {
    /// Wrap the last strategy failure as the terminal `Authentication` error,
    /// keeping its HTTP status and server error code for diagnosis.
    pub fn exhausted(last: Option<Error>) -> Self {
        match last {
            Some(Error::TokenEndpoint {
                status,
                code,
                description,
            }) => {
                let detail = match (&code, description) {
                    (Some(code), Some(desc)) => format!("token endpoint {status}: {code} ({desc})"),
                    (Some(code), None) => format!("token endpoint {status}: {code}"),
                    (None, _) => format!("token endpoint {status}"),
                };
                Error::Authentication {
                    status: Some(status),
                    code,
                    detail,
                }
            }
            Some(already @ Error::Authentication { .. }) => already,
            Some(other) => Error::Authentication {
                status: None,
                code: None,
                detail: other.to_string(),
            },
            None => Error::Authentication {
                status: None,
                code: None,
                detail: "no grant strategy available".into(),
            },
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenEndpoint { status, .. } => Some(*status),
            Error::Authentication { status, .. } => *status,
            _ => None,
        }
    }

    /// Authorization server error code (`invalid_grant`, ...), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::TokenEndpoint { code, .. } | Error::Authentication { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_keeps_status_and_code() {
        let last = Error::TokenEndpoint {
            status: 400,
            code: Some("invalid_grant".into()),
            description: Some("Invalid user credentials".into()),
        };
        let err = Error::exhausted(Some(last));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.code(), Some("invalid_grant"));
        assert_eq!(
            err.to_string(),
            "authentication failed: token endpoint 400: invalid_grant (Invalid user credentials)"
        );
    }

    #[test]
    fn exhausted_wraps_transport_failures() {
        let err = Error::exhausted(Some(Error::Http("connection refused".into())));
        assert!(matches!(err, Error::Authentication { status: None, .. }));
        assert!(err.to_string().contains("connection refused"), "got: {err}");
    }

    #[test]
    fn token_endpoint_display_without_code() {
        let err = Error::TokenEndpoint {
            status: 502,
            code: None,
            description: None,
        };
        assert_eq!(err.to_string(), "token endpoint returned 502: no error code");
    }
}
