//! Environment variable helpers

use crate::error::{Error, Result};

/// Read an optional environment variable, treating blank values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a required environment variable.
pub fn require_env(name: &'static str) -> Result<String> {
    env_var(name).ok_or(Error::MissingEnv(name))
}

/// Read an optional environment variable and parse it as `u64`.
pub fn env_u64(name: &'static str) -> Result<Option<u64>> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidEnv {
                name,
                reason: format!("{raw:?} is not an unsigned integer: {e}"),
            }),
    }
}
