//! Shared types for the Hyperoptic portal crates
//!
//! Holds the pieces every crate needs but none owns: the `Secret` wrapper
//! used for the account password, environment helpers, and the configuration
//! error type raised while resolving settings from files and the environment.

mod env;
mod error;
mod secret;

pub use env::{env_u64, env_var, require_env};
pub use error::{Error, Result};
pub use secret::Secret;
