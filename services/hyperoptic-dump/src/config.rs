//! Configuration types and loading
//!
//! Precedence: CLI args > env vars > config file > defaults.
//! The password is never stored in the TOML directly; the file may name a
//! `password_file` instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use hyperoptic_auth::AuthConfig;
use hyperoptic_auth::config::{ENV_EMAIL, ENV_PASSWORD};
use hyperoptic_client::API_BASE_URL;
use hyperoptic_client::client::DEFAULT_API_TIMEOUT;
use serde::Deserialize;

pub const ENV_CONFIG_PATH: &str = "HYPEROPTIC_CONFIG";
pub const ENV_API_BASE_URL: &str = "HYPEROPTIC_API_BASE_URL";

pub const USAGE: &str = "usage: hyperoptic-dump [--config <path>] [<email> <password>]";

/// Optional TOML file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub api: ApiSection,
}

/// `[auth]`: authorization server overrides and the account
#[derive(Debug, Default, Deserialize)]
pub struct AuthSection {
    pub email: Option<String>,
    /// File whose trimmed content is the password
    pub password_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_skew_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// `[api]`: account service overrides
#[derive(Debug, Default, Deserialize)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&contents)?;

        if config.auth.timeout_secs == Some(0) || config.api.timeout_secs == Some(0) {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(url) = &config.api.base_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {url}"
            )));
        }
        Ok(config)
    }

    /// Password from `password_file`. An empty file counts as unset.
    fn password(&self) -> common::Result<Option<Secret<String>>> {
        let Some(path) = &self.auth.password_file else {
            return Ok(None);
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            common::Error::Config(format!(
                "failed to read password_file {}: {e}",
                path.display()
            ))
        })?;
        let password = raw.trim();
        Ok((!password.is_empty()).then(|| Secret::new(password.to_owned())))
    }
}

/// Parsed command line.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub email: Option<String>,
    pub password: Option<Secret<String>>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> common::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = CliArgs::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args
                    .next()
                    .ok_or_else(|| common::Error::Config("--config needs a path".into()))?;
                cli.config_path = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--config=") {
                cli.config_path = Some(PathBuf::from(path));
            } else if arg.starts_with("--") {
                return Err(common::Error::Config(format!("unknown option {arg}\n{USAGE}")));
            } else {
                positional.push(arg);
            }
        }

        match positional.len() {
            0 => {}
            2 => {
                let password = positional.pop().map(Secret::new);
                cli.email = positional.pop();
                cli.password = password;
            }
            _ => {
                return Err(common::Error::Config(format!(
                    "expected both <email> and <password>\n{USAGE}"
                )));
            }
        }
        Ok(cli)
    }
}

/// Fully resolved settings for one dump run.
#[derive(Debug)]
pub struct DumpConfig {
    pub auth: AuthConfig,
    pub api_base_url: String,
    pub api_timeout: Duration,
}

impl DumpConfig {
    /// Merge the config file (from `--config` or `HYPEROPTIC_CONFIG`), the
    /// environment and the command line.
    pub fn resolve(cli: CliArgs) -> common::Result<Self> {
        let path = cli
            .config_path
            .or_else(|| common::env_var(ENV_CONFIG_PATH).map(PathBuf::from));
        let file = match &path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let file_password = file.password()?.unwrap_or_else(|| Secret::new(String::new()));
        let mut auth = AuthConfig::new(file.auth.email.clone().unwrap_or_default(), file_password);
        if let Some(url) = &file.auth.base_url {
            auth.auth_base_url = url.clone();
        }
        if let Some(client_id) = &file.auth.client_id {
            auth.client_id = client_id.clone();
        }
        if let Some(redirect) = &file.auth.redirect_uri {
            auth.redirect_uri = redirect.clone();
        }
        if let Some(secs) = file.auth.token_skew_secs {
            auth.access_skew = Duration::from_secs(secs);
        }
        if let Some(secs) = file.auth.timeout_secs {
            auth.request_timeout = Duration::from_secs(secs);
        }

        let mut auth = auth.apply_env()?;

        if let (Some(email), Some(password)) = (cli.email, cli.password) {
            auth.email = email;
            auth.password = password;
        }

        if auth.email.trim().is_empty() || auth.password.is_empty() {
            return Err(common::Error::Config(format!(
                "missing credentials: pass <email> <password> or set {ENV_EMAIL} and {ENV_PASSWORD}\n{USAGE}"
            )));
        }
        auth.validate()?;

        let api_base_url = common::env_var(ENV_API_BASE_URL)
            .or(file.api.base_url)
            .unwrap_or_else(|| API_BASE_URL.to_string());
        let api_timeout = file
            .api
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_API_TIMEOUT);

        Ok(DumpConfig {
            auth,
            api_base_url,
            api_timeout,
        })
    }
}
