use crate::archive::Credentials;

use hyper::http::Uri;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// INI file with everything in its `[DEFAULT]` section
pub const DEFAULT_CONFIG_PATH: &str = "config.ini";

/// Environment variables `LOOKUP_<KEY>` override config file values
pub const ENV_PREFIX: &str = "LOOKUP";

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "required value: `{key}` is missing from {} and is not defined as an environment variable {}_{}",
        .path.display(),
        ENV_PREFIX,
        .key.to_uppercase()
    )]
    Missing { key: &'static str, path: PathBuf },
    #[error(r#"permalink "{permalink}" must be an absolute http(s) URL"#)]
    InvalidPermalink { permalink: String },
    #[error(r#"log_level "{0}" is not one of error, warn, info, debug, trace"#)]
    InvalidLogLevel(String),
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub permalink: Uri,
    pub credentials: Credentials,
    pub log_level: log::Level,
    pub timeout: Duration,
}

impl Config {
    fn default_log_level() -> log::Level {
        log::Level::Warn
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)
    }
}

#[derive(Deserialize, Default)]
struct ConfigValues {
    permalink: Option<String>,
    user: Option<String>,
    key: Option<String>,
    log_level: Option<String>,
    timeout: Option<TimeoutConfig>,
}

impl ConfigValues {
    fn or(self, fallback: Self) -> Self {
        Self {
            permalink: self.permalink.or(fallback.permalink),
            user: self.user.or(fallback.user),
            key: self.key.or(fallback.key),
            log_level: self.log_level.or(fallback.log_level),
            timeout: self.timeout.or(fallback.timeout),
        }
    }
}

#[derive(Deserialize)]
#[serde(from = "NonZeroU64")]
struct TimeoutConfig(Duration);

impl From<NonZeroU64> for TimeoutConfig {
    fn from(value: NonZeroU64) -> Self {
        Self(Duration::from_secs(value.get()))
    }
}

pub struct ConfigResolver {
    path: PathBuf,
    env: Option<HashMap<String, String>>,
}

impl ConfigResolver {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), env: None }
    }

    /// Use the given variables instead of the process environment
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(self.path.as_path()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(self.env.clone()))
            .build()?;
        let default = Self::default_section(&settings)?;
        let values = settings.try_deserialize::<ConfigValues>()?.or(default);

        let permalink = self.required("permalink", values.permalink)?;
        let user = self.required("user", values.user)?;
        let key = self.required("key", values.key)?;

        let permalink = match permalink.parse::<Uri>() {
            Ok(uri) if uri.scheme().is_some() && uri.authority().is_some() => uri,
            _ => return Err(ConfigError::InvalidPermalink { permalink }),
        };

        Ok(Config {
            permalink,
            credentials: Credentials::new(user, key),
            log_level: match values.log_level {
                Some(level) => level
                    .parse()
                    .map_err(|_| ConfigError::InvalidLogLevel(level))?,
                None => Config::default_log_level(),
            },
            timeout: values
                .timeout
                .map(|timeout| timeout.0)
                .unwrap_or_else(Config::default_timeout),
        })
    }

    /// INI files written for Python's configparser keep everything in the `[DEFAULT]` section,
    /// the top level and the environment take precedence over it
    fn default_section(settings: &config::Config) -> Result<ConfigValues, ConfigError> {
        for section in ["DEFAULT", "default"] {
            match settings.get::<ConfigValues>(section) {
                Ok(values) => return Ok(values),
                Err(config::ConfigError::NotFound(_)) => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(ConfigValues::default())
    }

    fn required(&self, key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
        value
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key,
                path: self.path.clone(),
            })
    }
}

pub fn parse_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    ConfigResolver::new(path.as_ref()).resolve()
}
