use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default quiet period before an authenticated session is force-closed.
const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Default budget for one profile backend attempt.
const DEFAULT_PROFILE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Default retry budget after a failing attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Window within which raw activity signals collapse into one reset.
const DEFAULT_ACTIVITY_COALESCE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} could not be parsed: {message}")]
    Parse { key: &'static str, message: String },

    #[error("{0}")]
    Invalid(String),
}

/// Tunable parameters of the session lifecycle manager. `Default` carries
/// the production constants; deployments override through the environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub inactivity_timeout: Duration,
    pub profile_fetch_timeout: Duration,
    pub max_retries: u32,
    pub activity_coalesce_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            profile_fetch_timeout: DEFAULT_PROFILE_FETCH_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            activity_coalesce_window: DEFAULT_ACTIVITY_COALESCE_WINDOW,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            inactivity_timeout: Duration::from_secs(get_env_parsed(
                "SESSION_INACTIVITY_TIMEOUT_SECS",
                DEFAULT_INACTIVITY_TIMEOUT.as_secs(),
            )?),
            profile_fetch_timeout: Duration::from_secs(get_env_parsed(
                "SESSION_PROFILE_FETCH_TIMEOUT_SECS",
                DEFAULT_PROFILE_FETCH_TIMEOUT.as_secs(),
            )?),
            max_retries: get_env_parsed("SESSION_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            activity_coalesce_window: Duration::from_millis(get_env_parsed(
                "SESSION_ACTIVITY_COALESCE_WINDOW_MS",
                DEFAULT_ACTIVITY_COALESCE_WINDOW.as_millis() as u64,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "SESSION_INACTIVITY_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.profile_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "SESSION_PROFILE_FETCH_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "SESSION_MAX_RETRIES must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn get_env_parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::Parse {
            key,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
