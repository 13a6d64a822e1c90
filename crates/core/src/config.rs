use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DRAFT_PATH: &str = ".emovox-draft.json";
pub const ENV_API_URL: &str = "EMOVOX_API_URL";
pub const ENV_STAGE_TIMEOUT_SECS: &str = "EMOVOX_STAGE_TIMEOUT_SECS";
pub const ENV_DRAFT_PATH: &str = "EMOVOX_DRAFT_PATH";

/// Base URL of the story server. The `/api/...` routes are joined onto it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiBaseUrl(String);

impl ApiBaseUrl {
    pub fn new(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyApiUrl);
        }
        let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidApiUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url.as_str().trim_end_matches('/').to_owned())),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiBaseUrl {
    fn default() -> Self {
        Self(DEFAULT_API_URL.to_owned())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageTimeout {
    pub secs: u64,
}

impl StageTimeout {
    /// `0` disables the idle timeout.
    pub fn new(secs: u64) -> Self {
        Self { secs }
    }

    pub fn duration(&self) -> Option<Duration> {
        (self.secs > 0).then(|| Duration::from_secs(self.secs))
    }
}

impl Default for StageTimeout {
    fn default() -> Self {
        Self {
            secs: DEFAULT_STAGE_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: ApiBaseUrl,
    pub request_timeout: Duration,
    pub stage_timeout: StageTimeout,
    pub draft_path: PathBuf,
}

impl ClientConfig {
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        self.request_timeout = Duration::from_secs(secs);
        Ok(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: ApiBaseUrl::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stage_timeout: StageTimeout::default(),
            draft_path: PathBuf::from(DEFAULT_DRAFT_PATH),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api url must not be empty")]
    EmptyApiUrl,
    #[error("invalid api url: {0}")]
    InvalidApiUrl(String),
    #[error("api url scheme must be http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("request timeout must be > 0 s")]
    ZeroRequestTimeout,
    #[error("invalid value for {key}: {value}")]
    InvalidNumber { key: String, value: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_u64_with_default(
    cli_value: Option<u64>,
    env_key: &str,
    env: &impl Env,
    default: u64,
) -> Result<u64, ConfigError> {
    match cli_value {
        Some(v) => Ok(v),
        None => match env.var(env_key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: env_key.to_owned(),
                    value: raw,
                }),
            None => Ok(default),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_API_URL, "http://env:5000");
        let v = resolve_string_with_default(
            Some("http://cli:5000".to_owned()),
            ENV_API_URL,
            &env,
            DEFAULT_API_URL,
        );
        assert_eq!(v, "http://cli:5000");
    }

    #[test]
    fn api_url_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_API_URL, "http://env:5000");
        let v = resolve_string_with_default(None, ENV_API_URL, &env, DEFAULT_API_URL);
        assert_eq!(v, "http://env:5000");
    }

    #[test]
    fn api_url_default_used_when_both_missing() {
        let env = MapEnv::default();
        let v = resolve_string_with_default(None, ENV_API_URL, &env, DEFAULT_API_URL);
        assert_eq!(v, DEFAULT_API_URL);
    }

    #[test]
    fn api_base_rejects_non_http_schemes() {
        assert_eq!(
            ApiBaseUrl::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme("ftp".to_owned()))
        );
        assert_eq!(ApiBaseUrl::new("   "), Err(ConfigError::EmptyApiUrl));
        assert!(matches!(
            ApiBaseUrl::new("not a url"),
            Err(ConfigError::InvalidApiUrl(_))
        ));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let base = ApiBaseUrl::new("http://localhost:5000/").expect("valid");
        assert_eq!(
            base.endpoint("/api/story"),
            "http://localhost:5000/api/story"
        );
        let nested = ApiBaseUrl::new("https://host/emovox").expect("valid");
        assert_eq!(nested.endpoint("api/story"), "https://host/emovox/api/story");
    }

    #[test]
    fn stage_timeout_zero_disables() {
        assert_eq!(StageTimeout::new(0).duration(), None);
        assert_eq!(
            StageTimeout::new(5).duration(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn u64_env_must_parse() {
        let env = MapEnv::default().with_var(ENV_STAGE_TIMEOUT_SECS, "soon");
        let err = resolve_u64_with_default(None, ENV_STAGE_TIMEOUT_SECS, &env, 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let env = MapEnv::default().with_var(ENV_STAGE_TIMEOUT_SECS, " 42 ");
        assert_eq!(
            resolve_u64_with_default(None, ENV_STAGE_TIMEOUT_SECS, &env, 1),
            Ok(42)
        );
        assert_eq!(
            resolve_u64_with_default(Some(7), ENV_STAGE_TIMEOUT_SECS, &env, 1),
            Ok(7)
        );
    }

    #[test]
    fn zero_request_timeout_rejected() {
        assert_eq!(
            ClientConfig::default().with_request_timeout_secs(0),
            Err(ConfigError::ZeroRequestTimeout)
        );
    }
}
