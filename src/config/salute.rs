use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Secret exchanged at the token endpoint for a bearer token.
///
/// Immutable for the lifetime of the process. Debug output is redacted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;

        match v {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            _ => Err(serde::de::Error::custom(
                "expected a string or a number for salute.credentials",
            )),
        }
    }
}

/// Recognition backend configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SaluteConfig {
    /// Secret used to obtain bearer tokens (required, non-empty).
    /// TOML: `salute.credentials`. Env: `SALUTE_CREDENTIALS`.
    #[serde(default)]
    pub credentials: Credentials,

    /// Token scope sent to the token endpoint.
    /// TOML: `salute.scope`. Env: `SALUTE_SCOPE`. Default: `SALUTE_SPEECH_PERS`.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Token endpoint.
    /// TOML: `salute.url_access_token`. Env: `SALUTE_ACCESS_TOKEN_URL`.
    #[serde(default = "default_url_access_token")]
    pub url_access_token: Url,

    /// REST base URL of the recognition backend.
    /// TOML: `salute.url_rest`. Env: `SALUTE_REST_URL`.
    #[serde(default = "default_url_rest")]
    pub url_rest: Url,

    /// Fixed delay between task status queries, in seconds.
    /// TOML: `salute.check_interval`. Env: `SALUTE_CHECK_INTERVAL` or `CHECK_INTERVAL`.
    /// Default: `2.0`.
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,

    /// Max simultaneous outbound calls (token endpoint included).
    /// TOML: `salute.simultaneous_requests`. Env: `SALUTE_SIMULTANEOUS_REQUESTS`. Default: `3`.
    #[serde(default = "default_simultaneous_requests")]
    pub simultaneous_requests: usize,

    /// How long before token expiry the proactive refresh fires, in seconds.
    /// TOML: `salute.token_refresh_margin`. Default: `120`.
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin: u64,

    /// Delay before re-trying a failed scheduled refresh, in seconds.
    /// TOML: `salute.token_retry_delay`. Default: `30`.
    #[serde(default = "default_token_retry_delay")]
    pub token_retry_delay: u64,

    /// Max attempts per outbound call on transient failures (first attempt included).
    /// TOML: `salute.retry_max_attempts`. Default: `5`.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    /// Max total time spent retrying one outbound call, in seconds.
    /// TOML: `salute.retry_max_elapsed`. Default: `30`.
    #[serde(default = "default_retry_max_elapsed")]
    pub retry_max_elapsed: u64,

    /// TCP connect timeout per call, in seconds.
    /// TOML: `salute.connect_timeout`. Default: `10`.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Total timeout per call, in seconds.
    /// TOML: `salute.request_timeout`. Default: `30`.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Optional overall deadline for one job (upload through download), in seconds.
    /// TOML: `salute.job_deadline`. Default: unset (poll until a terminal status).
    #[serde(default)]
    pub job_deadline: Option<u64>,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `salute.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,
}

/// [`SaluteConfig`] with units applied.
#[derive(Debug, Clone)]
pub struct SaluteResolvedConfig {
    pub credentials: Credentials,
    pub scope: String,
    pub url_access_token: Url,
    pub url_rest: Url,
    pub check_interval: Duration,
    pub simultaneous_requests: usize,
    pub token_refresh_margin: Duration,
    pub token_retry_delay: Duration,
    pub retry_max_attempts: usize,
    pub retry_max_elapsed: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub job_deadline: Option<Duration>,
    pub proxy: Option<Url>,
}

impl SaluteConfig {
    pub fn resolve(&self) -> SaluteResolvedConfig {
        SaluteResolvedConfig {
            credentials: self.credentials.clone(),
            scope: self.scope.clone(),
            url_access_token: self.url_access_token.clone(),
            url_rest: self.url_rest.clone(),
            check_interval: Duration::try_from_secs_f64(self.check_interval)
                .unwrap_or_else(|_| Duration::from_secs_f64(default_check_interval())),
            simultaneous_requests: self.simultaneous_requests.max(1),
            token_refresh_margin: Duration::from_secs(self.token_refresh_margin),
            token_retry_delay: Duration::from_secs(self.token_retry_delay.max(1)),
            retry_max_attempts: self.retry_max_attempts.max(1),
            retry_max_elapsed: Duration::from_secs(self.retry_max_elapsed),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            job_deadline: self.job_deadline.map(Duration::from_secs),
            proxy: self.proxy.clone(),
        }
    }
}

impl Default for SaluteConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            scope: default_scope(),
            url_access_token: default_url_access_token(),
            url_rest: default_url_rest(),
            check_interval: default_check_interval(),
            simultaneous_requests: default_simultaneous_requests(),
            token_refresh_margin: default_token_refresh_margin(),
            token_retry_delay: default_token_retry_delay(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_max_elapsed: default_retry_max_elapsed(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            job_deadline: None,
            proxy: None,
        }
    }
}

fn default_scope() -> String {
    "SALUTE_SPEECH_PERS".to_string()
}

fn default_url_access_token() -> Url {
    Url::parse("https://ngw.devices.sberbank.ru:9443/api/v2/oauth")
        .expect("default url_access_token must be a valid URL")
}

fn default_url_rest() -> Url {
    Url::parse("https://smartspeech.sber.ru/rest/v1").expect("default url_rest must be a valid URL")
}

fn default_check_interval() -> f64 {
    2.0
}

fn default_simultaneous_requests() -> usize {
    3
}

fn default_token_refresh_margin() -> u64 {
    120
}

fn default_token_retry_delay() -> u64 {
    30
}

fn default_retry_max_attempts() -> usize {
    5
}

fn default_retry_max_elapsed() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}
