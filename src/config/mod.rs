mod basic;
mod salute;

pub use basic::BasicConfig;
pub use salute::{Credentials, SaluteConfig, SaluteResolvedConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Recognition backend settings (see `salute` table in config.toml).
    #[serde(default)]
    pub salute: SaluteConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// `salute` fields that may be set through `SALUTE_<FIELD>` environment variables.
const SALUTE_ENV_FIELDS: &[&str] = &[
    "credentials",
    "scope",
    "url_access_token",
    "url_rest",
    "check_interval",
    "simultaneous_requests",
    "token_refresh_margin",
    "token_retry_delay",
    "retry_max_attempts",
    "retry_max_elapsed",
    "connect_timeout",
    "request_timeout",
    "job_deadline",
    "proxy",
];

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and the environment.
    ///
    /// Environment keys: `LOGLEVEL`, `CHECK_INTERVAL` and `SALUTE_*` (`SALUTE_ACCESS_TOKEN_URL`
    /// and `SALUTE_REST_URL` are accepted as aliases of the `url_*` fields).
    /// `SALUTE_CHECK_INTERVAL` wins over the unprefixed `CHECK_INTERVAL`.
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment
            .merge(Env::raw().only(&["loglevel"]).map(|_| "basic.loglevel".into()))
            .merge(
                Env::raw()
                    .only(&["check_interval"])
                    .map(|_| "salute.check_interval".into()),
            )
            .merge(Env::prefixed("SALUTE_").filter_map(|key| {
                let key = key.as_str().to_ascii_lowercase();
                let field = match key.as_str() {
                    "access_token_url" => "url_access_token",
                    "rest_url" => "url_rest",
                    other => SALUTE_ENV_FIELDS.iter().copied().find(|f| *f == other)?,
                };
                Some(format!("salute.{field}").into())
            }))
    }

    pub fn extract() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Loads configuration and validates required fields.
    pub fn load() -> Self {
        let cfg = Self::extract()
            .unwrap_or_else(|err| panic!("failed to extract configuration: {err}"));
        if cfg.salute.credentials.is_empty() {
            panic!("salute.credentials (SALUTE_CREDENTIALS) must be set and non-empty");
        }
        cfg
    }

    pub fn salute(&self) -> SaluteResolvedConfig {
        self.salute.resolve()
    }
}
