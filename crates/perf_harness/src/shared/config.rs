// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::info;
use url::Url;

use crate::error::ConfigError;
use crate::shared::types::{BudgetKind, PageSize, PrincipalKind, SampleCount};

pub const SAMPLES_ENV_VAR: &str = "PERF_SAMPLES";

fn get_default_basic_timeout() -> Duration {
    Duration::from_secs(30)
}

fn get_default_long_timeout() -> Duration {
    Duration::from_secs(120)
}

fn get_default_sample_count() -> SampleCount {
    SampleCount::get_default()
}

fn get_default_page_size() -> PageSize {
    PageSize::get_default()
}

fn get_default_name_prefix() -> String {
    String::from("perf")
}

fn get_default_fixture_pick() -> usize {
    50
}

fn get_default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn get_default_pushgateway() -> String {
    String::from("localhost:9091")
}

/// How a principal authenticates. Either a user/password pair exchanged for a
/// token at the UAA, or a token issued ahead of time.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Password { username: String, password: String },
    Token { token: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
        }
    }
}

// Secrets never end up in config dumps.
impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Credentials::Password { username, .. } => {
                let mut s = serializer.serialize_struct("Credentials", 2)?;
                s.serialize_field("username", username)?;
                s.serialize_field("password", "<redacted>")?;
                s.end()
            }
            Credentials::Token { .. } => {
                let mut s = serializer.serialize_struct("Credentials", 1)?;
                s.serialize_field("token", "<redacted>")?;
                s.end()
            }
        }
    }
}

mod humantime_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: Url,

    #[serde(default)]
    pub uaa_url: Option<Url>,

    pub admin: Credentials,

    pub regular_user: Credentials,

    #[serde(default = "get_default_basic_timeout", with = "humantime_str")]
    pub basic_timeout: Duration,

    #[serde(default = "get_default_long_timeout", with = "humantime_str")]
    pub long_timeout: Duration,

    #[serde(default = "get_default_sample_count")]
    pub samples: SampleCount,

    #[serde(default = "get_default_page_size")]
    pub large_page_size: PageSize,

    #[serde(default = "get_default_name_prefix")]
    pub name_prefix: String,

    pub ccdb_path: PathBuf,

    #[serde(default = "get_default_fixture_pick")]
    pub fixture_pick: usize,

    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default = "get_default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default = "get_default_pushgateway")]
    pub pushgateway_url: String,
}

impl Config {
    pub fn budget(&self, kind: BudgetKind) -> Duration {
        match kind {
            BudgetKind::Basic => self.basic_timeout,
            BudgetKind::Long => self.long_timeout,
        }
    }

    pub fn credentials(&self, kind: PrincipalKind) -> &Credentials {
        match kind {
            PrincipalKind::Admin => &self.admin,
            PrincipalKind::RegularUser => &self.regular_user,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.api_url.scheme(), "http" | "https") || self.api_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api_url must be an http(s) url, got {}",
                self.api_url
            )));
        }

        if self.samples.0 == 0 {
            return Err(ConfigError::Invalid("samples must be at least 1".into()));
        }

        if !self.large_page_size.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "large_page_size {} is out of range",
                self.large_page_size
            )));
        }

        if self.basic_timeout.is_zero() || self.long_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }

        if self.fixture_pick == 0 {
            return Err(ConfigError::Invalid("fixture_pick must be at least 1".into()));
        }

        // The prefix ends up in LIKE patterns, so wildcard characters are not allowed.
        let prefix_pattern = Regex::new("^[A-Za-z0-9][A-Za-z0-9-]*$")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !prefix_pattern.is_match(&self.name_prefix) {
            return Err(ConfigError::Invalid(format!(
                "name_prefix {:?} may only contain letters, digits and dashes",
                self.name_prefix
            )));
        }

        for kind in [PrincipalKind::Admin, PrincipalKind::RegularUser] {
            if matches!(self.credentials(kind), Credentials::Password { .. })
                && self.uaa_url.is_none()
            {
                return Err(ConfigError::Invalid(format!(
                    "{kind} uses password credentials, which requires uaa_url"
                )));
            }
        }

        Ok(())
    }
}

/// Parse and validate config text, applying environment overrides looked up through `env`.
pub fn parse_config(
    contents: &str,
    source: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(contents)
        .map_err(|e| ConfigError::Parse(source.to_owned(), e))?;

    if let Some(samples) = env(SAMPLES_ENV_VAR) {
        let count: usize = samples.parse().map_err(|_| ConfigError::Env {
            var: SAMPLES_ENV_VAR,
            value: samples.clone(),
        })?;
        info!("Overriding config.samples via env variable to {count}");
        config.samples = SampleCount(count);
    }

    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
    parse_config(&contents, path, |var| std::env::var(var).ok())
}
