// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

use http_client::HttpError;

use crate::shared::types::PrincipalKind;

/// A required option is missing or invalid. Fatal to the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {0:?} does not exist or could not be read: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("could not parse config file {0:?}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
    #[error("environment variable {var} has invalid value {value:?}")]
    Env { var: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("{principal} uses password credentials but no uaa_url is configured")]
    NoTokenIssuer { principal: PrincipalKind },
    #[error("requesting token: {0}")]
    Token(#[from] HttpError),
    #[error("token issuer returned token type {0:?}, expected bearer")]
    UnexpectedTokenType(String),
}

/// Failure to leave a principal scope normally.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("entering scope: {0}")]
    Acquire(#[source] IdentityError),
    #[error("scope exceeded its budget of {after:?}")]
    TimedOut { after: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error(transparent)]
    Store(#[from] fixture_store::StoreError),
    #[error("listing resources: {0}")]
    Listing(#[from] HttpError),
    #[error("listing resources: {0}")]
    Scope(#[from] ScopeError),
    #[error("no source configured for {0} queries")]
    NoSource(&'static str),
    #[error("query timed out after {after:?}")]
    TimedOut { after: Duration },
}

/// A case could not start measuring. Fatal to that case only.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("resolving fixtures for {query}: {source}")]
    Fixtures {
        query: String,
        #[source]
        source: FixtureError,
    },
    #[error("no fixtures found for {query}, at least one is required")]
    EmptyFixtureSet { query: String },
    #[error("request template refers to fixture slot {slot} but only {available} were resolved")]
    MissingFixtureSlot { slot: usize, available: usize },
    #[error("establishing {principal} session: {source}")]
    Identity {
        principal: PrincipalKind,
        #[source]
        source: IdentityError,
    },
}

/// The suite could not be assembled. Fatal to the whole run.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("building http client: {0}")]
    Client(#[from] HttpError),
    #[error(transparent)]
    Store(#[from] fixture_store::OpenError),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{0:?} is not a valid directory")]
    NotADirectory(PathBuf),
    #[error("writing csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("pushing metrics: {0}")]
    Prometheus(#[from] prometheus::Error),
}
