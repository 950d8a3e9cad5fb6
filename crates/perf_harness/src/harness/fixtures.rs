// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering the identifiers that parameterize a case's requests.
//!
//! Identifiers come from two places: read-only queries against the controller database, and
//! the first page of an API listing fetched as one of the run's principals. A [`Selector`]
//! then narrows the candidates down to the number a case asked for.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use fixture_store::Connection;
use http_client::{BaseApiClient, RequestId};

use crate::error::{FixtureError, SetupError};
use crate::harness::identity::{IdentityScope, Principals};
use crate::harness::request::EndpointRequest;
use crate::shared::types::PrincipalKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FixtureQuery {
    /// A single-column SELECT with positional parameters.
    Database {
        statement: String,
        params: Vec<String>,
    },
    /// The `guid`s on the first page of a listing endpoint.
    Listing {
        path: String,
        principal: PrincipalKind,
    },
}

impl FixtureQuery {
    pub fn database(statement: &str, params: Vec<String>) -> Self {
        Self::Database {
            statement: statement.to_owned(),
            params,
        }
    }

    pub fn listing(path: &str, principal: PrincipalKind) -> Self {
        Self::Listing {
            path: path.to_owned(),
            principal,
        }
    }
}

impl fmt::Display for FixtureQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { statement, params } if params.is_empty() => {
                write!(f, "`{statement}`")
            }
            Self::Database { statement, params } => write!(f, "`{statement}` with {params:?}"),
            Self::Listing { path, principal } => write!(f, "GET {path} {}", principal.context()),
        }
    }
}

/// What a case needs: a query, how many of its results to keep, and whether an empty
/// result is acceptable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureSpec {
    pub query: FixtureQuery,
    pub pick: usize,
    pub required: bool,
}

impl FixtureSpec {
    /// At least one identifier must be found.
    pub fn required(query: FixtureQuery, pick: usize) -> Self {
        Self {
            query,
            pick,
            required: true,
        }
    }

    pub fn optional(query: FixtureQuery, pick: usize) -> Self {
        Self {
            query,
            pick,
            required: false,
        }
    }
}

/// Resolved identifiers. Possibly empty; emptiness is the caller's call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureSet {
    query: FixtureQuery,
    ids: Vec<String>,
}

impl FixtureSet {
    pub fn new(query: FixtureQuery, ids: Vec<String>) -> Self {
        Self { query, ids }
    }

    pub fn query(&self) -> &FixtureQuery {
        &self.query
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn require_non_empty(self) -> Result<Self, SetupError> {
        if self.is_empty() {
            return Err(SetupError::EmptyFixtureSet {
                query: self.query.to_string(),
            });
        }
        Ok(self)
    }
}

#[async_trait::async_trait]
pub trait FixtureSource {
    /// All candidates for `query`, in the source's order.
    async fn fetch(&self, query: &FixtureQuery) -> Result<Vec<String>, FixtureError>;
}

/// Answers [`FixtureQuery::Database`] from the controller database.
#[derive(Clone)]
pub struct DatabaseSource {
    conn: Connection,
}

impl DatabaseSource {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl FixtureSource for DatabaseSource {
    async fn fetch(&self, query: &FixtureQuery) -> Result<Vec<String>, FixtureError> {
        match query {
            FixtureQuery::Database { statement, params } => Ok(fixture_store::select_strings(
                &self.conn,
                statement.clone(),
                params.clone(),
            )
            .await?),
            FixtureQuery::Listing { .. } => Err(FixtureError::NoSource("listing")),
        }
    }
}

#[derive(Deserialize)]
struct ListingPage {
    resources: Vec<ListedResource>,
}

#[derive(Deserialize)]
struct ListedResource {
    guid: String,
}

/// Answers [`FixtureQuery::Listing`] by fetching the listing as the query's principal.
pub struct ListingSource {
    client: BaseApiClient,
    api_url: Url,
    identity: IdentityScope,
    principals: Arc<Principals>,
    budget: Duration,
}

impl ListingSource {
    pub fn new(
        client: BaseApiClient,
        api_url: Url,
        identity: IdentityScope,
        principals: Arc<Principals>,
        budget: Duration,
    ) -> Self {
        Self {
            client,
            api_url,
            identity,
            principals,
            budget,
        }
    }
}

#[async_trait::async_trait]
impl FixtureSource for ListingSource {
    async fn fetch(&self, query: &FixtureQuery) -> Result<Vec<String>, FixtureError> {
        let FixtureQuery::Listing { path, principal } = query else {
            return Err(FixtureError::NoSource("database"));
        };
        let url = EndpointRequest::from_path(path).to_url(&self.api_url);
        let principal = self.principals.get(*principal);

        let page: ListingPage = self
            .identity
            .with_principal(principal, self.budget, |session| async move {
                let headers = [
                    session.authorization_header(),
                    RequestId::new_unique_with_prefix("perftest-fixture").header(),
                    ("Accept".to_owned(), "application/json".to_owned()),
                ];
                self.client
                    .json_get::<ListingPage>(url.as_str(), &headers)
                    .await
            })
            .await??;

        Ok(page.resources.into_iter().map(|r| r.guid).collect())
    }
}

/// Narrows candidates down to at most `pick`.
pub trait Selector {
    fn select(&mut self, candidates: Vec<String>, pick: usize) -> Vec<String>;
}

/// Uniform choice without replacement. Reproducible when seeded.
pub struct SeededSelector {
    rng: StdRng,
}

impl SeededSelector {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl Selector for SeededSelector {
    fn select(&mut self, candidates: Vec<String>, pick: usize) -> Vec<String> {
        candidates
            .choose_multiple(&mut self.rng, pick)
            .cloned()
            .collect()
    }
}

/// Keeps the first `pick` candidates in source order.
#[derive(Debug, Default)]
pub struct FirstN;

impl Selector for FirstN {
    fn select(&mut self, candidates: Vec<String>, pick: usize) -> Vec<String> {
        candidates.into_iter().take(pick).collect()
    }
}

pub struct FixtureResolver {
    database: Arc<dyn FixtureSource + Send + Sync>,
    listing: Arc<dyn FixtureSource + Send + Sync>,
    selector: Box<dyn Selector + Send>,
    budget: Duration,
}

impl FixtureResolver {
    pub fn new(
        database: Arc<dyn FixtureSource + Send + Sync>,
        listing: Arc<dyn FixtureSource + Send + Sync>,
        selector: Box<dyn Selector + Send>,
        budget: Duration,
    ) -> Self {
        Self {
            database,
            listing,
            selector,
            budget,
        }
    }

    /// Fetch and narrow one fixture set. An empty result is an error only for required specs.
    pub async fn resolve(&mut self, spec: &FixtureSpec) -> Result<FixtureSet, SetupError> {
        let source = match spec.query {
            FixtureQuery::Database { .. } => &self.database,
            FixtureQuery::Listing { .. } => &self.listing,
        };

        let fetched = tokio::time::timeout(self.budget, source.fetch(&spec.query))
            .await
            .unwrap_or(Err(FixtureError::TimedOut { after: self.budget }));
        let candidates = fetched.map_err(|source| SetupError::Fixtures {
            query: spec.query.to_string(),
            source,
        })?;

        let available = candidates.len();
        let ids = self.selector.select(candidates, spec.pick);
        debug!(
            "resolved {} of {available} fixtures for {}",
            ids.len(),
            spec.query
        );
        let set = FixtureSet::new(spec.query.clone(), ids);
        if spec.required {
            set.require_non_empty()
        } else {
            Ok(set)
        }
    }
}
