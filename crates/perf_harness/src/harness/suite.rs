// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use http_client::BaseApiClient;

use crate::error::StartupError;
use crate::harness::case::{BenchmarkCase, CaseReport, CaseState};
use crate::harness::executor::TimedRequestExecutor;
use crate::harness::fixtures::{DatabaseSource, FixtureResolver, ListingSource, SeededSelector};
use crate::harness::identity::{IdentityScope, Principals, UaaIdentityProvider};
use crate::shared::config::Config;

/// Everything the cases share: one HTTP client, one identity provider, the principals, and
/// the fixture resolver with its database connection.
pub struct Harness {
    executor: TimedRequestExecutor,
    identity: IdentityScope,
    principals: Arc<Principals>,
    resolver: FixtureResolver,
}

impl Harness {
    pub fn new(
        executor: TimedRequestExecutor,
        identity: IdentityScope,
        principals: Arc<Principals>,
        resolver: FixtureResolver,
    ) -> Self {
        Self {
            executor,
            identity,
            principals,
            resolver,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let client = BaseApiClient::new()?;
        Self::with_client(config, client).await
    }

    /// Like [`Harness::from_config`], with a caller-supplied client.
    pub async fn with_client(config: &Config, client: BaseApiClient) -> Result<Self, StartupError> {
        let conn = fixture_store::open_db(&config.ccdb_path).await?;
        info!("Opened fixture database {:?}", config.ccdb_path);

        let principals = Arc::new(Principals::from_config(config));
        let identity = IdentityScope::new(Arc::new(UaaIdentityProvider::new(
            client.clone(),
            config.uaa_url.as_ref(),
        )));
        let listing = ListingSource::new(
            client.clone(),
            config.api_url.clone(),
            identity.clone(),
            principals.clone(),
            config.basic_timeout,
        );
        let resolver = FixtureResolver::new(
            Arc::new(DatabaseSource::new(conn)),
            Arc::new(listing),
            Box::new(SeededSelector::new(config.random_seed)),
            config.basic_timeout,
        );
        let executor = TimedRequestExecutor::new(client, config.api_url.clone());

        Ok(Self::new(executor, identity, principals, resolver))
    }

    /// Run `cases` in order. A failed case does not stop the ones after it.
    pub async fn run(&mut self, cases: &[BenchmarkCase]) -> SuiteReport {
        let started_at = OffsetDateTime::now_utc();
        let mut reports = Vec::with_capacity(cases.len());

        for case in cases {
            let report = case
                .run(
                    &self.executor,
                    &self.identity,
                    &self.principals,
                    &mut self.resolver,
                )
                .await;
            reports.push(report);
        }

        let leaked = self.identity.live_sessions();
        if leaked > 0 {
            warn!("{leaked} sessions were not released");
        }

        let report = SuiteReport {
            started_at,
            cases: reports,
        };
        info!(
            "Ran {} cases, {} failed",
            report.cases.len(),
            report.failed().count()
        );
        report
    }
}

#[derive(Clone, Debug)]
pub struct SuiteReport {
    pub started_at: OffsetDateTime,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn failed(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| c.state == CaseState::Failed)
    }

    /// 1 if any case failed. Failed or timed out trials do not count.
    pub fn exit_code(&self) -> i32 {
        if self.failed().next().is_some() {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::FutureExt;
    use http_client::test_utils::ApiClientCoreMock;
    use http_client::{HttpError, RawResponse};
    use url::Url;

    use super::*;
    use crate::error::FixtureError;
    use crate::harness::fixtures::{FirstN, FixtureQuery, FixtureSource, FixtureSpec};
    use crate::harness::recorder::TrialOutcome;
    use crate::harness::request::RequestTemplate;
    use crate::shared::config::Credentials;
    use crate::shared::types::{PrincipalKind, SampleCount};

    struct Empty;

    #[async_trait::async_trait]
    impl FixtureSource for Empty {
        async fn fetch(&self, _query: &FixtureQuery) -> Result<Vec<String>, FixtureError> {
            Ok(vec![])
        }
    }

    fn harness() -> Harness {
        let client = BaseApiClient::from(ApiClientCoreMock::from(|url: String, _body, _headers| {
            async move {
                if url.ends_with("/v3/service_plans") {
                    Ok(RawResponse::ok(r#"{"resources":[]}"#))
                } else {
                    Err(HttpError::RequestError {
                        ctx: url,
                        status: Some(404),
                        source: "not found".into(),
                    })
                }
            }
            .boxed()
        }));
        let principals = Arc::new(Principals::new(
            Credentials::Token {
                token: "a".into(),
            },
            Credentials::Token {
                token: "u".into(),
            },
        ));
        let identity = IdentityScope::new(Arc::new(UaaIdentityProvider::new(client.clone(), None)));
        let resolver = FixtureResolver::new(
            Arc::new(Empty),
            Arc::new(Empty),
            Box::new(FirstN),
            Duration::from_secs(1),
        );
        Harness::new(
            TimedRequestExecutor::new(client, Url::parse("https://api.example.com").unwrap()),
            identity,
            principals,
            resolver,
        )
    }

    fn list(path: &str) -> BenchmarkCase {
        BenchmarkCase::new(
            &format!("GET {path}"),
            PrincipalKind::Admin,
            "list all",
            Duration::from_secs(1),
            SampleCount(2),
            RequestTemplate::new(path),
        )
    }

    #[tokio::test]
    async fn failed_cases_do_not_stop_the_suite() {
        let needs_fixtures = list("/v3/service_plans").with_fixture(FixtureSpec::required(
            FixtureQuery::database("SELECT guid FROM services", vec![]),
            1,
        ));
        let cases = [list("/v3/service_plans"), needs_fixtures, list("/v3/missing")];

        let report = harness().run(&cases).await;

        let states: Vec<_> = report.cases.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            [CaseState::Completed, CaseState::Failed, CaseState::Completed]
        );
        assert_eq!(report.cases[0].count(TrialOutcome::Success), 2);
        assert_eq!(report.cases[2].count(TrialOutcome::Failure), 2);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn trial_failures_keep_exit_code_zero() {
        let report = harness().run(&[list("/v3/missing")]).await;
        assert_eq!(report.exit_code(), 0);
    }
}
