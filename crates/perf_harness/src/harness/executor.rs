// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use http_client::{BaseApiClient, RequestId};

use crate::harness::identity::Session;
use crate::harness::recorder::{Measurement, SampleRecorder, TrialOutcome};
use crate::harness::request::EndpointRequest;

/// Issues one GET per call and records exactly one trial for it.
#[derive(Clone, Debug)]
pub struct TimedRequestExecutor {
    client: BaseApiClient,
    api_url: Url,
}

impl TimedRequestExecutor {
    pub fn new(client: BaseApiClient, api_url: Url) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Time a single request. The clock covers sending the request through reading the full
    /// body. Anything not finished within `budget` is a timeout, even if a response did arrive.
    pub async fn measure(
        &self,
        recorder: &mut SampleRecorder,
        budget: Duration,
        request: &EndpointRequest,
        session: &Session,
    ) -> TrialOutcome {
        let url = request.to_url(&self.api_url);
        let request_id = RequestId::new_unique_with_prefix("perftest");
        let headers = [
            session.authorization_header(),
            request_id.header(),
            ("Accept".to_owned(), "application/json".to_owned()),
        ];

        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let response = tokio::time::timeout(budget, self.client.get(url.as_str(), &headers)).await;
        let duration = start.elapsed();

        let measurement = match response {
            Err(_) => Measurement::timeout(
                started_at,
                duration,
                format!("no response within {budget:?}"),
            ),
            Ok(Ok(response)) if duration > budget => Measurement::timeout(
                started_at,
                duration,
                format!("status {} after budget of {budget:?}", response.status),
            ),
            Ok(Ok(response)) if !(200..300).contains(&response.status) => Measurement::failure(
                started_at,
                duration,
                Some(response.status),
                truncated_body(&response.body),
            ),
            Ok(Ok(response)) => Measurement::success(started_at, duration, response.status),
            Ok(Err(e)) if e.is_transport() => {
                Measurement::failure(started_at, duration, None, format!("transport error: {e}"))
            }
            Ok(Err(e)) => Measurement::failure(started_at, duration, e.status(), e.to_string()),
        };

        let trial = recorder.record(measurement);
        match trial.outcome {
            TrialOutcome::Success => debug!(
                "{} #{} [{request_id}] {} in {:?}",
                trial.case,
                trial.index,
                trial.status.unwrap_or_default(),
                trial.duration
            ),
            outcome => warn!(
                "{} #{} [{request_id}] {outcome}: {}",
                trial.case,
                trial.index,
                trial.detail.as_deref().unwrap_or_default()
            ),
        }
        trial.outcome
    }
}

fn truncated_body(body: &[u8]) -> String {
    const MAX_DETAIL: usize = 512;
    let text = String::from_utf8_lossy(&body[..body.len().min(MAX_DETAIL)]).into_owned();
    if body.len() > MAX_DETAIL {
        format!("{text}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use http_client::test_utils::ApiClientCoreMock;
    use http_client::{HttpError, RawResponse};

    use super::*;
    use crate::harness::identity::{IdentityProvider, Principal, UaaIdentityProvider};
    use crate::shared::config::Credentials;
    use crate::shared::types::PrincipalKind;

    async fn session() -> Session {
        let provider = UaaIdentityProvider::new(
            BaseApiClient::from(ApiClientCoreMock::from(|_url, _body, _headers| {
                async { Ok(RawResponse::ok("{}")) }.boxed()
            })),
            None,
        );
        provider
            .acquire(&Principal::new(
                PrincipalKind::RegularUser,
                Credentials::Token {
                    token: "user-token".into(),
                },
            ))
            .await
            .unwrap()
    }

    fn executor(delay: Duration, result: Result<u16, u16>) -> TimedRequestExecutor {
        let client = BaseApiClient::from(ApiClientCoreMock::from(
            move |url: String, _body, headers: Vec<(String, String)>| {
                async move {
                    assert!(headers.contains(&("Authorization".into(), "bearer user-token".into())));
                    assert!(headers.iter().any(|(k, v)| k == RequestId::FIELD && v.starts_with("perftest")));
                    tokio::time::sleep(delay).await;
                    match result {
                        Ok(status) => Ok(RawResponse {
                            status,
                            body: "{}".into(),
                        }),
                        Err(status) => Err(HttpError::RequestError {
                            ctx: url,
                            status: Some(status),
                            source: "server error".into(),
                        }),
                    }
                }
                .boxed()
            },
        ));
        TimedRequestExecutor::new(client, Url::parse("https://api.example.com").unwrap())
    }

    fn request() -> EndpointRequest {
        EndpointRequest::from_path("/v3/service_plans")
    }

    #[tokio::test(start_paused = true)]
    async fn fast_responses_succeed() {
        let executor = executor(Duration::from_millis(120), Ok(200));
        let mut recorder = SampleRecorder::new("list");

        let outcome = executor
            .measure(&mut recorder, Duration::from_secs(30), &request(), &session().await)
            .await;

        assert_eq!(outcome, TrialOutcome::Success);
        let trial = &recorder.trials()[0];
        assert_eq!(trial.status, Some(200));
        assert_eq!(trial.duration, Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn error_statuses_are_failures() {
        let executor = executor(Duration::from_millis(5), Err(503));
        let mut recorder = SampleRecorder::new("list");

        let outcome = executor
            .measure(&mut recorder, Duration::from_secs(30), &request(), &session().await)
            .await;

        assert_eq!(outcome, TrialOutcome::Failure);
        assert_eq!(recorder.trials()[0].status, Some(503));
        assert!(recorder.trials()[0].detail.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn redirects_are_not_successes() {
        let executor = executor(Duration::from_millis(5), Ok(302));
        let mut recorder = SampleRecorder::new("show");

        let outcome = executor
            .measure(&mut recorder, Duration::from_secs(30), &request(), &session().await)
            .await;

        assert_eq!(outcome, TrialOutcome::Failure);
        assert_eq!(recorder.trials()[0].status, Some(302));
        assert_eq!(recorder.trials()[0].detail.as_deref(), Some("{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_time_out_at_the_budget() {
        let executor = executor(Duration::from_secs(45), Ok(200));
        let mut recorder = SampleRecorder::new("list");

        let outcome = executor
            .measure(&mut recorder, Duration::from_secs(30), &request(), &session().await)
            .await;

        assert_eq!(outcome, TrialOutcome::Timeout);
        let trial = &recorder.trials()[0];
        assert_eq!(trial.status, None);
        assert!(trial.duration >= Duration::from_secs(30));
        assert!(trial.duration < Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_records_one_trial() {
        let executor = executor(Duration::from_millis(1), Ok(200));
        let mut recorder = SampleRecorder::new("list");
        let session = session().await;

        for _ in 0..4 {
            executor
                .measure(&mut recorder, Duration::from_secs(1), &request(), &session)
                .await;
        }
        assert_eq!(recorder.len(), 4);
        assert_eq!(recorder.trials()[3].index, 3);
    }
}
