// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::error::{ScopeError, SetupError};
use crate::harness::executor::TimedRequestExecutor;
use crate::harness::fixtures::{FixtureResolver, FixtureSpec};
use crate::harness::identity::{IdentityScope, Principals};
use crate::harness::recorder::{Measurement, SampleRecorder, Trial, TrialOutcome};
use crate::harness::request::{EndpointRequest, RequestTemplate};
use crate::shared::types::{PrincipalKind, SampleCount};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CaseState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaseState::Pending => "pending",
            CaseState::Running => "running",
            CaseState::Completed => "completed",
            CaseState::Failed => "failed",
        })
    }
}

/// A named group of trials: one request template, one principal, one budget.
#[derive(Clone, Debug)]
pub struct BenchmarkCase {
    pub name: String,
    pub principal: PrincipalKind,
    pub budget: Duration,
    pub samples: SampleCount,
    /// Resolved in order; slot `i` of the request template refers to `fixtures[i]`.
    pub fixtures: Vec<FixtureSpec>,
    pub request: RequestTemplate,
}

impl BenchmarkCase {
    /// Named `"<endpoint> <principal context> <description>"`.
    pub fn new(
        endpoint: &str,
        principal: PrincipalKind,
        description: &str,
        budget: Duration,
        samples: SampleCount,
        request: RequestTemplate,
    ) -> Self {
        Self {
            name: format!("{endpoint} {} {description}", principal.context()),
            principal,
            budget,
            samples,
            fixtures: Vec::new(),
            request,
        }
    }

    pub fn with_fixture(mut self, spec: FixtureSpec) -> Self {
        self.fixtures.push(spec);
        self
    }

    async fn prepare(&self, resolver: &mut FixtureResolver) -> Result<EndpointRequest, SetupError> {
        let mut sets = Vec::with_capacity(self.fixtures.len());
        for spec in &self.fixtures {
            sets.push(resolver.resolve(spec).await?);
        }
        self.request.build(&sets)
    }

    /// Resolve fixtures once, then run `samples` trials one after another, each in its own
    /// principal scope.
    pub async fn run(
        &self,
        executor: &TimedRequestExecutor,
        identity: &IdentityScope,
        principals: &Principals,
        resolver: &mut FixtureResolver,
    ) -> CaseReport {
        let mut report = CaseReport::pending(self);
        info!("{}: starting {} trials", self.name, self.samples.0);
        report.state = CaseState::Running;

        let request = match self.prepare(resolver).await {
            Ok(request) => request,
            Err(e) => return report.fail(e),
        };

        let principal = principals.get(self.principal);
        let mut recorder = SampleRecorder::new(&self.name);

        for index in 0..self.samples.0 {
            let recorded_before = recorder.len();
            let started_at = OffsetDateTime::now_utc();

            let recorder_ref = &mut recorder;
            let request_ref = &request;
            let scoped = identity
                .with_principal(principal, self.budget, move |session| async move {
                    executor
                        .measure(recorder_ref, self.budget, request_ref, &session)
                        .await
                })
                .await;

            match scoped {
                Ok(_) => {}
                Err(ScopeError::TimedOut { after }) => {
                    if recorder.len() == recorded_before {
                        warn!("{} #{index}: principal scope exceeded {after:?}", self.name);
                        recorder.record(Measurement::timeout(
                            started_at,
                            after,
                            format!("principal scope exceeded {after:?}"),
                        ));
                    }
                }
                // Only refused acquisitions are setup errors; a slow one is a timeout above.
                Err(ScopeError::Acquire(source)) if index == 0 => {
                    return report.fail(SetupError::Identity {
                        principal: self.principal,
                        source,
                    });
                }
                Err(ScopeError::Acquire(e)) => {
                    warn!("{} #{index}: {e}", self.name);
                    recorder.record(Measurement::failure(
                        started_at,
                        Duration::ZERO,
                        None,
                        e.to_string(),
                    ));
                }
            }
        }

        report.complete(recorder)
    }
}

/// The result of running one case.
#[derive(Clone, Debug)]
pub struct CaseReport {
    pub name: String,
    pub principal: PrincipalKind,
    pub budget: Duration,
    pub state: CaseState,
    pub trials: Vec<Trial>,
    pub error: Option<String>,
}

impl CaseReport {
    fn pending(case: &BenchmarkCase) -> Self {
        Self {
            name: case.name.clone(),
            principal: case.principal,
            budget: case.budget,
            state: CaseState::Pending,
            trials: Vec::new(),
            error: None,
        }
    }

    fn fail(mut self, err: SetupError) -> Self {
        error!("{}: {err}", self.name);
        self.state = CaseState::Failed;
        self.error = Some(err.to_string());
        self
    }

    fn complete(mut self, recorder: SampleRecorder) -> Self {
        self.trials = recorder.into_trials();
        self.state = CaseState::Completed;
        info!(
            "{}: completed, {} successes, {} failures, {} timeouts",
            self.name,
            self.count(TrialOutcome::Success),
            self.count(TrialOutcome::Failure),
            self.count(TrialOutcome::Timeout)
        );
        self
    }

    pub fn count(&self, outcome: TrialOutcome) -> usize {
        self.trials.iter().filter(|t| t.outcome == outcome).count()
    }
}
