// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrialOutcome {
    Success,
    Failure,
    Timeout,
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrialOutcome::Success => "success",
            TrialOutcome::Failure => "failure",
            TrialOutcome::Timeout => "timeout",
        })
    }
}

/// What one execution observed, before it is numbered and filed under a case.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub started_at: OffsetDateTime,
    pub duration: Duration,
    pub outcome: TrialOutcome,
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl Measurement {
    pub fn success(started_at: OffsetDateTime, duration: Duration, status: u16) -> Self {
        Self {
            started_at,
            duration,
            outcome: TrialOutcome::Success,
            status: Some(status),
            detail: None,
        }
    }

    pub fn failure(
        started_at: OffsetDateTime,
        duration: Duration,
        status: Option<u16>,
        detail: String,
    ) -> Self {
        Self {
            started_at,
            duration,
            outcome: TrialOutcome::Failure,
            status,
            detail: Some(detail),
        }
    }

    pub fn timeout(started_at: OffsetDateTime, duration: Duration, detail: String) -> Self {
        Self {
            started_at,
            duration,
            outcome: TrialOutcome::Timeout,
            status: None,
            detail: Some(detail),
        }
    }
}

/// One recorded execution. Immutable once recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    pub case: String,
    /// Position in the case's execution order, starting at 0.
    pub index: usize,
    pub started_at: OffsetDateTime,
    pub duration: Duration,
    pub outcome: TrialOutcome,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

/// Append-only store of the trials of a single case, in execution order.
#[derive(Debug)]
pub struct SampleRecorder {
    case: String,
    trials: Vec<Trial>,
}

impl SampleRecorder {
    pub fn new(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            trials: Vec::new(),
        }
    }

    pub fn case_name(&self) -> &str {
        &self.case
    }

    pub fn record(&mut self, measurement: Measurement) -> &Trial {
        let index = self.trials.len();
        self.trials.push(Trial {
            case: self.case.clone(),
            index,
            started_at: measurement.started_at,
            duration: measurement.duration,
            outcome: measurement.outcome,
            status: measurement.status,
            detail: measurement.detail,
        });
        &self.trials[index]
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn count(&self, outcome: TrialOutcome) -> usize {
        self.trials.iter().filter(|t| t.outcome == outcome).count()
    }

    pub fn into_trials(self) -> Vec<Trial> {
        self.trials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trials_are_numbered_in_recording_order() {
        let now = OffsetDateTime::now_utc();
        let mut recorder = SampleRecorder::new("GET /v3/service_plans as admin list all");

        recorder.record(Measurement::success(now, Duration::from_millis(12), 200));
        recorder.record(Measurement::failure(
            now,
            Duration::from_millis(3),
            Some(502),
            "bad gateway".into(),
        ));
        let last = recorder.record(Measurement::timeout(
            now,
            Duration::from_secs(30),
            "budget exceeded".into(),
        ));
        assert_eq!(last.index, 2);
        assert_eq!(last.case, "GET /v3/service_plans as admin list all");

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.count(TrialOutcome::Success), 1);
        assert_eq!(recorder.count(TrialOutcome::Failure), 1);
        assert_eq!(recorder.count(TrialOutcome::Timeout), 1);

        let indices: Vec<_> = recorder.into_trials().iter().map(|t| t.index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }
}
