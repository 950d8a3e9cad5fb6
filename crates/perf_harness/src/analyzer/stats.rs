// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

/* Single case analysis functions */

use std::collections::HashMap;

use crate::harness::case::CaseReport;
use crate::harness::recorder::TrialOutcome;

/// Every key [`calc_case`] produces, in display order.
pub const STAT_KEYS: [&str; 8] = [
    "samples",
    "min_ms",
    "median_ms",
    "mean_ms",
    "max_ms",
    "spread",
    "fail_rt",
    "timeout_rt",
];

/// Latency statistics over all recorded trials of a case, in milliseconds, plus failure and
/// timeout rates in percent. A case without trials has all zeros.
pub fn calc_case(report: &CaseReport) -> HashMap<String, f32> {
    let mut times: Vec<f32> = report
        .trials
        .iter()
        .map(|t| t.duration.as_micros() as f32 / 1000.0)
        .collect();
    times.sort_by(f32::total_cmp);

    let count = times.len();
    let rate = |outcome| match count {
        0 => 0.0,
        _ => 100.0 * report.count(outcome) as f32 / count as f32,
    };

    let min = times.first().copied().unwrap_or_default();
    let max = times.last().copied().unwrap_or_default();
    let mean = match count {
        0 => 0.0,
        _ => times.iter().sum::<f32>() / count as f32,
    };

    HashMap::from([
        (String::from("samples"), count as f32),
        (String::from("min_ms"), min),
        (String::from("median_ms"), median(&times)),
        (String::from("mean_ms"), mean),
        (String::from("max_ms"), max),
        (String::from("spread"), max - min),
        (String::from("fail_rt"), rate(TrialOutcome::Failure)),
        (String::from("timeout_rt"), rate(TrialOutcome::Timeout)),
    ])
}

// `sorted` must be in ascending order.
fn median(sorted: &[f32]) -> f32 {
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[mid],
        _ => (sorted[mid - 1] + sorted[mid]) / 2.0,
    }
}
