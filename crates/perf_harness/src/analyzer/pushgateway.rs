// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts};

use crate::analyzer::stats::STAT_KEYS;
use crate::error::ReportError;

const JOB: &str = "service_plans_perftest";

/// One gauge family per statistic, with a sample per case.
pub fn case_gauges(
    case_stats: &[(&str, &HashMap<String, f32>)],
) -> Result<Vec<prometheus::proto::MetricFamily>, ReportError> {
    let mut metrics = vec![];

    for key in STAT_KEYS {
        let gauge = GaugeVec::new(
            Opts::new(format!("perftest_{key}"), "Service plan latency metric"),
            &["case"],
        )?;
        for (case, stats) in case_stats {
            if let Some(value) = stats.get(key) {
                gauge.with_label_values(&[*case]).set(*value as f64);
            }
        }
        metrics.extend(gauge.collect());
    }

    Ok(metrics)
}

pub fn send_pushgateway(
    address: &str,
    case_stats: &[(&str, &HashMap<String, f32>)],
    labels: HashMap<String, String>,
) -> Result<(), ReportError> {
    let metrics = case_gauges(case_stats)?;
    prometheus::push_metrics(JOB, labels, address, metrics, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauges_are_labelled_by_case() {
        let a = HashMap::from([(String::from("mean_ms"), 12.5)]);
        let b = HashMap::from([(String::from("mean_ms"), 40.0)]);
        let families = case_gauges(&[("list", &a), ("show", &b)]).unwrap();

        let mean = families
            .iter()
            .find(|f| f.get_name() == "perftest_mean_ms")
            .unwrap();
        assert_eq!(mean.get_metric().len(), 2);
        let values: Vec<_> = mean
            .get_metric()
            .iter()
            .map(|m| (m.get_label()[0].get_value(), m.get_gauge().get_value()))
            .collect();
        assert!(values.contains(&("list", 12.5)));
        assert!(values.contains(&("show", 40.0)));
    }
}
