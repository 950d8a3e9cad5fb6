// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::analyzer::pushgateway::send_pushgateway;
use crate::analyzer::stats::calc_case;
use crate::analyzer::writer::{case_stats_prettyprint, case_stats_writecsv};
use crate::error::ReportError;
use crate::harness::suite::SuiteReport;
use crate::shared::config::Config;

pub const PUSH_ENV_VAR: &str = "PUSH_METRICS";

pub fn push_requested() -> bool {
    std::env::var(PUSH_ENV_VAR).unwrap_or_default() == "TRUE"
}

/// Write the CSVs into `path`, print the summary and optionally push it to Prometheus.
pub fn report_results(
    path: &Path,
    suite: &SuiteReport,
    config: &Config,
    push: bool,
) -> Result<(), ReportError> {
    if !path.is_dir() {
        return Err(ReportError::NotADirectory(path.to_owned()));
    }

    let cases: Vec<_> = suite
        .cases
        .iter()
        .map(|case| (case.clone(), calc_case(case)))
        .collect();

    case_stats_writecsv(&cases, path)?;
    case_stats_prettyprint(&cases, config);

    if push {
        let labels = HashMap::from([
            (
                "api".to_string(),
                config.api_url.host_str().unwrap_or_default().to_string(),
            ),
            ("samples".to_string(), config.samples.0.to_string()),
        ]);
        info!("Pushing metrics to Prometheus with labels: {:?}", labels);
        let case_stats: Vec<_> = cases
            .iter()
            .map(|(case, stats)| (case.name.as_str(), stats))
            .collect();
        send_pushgateway(&config.pushgateway_url, &case_stats, labels)?;
    }

    Ok(())
}
