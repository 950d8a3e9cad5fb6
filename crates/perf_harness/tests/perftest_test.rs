#![cfg(feature = "run_system_tests")]
// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;

use perf_harness::catalog::service_plans::service_plan_cases;
use perf_harness::harness::case::CaseState;
use perf_harness::harness::suite::Harness;
use perf_harness::shared::config::load_config;

// Runs against the deployment named in $CONFIG.
fn config_path() -> PathBuf {
    std::env::var("CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"))
}

#[tokio::test]
async fn test_list_cases_against_deployment() {
    let config = load_config(&config_path()).unwrap();
    let cases: Vec<_> = service_plan_cases(&config)
        .into_iter()
        .filter(|case| case.name.ends_with("list all"))
        .collect();

    let mut harness = Harness::from_config(&config).await.unwrap();
    let report = harness.run(&cases).await;

    for case in &report.cases {
        assert_eq!(case.state, CaseState::Completed, "{}", case.name);
    }
}

#[tokio::test]
async fn test_all_cases_against_deployment() {
    let config = load_config(&config_path()).unwrap();
    let mut harness = Harness::from_config(&config).await.unwrap();

    let report = harness.run(&service_plan_cases(&config)).await;

    assert_eq!(report.exit_code(), 0);
}
