// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use perf_harness::analyzer::runner::{push_requested, report_results};
use perf_harness::catalog::service_plans::service_plan_cases;
use perf_harness::harness::case::BenchmarkCase;
use perf_harness::harness::suite::Harness;
use perf_harness::shared::config::{load_config, Config};
use perf_harness::shared::util::create_results_dir;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Samples request latency of the service plan endpoints.",
    long_about = "perftest runs every service plan benchmark case in order, as the admin and regular user principals, and writes per-case latency statistics to a timestamped results directory."
)]
struct Arguments {
    #[arg(
        short,
        long,
        env = "CONFIG",
        default_value = "perf_harness/config.json",
        help = "Path to the JSON config file."
    )]
    config: PathBuf,

    #[arg(
        short,
        long,
        help = "Suppress non-error output and set the log level to WARN."
    )]
    quiet: bool,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase verbosity level, can be used multiple times."
    )]
    verbose: u8,

    #[arg(long, help = "Only run cases whose name contains this text.")]
    filter: Option<String>,

    #[arg(long, help = "Print the names of the selected cases and exit.")]
    list: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Arguments::parse();

    let subscriber = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_max_level(match (args.quiet, args.verbose) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        })
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install logger: {err}");
    }

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            std::process::exit(2);
        }
    };

    let cases: Vec<_> = service_plan_cases(&config)
        .into_iter()
        .filter(|case| {
            args.filter
                .as_deref()
                .map_or(true, |filter| case.name.contains(filter))
        })
        .collect();

    if args.list {
        for case in &cases {
            println!("{}", case.name);
        }
        std::process::exit(0);
    }

    match perftest(&config, &cases).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    }
}

async fn perftest(config: &Config, cases: &[BenchmarkCase]) -> Result<i32> {
    let mut harness = Harness::from_config(config)
        .await
        .context("setting up harness")?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_secs();
    let dir = create_results_dir(&config.results_dir, timestamp)
        .with_context(|| format!("creating results dir in {:?}", config.results_dir))?;

    info!("Running {} cases", cases.len());
    let report = harness.run(cases).await;

    let exit_code = report.exit_code();

    // The push gateway client is blocking.
    let config = config.clone();
    let push = push_requested();
    tokio::task::spawn_blocking(move || report_results(&dir, &report, &config, push))
        .await
        .context("reporting task panicked")?
        .context("reporting results")?;

    Ok(exit_code)
}
