// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use csv::Writer;
use time::format_description::well_known::Rfc3339;

use crate::analyzer::stats::STAT_KEYS;
use crate::error::ReportError;
use crate::harness::case::CaseReport;
use crate::harness::recorder::Trial;
use crate::shared::config::Config;

#[derive(Debug, Clone)]
pub struct SummaryLine<'a> {
    case: &'a CaseReport,
    stats: &'a HashMap<String, f32>,
}

impl<'a> SummaryLine<'a> {
    pub fn new(case: &'a CaseReport, stats: &'a HashMap<String, f32>) -> Self {
        Self { case, stats }
    }

    pub fn write_header<W: Write>(wtr: &mut Writer<W>) -> Result<(), ReportError> {
        let mut header: Vec<String> = ["CASE", "PRINCIPAL", "STATE"].map(String::from).into();
        header.extend(STAT_KEYS.iter().map(|k| k.to_uppercase()));
        wtr.write_record(&header)?;
        Ok(())
    }

    pub fn write<W: Write>(&self, wtr: &mut Writer<W>) -> Result<(), ReportError> {
        let mut record = vec![
            self.case.name.clone(),
            self.case.principal.to_string(),
            self.case.state.to_string(),
        ];
        record.extend(STAT_KEYS.iter().map(|key| {
            let value = self.stats.get(*key).copied().unwrap_or_default();
            format!("{value:.2}")
        }));
        wtr.write_record(&record)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrialLine<'a>(&'a Trial);

impl TrialLine<'_> {
    pub fn write_header<W: Write>(wtr: &mut Writer<W>) -> Result<(), ReportError> {
        wtr.write_record([
            "CASE",
            "INDEX",
            "STARTED_AT",
            "DURATION_MS",
            "OUTCOME",
            "STATUS",
            "DETAIL",
        ])?;
        Ok(())
    }

    pub fn write<W: Write>(&self, wtr: &mut Writer<W>) -> Result<(), ReportError> {
        let trial = self.0;
        let started_at = trial
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| trial.started_at.unix_timestamp().to_string());
        wtr.write_record([
            trial.case.as_str(),
            &trial.index.to_string(),
            &started_at,
            &format!("{:.3}", trial.duration.as_micros() as f64 / 1000.0),
            &trial.outcome.to_string(),
            &trial.status.map(|s| s.to_string()).unwrap_or_default(),
            trial.detail.as_deref().unwrap_or_default(),
        ])?;
        Ok(())
    }
}

/// Write `summary.csv` (one row per case) and `trials.csv` (one row per trial) into `dir`.
pub fn case_stats_writecsv(
    cases: &[(CaseReport, HashMap<String, f32>)],
    dir: &Path,
) -> Result<(), ReportError> {
    let mut wtr = Writer::from_path(dir.join("summary.csv"))?;
    SummaryLine::write_header(&mut wtr)?;
    for (case, stats) in cases {
        SummaryLine::new(case, stats).write(&mut wtr)?;
    }
    wtr.flush().map_err(csv::Error::from)?;

    let mut wtr = Writer::from_path(dir.join("trials.csv"))?;
    TrialLine::write_header(&mut wtr)?;
    for trial in cases.iter().flat_map(|(case, _)| &case.trials) {
        TrialLine(trial).write(&mut wtr)?;
    }
    wtr.flush().map_err(csv::Error::from)?;

    Ok(())
}

fn config_dump(config: &Config) -> BTreeMap<String, String> {
    match serde_json::to_value(config) {
        Ok(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_string()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Pretty print the config and a latency table to the console
pub fn case_stats_prettyprint(cases: &[(CaseReport, HashMap<String, f32>)], config: &Config) {
    let separator: String = "-".repeat(100);
    println!("{separator}");
    println!("Config Dump:");

    for (key, value) in config_dump(config).iter() {
        println!("{}: {}", key, value);
    }

    for (case, stats) in cases {
        println!("{separator}\n{} [{}]", case.name, case.state);
        if let Some(error) = &case.error {
            println!("{error}");
            continue;
        }
        for key in STAT_KEYS {
            let value = stats.get(key).copied().unwrap_or_default();
            println!("{key: <12}{value:<10.2}");
        }
    }
    println!("{separator}");
}
