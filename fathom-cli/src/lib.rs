// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Driver that sizes FIFOs described by YAML spec files.
//!
//! Each spec is read with [fathom_spec], sized with [fathom_engine] and its
//! results written to a directory of its own (see [output]).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use fathom_engine::{size, size_with_cdc};
use fathom_spec::SizingSpec;
use log::{LevelFilter, info, warn};
use simplelog::{CombinedLogger, ConfigBuilder, SharedLogger, SimpleLogger, WriteLogger};

use crate::output::{recreate_dir, spec_out_dir, write_cdc_results, write_results, write_witness};
use crate::settings::Settings;

pub mod output;
pub mod settings;

/// Take the command-line string and convert it to a level
pub fn choose_level(lvl: &str) -> LevelFilter {
    match LevelFilter::from_str(lvl) {
        Ok(level) => level,
        Err(_) => {
            let default = LevelFilter::Info;
            println!("Unable to parse level string '{lvl}', defaulting to {default}");
            default
        }
    }
}

/// Install the console logger, plus a file logger when a log file is set.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let level = choose_level(settings.log_level());

    // No timestamps, file locations, thread information or targets
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![SimpleLogger::new(level, config.clone())];
    if let Some(log_file) = settings.log_file() {
        let file = File::create(log_file)
            .with_context(|| format!("Unable to create log file {}", log_file.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }
    CombinedLogger::init(loggers).context("Unable to install the logger")
}

/// What happened to one spec file.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecReport {
    /// Where the results went, `None` for a dry run.
    pub out_dir: Option<PathBuf>,

    /// The depth of the same-clock FIFO, `None` for a dry run.
    pub depth: Option<u64>,

    /// All basic checks passed.
    pub passed: bool,
}

/// Read, size and write out a single spec file.
pub fn run_spec(spec_path: &Path, settings: &Settings) -> Result<SpecReport> {
    let start = Instant::now();
    let spec = SizingSpec::from_file(spec_path)
        .with_context(|| format!("Invalid spec {}", spec_path.display()))?;
    info!("Loaded {} spec {}", spec.protocol(), spec_path.display());

    if settings.dry_run() {
        info!("{} is valid", spec_path.display());
        return Ok(SpecReport {
            out_dir: None,
            depth: None,
            passed: true,
        });
    }

    let mut params = spec.parameters().clone();
    if let Some(budget) = settings.time_budget() {
        params = params.with_time_budget(budget);
    }

    let (cdc_result, result) = match spec.cdc_parameters() {
        Some(cdc) => {
            let (cdc_result, result) = size_with_cdc(&params, cdc.clone())?;
            info!("{cdc_result}");
            (Some(cdc_result), result)
        }
        None => (None, size(&params)?),
    };

    let out_dir = spec_out_dir(&settings.outdir(), spec_path);
    recreate_dir(&out_dir)?;
    if let Some(cdc_result) = &cdc_result {
        write_cdc_results(&out_dir, cdc_result)?;
    }
    write_results(&out_dir, &result)?;
    write_witness(&out_dir, &result)?;

    let passed = result.basic_checks_pass
        && cdc_result
            .as_ref()
            .is_none_or(|cdc_result| cdc_result.basic_checks_pass);
    if !passed {
        warn!("{}: basic checks failed: {}", spec_path.display(), result.msg);
    }
    info!(
        "{} sized to depth {} in {:.3}s, results in {}",
        spec_path.display(),
        result.depth,
        start.elapsed().as_secs_f64(),
        out_dir.display()
    );

    Ok(SpecReport {
        out_dir: Some(out_dir),
        depth: Some(result.depth),
        passed,
    })
}
