// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Size the FIFOs described by one or more spec files
//!
//! For example, run using:
//!   cargo run --bin fathom -- specs/ready_valid.yaml --outdir out --log debug

use anyhow::{Result, bail};
use fathom_cli::run_spec;
use fathom_cli::settings::Settings;
use indicatif::ProgressBar;
use log::error;

fn main() -> Result<()> {
    let settings = Settings::parse_all_sources()?;
    fathom_cli::init_logging(&settings)?;

    let specs = settings.specs();
    if specs.is_empty() {
        bail!("No spec files given");
    }

    let progress_bar = settings
        .progress()
        .then(|| ProgressBar::new(specs.len() as u64));

    let mut failures = 0;
    for spec_path in specs {
        match run_spec(spec_path, &settings) {
            Ok(report) if report.passed => {}
            Ok(_) => failures += 1,
            Err(e) => {
                error!("{}: {e:#}", spec_path.display());
                failures += 1;
            }
        }
        if let Some(progress_bar) = &progress_bar {
            progress_bar.inc(1);
        }
    }

    if let Some(progress_bar) = progress_bar {
        progress_bar.finish();
    }

    if failures > 0 {
        bail!("{failures} of {} specs failed", specs.len());
    }
    Ok(())
}
