// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Files written for each sized spec.
//!
//! Every spec gets its own directory, `out_fathom_<spec stem>`, which is
//! recreated on each run and holds:
//!  - `<protocol>_results.yaml` with the scalar results,
//!  - `<protocol>_witness.csv` with the per-cycle witness,
//!  - `cdc_results.yaml` when the spec has a `cdc` block.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fathom_engine::params::ProtocolKind;
use fathom_engine::result::{CdcResult, ProtocolOutputs, SizingResult, SolverPath};
use log::debug;
use serde::Serialize;

const OUT_DIR_PREFIX: &str = "out_fathom_";

/// The scalar fields of a [SizingResult].
#[derive(Debug, Serialize)]
pub struct ResultsRecord<'a> {
    pub fifo_type: ProtocolKind,
    pub depth: u64,
    pub occ_peak: u64,
    pub t_star: usize,
    pub horizon: u64,
    pub solver_path: SolverPath,
    pub basic_checks_pass: bool,
    pub msg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xon: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xoff: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_init: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_eff: Option<u64>,
}

impl<'a> From<&'a SizingResult> for ResultsRecord<'a> {
    fn from(result: &'a SizingResult) -> Self {
        let rtt_eff = match result.outputs {
            ProtocolOutputs::Replay { rtt_eff } => Some(rtt_eff),
            _ => None,
        };
        Self {
            fifo_type: result.protocol,
            depth: result.depth,
            occ_peak: result.occ_peak,
            t_star: result.t_star,
            horizon: result.horizon,
            solver_path: result.solver_path,
            basic_checks_pass: result.basic_checks_pass,
            msg: &result.msg,
            xon: result.xon_xoff().map(|(xon, _)| xon),
            xoff: result.xon_xoff().map(|(_, xoff)| xoff),
            cred_init: result.credits().map(|(cred_init, _)| cred_init),
            cred_max: result.credits().map(|(_, cred_max)| cred_max),
            throughput: result.throughput(),
            rtt_eff,
        }
    }
}

/// Output directory of one spec file.
#[must_use]
pub fn spec_out_dir(outdir: &Path, spec_path: &Path) -> PathBuf {
    let stem = spec_path
        .file_stem()
        .map_or_else(|| "spec".into(), |stem| stem.to_string_lossy());
    outdir.join(format!("{OUT_DIR_PREFIX}{stem}"))
}

/// Remove any previous contents and create the directory afresh.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Unable to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Unable to create {}", dir.display()))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value)
        .with_context(|| format!("serde_yaml::to_string failed for {}", path.display()))?;
    fs::write(path, yaml).with_context(|| format!("Unable to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn write_results(dir: &Path, result: &SizingResult) -> Result<PathBuf> {
    let path = dir.join(format!("{}_results.yaml", result.protocol));
    write_yaml(&path, &ResultsRecord::from(result))?;
    Ok(path)
}

pub fn write_cdc_results(dir: &Path, result: &CdcResult) -> Result<PathBuf> {
    let path = dir.join("cdc_results.yaml");
    write_yaml(&path, result)?;
    Ok(path)
}

/// Column names of the write, read and occupancy sequences.
fn base_columns(protocol: ProtocolKind) -> [&'static str; 3] {
    match protocol {
        ProtocolKind::Replay => ["w_seq", "a_seq", "infl_seq"],
        _ => ["w_seq", "r_seq", "occ_seq"],
    }
}

/// Write the witness as CSV, one row per cycle.
///
/// The occupancy column holds the occupancy at the end of the cycle.
pub fn write_witness(dir: &Path, result: &SizingResult) -> Result<PathBuf> {
    let path = dir.join(format!("{}_witness.csv", result.protocol));
    let file = File::create(&path).with_context(|| format!("Unable to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_witness_rows(&mut out, result)
        .and_then(|()| out.flush())
        .with_context(|| format!("Unable to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

fn write_witness_rows(out: &mut impl Write, result: &SizingResult) -> std::io::Result<()> {
    let witness = &result.witness;
    let traces = witness.traces();

    write!(out, "cycle")?;
    for column in base_columns(result.protocol) {
        write!(out, ",{column}")?;
    }
    for (name, _) in traces {
        write!(out, ",{name}")?;
    }
    writeln!(out)?;

    let occupancy = witness.occupancy();
    for cycle in 0..witness.horizon() {
        write!(
            out,
            "{cycle},{},{},{}",
            witness.write()[cycle],
            witness.read()[cycle],
            occupancy[cycle + 1]
        )?;
        for (_, values) in traces {
            match values.get(cycle) {
                Some(value) => write!(out, ",{value}")?,
                None => write!(out, ",")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
