// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Command-line settings gathered from several sources.
//!
//! Later sources override earlier ones:
//!  - built-in defaults,
//!  - the TOML configuration file (`fathom.toml` or `--config`),
//!  - environment variables prefixed with `FATHOM_`,
//!  - command-line flags that were actually given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONF_FILE: &str = "fathom.toml";

/// Prefix of the environment variables that override settings.
pub const ENV_PREFIX: &str = "FATHOM_";

#[derive(Clone, Debug, PartialEq, Parser, Serialize, Deserialize)]
#[command(name = "fathom", about = "Worst-case FIFO depth sizing.")]
pub struct Settings {
    /// Spec files to size
    #[arg(value_name = "SPEC")]
    pub specs: Option<Vec<PathBuf>>,

    /// Configuration file to read instead of `fathom.toml`
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Directory the per-spec output directories are created in
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Logging level
    #[arg(long)]
    pub log: Option<String>,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Solver time budget per spec in seconds (0 for unlimited)
    #[arg(long)]
    pub time_budget_s: Option<f64>,

    /// Show a progress bar over the spec files
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub progress: Option<bool>,

    /// Validate the spec files without sizing them
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            specs: Some(Vec::new()),
            config: None,
            outdir: Some(PathBuf::from(".")),
            log: Some("info".to_string()),
            log_file: Some(PathBuf::new()),
            time_budget_s: Some(0.0),
            progress: Some(false),
            dry_run: Some(false),
        }
    }
}

impl Settings {
    /// Parse the command line and layer it over the other sources.
    pub fn parse_all_sources() -> Result<Self> {
        Self::from_cli(Self::parse())
    }

    /// Layer already-parsed command-line settings over the other sources.
    pub fn from_cli(cli: Settings) -> Result<Self> {
        let conf_file = match &cli.config {
            Some(conf_file) => {
                check_conf_file(conf_file)?;
                conf_file.clone()
            }
            None => PathBuf::from(DEFAULT_CONF_FILE),
        };

        let mut figment = Self::figment_with_defaults();
        figment = Self::figment_conf_file_merge(figment, &conf_file);
        figment = Self::figment_env_var_merge(figment);
        let config = Self::figment_extract(figment)?;
        Ok(Self::clap_merge(config, cli))
    }

    fn figment_with_defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(Settings::default()))
    }

    fn figment_conf_file_merge(config: Figment, conf_file: &Path) -> Figment {
        config.merge(Toml::file(conf_file))
    }

    fn figment_env_var_merge(config: Figment) -> Figment {
        config.merge(Env::prefixed(ENV_PREFIX))
    }

    fn figment_extract(config: Figment) -> Result<Settings> {
        Ok(config.extract()?)
    }

    fn clap_merge(mut config: Settings, cli: Settings) -> Settings {
        if cli.specs.as_ref().is_some_and(|specs| !specs.is_empty()) {
            config.specs = cli.specs;
        }
        if cli.config.is_some() {
            config.config = cli.config;
        }
        if cli.outdir.is_some() {
            config.outdir = cli.outdir;
        }
        if cli.log.is_some() {
            config.log = cli.log;
        }
        if cli.log_file.is_some() {
            config.log_file = cli.log_file;
        }
        if cli.time_budget_s.is_some() {
            config.time_budget_s = cli.time_budget_s;
        }
        if cli.progress.is_some() {
            config.progress = cli.progress;
        }
        if cli.dry_run.is_some() {
            config.dry_run = cli.dry_run;
        }

        config
    }

    /// Settings as they are before any command-line flag is seen.
    #[must_use]
    pub fn empty_cli() -> Self {
        Self {
            specs: None,
            config: None,
            outdir: None,
            log: None,
            log_file: None,
            time_budget_s: None,
            progress: None,
            dry_run: None,
        }
    }

    #[must_use]
    pub fn specs(&self) -> &[PathBuf] {
        self.specs.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn outdir(&self) -> PathBuf {
        self.outdir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub fn log_level(&self) -> &str {
        self.log.as_deref().unwrap_or("info")
    }

    /// The log file, if one was requested.
    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// The solver time budget, `None` when unlimited.
    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_s
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map(Duration::from_secs_f64)
    }

    #[must_use]
    pub fn progress(&self) -> bool {
        self.progress.unwrap_or(false)
    }

    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}

fn check_conf_file(conf_file: &Path) -> Result<()> {
    if conf_file.is_dir() {
        bail!("{} is not a file path", conf_file.display());
    }
    if !conf_file.exists() {
        bail!("{} not found", conf_file.display());
    }
    Ok(())
}
