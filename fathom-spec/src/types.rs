// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The YAML schema of a sizing spec file.
//!
//! Every key is optional at this level so that a spec with several problems
//! can be reported in one go. Required keys are checked when the spec is
//! turned into engine parameters.

use fathom_engine::cdc::{CdcDepthModel, FifoDomain};
use fathom_engine::layers::TrafficProfile;
use fathom_engine::params::{MarginKind, ProtocolKind, Rounding};
use fathom_engine::protocols::xon_xoff::HysteresisBound;
use serde::{Deserialize, de};
use serde_yaml::Value;

const AUTO: &str = "auto";

/// Parse a frequency given either as a number of Hz or as a string with units
///
/// Some examples are:
///  1000000000
///  1 GHz, 1.1GHz
///  800 MHz, 32.768 kHz
pub fn parse_frequency<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: de::Deserializer<'de>,
{
    // Deserialize to a generic `Value` first so that plain numbers are
    // accepted as well as strings.
    let value: Value = Deserialize::deserialize(deserializer)?;

    if let Some(number) = value.as_u64() {
        return Ok(number);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() && number >= 0.0 {
            return Ok(number as u64);
        }
        return Err(de::Error::custom(format!(
            "'{number}': frequency must be a non-negative number of Hz"
        )));
    }

    match value.as_str() {
        Some(s) => parse_frequency_str(s).map_err(de::Error::custom),
        None => Err(de::Error::custom(format!(
            "'{value:?}': Unsupported type for a frequency (should be u64 or String)"
        ))),
    }
}

/// Convert a decimal number with an optional `Hz`, `kHz`, `MHz` or `GHz`
/// suffix to whole Hz, truncating any fraction of a Hz.
pub fn parse_frequency_str(s: &str) -> Result<u64, String> {
    let lowercase = s.trim().to_lowercase();
    let split = lowercase
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lowercase.len());
    let (number, unit) = lowercase.split_at(split);

    let scale: u128 = match unit.trim() {
        "" | "hz" => 1,
        "khz" => 1_000,
        "mhz" => 1_000_000,
        "ghz" => 1_000_000_000,
        other => return Err(format!("Unable to parse {s} as a frequency: unknown unit '{other}'")),
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let mantissa: u128 = format!("{whole}{fraction}")
        .parse()
        .map_err(|e| format!("Unable to parse {s} as a frequency: {e}"))?;
    let divisor = u32::try_from(fraction.len())
        .ok()
        .and_then(|digits| 10u128.checked_pow(digits))
        .ok_or_else(|| format!("Unable to parse {s} as a frequency: too many digits"))?;
    let hz = mantissa
        .checked_mul(scale)
        .map(|scaled| scaled / divisor)
        .and_then(|hz| u64::try_from(hz).ok())
        .ok_or_else(|| format!("Unable to parse {s} as a frequency: out of range"))?;
    Ok(hz)
}

fn is_auto(value: &Value) -> bool {
    value.as_str() == Some(AUTO)
}

/// Parse `auto` (returned as `None`) or an integer.
pub fn parse_auto_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    if is_auto(&value) {
        return Ok(None);
    }
    match value.as_u64() {
        Some(number) => Ok(Some(number)),
        None => Err(de::Error::custom(format!(
            "'{value:?}': expected 'auto' or a non-negative integer"
        ))),
    }
}

/// Parse `auto` (returned as `None`) or a number.
pub fn parse_auto_fraction<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    if is_auto(&value) {
        return Ok(None);
    }
    match value.as_f64() {
        Some(number) => Ok(Some(number)),
        None => Err(de::Error::custom(format!(
            "'{value:?}': expected 'auto' or a number"
        ))),
    }
}

/// Parse `auto` (returned as `None`) or a `[lo, hi]` pair of integers.
pub fn parse_auto_range<'de, D>(deserializer: D) -> Result<Option<(u64, u64)>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    if is_auto(&value) {
        return Ok(None);
    }
    let pair = value
        .as_sequence()
        .filter(|seq| seq.len() == 2)
        .and_then(|seq| Some((seq[0].as_u64()?, seq[1].as_u64()?)));
    match pair {
        Some(pair) => Ok(Some(pair)),
        None => Err(de::Error::custom(format!(
            "'{value:?}': expected 'auto' or [lo, hi]"
        ))),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    Manual,
    #[default]
    Auto,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecConfig {
    pub fifo_type: Option<ProtocolKind>,
    #[serde(default, deserialize_with = "parse_auto_u64")]
    pub horizon: Option<u64>,

    // Flat traffic
    pub w_max: Option<u64>,
    pub r_max: Option<u64>,
    pub sum_w_min: Option<u64>,
    pub sum_w_max: Option<u64>,
    pub sum_r_min: Option<u64>,
    pub sum_r_max: Option<u64>,

    // Layered traffic
    pub write_profile: Option<TrafficProfile>,
    pub read_profile: Option<TrafficProfile>,
    pub kmin_blocks: Option<u64>,
    pub blind_window_cycles: Option<u64>,

    #[serde(default)]
    pub wr_latency: u64,
    #[serde(default)]
    pub rd_latency: u64,
    #[serde(default)]
    pub margin_type: MarginKind,
    #[serde(default)]
    pub margin_val: u64,
    #[serde(default)]
    pub rounding: Rounding,

    // xon_xoff and replay
    #[serde(default)]
    pub atomic_tail: u64,

    // xon_xoff
    #[serde(default)]
    pub react_latency: u64,
    #[serde(default)]
    pub resume_latency: u64,
    #[serde(default)]
    pub w_throttle_max: u64,
    #[serde(default)]
    pub thresholds: ThresholdMode,
    pub xon: Option<u64>,
    pub xoff: Option<u64>,
    #[serde(default, deserialize_with = "parse_auto_fraction")]
    pub throughput_target: Option<f64>,
    #[serde(default, deserialize_with = "parse_auto_u64")]
    pub xon_min: Option<u64>,
    #[serde(default, deserialize_with = "parse_auto_range")]
    pub xoff_range: Option<(u64, u64)>,
    pub hysteresis: Option<[HysteresisBound; 2]>,
    #[serde(default)]
    pub prefer_small_band: bool,
    #[serde(default)]
    pub prefer_low_xoff: bool,

    // cbfc
    #[serde(default, deserialize_with = "parse_auto_u64")]
    pub cred_init: Option<u64>,
    #[serde(default, deserialize_with = "parse_auto_u64")]
    pub cred_max: Option<u64>,
    pub cred_gran: Option<u64>,
    #[serde(default)]
    pub cred_ret_latency: u64,
    pub cred_auto_optimize: Option<bool>,
    #[serde(default)]
    pub cred_margin_type: MarginKind,
    #[serde(default)]
    pub cred_margin_val: u64,
    #[serde(default)]
    pub cred_rounding: Rounding,

    // replay
    pub rtt: Option<u64>,

    pub cdc: Option<CdcConfig>,
}

impl SpecConfig {
    /// Names of the flat-traffic keys that are set.
    #[must_use]
    pub fn flat_keys(&self) -> Vec<&'static str> {
        [
            ("w_max", self.w_max),
            ("r_max", self.r_max),
            ("sum_w_min", self.sum_w_min),
            ("sum_w_max", self.sum_w_max),
            ("sum_r_min", self.sum_r_min),
            ("sum_r_max", self.sum_r_max),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|_| name))
        .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CdcConfig {
    #[serde(deserialize_with = "parse_frequency")]
    pub wr_clk_freq: u64,
    #[serde(deserialize_with = "parse_frequency")]
    pub rd_clk_freq: u64,
    #[serde(default)]
    pub big_fifo_domain: FifoDomain,
    #[serde(default)]
    pub wr_clk_ppm: u64,
    #[serde(default)]
    pub rd_clk_ppm: u64,
    pub wptr_inc_cycles: Option<u64>,
    pub wptr_sync_slip_cycles: Option<u64>,
    pub wptr_sync_stages: Option<u64>,
    pub rd_react_cycles: Option<u64>,
    pub rptr_inc_cycles: Option<u64>,
    pub rptr_sync_slip_cycles: Option<u64>,
    pub rptr_sync_stages: Option<u64>,
    pub wr_full_update_cycles: Option<u64>,
    #[serde(default, deserialize_with = "parse_auto_u64")]
    pub window_cycles: Option<u64>,
    #[serde(default)]
    pub depth_model: CdcDepthModel,
    #[serde(default)]
    pub margin_type: MarginKind,
    #[serde(default)]
    pub margin_val: u64,
    #[serde(default)]
    pub rounding: Rounding,
}
