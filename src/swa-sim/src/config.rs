// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for swa-sim.
//!
//! Loads TOML configuration; CLI arguments override config file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use swa_core::config::{ScanConfig, TuningStep, WindowFunction};

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Simulated front-end parameters
    pub frontend: FrontendConfig,
    /// Sweep scan parameters
    pub scan: ScanSection,
    /// Simulated RF environment
    pub signal: SignalConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Simulated tuner/ADC front-end parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Tuner grid base frequency in Hz
    pub grid_base_hz: u32,
    /// Tuner grid increment in Hz
    pub grid_increment_hz: u32,
    /// ADC sample rate in Hz
    pub adc_rate_hz: u64,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            grid_base_hz: 0,
            grid_increment_hz: 50_000,
            adc_rate_hz: 170_666_667,
        }
    }
}

/// Sweep scan parameters, mirroring [`ScanConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Sweep start frequency in Hz
    pub start_hz: u32,
    /// Sweep range in Hz
    pub range_hz: u32,
    /// Requested resolution bandwidth in Hz
    pub resolution_hz: u32,
    /// Tuner channel bandwidth in Hz
    pub tuner_bandwidth_hz: u32,
    /// Manual tuning step in Hz (0 = automatic)
    pub tuning_step_hz: u32,
    /// Fragments averaged per band
    pub averaging: u8,
    /// Number of peaks to report
    pub peak_count: usize,
    /// Bins masked on each side of a found peak
    pub peak_exclusion_half_width: usize,
    /// Two-pass DC offset cancellation
    pub dc_compensation: bool,
    /// Fixed IF gain (disables AGC settling when set)
    pub if_gain: Option<u16>,
}

impl Default for ScanSection {
    fn default() -> Self {
        let defaults = ScanConfig::default();
        Self {
            start_hz: defaults.start_hz,
            range_hz: defaults.range_hz,
            resolution_hz: defaults.resolution_hz,
            tuner_bandwidth_hz: defaults.tuner_bandwidth_hz,
            tuning_step_hz: 0,
            averaging: defaults.averaging_outer,
            peak_count: defaults.peak_count,
            peak_exclusion_half_width: defaults.peak_exclusion_half_width,
            dc_compensation: defaults.dc_compensation,
            if_gain: None,
        }
    }
}

impl ScanSection {
    /// Build the engine-facing scan configuration.
    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig {
            start_hz: self.start_hz,
            range_hz: self.range_hz,
            resolution_hz: self.resolution_hz,
            tuner_bandwidth_hz: self.tuner_bandwidth_hz,
            tuning_step: if self.tuning_step_hz == 0 {
                TuningStep::Auto
            } else {
                TuningStep::Manual(self.tuning_step_hz)
            },
            averaging_outer: self.averaging,
            window: WindowFunction::Hamming,
            peak_count: self.peak_count,
            peak_exclusion_half_width: self.peak_exclusion_half_width,
            dc_compensation: self.dc_compensation,
            if_gain_override: self.if_gain,
            ..ScanConfig::default()
        }
    }
}

/// Simulated RF environment: a flat noise floor with injected carriers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Linear PSD value of the noise floor
    pub noise_floor: u32,
    /// Carriers present in the simulated spectrum
    pub carriers: Vec<CarrierConfig>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            noise_floor: 1 << 10,
            carriers: vec![
                CarrierConfig {
                    freq_hz: 482_000_000,
                    level: 1 << 22,
                },
                CarrierConfig {
                    freq_hz: 520_000_000,
                    level: 1 << 20,
                },
                CarrierConfig {
                    freq_hz: 562_000_000,
                    level: 1 << 18,
                },
            ],
        }
    }
}

/// One simulated carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Carrier center frequency in Hz
    pub freq_hz: u32,
    /// Linear PSD value at the carrier bin
    pub level: u32,
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        let example = Config {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            scan: ScanSection {
                if_gain: Some(128),
                ..ScanSection::default()
            },
            ..Config::default()
        };
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file
    ReadError(PathBuf, String),
    /// Failed to parse the config file
    ParseError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadError(path, err) => {
                write!(f, "failed to read config file '{}': {}", path.display(), err)
            }
            Self::ParseError(path, err) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.frontend.grid_increment_hz, 50_000);
        assert_eq!(config.scan.start_hz, 474_000_000);
        assert_eq!(config.scan.tuning_step_hz, 0);
        assert_eq!(config.signal.carriers.len(), 3);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[scan]
start_hz = 470000000
range_hz = 8000000
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scan.start_hz, 470_000_000);
        assert_eq!(config.scan.range_hz, 8_000_000);
        // Unset fields keep their defaults.
        assert_eq!(config.scan.resolution_hz, 100_000);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[frontend]
grid_increment_hz = 62500
adc_rate_hz = 204800000

[scan]
start_hz = 174000000
range_hz = 230000000
resolution_hz = 50000
tuner_bandwidth_hz = 8000000
tuning_step_hz = 4000000
dc_compensation = false
if_gain = 128

[signal]
noise_floor = 2048

[[signal.carriers]]
freq_hz = 200000000
level = 1000000
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, Some("debug".to_string()));
        assert_eq!(config.frontend.grid_increment_hz, 62_500);
        assert_eq!(config.scan.if_gain, Some(128));
        assert_eq!(config.signal.carriers.len(), 1);

        let scan = config.scan.to_scan_config();
        assert_eq!(scan.tuning_step, TuningStep::Manual(4_000_000));
        assert!(!scan.dc_compensation);
    }

    #[test]
    fn test_example_toml_parses() {
        let example = Config::example_toml();
        let _config: Config = toml::from_str(&example).unwrap();
    }

    #[test]
    fn test_auto_step_when_zero() {
        let section = ScanSection::default();
        assert_eq!(section.to_scan_config().tuning_step, TuningStep::Auto);
    }
}
