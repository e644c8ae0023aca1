// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

/// Window function applied by the capture pipeline before the FFT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    Rectangular,
    #[default]
    Hamming,
    Hanning,
}

/// Tuning step selection: derived from the tuner bandwidth, or forced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningStep {
    #[default]
    Auto,
    /// Manual step in Hz; snapped down to the tuner grid by the planner.
    Manual(u32),
}

/// Immutable per-scan configuration, snapshotted from the host registers
/// when a scan is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// First frequency of the sweep in Hz (snapped to the tuner grid).
    pub start_hz: u32,
    /// Total span to sweep in Hz.
    pub range_hz: u32,
    /// Desired bin spacing in Hz; the planner derives the achievable value.
    pub resolution_hz: u32,
    /// Usable tuner bandwidth per tuned band in Hz.
    pub tuner_bandwidth_hz: u32,
    /// Tuning step selection.
    pub tuning_step: TuningStep,
    /// Outer averaging passes accumulated by the pipeline per capture job.
    pub averaging_outer: u8,
    /// log2 of the inner averaging depth; scales the capture length.
    pub averaging_inner_log2: u8,
    /// FFT window function.
    pub window: WindowFunction,
    /// Number of peaks reported after a completed sweep.
    pub peak_count: usize,
    /// Half-width in bins excluded around each found peak.
    pub peak_exclusion_half_width: usize,
    /// Two-pass DC-offset cancellation.
    pub dc_compensation: bool,
    /// Fixed IF gain; `None` runs the AGC settle sequence per band.
    pub if_gain_override: Option<u16>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_hz: 474_000_000,
            range_hz: 100_000_000,
            resolution_hz: 100_000,
            tuner_bandwidth_hz: 4_570_000,
            tuning_step: TuningStep::Auto,
            averaging_outer: 1,
            averaging_inner_log2: 0,
            window: WindowFunction::Hamming,
            peak_count: 8,
            peak_exclusion_half_width: 4,
            dc_compensation: true,
            if_gain_override: None,
        }
    }
}

impl ScanConfig {
    /// Final frequency of the sweep in Hz.
    #[must_use]
    pub fn stop_hz(&self) -> u32 {
        self.start_hz.saturating_add(self.range_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_hz() {
        let config = ScanConfig {
            start_hz: 100_000_000,
            range_hz: 50_000_000,
            ..ScanConfig::default()
        };
        assert_eq!(config.stop_hz(), 150_000_000);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = ScanConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ScanConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.start_hz, config.start_hz);
        assert_eq!(back.window, config.window);
        assert_eq!(back.tuning_step, config.tuning_step);
    }
}
