// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sampling-parameter planner.
//!
//! Derives the per-scan capture parameters (FFT size, decimation chain,
//! resampler ratio, tuning step) from the requested resolution and the
//! tuner/ADC characteristics. The planner is pure: same inputs, same plan,
//! no side effects, so it is testable in isolation and a failed plan can be
//! reported before any hardware command is issued.

use serde::Serialize;
use thiserror::Error;

use crate::config::{ScanConfig, TuningStep};
use crate::fixed::{div_round_u128, div_round_u64, RATIO_FRAC_BITS, RES_FRAC_BITS};
use crate::freq::TunerGrid;

/// Smallest FFT size the capture pipeline supports.
pub const MIN_FFT_SIZE: usize = 64;

/// Largest FFT size the capture pipeline supports; also bounds the scratch
/// buffers of the DC canceller.
pub const MAX_FFT_SIZE: usize = 8192;

/// Platform minimum capture job length in samples.
pub const MIN_CAPTURE_LEN: usize = 1024;

/// Largest capture job the pipeline accepts.
pub const MAX_CAPTURE_LEN: usize = 1 << 18;

/// Resample ratio limits in Q25: the fractional resampler accepts
/// [0.5, 2.0).
pub const RESAMPLE_RATIO_MIN_Q25: u64 = 1 << (RATIO_FRAC_BITS - 1);
pub const RESAMPLE_RATIO_MAX_Q25: u64 = 1 << (RATIO_FRAC_BITS + 1);

/// Supported (CIC, FIR) decimation factor pairs, ascending by total factor.
/// The first pair that brings the residual resampler ratio into range wins.
const DECIMATION_TABLE: &[(u8, u8)] = &[
    (1, 1),
    (2, 1),
    (3, 1),
    (2, 2),
    (3, 2),
    (4, 2),
    (6, 2),
    (8, 2),
    (12, 2),
    (8, 4),
    (12, 4),
    (16, 4),
    (24, 4),
    (32, 4),
];

/// Planning failure; fatal to the scan, reported before any hardware
/// activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum PlanError {
    /// No supported FFT size satisfies `resolution * fft_size >= bandwidth`.
    #[error("requested resolution is not achievable with any supported FFT size")]
    ResolutionUnachievable,
    /// No decimation pair brings the resampler ratio into [0.5, 2.0).
    #[error("no decimation chain brings the resample ratio into range")]
    ResampleOutOfRange,
}

/// Derived sampling parameters, recomputed once per scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepPlan {
    /// FFT size; a power of two in [MIN_FFT_SIZE, MAX_FFT_SIZE].
    pub fft_size: usize,
    /// Capture job length in samples; >= fft_size and the platform minimum.
    pub capture_len: usize,
    /// CIC decimation factor.
    pub cic_decimation: u8,
    /// FIR decimation factor.
    pub fir_decimation: u8,
    /// Residual fractional resampler ratio in Q25, within [0.5, 2.0).
    pub resample_ratio_q25: u64,
    /// Tuning step in Hz; always a multiple of the tuner grid increment.
    pub tuning_step_hz: u32,
    /// Achievable bin spacing in Hz at `RES_FRAC_BITS` fractional bits.
    pub resolution: u64,
    /// Effective sample rate (`resolution * fft_size`) at the same
    /// fractional bits.
    pub effective_rate: u64,
    /// Fractional bits of `resolution` and `effective_rate`.
    pub rate_frac_bits: u32,
    /// Tuning step expressed in spectrum bins.
    pub fragment_len_bins: usize,
    /// One tuner grid increment expressed in spectrum bins; the offset used
    /// by the secondary DC-compensation measurement.
    pub grid_step_bins: usize,
}

/// Pure sampling-parameter planner for one tuner/ADC combination.
#[derive(Debug, Clone)]
pub struct SamplingPlanner {
    grid: TunerGrid,
    adc_rate: u64,
    adc_rate_frac_bits: u32,
}

impl SamplingPlanner {
    /// `adc_rate` is the ADC sample rate as a fixed-point value with
    /// `adc_rate_frac_bits` fractional bits.
    #[must_use]
    pub fn new(grid: TunerGrid, adc_rate: u64, adc_rate_frac_bits: u32) -> Self {
        Self {
            grid,
            adc_rate,
            adc_rate_frac_bits,
        }
    }

    #[must_use]
    pub fn grid(&self) -> &TunerGrid {
        &self.grid
    }

    /// Derive the sweep plan for one scan configuration.
    pub fn plan(&self, config: &ScanConfig) -> Result<SweepPlan, PlanError> {
        let grid_inc = u64::from(self.grid.increment_hz);

        // (a) Bins per grid increment, then the achievable resolution that
        // makes the tuning step an exact number of bins.
        let grid_step_bins =
            div_round_u64(grid_inc, u64::from(config.resolution_hz.max(1))).max(1);
        let resolution = div_round_u64(grid_inc << RES_FRAC_BITS, grid_step_bins);

        // (b) Smallest supported power-of-two FFT size covering the tuner
        // bandwidth at this resolution.
        let bandwidth = u64::from(config.tuner_bandwidth_hz) << RES_FRAC_BITS;
        let mut fft_size = MIN_FFT_SIZE;
        while (fft_size as u64) * resolution < bandwidth {
            fft_size *= 2;
            if fft_size > MAX_FFT_SIZE {
                return Err(PlanError::ResolutionUnachievable);
            }
        }
        let effective_rate = resolution * fft_size as u64;

        // (c) Nominal resampler ratio = adc_rate / effective_rate in Q25.
        let num = u128::from(self.adc_rate) << (RATIO_FRAC_BITS + RES_FRAC_BITS);
        let den = u128::from(effective_rate) << self.adc_rate_frac_bits;
        let nominal_q25 = div_round_u128(num, den) as u64;

        // (d) First decimation pair whose removal puts the residual ratio
        // into the resampler's supported range.
        let (cic, fir, residual_q25) = DECIMATION_TABLE
            .iter()
            .find_map(|&(cic, fir)| {
                let total = u64::from(cic) * u64::from(fir);
                let residual = div_round_u64(nominal_q25, total);
                (RESAMPLE_RATIO_MIN_Q25..RESAMPLE_RATIO_MAX_Q25)
                    .contains(&residual)
                    .then_some((cic, fir, residual))
            })
            .ok_or(PlanError::ResampleOutOfRange)?;

        // (e) Tuning step: larger of the bandwidth-derived auto step and one
        // grid increment, snapped down to the grid.
        let requested_step = match config.tuning_step {
            TuningStep::Auto => config.tuner_bandwidth_hz / 2,
            TuningStep::Manual(step) => step,
        };
        let tuning_step_hz = self
            .grid
            .snap_span_down(requested_step)
            .max(self.grid.increment_hz);

        // The step is a grid multiple and the resolution divides the grid
        // increment exactly, so this is an integer number of bins.
        let fragment_len_bins =
            ((u64::from(tuning_step_hz) / grid_inc) * grid_step_bins) as usize;
        if fragment_len_bins > fft_size {
            // One tuned band cannot cover the step; the sweep would leave
            // gaps between fragments.
            return Err(PlanError::ResolutionUnachievable);
        }

        // (f) Capture length scales with the inner averaging depth.
        let capture_len = (fft_size << config.averaging_inner_log2)
            .max(MIN_CAPTURE_LEN)
            .min(MAX_CAPTURE_LEN);

        Ok(SweepPlan {
            fft_size,
            capture_len,
            cic_decimation: cic,
            fir_decimation: fir,
            resample_ratio_q25: residual_q25,
            tuning_step_hz,
            resolution,
            effective_rate,
            rate_frac_bits: RES_FRAC_BITS,
            fragment_len_bins,
            grid_step_bins: grid_step_bins as usize,
        })
    }
}
