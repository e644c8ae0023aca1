// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Hardware port interfaces.
//!
//! The tuner, the gain controller and the capture pipeline run in their own
//! execution contexts (interrupt handlers or driver threads). The engine
//! only ever *issues* work through these traits; every completion comes
//! back as a [`ScanEvent`](crate::controller::ScanEvent) posted into the
//! engine's message queue, tagged with the generation counter the command
//! carried. Implementations must never touch engine state directly.

use serde::Serialize;

use swa_core::config::WindowFunction;

/// Static capture-pipeline parameters for one scan, derived from the sweep
/// plan at scan start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineParams {
    pub fft_size: usize,
    pub cic_decimation: u8,
    pub fir_decimation: u8,
    pub resample_ratio_q25: u64,
    pub window: WindowFunction,
    pub averaging_outer: u8,
}

/// Physical tuner front-end. Frequencies are pre-snapped to the tuner grid
/// before they reach this port.
pub trait TunerPort: Send {
    /// Start a retune; completion arrives as `ScanEvent::Tuned`.
    fn retune(&mut self, generation: u64, freq_hz: u32, bandwidth_hz: u32);
}

/// IF gain control loop.
pub trait GainController: Send {
    /// Start the AGC settle sequence; completion arrives as
    /// `ScanEvent::GainSettled`.
    fn start_settle(&mut self, generation: u64);

    /// Force a fixed IF gain for the non-AGC path. Synchronous; no
    /// completion message.
    fn override_gain(&mut self, value: u16);
}

/// Raw capture/FFT pipeline, treated as a job-queue device. Up to two
/// capture jobs may be outstanding at once (double-buffered).
pub trait HardwarePipeline: Send {
    /// Apply per-scan parameters before the first capture job.
    fn configure(&mut self, params: &PipelineParams);

    /// Queue one capture+PSD job; completion arrives as
    /// `ScanEvent::FragmentReady` carrying the PSD buffer.
    fn capture(&mut self, generation: u64, len: usize);
}
