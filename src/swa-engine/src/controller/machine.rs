// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sweep scan state machine.
//!
//! One message is processed at a time; each transition returns the hardware
//! commands to issue so the machine never performs I/O itself. Stale
//! completions (from a scan that was stopped or superseded) are detected by
//! a generation counter carried on every command and echoed by every
//! completion, and are discarded without side effects.

use std::fmt;

use serde::Serialize;

use swa_core::compositor::{PeakRecord, SpectralCompositor};
use swa_core::config::ScanConfig;
use swa_core::dc::{DcOffsetCanceller, DcResult, Fragment};
use swa_core::plan::{SamplingPlanner, SweepPlan};

use crate::error::ScanFailure;
use crate::ports::PipelineParams;

/// The scan controller's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data")]
pub enum ScanState {
    /// No scan active; results of the last completed scan remain readable.
    Idle,
    /// Planning in progress (transient within one `RunScan` event).
    Start,
    /// Waiting for tuner completion.
    Tune,
    /// Waiting for the AGC settle sequence.
    AgcUpdate,
    /// Waiting for a capture job to deliver its PSD fragment.
    ProcessFragment,
    /// Sweep finished; peak search done, results published.
    Complete,
    /// Terminal until the next `RunScan`.
    Failed(ScanFailure),
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Start => write!(f, "Start"),
            Self::Tune => write!(f, "Tune"),
            Self::AgcUpdate => write!(f, "AgcUpdate"),
            Self::ProcessFragment => write!(f, "ProcessFragment"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed(failure) => write!(f, "Failed({failure})"),
        }
    }
}

/// Events driving the state machine: host requests plus hardware
/// completions. Completions carry the generation of the command that
/// triggered them.
#[derive(Debug)]
pub enum ScanEvent {
    RunScan(ScanConfig),
    StopScan,
    Tuned { generation: u64 },
    GainSettled { generation: u64 },
    FragmentReady { generation: u64, fragment: Fragment },
    HardwareFault { generation: u64, code: u32 },
}

/// Hardware side effects requested by a transition, executed by the caller
/// in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCommand {
    ConfigurePipeline(PipelineParams),
    OverrideGain(u16),
    Retune { freq_hz: u32, bandwidth_hz: u32 },
    StartAgc,
    Capture { len: usize },
    PublishResults,
}

/// Mutable per-scan sweep position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepState {
    /// Nominal center frequency of the band being measured.
    pub center_hz: u32,
    /// Final frequency of the sweep; the scan completes once the next
    /// center would reach it.
    pub final_hz: u32,
    /// Whether the current band is in the DC-compensation secondary half
    /// (tuned one grid step above nominal).
    pub dc_secondary: bool,
}

/// The sweep scan controller.
///
/// Owns the planner, the DC canceller and the compositor; drives the
/// tuner/AGC/pipeline purely through returned [`ScanCommand`]s.
pub struct ScanMachine {
    state: ScanState,
    generation: u64,
    planner: SamplingPlanner,
    compositor: SpectralCompositor,
    dc: DcOffsetCanceller,
    config: Option<ScanConfig>,
    plan: Option<SweepPlan>,
    sweep: Option<SweepState>,
    peaks: Vec<PeakRecord>,
}

impl ScanMachine {
    #[must_use]
    pub fn new(planner: SamplingPlanner, spectrum_capacity: usize, db_frac_bits: u32) -> Self {
        Self {
            state: ScanState::Idle,
            generation: 0,
            planner,
            compositor: SpectralCompositor::new(spectrum_capacity, db_frac_bits),
            dc: DcOffsetCanceller::new(),
            config: None,
            plan: None,
            sweep: None,
            peaks: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Generation stamped onto outgoing commands; completions carrying an
    /// older generation are stale and get discarded.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn plan(&self) -> Option<&SweepPlan> {
        self.plan.as_ref()
    }

    /// The assembled spectrum; fully valid only in `Complete` (and `Idle`
    /// immediately after), partially valid during a sweep for progress
    /// reporting.
    #[must_use]
    pub fn spectrum(&self) -> &[i32] {
        self.compositor.spectrum()
    }

    #[must_use]
    pub fn db_frac_bits(&self) -> u32 {
        self.compositor.db_frac_bits()
    }

    #[must_use]
    pub fn peaks(&self) -> &[PeakRecord] {
        &self.peaks
    }

    /// Spectrum bins written so far, for progress reporting.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.compositor.written_len(), self.compositor.planned_len())
    }

    /// Process one event; returns the hardware commands to issue.
    pub fn handle(&mut self, event: ScanEvent) -> Vec<ScanCommand> {
        match event {
            ScanEvent::RunScan(config) => self.run_scan(config),
            ScanEvent::StopScan => self.stop_scan(),
            ScanEvent::Tuned { generation } => {
                if generation != self.generation || self.state != ScanState::Tune {
                    return Vec::new();
                }
                self.state = ScanState::AgcUpdate;
                self.agc_update()
            }
            ScanEvent::GainSettled { generation } => {
                if generation != self.generation || self.state != ScanState::AgcUpdate {
                    return Vec::new();
                }
                self.start_capture()
            }
            ScanEvent::FragmentReady {
                generation,
                fragment,
            } => {
                if generation != self.generation || self.state != ScanState::ProcessFragment {
                    return Vec::new();
                }
                self.process_fragment(fragment)
            }
            ScanEvent::HardwareFault { generation, code } => {
                if generation != self.generation || !self.scan_active() {
                    return Vec::new();
                }
                self.state = ScanState::Failed(ScanFailure::Hardware(code));
                Vec::new()
            }
        }
    }

    /// Return from `Complete` to `Idle` once results have been published.
    pub fn acknowledge_complete(&mut self) {
        if self.state == ScanState::Complete {
            self.state = ScanState::Idle;
        }
    }

    fn scan_active(&self) -> bool {
        matches!(
            self.state,
            ScanState::Start | ScanState::Tune | ScanState::AgcUpdate | ScanState::ProcessFragment
        )
    }

    fn run_scan(&mut self, config: ScanConfig) -> Vec<ScanCommand> {
        if self.scan_active() || self.state == ScanState::Complete {
            // A scan is already running (or unacknowledged); host must stop
            // it first.
            return Vec::new();
        }

        self.generation += 1;
        self.state = ScanState::Start;
        self.peaks.clear();

        let plan = match self.planner.plan(&config) {
            Ok(plan) => plan,
            Err(err) => {
                self.state = ScanState::Failed(ScanFailure::Plan(err));
                self.config = Some(config);
                return Vec::new();
            }
        };

        if let Err(err) = self.compositor.configure(
            config.range_hz,
            plan.tuning_step_hz,
            plan.effective_rate,
            plan.rate_frac_bits,
            plan.fft_size,
        ) {
            self.state = ScanState::Failed(ScanFailure::Compositor(err));
            self.config = Some(config);
            return Vec::new();
        }

        self.dc
            .configure(config.dc_compensation, plan.fft_size, plan.grid_step_bins);

        let start_hz = self.planner.grid().snap_down(config.start_hz);
        let sweep = SweepState {
            center_hz: start_hz,
            final_hz: start_hz.saturating_add(config.range_hz),
            dc_secondary: false,
        };

        let mut commands = vec![ScanCommand::ConfigurePipeline(PipelineParams {
            fft_size: plan.fft_size,
            cic_decimation: plan.cic_decimation,
            fir_decimation: plan.fir_decimation,
            resample_ratio_q25: plan.resample_ratio_q25,
            window: config.window,
            averaging_outer: config.averaging_outer,
        })];
        if let Some(gain) = config.if_gain_override {
            commands.push(ScanCommand::OverrideGain(gain));
        }
        commands.push(ScanCommand::Retune {
            freq_hz: sweep.center_hz,
            bandwidth_hz: config.tuner_bandwidth_hz,
        });

        self.config = Some(config);
        self.plan = Some(plan);
        self.sweep = Some(sweep);
        self.state = ScanState::Tune;
        commands
    }

    fn stop_scan(&mut self) -> Vec<ScanCommand> {
        if self.state == ScanState::Idle {
            return Vec::new();
        }
        // Bump the generation so completions from the aborted scan are
        // recognized as stale.
        self.generation += 1;
        self.dc.reset();
        self.compositor.reset();
        self.sweep = None;
        self.plan = None;
        self.config = None;
        self.peaks.clear();
        self.state = ScanState::Idle;
        Vec::new()
    }

    /// `Tune -> AgcUpdate -> ProcessFragment`, skipping the settle sequence
    /// when a fixed gain is forced or when measuring the DC-compensation
    /// secondary half of a band (gain must not move between the two halves).
    fn agc_update(&mut self) -> Vec<ScanCommand> {
        let skip_settle = self
            .config
            .as_ref()
            .is_some_and(|config| config.if_gain_override.is_some())
            || self.sweep.as_ref().is_some_and(|sweep| sweep.dc_secondary);
        if skip_settle {
            self.start_capture()
        } else {
            vec![ScanCommand::StartAgc]
        }
    }

    fn start_capture(&mut self) -> Vec<ScanCommand> {
        let Some(plan) = self.plan.as_ref() else {
            return Vec::new();
        };
        self.state = ScanState::ProcessFragment;
        vec![ScanCommand::Capture {
            len: plan.capture_len,
        }]
    }

    fn process_fragment(&mut self, fragment: Fragment) -> Vec<ScanCommand> {
        let (Some(config), Some(plan), Some(sweep)) =
            (self.config.as_ref(), self.plan.as_ref(), self.sweep.as_mut())
        else {
            return Vec::new();
        };

        match self.dc.process(fragment) {
            DcResult::NeedSecondary => {
                // Re-measure the same band with the tuner one grid step up;
                // the DC artifact stays put while the spectrum shifts.
                sweep.dc_secondary = true;
                self.state = ScanState::Tune;
                vec![ScanCommand::Retune {
                    freq_hz: sweep
                        .center_hz
                        .saturating_add(self.planner.grid().increment_hz),
                    bandwidth_hz: config.tuner_bandwidth_hz,
                }]
            }
            DcResult::Ready(corrected) => {
                sweep.dc_secondary = false;
                if let Err(err) = self.compositor.add_fragment(&corrected) {
                    self.state = ScanState::Failed(ScanFailure::Compositor(err));
                    return Vec::new();
                }

                let next_hz = sweep.center_hz.saturating_add(plan.tuning_step_hz);
                if next_hz >= sweep.final_hz {
                    self.peaks = self
                        .compositor
                        .find_peaks(config.peak_count, config.peak_exclusion_half_width);
                    self.state = ScanState::Complete;
                    vec![ScanCommand::PublishResults]
                } else {
                    // The step is a grid multiple and the start was snapped,
                    // so the next center is already on the grid.
                    sweep.center_hz = next_hz;
                    self.state = ScanState::Tune;
                    vec![ScanCommand::Retune {
                        freq_hz: next_hz,
                        bandwidth_hz: config.tuner_bandwidth_hz,
                    }]
                }
            }
        }
    }
}
