// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scan task: the async shell around the state machine.
//!
//! All events (host requests and hardware completions) arrive on one mpsc
//! queue and are processed strictly in order. The task executes the
//! commands each transition returns against the hardware ports and
//! publishes progress on a watch channel.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::controller::{ScanCommand, ScanEvent, ScanMachine, ScanState};
use crate::observer::ScanObserver;
use crate::ports::{GainController, HardwarePipeline, TunerPort};

/// Depth of the scan event queue. Hardware completion sources use
/// `try_send` and raise a fault if the queue is full, so this bounds how
/// many completions can be in flight.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Progress snapshot published on the watch channel after every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStatus {
    pub state: ScanState,
    pub generation: u64,
    pub written_bins: usize,
    pub planned_bins: usize,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            generation: 0,
            written_bins: 0,
            planned_bins: 0,
        }
    }
}

/// Hardware ports and listeners the scan task drives.
pub struct ScanTaskDeps {
    pub tuner: Box<dyn TunerPort>,
    pub gain: Box<dyn GainController>,
    pub pipeline: Box<dyn HardwarePipeline>,
    pub observer: Arc<dyn ScanObserver>,
}

/// Run the scan task until the event channel closes.
pub async fn run_scan_task(
    mut machine: ScanMachine,
    mut deps: ScanTaskDeps,
    mut rx: mpsc::Receiver<ScanEvent>,
    status_tx: watch::Sender<ScanStatus>,
) {
    info!("scan task started");

    while let Some(event) = rx.recv().await {
        let old_state = machine.state().clone();
        let commands = machine.handle(event);
        let new_state = machine.state().clone();

        if old_state != new_state {
            debug!("scan state {} -> {}", old_state, new_state);
            deps.observer.on_state_change(&old_state, &new_state);
            if let ScanState::Failed(failure) = &new_state {
                error!("scan failed: {}", failure);
                deps.observer.on_scan_failed(failure);
            }
        }

        for command in commands {
            execute_command(&mut machine, &mut deps, command);
        }

        let (written_bins, planned_bins) = machine.progress();
        let _ = status_tx.send(ScanStatus {
            state: machine.state().clone(),
            generation: machine.generation(),
            written_bins,
            planned_bins,
        });
    }

    info!("scan task shutting down (channel closed)");
}

fn execute_command(machine: &mut ScanMachine, deps: &mut ScanTaskDeps, command: ScanCommand) {
    let generation = machine.generation();
    match command {
        ScanCommand::ConfigurePipeline(params) => {
            debug!(
                "pipeline configure: fft {} decim {}x{} ratio {:#x}",
                params.fft_size, params.cic_decimation, params.fir_decimation,
                params.resample_ratio_q25
            );
            deps.pipeline.configure(&params);
        }
        ScanCommand::OverrideGain(value) => {
            deps.gain.override_gain(value);
        }
        ScanCommand::Retune {
            freq_hz,
            bandwidth_hz,
        } => {
            deps.tuner.retune(generation, freq_hz, bandwidth_hz);
        }
        ScanCommand::StartAgc => {
            deps.gain.start_settle(generation);
        }
        ScanCommand::Capture { len } => {
            deps.pipeline.capture(generation, len);
        }
        ScanCommand::PublishResults => {
            info!(
                "sweep complete: {} bins, {} peaks",
                machine.spectrum().len(),
                machine.peaks().len()
            );
            deps.observer.on_scan_complete(
                machine.spectrum(),
                machine.db_frac_bits(),
                machine.peaks(),
            );
            machine.acknowledge_complete();
        }
    }
}
