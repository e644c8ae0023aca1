// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod controller;
pub mod error;
pub mod observer;
pub mod ports;
pub mod task;

pub use controller::{ScanCommand, ScanEvent, ScanMachine, ScanState, SweepState};
pub use error::ScanFailure;
pub use observer::{NoopObserver, ScanObserver};
pub use ports::{GainController, HardwarePipeline, PipelineParams, TunerPort};
pub use task::{run_scan_task, ScanStatus, ScanTaskDeps, EVENT_QUEUE_DEPTH};
