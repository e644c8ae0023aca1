// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod compositor;
pub mod config;
pub mod dc;
pub mod fixed;
pub mod freq;
pub mod plan;

pub use compositor::{CompositorError, PeakRecord, SpectralCompositor};
pub use config::{ScanConfig, TuningStep, WindowFunction};
pub use dc::{DcOffsetCanceller, DcResult, Fragment};
pub use freq::TunerGrid;
pub use plan::{PlanError, SamplingPlanner, SweepPlan};
