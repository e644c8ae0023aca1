// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;
use thiserror::Error;

use swa_core::compositor::CompositorError;
use swa_core::plan::PlanError;

/// Failure code carried by the `Failed` scan state.
///
/// All planning and configuration failures are raised before any hardware
/// command is issued, so a failed scan never leaves a tuner or pipeline job
/// outstanding. Hardware faults are reported by the external components
/// through a fault completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ScanFailure {
    #[error("sweep planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("spectrum assembly failed: {0}")]
    Compositor(#[from] CompositorError),
    #[error("hardware pipeline fault (code {0})")]
    Hardware(u32),
}
