// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scan progress notifications.
//!
//! The engine calls an observer on state transitions and on completion.
//! All methods have default no-op implementations, so listeners override
//! only the events they care about.

use swa_core::compositor::PeakRecord;

use crate::controller::ScanState;
use crate::error::ScanFailure;

pub trait ScanObserver: Send + Sync {
    /// Called on every state-machine transition.
    fn on_state_change(&self, _old: &ScanState, _new: &ScanState) {}

    /// Called once per completed sweep, while the full spectrum is valid.
    fn on_scan_complete(&self, _spectrum: &[i32], _db_frac_bits: u32, _peaks: &[PeakRecord]) {}

    /// Called when a scan ends in the `Failed` state.
    fn on_scan_failed(&self, _failure: &ScanFailure) {}
}

/// Default observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}
