// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scan controller components.
//!
//! The state machine itself performs no I/O: every call to
//! [`ScanMachine::handle`] returns the list of hardware commands the caller
//! must issue, which keeps the transition logic deterministic and
//! unit-testable without any hardware.

pub mod machine;

pub use machine::{ScanCommand, ScanEvent, ScanMachine, ScanState, SweepState};
