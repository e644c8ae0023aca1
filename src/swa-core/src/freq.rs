// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

/// The set of frequencies a tuner can actually be programmed to:
/// `base_hz + n * increment_hz` for integer `n >= 0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TunerGrid {
    pub base_hz: u32,
    pub increment_hz: u32,
}

impl TunerGrid {
    #[must_use]
    pub fn new(base_hz: u32, increment_hz: u32) -> Self {
        Self {
            base_hz,
            increment_hz,
        }
    }

    /// Snap a frequency down to the nearest grid point at or below it.
    ///
    /// Frequencies below the grid base snap to the base itself.
    #[must_use]
    pub fn snap_down(&self, hz: u32) -> u32 {
        if hz <= self.base_hz {
            return self.base_hz;
        }
        let steps = (hz - self.base_hz) / self.increment_hz;
        self.base_hz + steps * self.increment_hz
    }

    /// Snap a frequency to the nearest grid point (round to nearest).
    #[must_use]
    pub fn snap_nearest(&self, hz: u32) -> u32 {
        if hz <= self.base_hz {
            return self.base_hz;
        }
        let offset = hz - self.base_hz;
        let steps = (offset + self.increment_hz / 2) / self.increment_hz;
        self.base_hz + steps * self.increment_hz
    }

    /// Check whether a frequency lies exactly on the grid.
    #[must_use]
    pub fn contains(&self, hz: u32) -> bool {
        hz >= self.base_hz && (hz - self.base_hz) % self.increment_hz == 0
    }

    /// Snap a span (e.g. a tuning step) down to a whole number of grid
    /// increments, never below one increment.
    #[must_use]
    pub fn snap_span_down(&self, span_hz: u32) -> u32 {
        let steps = (span_hz / self.increment_hz).max(1);
        steps * self.increment_hz
    }
}
