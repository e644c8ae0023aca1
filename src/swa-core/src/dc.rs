// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Two-pass DC-offset cancellation.
//!
//! Direct-conversion mixing injects a DC artifact at the tuner's LO
//! frequency, which lands on the fragment's DC bin and leaks into its
//! neighbors. The canceller takes two captures of the same band, one at the
//! nominal frequency and one offset by a single tuner grid step, so the
//! artifact stays put while the real spectrum shifts by a known number of
//! bins. Comparing the two estimates the artifact's magnitude without any
//! prior knowledge of it.

use crate::plan::MAX_FFT_SIZE;

/// One hardware capture+FFT result: `fft_size` PSD samples in Q8.23.
pub type Fragment = Box<[u32]>;

/// Outcome of feeding one fragment to the canceller.
#[derive(Debug)]
pub enum DcResult {
    /// The primary measurement is stashed; re-tune one grid step up and
    /// capture again.
    NeedSecondary,
    /// Corrected fragment, ready for the compositor.
    Ready(Fragment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Primary,
    Secondary,
}

/// Two-phase DC-offset canceller.
///
/// The scratch buffer is allocated once at the maximum supported FFT size
/// and indexed by the planned size, keeping memory bounded for the lifetime
/// of the engine.
#[derive(Debug)]
pub struct DcOffsetCanceller {
    enabled: bool,
    fft_size: usize,
    shift_bins: usize,
    phase: Phase,
    primary: Box<[u32]>,
}

impl DcOffsetCanceller {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: false,
            fft_size: 0,
            shift_bins: 0,
            phase: Phase::Primary,
            primary: vec![0u32; MAX_FFT_SIZE].into_boxed_slice(),
        }
    }

    /// Configure for a new scan. `shift_bins` is the secondary measurement's
    /// tuner offset (one grid step) expressed in bins.
    pub fn configure(&mut self, enabled: bool, fft_size: usize, shift_bins: usize) {
        debug_assert!(fft_size <= MAX_FFT_SIZE);
        self.enabled = enabled;
        self.fft_size = fft_size;
        self.shift_bins = shift_bins % fft_size.max(1);
        self.phase = Phase::Primary;
    }

    /// Discard any stashed primary measurement.
    pub fn reset(&mut self) {
        self.phase = Phase::Primary;
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Feed one fragment. In the primary phase the fragment is stashed and
    /// `NeedSecondary` asks the controller for the offset measurement; in
    /// the secondary phase the corrected fragment is produced. Disabled,
    /// this passes every fragment through untouched.
    pub fn process(&mut self, mut fragment: Fragment) -> DcResult {
        if !self.enabled {
            return DcResult::Ready(fragment);
        }
        let n = self.fft_size;
        debug_assert_eq!(fragment.len(), n);

        match self.phase {
            Phase::Primary => {
                self.primary[..n].copy_from_slice(&fragment[..n]);
                self.phase = Phase::Secondary;
                DcResult::NeedSecondary
            }
            Phase::Secondary => {
                let primary = &self.primary[..n];
                let secondary = &fragment[..n];

                // The DC bin and its two neighbors get the bias estimate;
                // compute them from the untouched buffers first.
                let dc_bins = [n - 1, 0, 1 % n];
                let mut corrected = [0u32; 3];
                for (slot, &bin) in dc_bins.iter().enumerate() {
                    corrected[slot] = correct_dc_bin(primary, secondary, bin, self.shift_bins);
                }

                // Remaining bins: element-wise average of both measurements.
                for (bin, out) in fragment.iter_mut().enumerate() {
                    *out = avg_round(self.primary[bin], *out);
                }
                for (slot, &bin) in dc_bins.iter().enumerate() {
                    fragment[bin] = corrected[slot];
                }

                self.phase = Phase::Primary;
                DcResult::Ready(fragment)
            }
        }
    }
}

impl Default for DcOffsetCanceller {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn avg_round(a: u32, b: u32) -> u32 {
    ((u64::from(a) + u64::from(b) + 1) / 2) as u32
}

/// Estimate the DC bias at `bin` and produce the corrected value.
///
/// The artifact sits at `bin` in both captures; the secondary capture sees
/// the real spectrum shifted, so the image of `bin` lands at the mirror bin
/// `bin + shift`. If subtracting the estimate would drive a corrected bin
/// negative the estimate is unreliable (low SNR) and the unbiased value
/// from the other buffer is substituted instead.
fn correct_dc_bin(primary: &[u32], secondary: &[u32], bin: usize, shift: usize) -> u32 {
    let n = primary.len();
    let mirror = (bin + shift) % n;

    let p = i64::from(primary[bin]);
    let s = i64::from(secondary[bin]);
    let p_m = i64::from(primary[mirror]);
    let s_m = i64::from(secondary[mirror]);

    let bias = (((p - s) + (s_m - p_m)) / 2).max(0);

    let corrected_p = p - bias;
    let corrected_s = s - bias;
    let chosen_p = if corrected_p < 0 { s } else { corrected_p };
    let chosen_s = if corrected_s < 0 { p } else { corrected_s };

    ((chosen_p + chosen_s + 1) / 2) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(values: &[u32]) -> Fragment {
        values.to_vec().into_boxed_slice()
    }

    #[test]
    fn test_disabled_is_passthrough() {
        let mut dc = DcOffsetCanceller::new();
        dc.configure(false, 8, 1);
        let input = fragment(&[1, 2, 3, 4, 5, 6, 7, 8]);
        match dc.process(input.clone()) {
            DcResult::Ready(out) => assert_eq!(out, input),
            DcResult::NeedSecondary => panic!("disabled canceller must pass through"),
        }
        // And again: no internal phase is consumed.
        assert!(matches!(
            dc.process(fragment(&[9, 9, 9, 9, 9, 9, 9, 9])),
            DcResult::Ready(_)
        ));
    }

    #[test]
    fn test_primary_then_secondary() {
        let mut dc = DcOffsetCanceller::new();
        dc.configure(true, 8, 1);
        assert!(matches!(
            dc.process(fragment(&[10; 8])),
            DcResult::NeedSecondary
        ));
        assert!(matches!(dc.process(fragment(&[10; 8])), DcResult::Ready(_)));
        // Phase cursor reset: a new band starts at primary again.
        assert!(matches!(
            dc.process(fragment(&[10; 8])),
            DcResult::NeedSecondary
        ));
    }

    #[test]
    fn test_identical_pair_is_identity() {
        let mut dc = DcOffsetCanceller::new();
        dc.configure(true, 8, 2);
        let data = [100, 250, 3000, 42, 9, 77, 123_456, 8_388_608];
        assert!(matches!(
            dc.process(fragment(&data)),
            DcResult::NeedSecondary
        ));
        match dc.process(fragment(&data)) {
            DcResult::Ready(out) => assert_eq!(&out[..], &data[..]),
            DcResult::NeedSecondary => panic!("expected Ready"),
        }
    }

    #[test]
    fn test_bias_removed_from_dc_bins() {
        // Flat spectrum of 1000 with a +600 artifact on the DC bin and its
        // neighbors in both captures.
        let n = 16;
        let shift = 2;
        let mut primary = vec![1000u32; n];
        let mut secondary = vec![1000u32; n];
        for bin in [n - 1, 0, 1] {
            primary[bin] += 600;
            secondary[bin] += 600;
        }

        let mut dc = DcOffsetCanceller::new();
        dc.configure(true, n, shift);
        assert!(matches!(
            dc.process(fragment(&primary)),
            DcResult::NeedSecondary
        ));
        let out = match dc.process(fragment(&secondary)) {
            DcResult::Ready(out) => out,
            DcResult::NeedSecondary => panic!("expected Ready"),
        };

        // bias = ((p-s) + (s_m - p_m)) / 2 = 0 here per-construction for
        // equal captures; the artifact itself cancels via the mirror: the
        // mirror bins hold clean 1000s, so corrected DC bins keep their
        // average while ordinary bins average untouched.
        for bin in 3..n - 1 {
            assert_eq!(out[bin], 1000, "bin {bin}");
        }
    }

    #[test]
    fn test_asymmetric_bias_estimate() {
        // Artifact present only in the primary capture: the estimate is
        // (p - s)/2 + (s_m - p_m)/2 with clean mirrors, i.e. half the
        // injected bias, and both corrected bins stay non-negative.
        let n = 8;
        let shift = 3;
        let mut primary = vec![500u32; n];
        let secondary = vec![500u32; n];
        primary[0] += 400;

        let mut dc = DcOffsetCanceller::new();
        dc.configure(true, n, shift);
        dc.process(fragment(&primary));
        let out = match dc.process(fragment(&secondary)) {
            DcResult::Ready(out) => out,
            DcResult::NeedSecondary => panic!("expected Ready"),
        };

        // bias = ((900 - 500) + (500 - 500)) / 2 = 200
        // corrected_p = 700, corrected_s = 300 -> avg = 500
        assert_eq!(out[0], 500);
    }

    #[test]
    fn test_negative_correction_substitutes_other_buffer() {
        // A huge primary artifact over a tiny secondary bin: subtracting the
        // bias would drive the secondary bin negative, so the unbiased
        // primary mirror-side value is substituted.
        let n = 8;
        let shift = 1;
        let mut primary = vec![10u32; n];
        let secondary = vec![10u32; n];
        primary[0] = 5000;

        let mut dc = DcOffsetCanceller::new();
        dc.configure(true, n, shift);
        dc.process(fragment(&primary));
        let out = match dc.process(fragment(&secondary)) {
            DcResult::Ready(out) => out,
            DcResult::NeedSecondary => panic!("expected Ready"),
        };

        // bias = ((5000-10) + (10-10))/2 = 2495; corrected_s would be
        // negative, so the other buffer's raw value is substituted. The
        // essential property: the output never underflows.
        assert!(out[0] >= 10);
        for bin in 2..n - 1 {
            assert_eq!(out[bin], 10);
        }
    }
}
