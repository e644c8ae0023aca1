// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fragment compositor: dB conversion, overlap stitching, peak search.
//!
//! Fragments arrive one per tuned band in FFT bin order (DC, positive
//! frequencies, negative frequencies). The compositor converts the relevant
//! bins to dB, aligns each fragment's level with its predecessor at their
//! shared boundary bin so gain/AGC differences between tunings leave no
//! seam, and assembles everything into one spectrum ordered by ascending
//! absolute frequency.

use serde::Serialize;
use thiserror::Error;

use crate::fixed::{div_round_u64, linear_to_db};

/// Representable dB range of a spectrum bin, in raw fixed-point units.
pub const SPECTRUM_DB_MIN: i32 = i16::MIN as i32;
pub const SPECTRUM_DB_MAX: i32 = i16::MAX as i32;

/// One reported spectral peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakRecord {
    /// Peak level in dB, in the compositor's fixed-point format.
    pub value_db: i32,
    /// Spectrum bin index (ascending absolute frequency).
    pub bin: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum CompositorError {
    /// The planned spectrum does not fit the output buffer. Configuration-
    /// time error; the scan never starts.
    #[error("planned spectrum of {needed} bins exceeds buffer capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    /// A fragment write would run past the planned spectrum length. This is
    /// an internal-consistency violation (planner or sweep-termination bug),
    /// never silently truncated.
    #[error("fragment write past the planned spectrum length")]
    Overflow,
}

/// Owns the output spectrum and assembles it incrementally.
#[derive(Debug)]
pub struct SpectralCompositor {
    spectrum: Box<[i32]>,
    db_frac_bits: u32,
    /// Planned spectrum length for the current scan.
    len: usize,
    cursor: usize,
    /// Fragment contribution per band, in bins (the tuning step).
    fragment_len: usize,
    fft_size: usize,
    /// dB value retained at the boundary bin shared with the next fragment.
    prev_boundary_db: i32,
    first_fragment_done: bool,
}

impl SpectralCompositor {
    /// The spectrum buffer is allocated once at `capacity_bins` and reused
    /// across scans; a scan that needs more fails at configure time.
    #[must_use]
    pub fn new(capacity_bins: usize, db_frac_bits: u32) -> Self {
        Self {
            spectrum: vec![SPECTRUM_DB_MIN; capacity_bins].into_boxed_slice(),
            db_frac_bits,
            len: 0,
            cursor: 0,
            fragment_len: 0,
            fft_size: 0,
            prev_boundary_db: 0,
            first_fragment_done: false,
        }
    }

    /// Compute the output length for a scan and reset the write cursor.
    pub fn configure(
        &mut self,
        scan_range_hz: u32,
        tuning_step_hz: u32,
        effective_rate: u64,
        rate_frac_bits: u32,
        fft_size: usize,
    ) -> Result<(), CompositorError> {
        let fragment_len = div_round_u64(
            (u64::from(tuning_step_hz) << rate_frac_bits) * fft_size as u64,
            effective_rate,
        ) as usize;
        let bands = u64::from(scan_range_hz)
            .div_ceil(u64::from(tuning_step_hz))
            .max(1) as usize;

        let pos_len = fragment_len - fragment_len / 2;
        let needed = pos_len + (bands - 1) * fragment_len;
        if needed > self.spectrum.len() {
            return Err(CompositorError::BufferTooSmall {
                needed,
                capacity: self.spectrum.len(),
            });
        }

        self.len = needed;
        self.fragment_len = fragment_len;
        self.fft_size = fft_size;
        self.reset();
        Ok(())
    }

    /// Reset the write cursor for a fresh sweep with the same plan.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.prev_boundary_db = 0;
        self.first_fragment_done = false;
        self.spectrum[..self.len].fill(SPECTRUM_DB_MIN);
    }

    #[must_use]
    pub fn planned_len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn written_len(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.len > 0 && self.cursor == self.len
    }

    #[must_use]
    pub fn db_frac_bits(&self) -> u32 {
        self.db_frac_bits
    }

    /// The assembled spectrum, valid up to `written_len()`.
    #[must_use]
    pub fn spectrum(&self) -> &[i32] {
        &self.spectrum[..self.len]
    }

    fn to_db(&self, psd: u32) -> i32 {
        match linear_to_db(psd, self.db_frac_bits) {
            Some(db) => db.clamp(i64::from(SPECTRUM_DB_MIN), i64::from(SPECTRUM_DB_MAX)) as i32,
            None => SPECTRUM_DB_MIN,
        }
    }

    /// Convert one corrected fragment to dB and stitch it onto the spectrum.
    ///
    /// The first fragment contributes only its DC..Nyquist half; every later
    /// fragment contributes a full tuning step: its negative-frequency bins
    /// (which adjoin the previous fragment's last positive bin) and then its
    /// positive-frequency bins.
    pub fn add_fragment(&mut self, psd: &[u32]) -> Result<(), CompositorError> {
        debug_assert_eq!(psd.len(), self.fft_size);
        let l = self.fragment_len;
        let neg_len = l / 2;
        let pos_len = l - neg_len;
        let n = self.fft_size;

        if !self.first_fragment_done {
            if pos_len > self.len {
                return Err(CompositorError::Overflow);
            }
            for i in 0..pos_len {
                self.spectrum[i] = self.to_db(psd[i]);
            }
            self.cursor = pos_len;
            // The bin one past our positive contribution is where the next
            // fragment's negative edge lands.
            self.prev_boundary_db = self.to_db(psd[pos_len]);
            self.first_fragment_done = true;
            return Ok(());
        }

        if self.cursor + l > self.len {
            return Err(CompositorError::Overflow);
        }

        // Level offset that makes this fragment continuous with the
        // previous one at the shared boundary bin.
        let boundary_db = self.to_db(psd[n - neg_len]);
        let offset = self.prev_boundary_db - boundary_db;

        // Positive-frequency bins first, then the negative-frequency edge;
        // both land in ascending absolute-frequency order.
        for i in 0..pos_len {
            self.spectrum[self.cursor + neg_len + i] = shift_clamp(self.to_db(psd[i]), offset);
        }
        for i in 0..neg_len {
            self.spectrum[self.cursor + i] = shift_clamp(self.to_db(psd[n - neg_len + i]), offset);
        }

        self.cursor += l;
        self.prev_boundary_db = shift_clamp(self.to_db(psd[pos_len]), offset);
        Ok(())
    }

    /// Find the `count` strongest bins, excluding `exclusion_half_width`
    /// bins on each side of every peak already taken.
    ///
    /// Exclusion is tracked in a parallel bitset rather than by overwriting
    /// bins with a sentinel value, so the spectrum is never mutated and a
    /// legitimate bin at the sentinel level cannot be lost. Peaks come back
    /// in descending value order; the search stops early if the exclusion
    /// zones consume the whole spectrum.
    #[must_use]
    pub fn find_peaks(&self, count: usize, exclusion_half_width: usize) -> Vec<PeakRecord> {
        let spectrum = &self.spectrum[..self.len];
        let mut excluded = vec![false; spectrum.len()];
        let mut peaks = Vec::with_capacity(count);

        for _ in 0..count {
            let mut best: Option<(i32, usize)> = None;
            for (bin, &value) in spectrum.iter().enumerate() {
                if excluded[bin] {
                    continue;
                }
                if best.map_or(true, |(v, _)| value > v) {
                    best = Some((value, bin));
                }
            }
            let Some((value_db, bin)) = best else {
                break;
            };
            peaks.push(PeakRecord { value_db, bin });

            let lo = bin.saturating_sub(exclusion_half_width);
            let hi = (bin + exclusion_half_width).min(spectrum.len() - 1);
            for flag in &mut excluded[lo..=hi] {
                *flag = true;
            }
        }
        peaks
    }
}

#[inline]
fn shift_clamp(db: i32, offset: i32) -> i32 {
    db.saturating_add(offset)
        .clamp(SPECTRUM_DB_MIN, SPECTRUM_DB_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{PSD_FRAC_BITS, RES_FRAC_BITS};

    const DB_FRAC_BITS: u32 = 8;

    /// 16-point FFT, 8-bin tuning step, 4-band scan: spectrum of
    /// 4 + 3*8 = 28 bins.
    fn configured() -> SpectralCompositor {
        let mut compositor = SpectralCompositor::new(64, DB_FRAC_BITS);
        compositor
            .configure(
                3_200_000,
                800_000,
                1_600_000u64 << RES_FRAC_BITS,
                RES_FRAC_BITS,
                16,
            )
            .unwrap();
        compositor
    }

    fn flat(value: u32) -> Vec<u32> {
        vec![value; 16]
    }

    #[test]
    fn test_configure_length() {
        let compositor = configured();
        assert_eq!(compositor.planned_len(), 28);
        assert_eq!(compositor.written_len(), 0);
        assert!(!compositor.is_complete());
    }

    #[test]
    fn test_configure_buffer_too_small() {
        let mut compositor = SpectralCompositor::new(16, DB_FRAC_BITS);
        let err = compositor
            .configure(
                3_200_000,
                800_000,
                1_600_000u64 << RES_FRAC_BITS,
                RES_FRAC_BITS,
                16,
            )
            .unwrap_err();
        assert_eq!(
            err,
            CompositorError::BufferTooSmall {
                needed: 28,
                capacity: 16
            }
        );
    }

    #[test]
    fn test_first_fragment_writes_half() {
        let mut compositor = configured();
        compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        assert_eq!(compositor.written_len(), 4);
        assert_eq!(&compositor.spectrum()[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_full_sweep_completes() {
        let mut compositor = configured();
        compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        for _ in 0..3 {
            compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        }
        assert!(compositor.is_complete());
        assert_eq!(compositor.spectrum(), &[0i32; 28][..]);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut compositor = configured();
        for _ in 0..4 {
            compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        }
        assert_eq!(
            compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)),
            Err(CompositorError::Overflow)
        );
    }

    #[test]
    fn test_stitch_offset_removes_gain_seam() {
        // Second band captured with 4x the gain (+6.02 dB); stitching must
        // absorb it so the flat input stays flat across the boundary.
        let mut compositor = configured();
        compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        compositor
            .add_fragment(&flat(1 << (PSD_FRAC_BITS + 2)))
            .unwrap();

        let spectrum = &compositor.spectrum()[..compositor.written_len()];
        for (bin, &db) in spectrum.iter().enumerate() {
            assert!(db.abs() <= 1, "seam at bin {bin}: {db}");
        }
    }

    #[test]
    fn test_boundary_continuity() {
        // A shaped fragment: the value stitched at the boundary must equal
        // the previous fragment's retained boundary value exactly.
        let mut compositor = configured();
        let mut shaped = flat(1 << PSD_FRAC_BITS);
        shaped[4] = 1 << (PSD_FRAC_BITS + 3); // bin one past the positive edge
        compositor.add_fragment(&shaped).unwrap();

        // Next fragment sees that same spectral content at its negative
        // edge (bin fft - neg_len = 12), scaled by an arbitrary gain.
        let mut next = flat(1 << (PSD_FRAC_BITS + 1));
        next[12] = 1 << (PSD_FRAC_BITS + 4); // same content, 2x gain
        compositor.add_fragment(&next).unwrap();

        let expected = linear_to_db(shaped[4], DB_FRAC_BITS).unwrap() as i32;
        assert_eq!(compositor.spectrum()[4], expected);
    }

    #[test]
    fn test_find_peaks_descending_and_separated() {
        // Carriers in three different bands land at spectrum bins 2, 11
        // and 21 (none on a stitch boundary bin, so all offsets stay zero).
        let mut compositor = configured();
        let mut first = flat(1000);
        first[2] = 1 << 30;
        compositor.add_fragment(&first).unwrap();
        let mut second = flat(1000);
        second[3] = 1 << 27;
        compositor.add_fragment(&second).unwrap();
        compositor.add_fragment(&flat(1000)).unwrap();
        let mut fourth = flat(1000);
        fourth[13] = 1 << 26;
        compositor.add_fragment(&fourth).unwrap();

        let excl = 2;
        let peaks = compositor.find_peaks(3, excl);
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks[0].bin, 2);
        assert_eq!(peaks[1].bin, 11);
        assert_eq!(peaks[2].bin, 21);
        for pair in peaks.windows(2) {
            assert!(pair[0].value_db > pair[1].value_db);
        }
        for (i, a) in peaks.iter().enumerate() {
            for b in peaks.iter().skip(i + 1) {
                assert!(
                    a.bin.abs_diff(b.bin) > 2 * excl,
                    "peaks {} and {} too close",
                    a.bin,
                    b.bin
                );
            }
        }
    }

    #[test]
    fn test_find_peaks_does_not_mutate_spectrum() {
        let mut compositor = configured();
        let mut shaped = flat(12345);
        shaped[1] = 1 << 28;
        compositor.add_fragment(&shaped).unwrap();
        compositor.add_fragment(&flat(777)).unwrap();

        let before: Vec<i32> = compositor.spectrum().to_vec();
        let _ = compositor.find_peaks(5, 3);
        let _ = compositor.find_peaks(1, 0);
        assert_eq!(compositor.spectrum(), &before[..]);
    }

    #[test]
    fn test_find_peaks_exhausted_stops_early() {
        let mut compositor = configured();
        compositor.add_fragment(&flat(1 << PSD_FRAC_BITS)).unwrap();
        // Exclusion wider than the whole spectrum: only one peak fits.
        let peaks = compositor.find_peaks(4, 1000);
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_zero_psd_clamps_to_floor() {
        let mut compositor = configured();
        compositor.add_fragment(&flat(0)).unwrap();
        assert!(compositor.spectrum()[..4]
            .iter()
            .all(|&db| db == SPECTRUM_DB_MIN));
    }
}
