// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-point helpers shared by the planner and the compositor.
//!
//! Everything here is integer-only and deterministic: the sweep engine must
//! produce bit-stable spectra across runs, so no floating point is allowed
//! anywhere in the signal path. Divisions round to nearest rather than
//! truncate to avoid a systematic low bias accumulating across a sweep.

/// Fractional bits used for resolutions and sample rates.
pub const RES_FRAC_BITS: u32 = 16;

/// Fractional bits of the hardware resampler ratio.
pub const RATIO_FRAC_BITS: u32 = 25;

/// Fractional bits of the raw PSD samples delivered by the capture pipeline
/// (Q8.23).
pub const PSD_FRAC_BITS: u32 = 23;

/// 10 * log10(2) in Q17, the dB weight of one octave.
const DB_PER_LOG2_Q17: i64 = 394_566;

/// Round-to-nearest unsigned division.
#[inline]
#[must_use]
pub fn div_round_u64(num: u64, den: u64) -> u64 {
    (num + den / 2) / den
}

/// Round-to-nearest unsigned division over u128, for intermediate products
/// that do not fit 64 bits (e.g. the resample ratio derivation).
#[inline]
#[must_use]
pub fn div_round_u128(num: u128, den: u128) -> u128 {
    (num + den / 2) / den
}

/// Round-to-nearest signed division (half away from zero).
#[inline]
#[must_use]
pub fn div_round_i64(num: i64, den: i64) -> i64 {
    debug_assert!(den > 0);
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

/// Rescale a fixed-point value between fractional-bit formats, rounding to
/// nearest when precision is dropped.
#[inline]
#[must_use]
pub fn rescale_i64(value: i64, from_bits: u32, to_bits: u32) -> i64 {
    if to_bits >= from_bits {
        value << (to_bits - from_bits)
    } else {
        div_round_i64(value, 1i64 << (from_bits - to_bits))
    }
}

/// Binary logarithm of `x` in Q16, by iterative squaring of the normalized
/// mantissa. Exact for powers of two; within 1 LSB otherwise.
///
/// `x` must be non-zero.
#[must_use]
pub fn log2_q16(x: u32) -> i64 {
    debug_assert!(x != 0);
    let msb = 31 - x.leading_zeros();
    // Normalize the mantissa into Q31 [1.0, 2.0).
    let mut v = (x as u64) << (31 - msb);
    let mut acc = (msb as i64) << 16;
    for bit in (0..16).rev() {
        v = (v * v) >> 31;
        if v >= 1u64 << 32 {
            v >>= 1;
            acc += 1 << bit;
        }
    }
    acc
}

/// Convert a linear PSD sample to dB at `db_frac_bits` fractional bits.
///
/// The calibration offset maps full scale of the Q8.23 pipeline format so
/// that a sample of 1.0 (i.e. `1 << PSD_FRAC_BITS`) is exactly 0 dB.
/// Returns `None` for a zero sample, which has no finite dB value; callers
/// clamp it to their representable floor.
#[must_use]
pub fn linear_to_db(psd: u32, db_frac_bits: u32) -> Option<i64> {
    if psd == 0 {
        return None;
    }
    let log2 = log2_q16(psd) - ((PSD_FRAC_BITS as i64) << 16);
    let db_q16 = div_round_i64(log2 * DB_PER_LOG2_Q17, 1 << 17);
    Some(rescale_i64(db_q16, 16, db_frac_bits))
}
