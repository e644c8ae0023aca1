// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated tuner front-end for development and testing.
//!
//! Holds front-end state in memory and answers every command with a
//! completion message after a short delay. No hardware required. The
//! synthesized PSD is deterministic: a pseudo-random noise floor seeded by
//! the tuned frequency, the configured carriers, and a DC spur pinned to
//! bin zero so the two-pass DC cancellation has something to remove.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;

use swa_engine::{GainController, HardwarePipeline, PipelineParams, ScanEvent, TunerPort};

use crate::config::SignalConfig;

/// State shared between the simulated ports.
struct SimShared {
    tuned_hz: AtomicU32,
}

/// Simulated tuner: retunes instantly, completes after a settle delay.
///
/// All simulated ports hold a weak sender to the event queue so the scan
/// task still shuts down once the host drops its own sender.
pub struct SimTuner {
    shared: Arc<SimShared>,
    tx: mpsc::WeakSender<ScanEvent>,
}

/// Simulated IF gain loop.
pub struct SimGain {
    tx: mpsc::WeakSender<ScanEvent>,
}

/// Simulated capture/FFT pipeline.
pub struct SimPipeline {
    shared: Arc<SimShared>,
    tx: mpsc::WeakSender<ScanEvent>,
    signal: SignalConfig,
    bin_spacing_hz: u32,
    fft_size: usize,
}

/// Linear PSD value of the simulated DC artifact at bin zero.
const DC_SPUR_LEVEL: u32 = 1 << 16;

/// Build the three simulated ports sharing one front-end state.
pub fn sim_ports(
    signal: SignalConfig,
    bin_spacing_hz: u32,
    tx: &mpsc::Sender<ScanEvent>,
) -> (SimTuner, SimGain, SimPipeline) {
    let shared = Arc::new(SimShared {
        tuned_hz: AtomicU32::new(0),
    });
    (
        SimTuner {
            shared: shared.clone(),
            tx: tx.downgrade(),
        },
        SimGain { tx: tx.downgrade() },
        SimPipeline {
            shared,
            tx: tx.downgrade(),
            signal,
            bin_spacing_hz,
            fft_size: 0,
        },
    )
}

impl TunerPort for SimTuner {
    fn retune(&mut self, generation: u64, freq_hz: u32, _bandwidth_hz: u32) {
        self.shared.tuned_hz.store(freq_hz, Ordering::SeqCst);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(1)).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(ScanEvent::Tuned { generation }).await;
            }
        });
    }
}

impl GainController for SimGain {
    fn start_settle(&mut self, generation: u64) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(2)).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(ScanEvent::GainSettled { generation }).await;
            }
        });
    }

    fn override_gain(&mut self, value: u16) {
        debug!("sim gain override: {}", value);
    }
}

impl HardwarePipeline for SimPipeline {
    fn configure(&mut self, params: &PipelineParams) {
        self.fft_size = params.fft_size;
    }

    fn capture(&mut self, generation: u64, _len: usize) {
        let tuned_hz = self.shared.tuned_hz.load(Ordering::SeqCst);
        let fragment =
            synthesize_fragment(&self.signal, tuned_hz, self.fft_size, self.bin_spacing_hz);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(1)).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(ScanEvent::FragmentReady {
                        generation,
                        fragment,
                    })
                    .await;
            }
        });
    }
}

/// Synthesize one PSD fragment for the given tuned frequency.
///
/// FFT layout: bins `0..n/2` are the positive offsets from the tuned
/// center, bins `n/2..n` the negative ones.
fn synthesize_fragment(
    signal: &SignalConfig,
    tuned_hz: u32,
    fft_size: usize,
    bin_spacing_hz: u32,
) -> Box<[u32]> {
    let n = fft_size as i64;
    let spacing = i64::from(bin_spacing_hz);
    let mut psd = vec![0u32; fft_size].into_boxed_slice();

    for (k, value) in psd.iter_mut().enumerate() {
        let offset = if (k as i64) < n / 2 {
            k as i64
        } else {
            k as i64 - n
        };
        let bin_hz = i64::from(tuned_hz) + offset * spacing;

        let jitter = xorshift32(tuned_hz ^ (k as u32).wrapping_mul(0x9e37_79b9));
        let mut level = signal.noise_floor + jitter % (signal.noise_floor / 4 + 1);

        for carrier in &signal.carriers {
            if (bin_hz - i64::from(carrier.freq_hz)).abs() <= spacing / 2 {
                level = level.saturating_add(carrier.level);
            }
        }

        // The DC artifact sits at the tuned frequency no matter where the
        // tuner points.
        if offset.abs() <= 1 {
            level = level.saturating_add(DC_SPUR_LEVEL);
        }

        *value = level;
    }

    psd
}

fn xorshift32(seed: u32) -> u32 {
    let mut x = seed | 1;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CarrierConfig;

    fn signal() -> SignalConfig {
        SignalConfig {
            noise_floor: 1 << 10,
            carriers: vec![CarrierConfig {
                freq_hz: 474_500_000,
                level: 1 << 22,
            }],
        }
    }

    #[test]
    fn test_fragment_is_deterministic() {
        let a = synthesize_fragment(&signal(), 474_000_000, 128, 50_000);
        let b = synthesize_fragment(&signal(), 474_000_000, 128, 50_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_carrier_lands_on_expected_bin() {
        // Carrier 500 kHz above center with 50 kHz bins: bin 10.
        let psd = synthesize_fragment(&signal(), 474_000_000, 128, 50_000);
        assert!(psd[10] >= 1 << 22);
        assert!(psd[20] < 1 << 14);
    }

    #[test]
    fn test_carrier_in_negative_half() {
        // Carrier 500 kHz below a center of 475.0 MHz: bin n - 10.
        let psd = synthesize_fragment(&signal(), 475_000_000, 128, 50_000);
        assert!(psd[128 - 10] >= 1 << 22);
    }

    #[test]
    fn test_dc_spur_follows_the_tuner() {
        let psd = synthesize_fragment(&signal(), 600_000_000, 128, 50_000);
        assert!(psd[0] >= DC_SPUR_LEVEL);
        assert!(psd[1] >= DC_SPUR_LEVEL);
        assert!(psd[127] >= DC_SPUR_LEVEL);
        assert!(psd[5] < DC_SPUR_LEVEL);
    }
}
