// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

mod config;
mod sim;

use swa_core::compositor::PeakRecord;
use swa_core::freq::TunerGrid;
use swa_core::plan::{SamplingPlanner, SweepPlan};
use swa_engine::{
    run_scan_task, ScanEvent, ScanMachine, ScanObserver, ScanState, ScanStatus, ScanTaskDeps,
    EVENT_QUEUE_DEPTH,
};

use crate::config::Config;
use crate::sim::sim_ports;

type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Fractional bits of the published dB spectrum.
const DB_FRAC_BITS: u32 = 8;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - ", env!("CARGO_PKG_DESCRIPTION"));

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Sweep start frequency in Hz (overrides config)
    #[arg(long = "start")]
    start_hz: Option<u32>,
    /// Sweep range in Hz (overrides config)
    #[arg(long = "range")]
    range_hz: Option<u32>,
    /// Resolution bandwidth in Hz (overrides config)
    #[arg(long = "resolution")]
    resolution_hz: Option<u32>,
    /// Disable two-pass DC offset cancellation
    #[arg(long = "no-dc")]
    no_dc: bool,
    /// Print an example configuration file and exit
    #[arg(long = "example-config")]
    example_config: bool,
}

/// Observer that prints the finished sweep to stdout.
struct PrintObserver {
    start_hz: u32,
    bin_spacing_hz: u32,
}

impl ScanObserver for PrintObserver {
    fn on_scan_complete(&self, spectrum: &[i32], db_frac_bits: u32, peaks: &[PeakRecord]) {
        let scale = f64::from(1u32 << db_frac_bits);
        println!("sweep done: {} bins", spectrum.len());
        for (rank, peak) in peaks.iter().enumerate() {
            let freq_hz =
                u64::from(self.start_hz) + peak.bin as u64 * u64::from(self.bin_spacing_hz);
            println!(
                "peak {}: {:.3} MHz, {:.2} dB",
                rank + 1,
                freq_hz as f64 / 1e6,
                f64::from(peak.value_db) / scale,
            );
        }
    }
}

/// Spectrum bins the sweep will produce, for sizing the output buffer.
fn spectrum_capacity(plan: &SweepPlan, range_hz: u32) -> usize {
    let bands = u64::from(range_hz).div_ceil(u64::from(plan.tuning_step_hz)) as usize;
    let l = plan.fragment_len_bins;
    (l - l / 2) + bands.saturating_sub(1) * l
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.example_config {
        print!("{}", Config::example_toml());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(start_hz) = cli.start_hz {
        config.scan.start_hz = start_hz;
    }
    if let Some(range_hz) = cli.range_hz {
        config.scan.range_hz = range_hz;
    }
    if let Some(resolution_hz) = cli.resolution_hz {
        config.scan.resolution_hz = resolution_hz;
    }
    if cli.no_dc {
        config.scan.dc_compensation = false;
    }

    init_tracing(config.general.log_level.as_deref());

    let grid = TunerGrid::new(
        config.frontend.grid_base_hz,
        config.frontend.grid_increment_hz,
    );
    let planner = SamplingPlanner::new(grid, config.frontend.adc_rate_hz, 0);
    let scan_config = config.scan.to_scan_config();

    // Plan once up front: the simulator needs the bin spacing, and a bad
    // configuration is better rejected before the engine starts.
    let plan = planner.plan(&scan_config)?;
    let bin_spacing_hz = plan.resolution.div_ceil(1 << 16) as u32;
    let start_hz = grid.snap_down(scan_config.start_hz);
    info!(
        "sweep {:.3}..{:.3} MHz, step {} kHz, fft {}, decim {}x{}",
        f64::from(start_hz) / 1e6,
        f64::from(start_hz.saturating_add(scan_config.range_hz)) / 1e6,
        plan.tuning_step_hz / 1000,
        plan.fft_size,
        plan.cic_decimation,
        plan.fir_decimation,
    );

    let capacity = spectrum_capacity(&plan, scan_config.range_hz);
    let machine = ScanMachine::new(planner, capacity, DB_FRAC_BITS);

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let (status_tx, mut status_rx) = watch::channel(ScanStatus::default());
    let (tuner, gain, pipeline) = sim_ports(config.signal.clone(), bin_spacing_hz, &tx);
    let deps = ScanTaskDeps {
        tuner: Box::new(tuner),
        gain: Box::new(gain),
        pipeline: Box::new(pipeline),
        observer: Arc::new(PrintObserver {
            start_hz,
            bin_spacing_hz,
        }),
    };
    let task = tokio::spawn(run_scan_task(machine, deps, rx, status_tx));

    tx.send(ScanEvent::RunScan(scan_config)).await?;

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                changed.map_err(|_| "scan task exited unexpectedly")?;
                let status = status_rx.borrow().clone();
                match status.state {
                    ScanState::Idle if status.planned_bins > 0 => break,
                    ScanState::Failed(failure) => {
                        error!("scan failed: {}", failure);
                        break;
                    }
                    _ => {}
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, stopping scan");
                tx.send(ScanEvent::StopScan).await?;
                break;
            }
        }
    }

    drop(tx);
    task.await?;
    Ok(())
}

/// Initialize logging/tracing.
fn init_tracing(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}
