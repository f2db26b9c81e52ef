//! Flywheel Impulse Simulation
//!
//! Generates a noisy rowing session for testing the monitor. The clean
//! impulse train comes from the library flywheel model; on top of it this
//! binary adds:
//! - Gaussian timing jitter on every interval
//! - Occasional double triggers from a bouncing reed switch
//! - Stroke-to-stroke variation in handle force
//!
//! # Usage
//! ```bash
//! ./impulse-simulation --strokes 100 --realtime | ./rowing-monitor --stdin
//! ```

use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::Duration;

use rowing_monitor::simulation::{FlywheelSimulator, SimulatorConfig};

/// Gap of a spurious second trigger (s), well below the debounce window.
const DOUBLE_TRIGGER_GAP: f64 = 0.0008;
/// Intervals are never emitted shorter than this (s).
const MIN_EMITTED_INTERVAL: f64 = 0.0001;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "impulse-simulation")]
#[command(about = "Flywheel impulse generator for rowing monitor testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of strokes to row
    #[arg(short, long, default_value = "60")]
    strokes: usize,

    /// Mean handle torque during the drive (N·m)
    #[arg(long, default_value = "4.0")]
    drive_torque: f64,

    /// Stroke-to-stroke torque variation (fraction of the mean)
    #[arg(long, default_value = "0.05")]
    torque_variation: f64,

    /// Drive duration (s)
    #[arg(long, default_value = "0.8")]
    drive_time: f64,

    /// Recovery duration (s)
    #[arg(long, default_value = "1.6")]
    recovery_time: f64,

    /// Standard deviation of the timing jitter (s)
    #[arg(long, default_value = "0.0002")]
    jitter: f64,

    /// Probability that an impulse is followed by a spurious trigger
    #[arg(long, default_value = "0.002")]
    double_trigger_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Sleep for each interval before printing it
    #[arg(long)]
    realtime: bool,

    /// Suppress progress output on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn log_mission(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[impulse-simulation] {}", message);
    }
}

/// Clean impulse train with a per-stroke torque drawn around the mean.
fn generate_session(args: &Args, rng: &mut StdRng) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let torque_noise = Normal::new(1.0, args.torque_variation.max(0.0))?;
    let torques: Vec<f64> = (0..args.strokes)
        .map(|_| args.drive_torque * torque_noise.sample(&mut *rng).max(0.1))
        .collect();

    let simulator = FlywheelSimulator::new(SimulatorConfig {
        drive_torque: args.drive_torque,
        drive_time: args.drive_time,
        recovery_time: args.recovery_time,
        strokes: args.strokes,
        ..SimulatorConfig::default()
    });
    Ok(simulator.impulse_intervals_with_torques(&torques))
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let jitter = Normal::new(0.0, args.jitter.max(0.0))?;

    log_mission(&"=".repeat(60), args.quiet);
    log_mission(
        &format!(
            "{} strokes | drive {:.2} s @ {:.1} N·m | recovery {:.2} s",
            args.strokes, args.drive_time, args.drive_torque, args.recovery_time
        ),
        args.quiet,
    );
    log_mission(
        &format!(
            "jitter {:.1e} s | double trigger rate {:.3}",
            args.jitter, args.double_trigger_rate
        ),
        args.quiet,
    );
    if let Some(seed) = args.seed {
        log_mission(&format!("Random seed: {}", seed), args.quiet);
    }
    log_mission(&"=".repeat(60), args.quiet);

    let intervals = generate_session(&args, &mut rng)?;
    log_mission(&format!("{} impulses generated", intervals.len()), args.quiet);

    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();
    let double_trigger_rate = args.double_trigger_rate.clamp(0.0, 1.0);

    for dt in intervals {
        let noisy = (dt + jitter.sample(&mut rng)).max(MIN_EMITTED_INTERVAL);
        let (first, bounce) =
            if rng.gen_bool(double_trigger_rate) && noisy > 2.0 * DOUBLE_TRIGGER_GAP {
                (noisy - DOUBLE_TRIGGER_GAP, Some(DOUBLE_TRIGGER_GAP))
            } else {
                (noisy, None)
            };

        for part in std::iter::once(first).chain(bounce) {
            if args.realtime {
                std::thread::sleep(Duration::from_secs_f64(part));
            }
            if let Err(e) = writeln!(stdout_lock, "{:.7}", part) {
                // Reader went away
                if e.kind() == io::ErrorKind::BrokenPipe {
                    return Ok(());
                }
                return Err(e.into());
            }
        }
        if args.realtime {
            stdout_lock.flush()?;
        }
    }

    stdout_lock.flush()?;
    log_mission("Session complete", args.quiet);
    Ok(())
}
