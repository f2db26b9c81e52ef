//! Deterministic flywheel simulator.
//!
//! Integrates `I·dω/dt = τ(t) − k·ω²` with a midpoint (RK2) step and reports
//! the time between successive sensor impulses, linearly interpolating the
//! moment each impulse angle is crossed. `τ(t)` is a square wave: constant
//! torque during the drive, zero during the recovery. After the last stroke
//! the flywheel coasts for `spin_down_time` seconds.

use std::f64::consts::TAU;

use crate::config::defaults;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub inertia: f64,
    pub drag_factor: f64,
    pub impulses_per_revolution: u32,
    /// Handle torque during the drive (N·m)
    pub drive_torque: f64,
    pub drive_time: f64,
    pub recovery_time: f64,
    pub initial_angular_velocity: f64,
    pub strokes: usize,
    pub spin_down_time: f64,
    pub time_step: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            inertia: defaults::FLYWHEEL_INERTIA,
            drag_factor: defaults::INITIAL_DRAG_FACTOR,
            impulses_per_revolution: defaults::IMPULSES_PER_REVOLUTION,
            drive_torque: 4.0,
            drive_time: 0.8,
            recovery_time: 1.6,
            initial_angular_velocity: 100.0,
            strokes: 10,
            spin_down_time: 8.0,
            time_step: defaults::SIMULATION_TIME_STEP,
        }
    }
}

impl SimulatorConfig {
    pub fn stroke_time(&self) -> f64 {
        self.drive_time + self.recovery_time
    }

    /// Length of the simulated session (s).
    pub fn session_time(&self) -> f64 {
        self.strokes as f64 * self.stroke_time() + self.spin_down_time
    }
}

#[derive(Debug, Clone)]
pub struct FlywheelSimulator {
    config: SimulatorConfig,
}

impl FlywheelSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn applied_torque(&self, t: f64, drive_torques: &[f64]) -> f64 {
        let c = &self.config;
        let stroke_time = c.stroke_time();
        if stroke_time <= 0.0 || t >= c.strokes as f64 * stroke_time {
            return 0.0;
        }
        if t % stroke_time >= c.drive_time {
            return 0.0;
        }
        let stroke = (t / stroke_time) as usize;
        drive_torques.get(stroke).copied().unwrap_or(c.drive_torque)
    }

    fn acceleration(&self, t: f64, omega: f64, drive_torques: &[f64]) -> f64 {
        (self.applied_torque(t, drive_torques) - self.config.drag_factor * omega * omega)
            / self.config.inertia
    }

    /// Time between consecutive impulses over the whole session (s).
    pub fn impulse_intervals(&self) -> Vec<f64> {
        self.impulse_intervals_with_torques(&[])
    }

    /// Like [`impulse_intervals`](Self::impulse_intervals), with the drive
    /// torque of stroke `n` taken from `drive_torques[n]`. Strokes beyond
    /// the slice use the configured torque.
    pub fn impulse_intervals_with_torques(&self, drive_torques: &[f64]) -> Vec<f64> {
        let c = &self.config;
        let step = TAU / f64::from(c.impulses_per_revolution.max(1));
        let h = c.time_step;
        let end = c.session_time();
        if h <= 0.0 || c.inertia <= 0.0 {
            return Vec::new();
        }

        let mut intervals = Vec::new();
        let (mut t, mut theta, mut omega) = (0.0_f64, 0.0_f64, c.initial_angular_velocity);
        let mut next_impulse = step;
        let mut last_impulse_time = 0.0;

        while t < end && omega > 0.0 {
            let k1 = self.acceleration(t, omega, drive_torques);
            let omega_mid = omega + 0.5 * h * k1;
            let k2 = self.acceleration(t + 0.5 * h, omega_mid, drive_torques);
            let next_omega = omega + h * k2;
            let next_theta = theta + h * omega_mid;

            while next_theta >= next_impulse {
                let fraction = (next_impulse - theta) / (next_theta - theta);
                let crossing = t + fraction * h;
                intervals.push(crossing - last_impulse_time);
                last_impulse_time = crossing;
                next_impulse += step;
            }

            t += h;
            theta = next_theta;
            omega = next_omega;
        }
        intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_torque_balances_drag() {
        // τ = k·ω² at ω = 100 keeps the flywheel at constant speed
        let drag = defaults::INITIAL_DRAG_FACTOR;
        let sim = FlywheelSimulator::new(SimulatorConfig {
            drive_torque: drag * 100.0 * 100.0,
            drive_time: 10.0,
            recovery_time: 0.0,
            strokes: 1,
            spin_down_time: 0.0,
            ..SimulatorConfig::default()
        });
        let intervals = sim.impulse_intervals();
        let expected = TAU / 6.0 / 100.0;
        for dt in intervals.iter().skip(1) {
            assert!((dt - expected).abs() < 1e-6, "dt {dt}");
        }
    }

    #[test]
    fn test_interval_sum_matches_session_time() {
        let sim = FlywheelSimulator::new(SimulatorConfig {
            strokes: 2,
            ..SimulatorConfig::default()
        });
        let total: f64 = sim.impulse_intervals().iter().sum();
        let session = sim.config().session_time();
        assert!(total <= session + 1e-3);
        assert!(session - total < 0.1);
    }

    #[test]
    fn test_drive_shortens_intervals() {
        let sim = FlywheelSimulator::new(SimulatorConfig {
            strokes: 1,
            ..SimulatorConfig::default()
        });
        let intervals = sim.impulse_intervals();
        let first = intervals[0];
        let mut elapsed = 0.0;
        let at_drive_end = intervals
            .iter()
            .find(|dt| {
                elapsed += **dt;
                elapsed >= 0.8
            })
            .copied()
            .unwrap();
        assert!(at_drive_end < first);
        assert!(intervals.last().copied().unwrap() > at_drive_end);
    }

    #[test]
    fn test_stronger_drive_spins_faster() {
        let sim = FlywheelSimulator::new(SimulatorConfig {
            strokes: 2,
            spin_down_time: 0.0,
            ..SimulatorConfig::default()
        });
        let uniform = sim.impulse_intervals();
        let stronger = sim.impulse_intervals_with_torques(&[4.0, 6.0]);
        assert_eq!(sim.impulse_intervals_with_torques(&[4.0, 4.0]), uniform);
        assert!(stronger.len() > uniform.len());
    }
}
