//! Flywheel model: impulse timing to angular velocity, acceleration and torque.
//!
//! Every accepted impulse adds a fixed angular step. The robust quadratic
//! fit of angular displacement over time gives `ω` (first derivative at the
//! newest impulse) and `α` (second derivative). Net torque on the flywheel
//! is `τ = I·α + k·ω²`.
//!
//! During the recovery only drag acts on the flywheel, so `1/ω` grows
//! linearly with slope `k/I`. Fitting that line gives a fresh drag factor
//! at the end of every recovery.

use std::f64::consts::TAU;

use crate::config::RowerConfig;
use crate::stats::{MovingAverager, RobustLinearEstimator, RobustQuadraticEstimator, StreamFilter};

#[derive(Debug, Clone)]
pub struct Flywheel {
    inertia: f64,
    magic_constant: f64,
    angular_step: f64,
    min_time_between_impulses: f64,
    max_time_between_impulses: f64,
    flank_length: usize,
    minimum_drive_torque: f64,
    auto_adjust_drag_factor: bool,
    min_drag_factor: f64,
    max_drag_factor: f64,
    min_drag_fit: f64,

    interval_filter: StreamFilter,
    flank: RobustQuadraticEstimator,
    drag_samples: RobustLinearEstimator,
    drag_factor: MovingAverager,

    total_time: f64,
    angular_displacement: f64,
    angular_velocity: f64,
    angular_acceleration: f64,
    torque: f64,
    dwelling: bool,
    in_recovery: bool,
    recovery_impulses: usize,
}

impl Flywheel {
    pub fn new(config: &RowerConfig) -> Self {
        let impulses = config.impulses_per_revolution.max(1);
        Self {
            inertia: config.flywheel_inertia,
            magic_constant: config.magic_constant,
            angular_step: TAU / f64::from(impulses),
            min_time_between_impulses: config.min_time_between_impulses,
            max_time_between_impulses: config.max_time_between_impulses,
            flank_length: config.flank_length.max(3),
            minimum_drive_torque: config.minimum_drive_torque,
            auto_adjust_drag_factor: config.auto_adjust_drag_factor,
            min_drag_factor: config.min_drag_factor,
            max_drag_factor: config.max_drag_factor,
            min_drag_fit: config.min_drag_fit,
            interval_filter: StreamFilter::new(config.smoothing, config.max_time_between_impulses),
            flank: RobustQuadraticEstimator::new(config.flank_length),
            drag_samples: RobustLinearEstimator::new(config.drag_sample_size),
            drag_factor: MovingAverager::new(config.drag_factor_smoothing, config.drag_factor),
            total_time: 0.0,
            angular_displacement: 0.0,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            torque: 0.0,
            dwelling: false,
            in_recovery: false,
            recovery_impulses: 0,
        }
    }

    /// Feed the time since the previous impulse (seconds).
    pub fn push_impulse(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        if dt > self.max_time_between_impulses {
            // Spinning down: time keeps running, the flank no longer
            // describes one continuous motion
            self.dwelling = true;
            self.total_time += dt;
            self.angular_displacement += self.angular_step;
            self.flank.reset();
            self.angular_velocity = 0.0;
            self.angular_acceleration = 0.0;
            self.torque = 0.0;
            return;
        }
        self.dwelling = false;

        let interval = if dt < self.min_time_between_impulses {
            self.interval_filter.clean()
        } else {
            self.interval_filter.push(dt);
            self.interval_filter.clean()
        };

        self.total_time += interval;
        self.angular_displacement += self.angular_step;
        self.flank.push(self.total_time, self.angular_displacement);

        if !self.is_ready() {
            return;
        }
        self.angular_velocity = self.flank.first_derivative_at(self.total_time).max(0.0);
        self.angular_acceleration = self.flank.second_derivative();
        self.torque = self.inertia * self.angular_acceleration
            + self.drag_factor() * self.angular_velocity.powi(2);

        if self.in_recovery {
            self.recovery_impulses += 1;
            // Wait until the flank holds recovery impulses only
            if self.recovery_impulses > self.flank_length && self.angular_velocity > 0.0 {
                self.drag_samples
                    .push(self.total_time, 1.0 / self.angular_velocity);
            }
        }
    }

    /// The flank window is full, so derivatives are meaningful.
    pub fn is_ready(&self) -> bool {
        self.flank.len() >= self.flank_length && self.flank.is_reliable()
    }

    pub fn is_dwelling(&self) -> bool {
        self.dwelling
    }

    pub fn is_powered(&self) -> bool {
        self.is_ready() && !self.dwelling && self.torque > self.minimum_drive_torque
    }

    pub fn is_unpowered(&self) -> bool {
        self.is_ready() && !self.dwelling && self.torque <= self.minimum_drive_torque
    }

    /// Start collecting drag samples.
    pub fn start_recovery(&mut self) {
        self.in_recovery = true;
        self.recovery_impulses = 0;
        self.drag_samples.reset();
    }

    /// Stop collecting drag samples and fold the recovery's drag estimate
    /// into the working drag factor.
    ///
    /// Returns the accepted raw estimate, if any.
    pub fn end_recovery(&mut self) -> Option<f64> {
        self.in_recovery = false;
        if !self.auto_adjust_drag_factor || !self.drag_samples.is_reliable() {
            return None;
        }
        let estimate = self.inertia * self.drag_samples.slope();
        let fit = self.drag_samples.goodness_of_fit();
        let accepted = estimate.is_finite()
            && estimate >= self.min_drag_factor
            && estimate <= self.max_drag_factor
            && fit >= self.min_drag_fit;
        if !accepted {
            return None;
        }
        self.drag_factor.push_value(estimate);
        Some(estimate)
    }

    /// Smoothed drag factor (N·m·s²).
    pub fn drag_factor(&self) -> f64 {
        self.drag_factor.moving_average()
    }

    /// Boat distance equivalent of one radian of flywheel rotation (m).
    pub fn linear_distance_per_radian(&self) -> f64 {
        (self.drag_factor() / self.magic_constant).cbrt()
    }

    pub fn angular_step(&self) -> f64 {
        self.angular_step
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn angular_displacement(&self) -> f64 {
        self.angular_displacement
    }

    /// rad/s
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// rad/s²
    pub fn angular_acceleration(&self) -> f64 {
        self.angular_acceleration
    }

    /// N·m
    pub fn torque(&self) -> f64 {
        self.torque
    }

    /// Back to a stationary flywheel. The learned drag factor is kept.
    pub fn reset(&mut self) {
        self.interval_filter.reset();
        self.flank.reset();
        self.drag_samples.reset();
        self.total_time = 0.0;
        self.angular_displacement = 0.0;
        self.angular_velocity = 0.0;
        self.angular_acceleration = 0.0;
        self.torque = 0.0;
        self.dwelling = false;
        self.in_recovery = false;
        self.recovery_impulses = 0;
    }
}
