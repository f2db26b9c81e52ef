//! Stroke detection state machine.
//!
//! ```text
//! WaitingForDrive ──powered──▶ Drive ──unpowered, ≥ min drive──▶ Recovery
//!                                ▲                                   │
//!                                └──powered, ≥ min recovery──────────┘
//! any rowing state ──dwelling or phase > max stroke time──▶ Stopped ──powered──▶ Drive
//! ```

use tracing::debug;

use super::Flywheel;
use crate::config::RowerConfig;
use crate::types::StrokeState;

/// Figures of one stroke, or of its drive only when emitted at drive end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSummary {
    /// 1-based number of the stroke within the session
    pub stroke_number: u32,
    /// Session time at which the summary was taken (s)
    pub timestamp: f64,
    pub drive_duration: f64,
    /// Zero in a drive summary
    pub recovery_duration: f64,
    /// Drive plus recovery. Provisional in a drive summary: the drive plus
    /// the previous stroke's recovery.
    pub stroke_duration: f64,
    /// Boat distance covered since the stroke began (m)
    pub distance: f64,
    /// Mean angular velocity since the stroke began (rad/s)
    pub average_angular_velocity: f64,
    /// `k·ω̄³` (W)
    pub power: f64,
    pub drag_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowerEvent {
    DriveStarted,
    DriveFinished(StrokeSummary),
    /// Completes a stroke; the next drive starts with it
    RecoveryFinished(StrokeSummary),
    Paused,
    /// First drive after a pause
    Resumed,
}

#[derive(Debug, Clone)]
pub struct Rower {
    flywheel: Flywheel,
    minimum_drive_time: f64,
    minimum_recovery_time: f64,
    maximum_stroke_time: f64,

    state: StrokeState,
    phase_start_time: f64,
    stroke_start_time: f64,
    stroke_start_angle: f64,
    stroke_start_distance: f64,
    drive_duration: f64,
    last_recovery_duration: f64,
    strokes_started: u32,
    distance_total: f64,
    moving_time: f64,
}

impl Rower {
    pub fn new(config: &RowerConfig) -> Self {
        Self {
            flywheel: Flywheel::new(config),
            minimum_drive_time: config.minimum_drive_time,
            minimum_recovery_time: config.minimum_recovery_time,
            maximum_stroke_time: config.maximum_stroke_time,
            state: StrokeState::WaitingForDrive,
            phase_start_time: 0.0,
            stroke_start_time: 0.0,
            stroke_start_angle: 0.0,
            stroke_start_distance: 0.0,
            drive_duration: 0.0,
            last_recovery_duration: config.minimum_recovery_time,
            strokes_started: 0,
            distance_total: 0.0,
            moving_time: 0.0,
        }
    }

    /// Feed one impulse interval and advance the state machine.
    pub fn handle_impulse(&mut self, dt: f64) -> Option<RowerEvent> {
        let previous_time = self.flywheel.total_time();
        self.flywheel.push_impulse(dt);
        let now = self.flywheel.total_time();

        if self.state.is_rowing() {
            if self.flywheel.is_dwelling() || now - self.phase_start_time > self.maximum_stroke_time {
                return Some(self.pause(now));
            }
            self.moving_time += now - previous_time;
            self.distance_total +=
                self.flywheel.linear_distance_per_radian() * self.flywheel.angular_step();
        }

        match self.state {
            StrokeState::WaitingForDrive | StrokeState::Stopped => {
                if !self.flywheel.is_powered() {
                    return None;
                }
                let resumed = self.state == StrokeState::Stopped;
                self.start_drive(now);
                Some(if resumed {
                    RowerEvent::Resumed
                } else {
                    RowerEvent::DriveStarted
                })
            }
            StrokeState::Drive => {
                if !self.flywheel.is_unpowered() || now - self.phase_start_time < self.minimum_drive_time {
                    return None;
                }
                self.drive_duration = now - self.phase_start_time;
                let summary = self.summary(now, 0.0, self.drive_duration + self.last_recovery_duration);
                self.state = StrokeState::Recovery;
                self.phase_start_time = now;
                self.flywheel.start_recovery();
                Some(RowerEvent::DriveFinished(summary))
            }
            StrokeState::Recovery => {
                if !self.flywheel.is_powered() || now - self.phase_start_time < self.minimum_recovery_time {
                    return None;
                }
                let recovery_duration = now - self.phase_start_time;
                if let Some(drag) = self.flywheel.end_recovery() {
                    debug!(drag_factor = drag * 1e6, "Drag factor estimate accepted");
                }
                let summary = self.summary(
                    now,
                    recovery_duration,
                    self.drive_duration + recovery_duration,
                );
                self.last_recovery_duration = recovery_duration;
                self.start_drive(now);
                Some(RowerEvent::RecoveryFinished(summary))
            }
        }
    }

    fn start_drive(&mut self, now: f64) {
        self.state = StrokeState::Drive;
        self.phase_start_time = now;
        self.stroke_start_time = now;
        self.stroke_start_angle = self.flywheel.angular_displacement();
        self.stroke_start_distance = self.distance_total;
        self.strokes_started += 1;
    }

    fn pause(&mut self, now: f64) -> RowerEvent {
        debug!(state = %self.state, time = now, "Flywheel stopped, pausing");
        if self.state == StrokeState::Recovery {
            self.flywheel.end_recovery();
        }
        // The interrupted stroke is not counted
        self.strokes_started = self.strokes_started.saturating_sub(1);
        self.state = StrokeState::Stopped;
        RowerEvent::Paused
    }

    fn summary(&self, now: f64, recovery_duration: f64, stroke_duration: f64) -> StrokeSummary {
        let elapsed = now - self.stroke_start_time;
        let average_angular_velocity = if elapsed > 0.0 {
            (self.flywheel.angular_displacement() - self.stroke_start_angle) / elapsed
        } else {
            0.0
        };
        let drag_factor = self.flywheel.drag_factor();
        StrokeSummary {
            stroke_number: self.strokes_started,
            timestamp: now,
            drive_duration: self.drive_duration,
            recovery_duration,
            stroke_duration,
            distance: self.distance_total - self.stroke_start_distance,
            average_angular_velocity,
            power: drag_factor * average_angular_velocity.powi(3),
            drag_factor,
        }
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn flywheel(&self) -> &Flywheel {
        &self.flywheel
    }

    /// Boat distance while rowing (m).
    pub fn distance_total(&self) -> f64 {
        self.distance_total
    }

    /// Time spent in drive or recovery (s).
    pub fn moving_time(&self) -> f64 {
        self.moving_time
    }

    pub fn reset(&mut self) {
        self.flywheel.reset();
        self.state = StrokeState::WaitingForDrive;
        self.phase_start_time = 0.0;
        self.stroke_start_time = 0.0;
        self.stroke_start_angle = 0.0;
        self.stroke_start_distance = 0.0;
        self.drive_duration = 0.0;
        self.last_recovery_duration = self.minimum_recovery_time;
        self.strokes_started = 0;
        self.distance_total = 0.0;
        self.moving_time = 0.0;
    }
}
