//! Peripherals Module
//!
//! Publishes metrics as FTMS GATT payloads. The radio transport lives
//! outside this crate: payloads are handed to a [`Notifier`], which a
//! Bluetooth or ANT+ bridge implements. [`TracingNotifier`] logs them.

pub mod ftms;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::RowerEvent;
use crate::types::Metrics;
use ftms::{Characteristic, MachineStatus};

/// FTMS profile advertised to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralMode {
    #[default]
    Rower,
    /// Indoor bike profile, for apps that do not speak Rower Data
    Bike,
}

impl std::fmt::Display for PeripheralMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeripheralMode::Rower => write!(f, "rower"),
            PeripheralMode::Bike => write!(f, "bike"),
        }
    }
}

// ============================================================================
// Notifier seam
// ============================================================================

/// Sink for characteristic notifications.
pub trait Notifier: Send {
    fn notify(&mut self, characteristic: Characteristic, payload: &[u8]);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, characteristic: Characteristic, payload: &[u8]) {
        (**self).notify(characteristic, payload);
    }
}

/// Hex dump of a payload, e.g. `2c 01 31`.
pub fn hex_string(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logs every payload at `debug` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, characteristic: Characteristic, payload: &[u8]) {
        debug!(
            characteristic = %characteristic,
            uuid = characteristic.uuid16(),
            payload = %hex_string(payload),
            "FTMS notify"
        );
    }
}

// ============================================================================
// FTMS peripheral
// ============================================================================

pub struct FtmsPeripheral<N: Notifier> {
    mode: PeripheralMode,
    notifier: N,
    session_started: bool,
}

impl<N: Notifier> FtmsPeripheral<N> {
    pub fn new(mode: PeripheralMode, notifier: N) -> Self {
        Self {
            mode,
            notifier,
            session_started: false,
        }
    }

    pub fn mode(&self) -> PeripheralMode {
        self.mode
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Read-only Fitness Machine Feature value for the active profile.
    pub fn features(&self) -> [u8; ftms::FEATURE_LEN] {
        match self.mode {
            PeripheralMode::Rower => ftms::rower_features(),
            PeripheralMode::Bike => ftms::indoor_bike_features(),
        }
    }

    /// Notify the data characteristic. Returns `false` when the snapshot
    /// lacks the profile's mandatory fields.
    pub fn notify_metrics(&mut self, metrics: &Metrics) -> bool {
        match self.mode {
            PeripheralMode::Rower => match ftms::encode_rower_data(metrics) {
                Some(payload) => {
                    self.notifier.notify(Characteristic::RowerData, &payload);
                    true
                }
                None => false,
            },
            PeripheralMode::Bike => match ftms::encode_indoor_bike_data(metrics) {
                Some(payload) => {
                    self.notifier.notify(Characteristic::IndoorBikeData, &payload);
                    true
                }
                None => false,
            },
        }
    }

    /// Status notification for session transitions carried by `event`.
    pub fn notify_event(&mut self, event: &RowerEvent) {
        match event {
            RowerEvent::DriveStarted if !self.session_started => {
                self.session_started = true;
                self.notify_status(MachineStatus::StartedOrResumed);
            }
            RowerEvent::Resumed => {
                self.session_started = true;
                self.notify_status(MachineStatus::StartedOrResumed);
            }
            RowerEvent::Paused => self.notify_status(MachineStatus::Paused),
            _ => {}
        }
    }

    pub fn notify_reset(&mut self) {
        self.session_started = false;
        self.notify_status(MachineStatus::Reset);
    }

    pub fn notify_stopped(&mut self) {
        self.notify_status(MachineStatus::Stopped);
    }

    fn notify_status(&mut self, status: MachineStatus) {
        self.notifier
            .notify(Characteristic::FitnessMachineStatus, &status.encode());
    }
}
