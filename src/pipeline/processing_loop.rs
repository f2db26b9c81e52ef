//! Impulse processing loop shared across all input modes.
//!
//! A single [`ProcessingLoop`] owns the [`RowingEngine`] and multiplexes
//! impulses from any [`ImpulseSource`] with session commands and heart-rate
//! measurements arriving from the API. Snapshots are written to the shared
//! [`AppState`], pushed onto the [`MetricsFeed`] and encoded for the FTMS
//! peripheral whenever the engine reports a stroke event.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{ImpulseEvent, ImpulseSource, SourceError};
use super::{AppState, SessionCommand, SystemStatus};
use crate::api::MetricsFeed;
use crate::config::MonitorConfig;
use crate::engine::{RowerEvent, RowingEngine};
use crate::peripherals::{FtmsPeripheral, Notifier};
use crate::types::HeartRateMeasurement;

/// Strokes between progress lines at `info`.
const PROGRESS_EVERY_STROKES: u32 = 10;

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub impulses_processed: u64,
    pub events_emitted: u64,
    pub strokes_completed: u32,
    pub pauses: u32,
    pub resets: u32,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session: {} impulses, {} events, {} strokes, {} pauses, {} resets",
            self.impulses_processed,
            self.events_emitted,
            self.strokes_completed,
            self.pauses,
            self.resets
        )
    }
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Receiving ends of the API channels.
pub struct LoopChannels {
    pub commands: mpsc::Receiver<SessionCommand>,
    pub heart_rate: mpsc::Receiver<HeartRateMeasurement>,
}

enum LoopInput {
    Cancelled,
    Source(Result<ImpulseEvent, SourceError>),
    Command(SessionCommand),
    HeartRate(HeartRateMeasurement),
}

/// Owns all state needed for the impulse processing loop.
///
/// Built with [`new()`](ProcessingLoop::new), then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop<N: Notifier> {
    engine: RowingEngine,
    peripheral: Option<FtmsPeripheral<N>>,
    app_state: Arc<RwLock<AppState>>,
    feed: MetricsFeed,
    channels: LoopChannels,
    cancel_token: CancellationToken,
    stats: SessionStats,
}

impl<N: Notifier> ProcessingLoop<N> {
    pub fn new(
        config: &MonitorConfig,
        notifier: N,
        app_state: Arc<RwLock<AppState>>,
        feed: MetricsFeed,
        channels: LoopChannels,
        cancel_token: CancellationToken,
    ) -> Self {
        let peripheral = config
            .peripheral
            .enabled
            .then(|| FtmsPeripheral::new(config.peripheral.mode, notifier));

        Self {
            engine: RowingEngine::new(config),
            peripheral,
            app_state,
            feed,
            channels,
            cancel_token,
            stats: SessionStats::default(),
        }
    }

    pub fn peripheral(&self) -> Option<&FtmsPeripheral<N>> {
        self.peripheral.as_ref()
    }

    /// Run until the source is exhausted, fails, or cancellation.
    ///
    /// Returns the loop statistics together with `self`, so callers can
    /// inspect the final engine and peripheral.
    pub async fn run<S: ImpulseSource>(mut self, source: &mut S) -> (SessionStats, Self) {
        info!("🚣 Processing flywheel impulses from {}...", source.source_name());
        if let Some(peripheral) = &self.peripheral {
            info!("📡 FTMS {} profile enabled", peripheral.mode());
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        {
            let mut state = self.app_state.write().await;
            state.source_name = Some(source.source_name().to_string());
            state.status = SystemStatus::Idle;
        }

        loop {
            let input = tokio::select! {
                _ = self.cancel_token.cancelled() => LoopInput::Cancelled,
                result = source.next_impulse() => LoopInput::Source(result),
                Some(command) = self.channels.commands.recv() => LoopInput::Command(command),
                Some(measurement) = self.channels.heart_rate.recv() => LoopInput::HeartRate(measurement),
            };

            match input {
                LoopInput::Cancelled => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                LoopInput::Source(Err(e)) => {
                    warn!("[ProcessingLoop] Source error: {}", e);
                    break;
                }
                LoopInput::Source(Ok(ImpulseEvent::Eof)) => {
                    info!(
                        "[ProcessingLoop] Source reached end ({} impulses processed)",
                        self.stats.impulses_processed
                    );
                    break;
                }
                LoopInput::Source(Ok(ImpulseEvent::Impulse(dt))) => self.handle_impulse(dt).await,
                LoopInput::Command(SessionCommand::Reset) => self.handle_reset().await,
                LoopInput::HeartRate(measurement) => {
                    self.engine.update_heart_rate(measurement);
                    self.publish().await;
                }
            }
        }

        if let Some(peripheral) = self.peripheral.as_mut() {
            peripheral.notify_stopped();
        }
        {
            let mut state = self.app_state.write().await;
            state.impulses_processed = self.stats.impulses_processed;
            state.status = SystemStatus::SourceEnded;
        }

        self.log_final_stats();
        (self.stats, self)
    }

    async fn handle_impulse(&mut self, dt: f64) {
        self.stats.impulses_processed += 1;
        let Some(event) = self.engine.handle_impulse(dt) else {
            return;
        };
        self.stats.events_emitted += 1;

        match &event {
            RowerEvent::RecoveryFinished(summary) => {
                self.stats.strokes_completed += 1;
                debug!(
                    stroke = summary.stroke_number,
                    power = summary.power,
                    duration = summary.stroke_duration,
                    distance = summary.distance,
                    drag_factor = summary.drag_factor,
                    "Stroke completed"
                );
                if self.stats.strokes_completed % PROGRESS_EVERY_STROKES == 0 {
                    let metrics = self.engine.metrics();
                    info!(
                        "📈 Progress: {} strokes | {:.0} m | {:.0} W | {:.1} spm",
                        self.stats.strokes_completed,
                        metrics.distance_total.unwrap_or(0.0),
                        metrics.power.unwrap_or(0.0),
                        metrics.strokes_per_minute.unwrap_or(0.0)
                    );
                }
            }
            RowerEvent::Paused => {
                self.stats.pauses += 1;
                info!("⏸️  Session paused after {} strokes", self.stats.strokes_completed);
            }
            RowerEvent::Resumed => info!("▶️  Session resumed"),
            RowerEvent::DriveStarted | RowerEvent::DriveFinished(_) => {}
        }

        if let Some(peripheral) = self.peripheral.as_mut() {
            peripheral.notify_event(&event);
        }
        self.publish().await;
    }

    async fn handle_reset(&mut self) {
        self.stats.resets += 1;
        self.engine.reset();
        if let Some(peripheral) = self.peripheral.as_mut() {
            peripheral.notify_reset();
        }
        info!("🔄 Session reset");
        self.publish().await;
    }

    /// Snapshot to shared state, feed and peripheral.
    async fn publish(&mut self) {
        let metrics = self.engine.metrics();
        if let Some(peripheral) = self.peripheral.as_mut() {
            peripheral.notify_metrics(&metrics);
        }
        {
            let mut state = self.app_state.write().await;
            state.impulses_processed = self.stats.impulses_processed;
            state.publish(metrics.clone());
        }
        self.feed.publish(metrics);
    }

    fn log_final_stats(&self) {
        let metrics = self.engine.metrics();
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 FINAL STATISTICS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Impulses Processed:   {}", self.stats.impulses_processed);
        info!("   Strokes:              {}", metrics.strokes_total.unwrap_or(0));
        info!("   Distance:             {:.1} m", metrics.distance_total.unwrap_or(0.0));
        info!("   Duration:             {:.1} s", metrics.duration_total.unwrap_or(0.0));
        info!("   Calories:             {:.1} kcal", metrics.calories_total.unwrap_or(0.0));
        info!(
            "   Drag Factor:          {:.1}",
            self.engine.rower().flywheel().drag_factor() * 1e6
        );
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::ftms::Characteristic;
    use crate::pipeline::source::FileSource;
    use crate::simulation::{FlywheelSimulator, SimulatorConfig};
    use crate::types::SessionState;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Vec<(Characteristic, Vec<u8>)>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, characteristic: Characteristic, payload: &[u8]) {
            self.sent.push((characteristic, payload.to_vec()));
        }
    }

    struct Fixture {
        processing: ProcessingLoop<RecordingNotifier>,
        app_state: Arc<RwLock<AppState>>,
        feed: MetricsFeed,
        commands: mpsc::Sender<SessionCommand>,
        heart_rate: mpsc::Sender<HeartRateMeasurement>,
        cancel: CancellationToken,
    }

    fn fixture(config: &MonitorConfig) -> Fixture {
        let app_state = Arc::new(RwLock::new(AppState::default()));
        let feed = MetricsFeed::new(256);
        let (commands, commands_rx) = mpsc::channel(4);
        let (heart_rate, heart_rate_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let processing = ProcessingLoop::new(
            config,
            RecordingNotifier::default(),
            app_state.clone(),
            feed.clone(),
            LoopChannels {
                commands: commands_rx,
                heart_rate: heart_rate_rx,
            },
            cancel.clone(),
        );
        Fixture {
            processing,
            app_state,
            feed,
            commands,
            heart_rate,
            cancel,
        }
    }

    fn session(strokes: usize) -> FileSource {
        let intervals = FlywheelSimulator::new(SimulatorConfig {
            strokes,
            ..SimulatorConfig::default()
        })
        .impulse_intervals();
        FileSource::from_intervals(intervals, false)
    }

    #[tokio::test]
    async fn test_replay_publishes_session() {
        let f = fixture(&MonitorConfig::default());
        let mut frames = f.feed.subscribe();
        let mut source = session(5);
        let total = source.remaining() as u64;

        let (stats, processing) = f.processing.run(&mut source).await;

        assert_eq!(stats.impulses_processed, total);
        assert_eq!(stats.strokes_completed, 4);
        assert_eq!(stats.pauses, 1);

        let state = f.app_state.read().await;
        assert_eq!(state.status, SystemStatus::SourceEnded);
        assert_eq!(state.source_name.as_deref(), Some("file"));
        assert_eq!(state.impulses_processed, total);
        assert_eq!(state.latest_metrics.strokes_total, Some(4));
        assert_eq!(state.latest_metrics.session_state, Some(SessionState::Paused));

        assert!(frames.try_recv().is_ok());

        let sent = &processing.peripheral().unwrap().notifier().sent;
        assert!(sent.iter().any(|(c, _)| *c == Characteristic::RowerData));
        let statuses: Vec<&Vec<u8>> = sent
            .iter()
            .filter(|(c, _)| *c == Characteristic::FitnessMachineStatus)
            .map(|(_, p)| p)
            .collect();
        assert_eq!(statuses.first().map(|p| p.as_slice()), Some(&[0x04u8, 0x00][..]));
        assert_eq!(statuses.last().map(|p| p.as_slice()), Some(&[0x02u8, 0x01][..]));
    }

    #[tokio::test]
    async fn test_disabled_peripheral_sends_nothing() {
        let mut config = MonitorConfig::default();
        config.peripheral.enabled = false;
        let f = fixture(&config);
        let (_, processing) = f.processing.run(&mut session(2)).await;
        assert!(processing.peripheral().is_none());
    }

    /// Never yields an impulse, like an idle stdin pipe.
    struct IdleSource;

    #[async_trait::async_trait]
    impl ImpulseSource for IdleSource {
        async fn next_impulse(&mut self) -> Result<ImpulseEvent, SourceError> {
            std::future::pending().await
        }

        fn source_name(&self) -> &str {
            "idle"
        }
    }

    #[tokio::test]
    async fn test_reset_and_heart_rate_are_applied() {
        let f = fixture(&MonitorConfig::default());
        let mut frames = f.feed.subscribe();
        let processing = f.processing;
        let handle = tokio::spawn(async move { processing.run(&mut IdleSource).await });

        f.heart_rate
            .send(HeartRateMeasurement {
                heartrate: Some(128),
                battery_level: None,
            })
            .await
            .unwrap();
        let first = frames.recv().await.unwrap();
        assert_eq!(first.heartrate, Some(128));
        assert_eq!(f.app_state.read().await.status, SystemStatus::Idle);

        f.commands.send(SessionCommand::Reset).await.unwrap();
        let reset = frames.recv().await.unwrap();
        assert_eq!(serde_json::to_string(&reset).unwrap(), r#"{"heartrate":128}"#);

        f.cancel.cancel();
        let (stats, processing) = handle.await.unwrap();
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.impulses_processed, 0);
        assert_eq!(f.app_state.read().await.status, SystemStatus::SourceEnded);

        let statuses: Vec<Vec<u8>> = processing
            .peripheral()
            .unwrap()
            .notifier()
            .sent
            .iter()
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(statuses, vec![vec![0x01, 0x00], vec![0x02, 0x01]]);
    }
}
