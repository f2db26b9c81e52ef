//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()`, feed it
//! from a real `ProcessingLoop` replaying a simulated session, and exercise
//! the endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use rowing_monitor::api::{create_app, DashboardState, MetricsFeed};
use rowing_monitor::config::MonitorConfig;
use rowing_monitor::peripherals::TracingNotifier;
use rowing_monitor::pipeline::source::{FileSource, LineSource};
use rowing_monitor::pipeline::{AppState, LoopChannels, ProcessingLoop, SessionCommand, SystemStatus};
use rowing_monitor::simulation::{FlywheelSimulator, SimulatorConfig};
use rowing_monitor::types::{HeartRateMeasurement, SessionState};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct Harness {
    app_state: Arc<RwLock<AppState>>,
    feed: MetricsFeed,
    dashboard: DashboardState,
    channels: Option<LoopChannels>,
}

fn harness() -> Harness {
    let app_state = Arc::new(RwLock::new(AppState::default()));
    let feed = MetricsFeed::new(256);
    let (commands_tx, commands) = mpsc::channel::<SessionCommand>(8);
    let (heart_rate_tx, heart_rate) = mpsc::channel::<HeartRateMeasurement>(8);
    let dashboard = DashboardState {
        app_state: app_state.clone(),
        feed: feed.clone(),
        commands: commands_tx,
        heart_rate: heart_rate_tx,
    };
    Harness {
        app_state,
        feed,
        dashboard,
        channels: Some(LoopChannels {
            commands,
            heart_rate,
        }),
    }
}

fn app(harness: &Harness) -> Router {
    create_app(harness.dashboard.clone())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn replay_session(harness: &mut Harness, strokes: usize) {
    let intervals = FlywheelSimulator::new(SimulatorConfig {
        strokes,
        ..SimulatorConfig::default()
    })
    .impulse_intervals();
    let processing = ProcessingLoop::new(
        &MonitorConfig::default(),
        TracingNotifier,
        harness.app_state.clone(),
        harness.feed.clone(),
        harness.channels.take().unwrap(),
        CancellationToken::new(),
    );
    let mut source = FileSource::from_intervals(intervals, false);
    processing.run(&mut source).await;
}

#[tokio::test]
async fn test_health_before_any_data() {
    let h = harness();
    let (status, json) = get_json(app(&h), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Initializing");
    assert!(json["source"].is_null());
}

#[tokio::test]
async fn test_metrics_empty_before_first_stroke() {
    let h = harness();
    let (status, json) = get_json(app(&h), "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], serde_json::json!({}));
}

#[tokio::test]
async fn test_replayed_session_is_served() {
    let mut h = harness();
    replay_session(&mut h, 6).await;

    let (_, health) = get_json(app(&h), "/health").await;
    assert_eq!(health["status"], "SourceEnded");
    assert_eq!(health["source"], "file");
    assert!(health["impulses_processed"].as_u64().unwrap() > 0);

    let (status, json) = get_json(app(&h), "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["strokesTotal"], 5);
    assert_eq!(data["sessionState"], "paused");
    assert_eq!(data["strokeState"], "stopped");
    let spm = data["strokesPerMinute"].as_f64().unwrap();
    assert!((spm - 25.0).abs() < 2.0, "spm = {spm}");
    assert!(data["distanceTotal"].as_f64().unwrap() > 0.0);
    assert!(data.get("heartrate").is_none());
}

#[tokio::test]
async fn test_feed_reset_payload_keeps_heart_rate() {
    let mut h = harness();
    let mut frames = h.feed.subscribe();
    let cancel = CancellationToken::new();

    // Impulses arrive over a pipe that stays open, like `--stdin`
    let (mut writer, reader) = tokio::io::duplex(64 * 1024);
    let mut source = LineSource::new(BufReader::new(reader), "pipe");
    let processing = ProcessingLoop::new(
        &MonitorConfig::default(),
        TracingNotifier,
        h.app_state.clone(),
        h.feed.clone(),
        h.channels.take().unwrap(),
        cancel.clone(),
    );
    let task = tokio::spawn(async move { processing.run(&mut source).await });

    let intervals = FlywheelSimulator::new(SimulatorConfig {
        strokes: 3,
        ..SimulatorConfig::default()
    })
    .impulse_intervals();
    let text: String = intervals.iter().map(|dt| format!("{dt}\n")).collect();
    writer.write_all(text.as_bytes()).await.unwrap();

    loop {
        let frame = frames.recv().await.unwrap();
        if frame.session_state == Some(SessionState::Paused) {
            assert_eq!(frame.strokes_total, Some(2));
            break;
        }
    }

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/heartrate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"heartrate":141,"batteryLevel":72}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let frame = frames.recv().await.unwrap();
    assert_eq!(frame.heartrate, Some(141));
    assert_eq!(frame.strokes_total, Some(2));

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let frame = frames.recv().await.unwrap();
    assert_eq!(
        serde_json::to_string(&frame).unwrap(),
        r#"{"heartrate":141,"heartrateBatteryLevel":72}"#
    );

    let (_, json) = get_json(app(&h), "/api/metrics").await;
    assert_eq!(
        json["data"],
        serde_json::json!({"heartrate": 141, "heartrateBatteryLevel": 72})
    );

    cancel.cancel();
    let (stats, _) = task.await.unwrap();
    assert_eq!(stats.resets, 1);
    assert_eq!(h.app_state.read().await.status, SystemStatus::SourceEnded);
}

#[tokio::test]
async fn test_requests_rejected_after_loop_exits() {
    let mut h = harness();
    replay_session(&mut h, 1).await;

    let response = app(&h)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
