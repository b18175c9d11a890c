use async_trait::async_trait;
use device_qc::config::{RemoteConfig, TimeoutPolicy};
use device_qc::core::IMPEDANCE_COLUMNS;
use device_qc::hal::mock::SimulatedControlBoard;
use device_qc::hal::{CommandHandler, ControlBoardProxy, Hub, CONTROL_BOARD_PEER};
use device_qc::scan::{ImpedanceSweep, SweepConfig};
use device_qc::QcError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn sweep_with(board: SimulatedControlBoard, remote: RemoteConfig) -> ImpedanceSweep {
    let mut hub = Hub::new();
    hub.register(board);
    let proxy = ControlBoardProxy::new(Arc::new(hub), CONTROL_BOARD_PEER);
    ImpedanceSweep::new(Arc::new(proxy), remote)
}

#[tokio::test]
async fn test_fast_sweep_keeps_only_actuated_rows() {
    let board = SimulatedControlBoard::new(16).with_sagging_channels([2]);
    let sweep = sweep_with(board.clone(), RemoteConfig::default());

    let config = SweepConfig::new([1, 2, 5], 100.0, 10e3);
    let table = sweep.run(&config).await.unwrap();

    // 5 sampling windows for each of the two healthy channels
    assert_eq!(table.len(), 10);
    assert!(table.rows.iter().all(|r| r.v_actuation > 90.0));
    assert_eq!(table.channels(), vec![1, 5]);
    assert_eq!(board.commands(), vec!["channel_count", "sweep_channels"]);
}

#[tokio::test]
async fn test_fast_sweep_never_returns_unrequested_channels() {
    let board = SimulatedControlBoard::new(8).with_stray_channel(7);
    let sweep = sweep_with(board, RemoteConfig::default());

    let table = sweep.run(&SweepConfig::new([0, 3], 50.0, 1e3)).await.unwrap();

    assert!(!table.is_empty());
    assert!(table.rows.iter().all(|r| r.channel_i == 0 || r.channel_i == 3));
}

#[tokio::test]
async fn test_out_of_range_channel_makes_no_measurement_call() {
    let board = SimulatedControlBoard::new(8);
    let sweep = sweep_with(board.clone(), RemoteConfig::default());

    let err = sweep
        .run(&SweepConfig::new([3, 8], 100.0, 10e3))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        QcError::InvalidChannel { channel: 8, channel_count: 8 }
    ));
    assert_eq!(board.commands(), vec!["channel_count"]);
    assert_eq!(board.measurement_calls(), 0);
}

#[tokio::test]
async fn test_invalid_config_makes_no_remote_call() {
    let board = SimulatedControlBoard::new(8);
    let sweep = sweep_with(board.clone(), RemoteConfig::default());

    let err = sweep
        .run(&SweepConfig::new([1], -5.0, 10e3))
        .await
        .unwrap_err();

    assert!(matches!(err, QcError::InvalidConfig(_)));
    assert!(board.commands().is_empty());
}

#[tokio::test]
async fn test_slow_sweep_returns_partial_rows_on_peer_failure() {
    let board = SimulatedControlBoard::new(10).fail_on_measure(3);
    let sweep = sweep_with(board.clone(), RemoteConfig::default());

    let config = SweepConfig::new([2, 5, 7], 100.0, 10e3).with_slow_scan(true);
    let table = sweep.run(&config).await.unwrap();

    assert_eq!(table.channels(), vec![2, 5]);
    assert_eq!(table.len(), 10);
    assert_eq!(board.measurement_calls(), 3);

    // Every row carries the start time of the call that produced it
    let starts = |channel: usize| {
        let mut stamps: Vec<_> = table
            .rows
            .iter()
            .filter(|r| r.channel_i == channel)
            .map(|r| r.utc_start)
            .collect();
        stamps.dedup();
        stamps
    };
    let (first, second) = (starts(2), starts(5));
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(first[0] <= second[0]);
}

#[tokio::test]
async fn test_slow_sweep_with_nothing_passing_still_has_columns() {
    let board = SimulatedControlBoard::new(10).with_sagging_channels([2, 5, 7]);
    let sweep = sweep_with(board, RemoteConfig::default());

    let config = SweepConfig::new([2, 5, 7], 100.0, 10e3).with_slow_scan(true);
    let table = sweep.run(&config).await.unwrap();

    assert!(table.is_empty());
    let frame = table.to_table();
    assert_eq!(frame.len(), 0);
    assert_eq!(frame.column_names(), IMPEDANCE_COLUMNS.to_vec());
}

#[tokio::test]
async fn test_rows_with_missing_values_are_dropped() {
    let board = SimulatedControlBoard::new(4).with_missing_channels([1]);
    let sweep = sweep_with(board, RemoteConfig::default());

    let table = sweep.run(&SweepConfig::new([0, 1], 10.0, 1e3)).await.unwrap();

    assert_eq!(table.channels(), vec![0]);
}

#[tokio::test]
async fn test_fast_sweep_timeout_is_fatal() {
    let board = SimulatedControlBoard::new(4).with_delay(Duration::from_millis(200));
    let remote = RemoteConfig {
        channel_count_timeout_s: 1.0,
        sweep_timeout: TimeoutPolicy::Flat(0.05),
        ..RemoteConfig::default()
    };
    let sweep = sweep_with(board, remote);

    let err = sweep.run(&SweepConfig::new([0], 10.0, 1e3)).await.unwrap_err();
    assert!(matches!(err, QcError::RemoteTimeout { ref command, .. } if command == "sweep_channels"));
}

#[tokio::test]
async fn test_slow_sweep_timeout_is_not_swallowed() {
    let board = SimulatedControlBoard::new(4).with_delay(Duration::from_millis(200));
    let remote = RemoteConfig {
        channel_count_timeout_s: 1.0,
        measure_timeout_s: 0.05,
        ..RemoteConfig::default()
    };
    let sweep = sweep_with(board, remote);

    let config = SweepConfig::new([0, 1], 10.0, 1e3).with_slow_scan(true);
    let err = sweep.run(&config).await.unwrap_err();
    assert!(matches!(err, QcError::RemoteTimeout { .. }));
}

#[tokio::test]
async fn test_channel_count_queried_on_every_sweep() {
    let board = SimulatedControlBoard::new(4);
    let sweep = sweep_with(board.clone(), RemoteConfig::default());
    let config = SweepConfig::new([0], 10.0, 1e3);

    sweep.run(&config).await.unwrap();
    sweep.run(&config).await.unwrap();

    let counts = board
        .commands()
        .iter()
        .filter(|c| c.as_str() == "channel_count")
        .count();
    assert_eq!(counts, 2);
}

#[tokio::test]
async fn test_metrics_track_rejections() {
    let board = SimulatedControlBoard::new(8).with_sagging_channels([1]);
    let sweep = sweep_with(board, RemoteConfig::default());

    let config = SweepConfig::new([0, 1], 100.0, 10e3).with_sampling_windows(3);
    sweep.run(&config).await.unwrap();

    let snap = sweep.metrics().snapshot();
    assert_eq!(snap.remote_calls, 2);
    assert_eq!(snap.remote_failures, 0);
    assert_eq!(snap.rows_received, 6);
    assert_eq!(snap.rows_rejected, 3);
}

/// Board that answers every sweep with one undated and one dated reading
struct UndatedBoard;

#[async_trait]
impl CommandHandler for UndatedBoard {
    fn peer_name(&self) -> &str {
        CONTROL_BOARD_PEER
    }

    async fn handle(&self, command: &str, _args: Value) -> Result<Value, String> {
        let reading = |utc_start: Value| {
            json!({
                "utc_start": utc_start,
                "seconds": 0.0,
                "channel_i": 1,
                "frequency": 1e3,
                "V_actuation": 100.0,
                "capacitance": 1e-13,
                "impedance": 1e6,
            })
        };
        match command {
            "channel_count" => Ok(json!(4)),
            "sweep_channels" => Ok(json!([
                reading(Value::Null),
                reading(json!("2024-05-01T12:00:00Z")),
            ])),
            _ => Err(format!("unknown command '{}'", command)),
        }
    }
}

#[tokio::test]
async fn test_readings_without_timestamp_are_dropped() {
    let mut hub = Hub::new();
    hub.register(UndatedBoard);
    let proxy = ControlBoardProxy::new(Arc::new(hub), CONTROL_BOARD_PEER);
    let sweep = ImpedanceSweep::new(Arc::new(proxy), RemoteConfig::default());

    let table = sweep.run(&SweepConfig::new([1], 100.0, 1e3)).await.unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(
        table.rows[0].utc_start.to_rfc3339(),
        "2024-05-01T12:00:00+00:00"
    );
}

#[tokio::test]
async fn test_unvalidated_timeouts_are_rejected_before_any_call() {
    let board = SimulatedControlBoard::new(4);
    let remote = RemoteConfig {
        channel_count_timeout_s: -1.0,
        measure_timeout_s: f64::NAN,
        ..RemoteConfig::default()
    };
    let sweep = sweep_with(board.clone(), remote);

    let err = sweep
        .run(&SweepConfig::new([0], 10.0, 1e3).with_slow_scan(true))
        .await
        .unwrap_err();

    assert!(matches!(err, QcError::InvalidConfig(_)));
    assert!(board.commands().is_empty());
}
