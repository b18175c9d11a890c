use device_qc::observability::ScanMetrics;
use std::sync::Arc;

#[test]
fn test_metrics_creation() {
    let metrics = ScanMetrics::new();
    assert_eq!(metrics.remote_calls(), 0);
    assert_eq!(metrics.remote_failures(), 0);
    assert_eq!(metrics.avg_call_latency_us(), 0);
}

#[test]
fn test_metrics_shared_between_tasks() {
    let metrics = Arc::new(ScanMetrics::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let metrics = metrics.clone();
            std::thread::spawn(move || {
                let start = metrics.start_call();
                metrics.finish_call(start, true);
                metrics.record_rows(5, 1);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.remote_calls, 4);
    assert_eq!(snapshot.rows_received, 20);
    assert_eq!(snapshot.rows_rejected, 4);
}

#[tokio::test]
async fn test_metrics_latency_tracking() {
    let metrics = ScanMetrics::new();

    let start = metrics.start_call();
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    metrics.finish_call(start, false);

    assert!(metrics.avg_call_latency_us() >= 10_000);
    assert_eq!(metrics.remote_failures(), 1);
}
