//! Integration tests for rtt-analyzer.
//!
//! These tests run a real service on an ephemeral port and drive it through
//! the HTTP client, the way the CLI does.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rtt_analyzer::protocol::{ProcessFileRequest, SaveConfigRequest};
use rtt_analyzer::{serve_with_listener, wait_for_health, ClientError, ServiceClient, Settings};
use rtt_analyzer_core::sample::RttUnit;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A service running for the duration of a test.
struct TestService {
    client: ServiceClient,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestService {
    async fn start(data_dir: &Path) -> Self {
        let mut settings = Settings::default();
        settings.storage.data_dir = Some(data_dir.to_path_buf());
        settings.input.unit = RttUnit::Milliseconds;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve_with_listener(
            listener,
            settings.service_options(),
            async move {
                let _ = rx.await;
            },
        ));

        let client =
            ServiceClient::connect(&format!("http://{addr}/"), Duration::from_secs(10)).unwrap();
        wait_for_health(&client, Duration::from_secs(10))
            .await
            .unwrap();

        Self {
            client,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn write_capture(dir: &Path, name: &str, values: &[f64]) -> String {
    let mut content = String::from("seq,RTT\n");
    for (i, v) in values.iter().enumerate() {
        content.push_str(&format!("{i},{v}\n"));
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let service = TestService::start(dir.path()).await;

    let health = service.client.health_check().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.message, "Backend is ready");

    service.stop().await;
}

#[tokio::test]
async fn test_analyze_compare_and_persist() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let first = write_capture(dir.path(), "baseline.csv", &[10.0, 20.0, 30.0, 40.0, 50.0]);
    let second = write_capture(dir.path(), "candidate.csv", &[33.0]);

    let service = TestService::start(&data).await;
    let client = &service.client;

    let result = client
        .process_file(&ProcessFileRequest::new(&first))
        .await
        .unwrap();
    assert_eq!(result.base_name, "baseline");
    assert_eq!(result.stats.mean_ms, 30.0);
    assert!((result.stats.p90_ms - 46.0).abs() < 1e-9);
    assert_eq!(result.chart_data.x, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    assert!(result.comparison.is_none());

    let result = client
        .process_file(&ProcessFileRequest::new(&second))
        .await
        .unwrap();
    let delta = result.comparison.unwrap();
    assert_eq!(delta.mean_ms.value, 30.0);
    assert!((delta.mean_ms.change - 10.0).abs() < 1e-9);

    service.stop().await;

    // History survives a restart
    let service = TestService::start(&data).await;
    let view = service.client.get_comparisons().await.unwrap();
    let names: Vec<_> = view.all_rows.iter().map(|r| r.source_file.as_str()).collect();
    assert_eq!(names, vec!["baseline", "candidate"]);
    assert_eq!(view.columns.len(), 8);

    service.stop().await;
}

#[tokio::test]
async fn test_failed_analysis_reports_status() {
    let dir = TempDir::new().unwrap();
    let service = TestService::start(dir.path()).await;
    let client = &service.client;

    let missing = dir.path().join("missing.csv").display().to_string();
    let err = client
        .process_file(&ProcessFileRequest::new(missing))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));

    let empty = dir.path().join("empty.csv");
    fs::write(&empty, "seq,RTT\n").unwrap();
    let err = client
        .process_file(&ProcessFileRequest::new(empty.display().to_string()))
        .await
        .unwrap_err();
    match err {
        ClientError::Api { status, detail } => {
            assert_eq!(status, 400);
            assert!(detail.contains("no valid RTT data"));
        }
        other => panic!("Expected Api error, got {other:?}"),
    }

    assert!(client.get_comparisons().await.unwrap().all_rows.is_empty());
    service.stop().await;
}

#[tokio::test]
async fn test_output_base_dir_override() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("results");
    fs::create_dir(&out).unwrap();
    let capture = write_capture(dir.path(), "run.csv", &[1.0, 2.0]);

    let service = TestService::start(&dir.path().join("data")).await;
    let result = service
        .client
        .process_file(
            &ProcessFileRequest::new(capture).with_output_base_dir(out.display().to_string()),
        )
        .await
        .unwrap();

    assert!(out.join("run_results").join("run.csv").is_file());
    assert_eq!(
        result.output_dir,
        out.join("run_results").display().to_string()
    );

    service.stop().await;
}

#[tokio::test]
async fn test_merge_delete_clear() {
    let dir = TempDir::new().unwrap();
    let service = TestService::start(&dir.path().join("data")).await;
    let client = &service.client;

    for (name, value) in [("a.csv", 10.0), ("b.csv", 20.0), ("c.csv", 60.0)] {
        let path = write_capture(dir.path(), name, &[value]);
        client
            .process_file(&ProcessFileRequest::new(path))
            .await
            .unwrap();
    }

    assert_eq!(client.merge_rows(vec![0, 2]).await.unwrap(), 2);
    let view = client.get_comparisons().await.unwrap();
    assert_eq!(view.all_rows.len(), 2);
    assert_eq!(view.all_rows[0].source_file, "b");
    assert_eq!(view.all_rows[1].source_file, "a (merged)");
    assert_eq!(view.all_rows[1].mean_ms, 35.0);

    let err = client.merge_rows(vec![0]).await.unwrap_err();
    assert_eq!(err.status(), Some(400));

    let err = client.delete_rows(vec![5]).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(client.get_comparisons().await.unwrap().all_rows.len(), 2);

    assert_eq!(client.delete_rows(vec![0]).await.unwrap(), 1);
    let view = client.get_comparisons().await.unwrap();
    assert_eq!(view.all_rows.len(), 1);
    assert_eq!(view.all_rows[0].source_file, "a (merged)");

    client.clear_comparisons().await.unwrap();
    client.clear_comparisons().await.unwrap();
    let view = client.get_comparisons().await.unwrap();
    assert!(view.all_rows.is_empty());
    assert!(view.columns.is_empty());

    service.stop().await;
}

#[tokio::test]
async fn test_config_roundtrip() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let service = TestService::start(&data).await;

    service
        .client
        .save_config(&SaveConfigRequest {
            input_dir: "/captures".to_string(),
            output_base_dir: "/results".to_string(),
        })
        .await
        .unwrap();
    service.stop().await;

    let service = TestService::start(&data).await;
    let config = service.client.get_config().await.unwrap();
    assert_eq!(config.input_dir, "/captures");
    assert_eq!(config.output_base_dir, "/results");
    assert_eq!(
        config.comparisons_file,
        data.join("comparisons.csv").display().to_string()
    );

    service.stop().await;
}

#[test]
fn test_service_client_connect_validation() {
    let timeout = Duration::from_secs(1);

    // Valid URLs should work
    assert!(ServiceClient::connect("http://localhost:8000", timeout).is_ok());
    assert!(ServiceClient::connect("https://localhost:8000", timeout).is_ok());

    // Invalid URLs should fail
    let result = ServiceClient::connect("localhost:8000", timeout);
    assert!(matches!(result, Err(ClientError::InvalidUrl(_))));

    let result = ServiceClient::connect("ftp://localhost:8000", timeout);
    assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
}
