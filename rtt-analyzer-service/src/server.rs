//! HTTP server for the RTT analyzer.
//!
//! The server owns the comparison history and the saved configuration. Each
//! sits behind its own lock; an analysis holds the history lock from the
//! moment it reads the previous row until its own row is written, so
//! concurrent analyses are applied one after the other. File I/O runs on the
//! blocking thread pool.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{delete, get, post},
    Json, Router,
};
use rtt_analyzer_core::protocol::{
    AnalysisResult, ComparisonsView, Config, DataResponse, DeleteRowsRequest, DeleteRowsResponse,
    HealthResponse, MergeRowsRequest, MergeRowsResponse, ProcessFileRequest, SaveConfigRequest,
    StatusResponse,
};
use rtt_analyzer_core::sample::SampleLoader;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::analysis::Analyzer;
use crate::config_store::ConfigStore;
use crate::error::ApiError;
use crate::store::ComparisonStore;

/// Default number of rows in the short history view.
pub const DEFAULT_ROWS_VIEW_LIMIT: usize = 10;

/// Everything the service needs to start.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Location of the comparison history CSV.
    pub comparisons_file: PathBuf,
    /// Location of the saved user directories.
    pub config_file: PathBuf,
    /// Rows in the short history view; zero for all.
    pub rows_view_limit: usize,
    /// How captures are read.
    pub loader: SampleLoader,
}

impl ServiceOptions {
    /// Options that keep both files under `data_dir`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self {
            comparisons_file: data_dir.join("comparisons.csv"),
            config_file: data_dir.join("config.json"),
            rows_view_limit: DEFAULT_ROWS_VIEW_LIMIT,
            loader: SampleLoader::default(),
        }
    }
}

/// Shared state for the HTTP server.
struct AppState {
    analyzer: Analyzer,
    /// The comparison history; also serializes analyses.
    store: Mutex<ComparisonStore>,
    config: Mutex<ConfigStore>,
}

impl AppState {
    fn open(options: ServiceOptions) -> anyhow::Result<Self> {
        let store = ComparisonStore::open(&options.comparisons_file, options.rows_view_limit)?;
        let config = ConfigStore::open(
            &options.config_file,
            options.comparisons_file.display().to_string(),
        )?;

        Ok(Self {
            analyzer: Analyzer::new(options.loader),
            store: Mutex::new(store),
            config: Mutex::new(config),
        })
    }
}

/// Run `f` on the blocking thread pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {e}")))?
}

/// Health check endpoint.
///
/// GET /health
/// Returns: { "status": "ok", "message": "Backend is ready" }
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ready())
}

/// GET /get-config
async fn get_config(State(state): State<Arc<AppState>>) -> Json<DataResponse<Config>> {
    let config = state.config.lock().await;
    Json(DataResponse::new(config.get().clone()))
}

/// POST /save-config
/// Body: { "input_dir": "...", "output_base_dir": "..." }
async fn save_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveConfigRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;

    blocking(move || {
        let mut config = state.config.blocking_lock();
        config.save(request).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(StatusResponse::success(
        "Configuration saved successfully.",
    )))
}

/// Analyze a capture and append it to the history.
///
/// POST /process-file
/// Body: { "file_path": "...", "output_base_dir": "..." }
async fn process_file(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProcessFileRequest>, JsonRejection>,
) -> Result<Json<DataResponse<AnalysisResult>>, ApiError> {
    let Json(request) = payload?;
    info!("Processing {}", request.file_path);

    let result = blocking(move || {
        let mut store = state.store.blocking_lock();
        state
            .analyzer
            .process(
                &mut store,
                Path::new(&request.file_path),
                request.output_base_dir.as_deref(),
            )
            .map_err(ApiError::from)
    })
    .await?;

    let message = format!("File '{}' processed successfully.", result.base_name);
    Ok(Json(DataResponse::with_message(result, message)))
}

/// GET /get-comparisons
async fn get_comparisons(
    State(state): State<Arc<AppState>>,
) -> Json<DataResponse<ComparisonsView>> {
    let store = state.store.lock().await;
    Json(DataResponse::new(store.list()))
}

/// DELETE /clear-comparisons
async fn clear_comparisons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    blocking(move || {
        let mut store = state.store.blocking_lock();
        store.clear().map_err(ApiError::from)
    })
    .await?;

    Ok(Json(StatusResponse::success(
        "Comparisons history cleared successfully.",
    )))
}

/// Merge history rows into one averaged row.
///
/// POST /merge-rows
/// Body: { "row_indices": [0, 2], "merged_data": {...} }
async fn merge_rows(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MergeRowsRequest>, JsonRejection>,
) -> Result<Json<MergeRowsResponse>, ApiError> {
    let Json(request) = payload?;
    let count = request.row_indices.len();

    blocking(move || {
        let mut store = state.store.blocking_lock();
        let indices = store.resolve_indices(&request.row_indices)?;
        store.merge(&indices)?;
        Ok(())
    })
    .await?;

    Ok(Json(MergeRowsResponse::merged(count)))
}

/// DELETE /delete-rows
/// Body: { "row_indices": [1] }
async fn delete_rows(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteRowsRequest>, JsonRejection>,
) -> Result<Json<DeleteRowsResponse>, ApiError> {
    let Json(request) = payload?;

    let deleted = blocking(move || {
        let mut store = state.store.blocking_lock();
        let indices = store.resolve_indices(&request.row_indices)?;
        Ok(store.delete(&indices)?)
    })
    .await?;

    Ok(Json(DeleteRowsResponse::deleted(deleted)))
}

/// Build the router with all endpoints.
fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/get-config", get(get_config))
        .route("/save-config", post(save_config))
        .route("/process-file", post(process_file))
        .route("/get-comparisons", get(get_comparisons))
        .route("/clear-comparisons", delete(clear_comparisons))
        .route("/merge-rows", post(merge_rows))
        .route("/delete-rows", delete(delete_rows))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the service on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the stored history or config cannot be loaded, the
/// address cannot be bound, or the server fails.
pub async fn serve(options: ServiceOptions, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, options, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
    })
    .await
}

/// Run the service on an already bound listener until `shutdown` resolves.
///
/// Use this when the caller needs to know the port before the server starts,
/// e.g. when binding port 0 in tests.
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    options: ServiceOptions,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = tokio::task::spawn_blocking(move || AppState::open(options)).await??;
    let app = build_router(Arc::new(state));

    info!("RTT analyzer service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutting down RTT analyzer service");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rtt_analyzer_core::protocol::ErrorResponse;
    use rtt_analyzer_core::sample::RttUnit;
    use serde::de::DeserializeOwned;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn create_test_state(dir: &TempDir) -> Arc<AppState> {
        let mut options = ServiceOptions::in_data_dir(&dir.path().join("data"));
        options.loader = SampleLoader::new("RTT", RttUnit::Milliseconds);
        Arc::new(AppState::open(options).unwrap())
    }

    fn write_capture(dir: &TempDir, name: &str, values: &[f64]) -> String {
        let mut content = String::from("RTT\n");
        for v in values {
            content.push_str(&format!("{v}\n"));
        }
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    async fn send(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Vec<u8>) {
        let app = build_router(state.clone());
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    async fn process(state: &Arc<AppState>, path: &str) -> StatusCode {
        send(
            state,
            "POST",
            "/process-file",
            Some(serde_json::json!({ "file_path": path })),
        )
        .await
        .0
    }

    async fn comparisons(state: &Arc<AppState>) -> ComparisonsView {
        let (status, body) = send(state, "GET", "/get-comparisons", None).await;
        assert_eq!(status, StatusCode::OK);
        parse::<DataResponse<ComparisonsView>>(&body).data
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);

        let (status, body) = send(&state, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = parse(&body);
        assert_eq!(health.status, "ok");
        assert_eq!(health.message, "Backend is ready");
    }

    #[tokio::test]
    async fn test_process_file_endpoint() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);
        let path = write_capture(&dir, "run_a.csv", &[10.0, 20.0, 30.0, 40.0, 50.0]);

        let (status, body) = send(
            &state,
            "POST",
            "/process-file",
            Some(serde_json::json!({ "file_path": path })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: DataResponse<AnalysisResult> = parse(&body);
        assert_eq!(response.status, "success");
        assert_eq!(
            response.message.as_deref(),
            Some("File 'run_a' processed successfully.")
        );
        assert_eq!(response.data.stats.mean_ms, 30.0);
        assert!(response.data.comparison.is_none());

        // comparison is serialized as null for the first row
        let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(raw["data"]["comparison"].is_null());
    }

    #[tokio::test]
    async fn test_process_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);
        let missing = dir.path().join("missing.csv").display().to_string();

        let (status, body) = send(
            &state,
            "POST",
            "/process-file",
            Some(serde_json::json!({ "file_path": missing })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = parse(&body);
        assert!(error.detail.contains("missing.csv"));
        assert!(comparisons(&state).await.all_rows.is_empty());
    }

    #[tokio::test]
    async fn test_process_invalid_file_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);
        let good = write_capture(&dir, "good.csv", &[1.0]);
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "RTT\nnot a number\n").unwrap();

        assert_eq!(process(&state, &good).await, StatusCode::OK);
        assert_eq!(
            process(&state, &bad.display().to_string()).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(comparisons(&state).await.all_rows.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected_with_detail() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);

        let (status, body) = send(
            &state,
            "POST",
            "/process-file",
            Some(serde_json::json!({ "path": "/x.csv" })),
        )
        .await;

        assert!(status.is_client_error());
        let error: ErrorResponse = parse(&body);
        assert!(error.detail.starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_get_comparisons_before_any_analysis() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);

        let view = comparisons(&state).await;
        assert!(view.rows.is_empty());
        assert!(view.columns.is_empty());
        assert!(view.all_rows.is_empty());
    }

    #[tokio::test]
    async fn test_merge_then_delete_then_clear() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);
        for (name, value) in [("a.csv", 10.0), ("b.csv", 20.0), ("c.csv", 30.0)] {
            let path = write_capture(&dir, name, &[value]);
            assert_eq!(process(&state, &path).await, StatusCode::OK);
        }

        let (status, body) = send(
            &state,
            "POST",
            "/merge-rows",
            Some(serde_json::json!({ "row_indices": [0, 1], "merged_data": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let merged: MergeRowsResponse = parse(&body);
        assert_eq!(merged.rows_merged, 2);

        let view = comparisons(&state).await;
        let names: Vec<_> = view.all_rows.iter().map(|r| r.source_file.as_str()).collect();
        assert_eq!(names, vec!["c", "a (merged)"]);
        assert_eq!(view.all_rows[1].mean_ms, 15.0);

        let (status, body) = send(
            &state,
            "DELETE",
            "/delete-rows",
            Some(serde_json::json!({ "row_indices": [0] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let deleted: DeleteRowsResponse = parse(&body);
        assert_eq!(deleted.rows_deleted, 1);
        assert_eq!(comparisons(&state).await.all_rows.len(), 1);

        let (status, _) = send(&state, "DELETE", "/clear-comparisons", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(comparisons(&state).await.all_rows.is_empty());

        let (status, _) = send(&state, "DELETE", "/clear-comparisons", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_mutations_are_bad_requests() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);
        let path = write_capture(&dir, "a.csv", &[1.0]);
        assert_eq!(process(&state, &path).await, StatusCode::OK);

        let cases = [
            ("POST", "/merge-rows", serde_json::json!({ "row_indices": [0] })),
            ("POST", "/merge-rows", serde_json::json!({ "row_indices": [0, 4] })),
            ("DELETE", "/delete-rows", serde_json::json!({ "row_indices": [] })),
            ("DELETE", "/delete-rows", serde_json::json!({ "row_indices": [-1] })),
        ];
        for (method, uri, body) in cases {
            let (status, body) = send(&state, method, uri, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            let error: ErrorResponse = parse(&body);
            assert!(!error.detail.is_empty());
        }

        assert_eq!(comparisons(&state).await.all_rows.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_analyses_are_serialized() {
        const RUNS: usize = 8;
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);

        let mut tasks = Vec::new();
        for i in 0..RUNS {
            let path = write_capture(&dir, &format!("run_{i}.csv"), &[(i + 1) as f64]);
            let state = state.clone();
            tasks.push(tokio::spawn(async move {
                let (status, body) = send(
                    &state,
                    "POST",
                    "/process-file",
                    Some(serde_json::json!({ "file_path": path })),
                )
                .await;
                assert_eq!(status, StatusCode::OK);
                parse::<DataResponse<AnalysisResult>>(&body).data
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        let rows = comparisons(&state).await.all_rows;
        assert_eq!(rows.len(), RUNS);

        // Every delta was taken against the row stored right before its own.
        for result in results {
            let position = rows
                .iter()
                .position(|row| row.source_file == result.base_name)
                .unwrap();
            match result.comparison {
                None => assert_eq!(position, 0, "{}", result.base_name),
                Some(delta) => {
                    assert!(position > 0, "{}", result.base_name);
                    assert_eq!(delta.mean_ms.value, rows[position - 1].mean_ms);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir);

        let (status, _) = send(
            &state,
            "POST",
            "/save-config",
            Some(serde_json::json!({ "input_dir": "/in", "output_base_dir": "/out" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", "/get-config", None).await;
        assert_eq!(status, StatusCode::OK);
        let config: DataResponse<Config> = parse(&body);
        assert_eq!(config.data.input_dir, "/in");
        assert_eq!(config.data.output_base_dir, "/out");
        assert!(config.data.comparisons_file.ends_with("comparisons.csv"));
    }

    #[tokio::test]
    async fn test_serve_with_listener_shuts_down() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let options = ServiceOptions::in_data_dir(dir.path());

        let result = serve_with_listener(listener, options, async {}).await;
        assert!(result.is_ok());
    }
}
