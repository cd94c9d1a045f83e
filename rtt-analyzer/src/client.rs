//! HTTP client for a running rtt-analyzer service.

use std::time::Duration;

use rtt_analyzer_core::protocol::{
    AnalysisResult, ComparisonsView, Config, DataResponse, DeleteRowsRequest, DeleteRowsResponse,
    ErrorResponse, HealthResponse, MergeRowsRequest, MergeRowsResponse, ProcessFileRequest,
    SaveConfigRequest, StatusResponse,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;

/// Errors that can occur while talking to the service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP request to the service failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("Service returned {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The service answered but is not ready.
    #[error("Service not ready: {0}")]
    NotReady(String),

    /// Service did not become ready within the timeout period.
    #[error("Service at {url} not ready after {timeout_secs}s timeout. Last error: {last_error}")]
    TimeoutError {
        url: String,
        timeout_secs: u64,
        last_error: String,
    },
}

impl ClientError {
    /// HTTP status returned by the service, if it answered with an error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection to an rtt-analyzer service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    /// Base URL without trailing slash.
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    /// Connect to the service at `url` with a per-request `timeout`.
    ///
    /// No request is made; use [`wait_for_health`] to wait for the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be created.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(format!(
                "URL must start with http:// or https://: {}",
                url
            )));
        }

        let base_url = url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }

    /// Get the base URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if the service is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service is not ready.
    pub async fn health_check(&self) -> Result<HealthResponse, ClientError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let health: HealthResponse = decode(response).await?;

        if health.is_ready() {
            Ok(health)
        } else {
            Err(ClientError::NotReady(format!(
                "{}: {}",
                health.status, health.message
            )))
        }
    }

    /// Fetch the saved directories.
    pub async fn get_config(&self) -> Result<Config, ClientError> {
        let response = self.client.get(self.url("/get-config")).send().await?;
        let body: DataResponse<Config> = decode(response).await?;
        Ok(body.data)
    }

    /// Save the input and output directories.
    pub async fn save_config(&self, request: &SaveConfigRequest) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/save-config"))
            .json(request)
            .send()
            .await?;
        let _body: StatusResponse = decode(response).await?;
        Ok(())
    }

    /// Analyze a capture on the service's machine.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 when the file does not
    /// exist and 400 when it holds no usable data.
    pub async fn process_file(
        &self,
        request: &ProcessFileRequest,
    ) -> Result<AnalysisResult, ClientError> {
        let response = self
            .client
            .post(self.url("/process-file"))
            .json(request)
            .send()
            .await?;
        let body: DataResponse<AnalysisResult> = decode(response).await?;
        Ok(body.data)
    }

    /// Fetch the comparison history.
    pub async fn get_comparisons(&self) -> Result<ComparisonsView, ClientError> {
        let response = self.client.get(self.url("/get-comparisons")).send().await?;
        let body: DataResponse<ComparisonsView> = decode(response).await?;
        Ok(body.data)
    }

    /// Remove the whole comparison history.
    pub async fn clear_comparisons(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url("/clear-comparisons"))
            .send()
            .await?;
        let _body: StatusResponse = decode(response).await?;
        Ok(())
    }

    /// Merge history rows into one averaged row. Returns the number of rows merged.
    pub async fn merge_rows(&self, row_indices: Vec<i64>) -> Result<usize, ClientError> {
        let response = self
            .client
            .post(self.url("/merge-rows"))
            .json(&MergeRowsRequest::new(row_indices))
            .send()
            .await?;
        let body: MergeRowsResponse = decode(response).await?;
        Ok(body.rows_merged)
    }

    /// Delete history rows. Returns the number of rows deleted.
    pub async fn delete_rows(&self, row_indices: Vec<i64>) -> Result<usize, ClientError> {
        let response = self
            .client
            .delete(self.url("/delete-rows"))
            .json(&DeleteRowsRequest::new(row_indices))
            .send()
            .await?;
        let body: DeleteRowsResponse = decode(response).await?;
        Ok(body.rows_deleted)
    }
}

/// Decode a success body, or turn an error body into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await?;
    let detail = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.detail)
        .unwrap_or(text);

    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}

/// Wait for the service to become ready.
///
/// Polls the health endpoint every 100ms until it responds successfully
/// or the timeout is reached.
///
/// # Errors
///
/// Returns a timeout error if the service does not become ready in time.
pub async fn wait_for_health(client: &ServiceClient, timeout: Duration) -> Result<(), ClientError> {
    let start = std::time::Instant::now();
    let retry_interval = Duration::from_millis(100);

    loop {
        match client.health_check().await {
            Ok(_) => return Ok(()),
            Err(_) if start.elapsed() < timeout => {
                sleep(retry_interval).await;
            }
            Err(e) => {
                return Err(ClientError::TimeoutError {
                    url: client.base_url().to_string(),
                    timeout_secs: timeout.as_secs(),
                    last_error: e.to_string(),
                });
            }
        }
    }
}
