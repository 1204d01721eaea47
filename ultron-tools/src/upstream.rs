//! Shared HTTP plumbing for the upstream knowledge and market services.

use std::time::Duration;

pub(crate) const USER_AGENT: &str = "Ultron/0.3 (persona agent)";

/// Failure talking to an upstream service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("could not parse response: {0}")]
    Parse(String),
}

/// A reqwest client with the shared user agent and a bounded timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpstreamError::Request(format!("Failed to create HTTP client: {e}")))
}

/// GET `url` and return the body of a successful response.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String, UpstreamError> {
    tracing::debug!(url = %url, "Upstream GET");
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| UpstreamError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status(status.as_u16()));
    }
    response
        .text()
        .await
        .map_err(|e| UpstreamError::Request(format!("failed to read body: {e}")))
}

/// GET `url` and decode a JSON body.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<serde_json::Value, UpstreamError> {
    let body = get_text(client, url, query).await?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::Parse(e.to_string()))
}
