//! Summary lookup backed by the Wikipedia REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use ultron_core::config::RetrievalConfig;
use ultron_core::error::ToolError;
use ultron_core::registry::{ParamKind, ParamSpec, Tool};
use ultron_core::types::{Reference, ToolOutput};

use crate::upstream::{UpstreamError, get_json, http_client};

const NO_SUMMARY: &str = "No summary available for this topic.";

/// A page summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub title: String,
    pub summary: String,
    pub link: String,
}

/// Where topic summaries come from.
#[async_trait]
pub trait SummarySource: Send + Sync {
    /// `Ok(None)` when the service has no summary for the topic.
    async fn summary(&self, topic: &str) -> Result<Option<TopicSummary>, UpstreamError>;
}

pub struct WikipediaClient {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.wikipedia_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn page_url(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(topic.trim()))
    }
}

#[async_trait]
impl SummarySource for WikipediaClient {
    async fn summary(&self, topic: &str) -> Result<Option<TopicSummary>, UpstreamError> {
        match get_json(&self.client, &self.page_url(topic), &[]).await {
            Ok(body) => Ok(parse_summary(&body)),
            Err(UpstreamError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Read `title`, `extract` and the desktop page link. No extract means no summary.
pub fn parse_summary(body: &Value) -> Option<TopicSummary> {
    let summary = body["extract"].as_str().map(str::trim).filter(|s| !s.is_empty())?;
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let link = body["content_urls"]["desktop"]["page"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    Some(TopicSummary {
        title,
        summary: summary.to_string(),
        link,
    })
}

/// `summary_lookup`: a short encyclopedia summary of a topic.
pub struct SummaryLookupTool {
    source: Arc<dyn SummarySource>,
}

impl SummaryLookupTool {
    pub fn new(source: Arc<dyn SummarySource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for SummaryLookupTool {
    fn name(&self) -> &str {
        "summary_lookup"
    }

    fn description(&self) -> &str {
        "Fetch a short summary of a topic from Wikipedia."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "query",
            ParamKind::String,
            "The topic to retrieve a summary for",
        )]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = args["query"].as_str().unwrap_or_default();
        match self.source.summary(query).await {
            Ok(Some(found)) => {
                let reference = Reference::new(found.title.clone(), found.link.clone());
                let data = json!({
                    "title": found.title,
                    "summary": found.summary,
                    "link": found.link,
                    "source": "Wikipedia",
                });
                Ok(ToolOutput::data(found.summary, data).with_references(vec![reference]))
            }
            Ok(None) => Ok(ToolOutput::error(NO_SUMMARY)),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Summary lookup failed");
                Ok(ToolOutput::error(format!("Failed to fetch a summary: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Result<Option<TopicSummary>, UpstreamError>);

    #[async_trait]
    impl SummarySource for FixedSource {
        async fn summary(&self, _topic: &str) -> Result<Option<TopicSummary>, UpstreamError> {
            self.0.clone()
        }
    }

    fn tool(result: Result<Option<TopicSummary>, UpstreamError>) -> SummaryLookupTool {
        SummaryLookupTool::new(Arc::new(FixedSource(result)))
    }

    #[test]
    fn test_parse_summary() {
        let body = json!({
            "title": "Piracy",
            "extract": "Piracy is an act of robbery at sea. ",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Piracy"}}
        });
        let parsed = parse_summary(&body).unwrap();
        assert_eq!(parsed.title, "Piracy");
        assert_eq!(parsed.summary, "Piracy is an act of robbery at sea.");
        assert_eq!(parsed.link, "https://en.wikipedia.org/wiki/Piracy");
    }

    #[test]
    fn test_parse_summary_without_extract() {
        assert!(parse_summary(&json!({"title": "Nothing"})).is_none());
        assert!(parse_summary(&json!({"title": "Blank", "extract": "  "})).is_none());
    }

    #[test]
    fn test_page_url_encodes_topic() {
        let client = WikipediaClient::new(&RetrievalConfig::default()).unwrap();
        assert_eq!(
            client.page_url("Ada Lovelace"),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Ada%20Lovelace"
        );
    }

    #[tokio::test]
    async fn test_tool_found() {
        let out = tool(Ok(Some(TopicSummary {
            title: "Rum".into(),
            summary: "Rum is a liquor.".into(),
            link: "https://en.wikipedia.org/wiki/Rum".into(),
        })))
        .execute(json!({"query": "rum"}))
        .await
        .unwrap();
        assert_eq!(out.speakable(), "Rum is a liquor.");
        assert_eq!(out.references()[0].link, "https://en.wikipedia.org/wiki/Rum");
    }

    #[tokio::test]
    async fn test_tool_not_found_and_upstream_error() {
        let out = tool(Ok(None)).execute(json!({"query": "zzz"})).await.unwrap();
        assert_eq!(out, ToolOutput::error(NO_SUMMARY));

        let out = tool(Err(UpstreamError::Status(503)))
            .execute(json!({"query": "zzz"}))
            .await
            .unwrap();
        assert!(out.is_error());
        assert!(out.speakable().contains("503"));
    }
}
