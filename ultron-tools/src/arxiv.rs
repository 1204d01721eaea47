//! Paper retrieval backed by the arXiv Atom API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use ultron_core::config::RetrievalConfig;
use ultron_core::error::ToolError;
use ultron_core::registry::{ParamKind, ParamSpec, Tool};
use ultron_core::types::{Reference, ToolOutput};

use crate::upstream::{UpstreamError, get_text, http_client};

const NO_PAPERS: &str = "No relevant research papers found.";

/// A paper as surfaced to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub summary: String,
    /// The abstract page, from the entry `<id>`.
    pub link: String,
    /// Author names joined by `", "`.
    pub authors: String,
    pub published_date: String,
}

/// Papers found for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperSearch {
    pub papers: Vec<Paper>,
    /// Dataset mentions; never populated by arXiv, kept for the result shape.
    pub datasets: Option<Vec<String>>,
}

/// Where research papers come from.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<PaperSearch, UpstreamError>;
}

/// HTTP client for the arXiv API.
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl ArxivClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.arxiv_base_url.clone(),
            max_results: config.max_results,
        })
    }

    /// `{base}?search_query=all:{query}&max_results={n}`
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}?search_query={}&max_results={}",
            self.base_url,
            urlencoding::encode(&format!("all:{}", query.trim())),
            self.max_results
        )
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(&self, query: &str) -> Result<PaperSearch, UpstreamError> {
        let body = get_text(&self.client, &self.search_url(query), &[]).await?;
        Ok(parse_atom_feed(&body))
    }
}

/// Parse the Atom feed. Entries without a title are skipped.
pub fn parse_atom_feed(xml: &str) -> PaperSearch {
    let papers = blocks(xml, "entry").filter_map(parse_entry).collect();
    PaperSearch {
        papers,
        datasets: None,
    }
}

fn parse_entry(entry: &str) -> Option<Paper> {
    let title = normalize_whitespace(&tag_text(entry, "title")?);
    let authors = blocks(entry, "author")
        .filter_map(|author| tag_text(author, "name"))
        .collect::<Vec<_>>()
        .join(", ");
    Some(Paper {
        title,
        summary: normalize_whitespace(&tag_text(entry, "summary").unwrap_or_default()),
        link: tag_text(entry, "id").unwrap_or_default(),
        authors,
        published_date: tag_text(entry, "published").unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// Every `<tag>...</tag>` block, tags included.
fn blocks<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut from = 0;
    std::iter::from_fn(move || {
        let start = from + xml[from..].find(&open)?;
        let end = start + xml[start..].find(&close)? + close.len();
        from = end;
        Some(&xml[start..end])
    })
}

/// Text of the first `<tag ...>text</tag>`.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut search = 0;
    // Skip longer tags sharing the prefix, e.g. <titleExtra> for <title>
    let start = loop {
        let pos = search + xml[search..].find(&open)?;
        match xml[pos + open.len()..].chars().next() {
            Some('>') | Some(' ') => break pos,
            _ => search = pos + open.len(),
        }
    };
    let content_start = start + xml[start..].find('>')? + 1;
    let content_end = content_start + xml[content_start..].find(&close)?;
    Some(xml[content_start..content_end].trim().to_string())
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One markdown bullet per paper: bold title, source link, quoted summary.
pub fn format_insights(papers: &[Paper]) -> String {
    papers
        .iter()
        .map(|p| format!("\n- **{}** ([source]({}))\n\n\"{}\"\n\n", p.title, p.link, p.summary))
        .collect()
}

/// `paper_retrieval`: research paper insights for a query.
pub struct PaperRetrievalTool {
    source: Arc<dyn PaperSource>,
}

impl PaperRetrievalTool {
    pub fn new(source: Arc<dyn PaperSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for PaperRetrievalTool {
    fn name(&self) -> &str {
        "paper_retrieval"
    }

    fn description(&self) -> &str {
        "Retrieve research papers on a topic from arXiv and summarize their findings."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "query",
            ParamKind::String,
            "The research topic to search for",
        )]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(45)
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = args["query"].as_str().unwrap_or_default();
        let found = match self.source.search(query).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Paper search failed");
                return Ok(ToolOutput::error(format!("Failed to retrieve papers: {e}")));
            }
        };
        if found.papers.is_empty() {
            return Ok(ToolOutput::text(NO_PAPERS));
        }
        tracing::info!(query = %query, papers = found.papers.len(), "Papers retrieved");

        let references = found
            .papers
            .iter()
            .map(|p| Reference::new(p.title.clone(), p.link.clone()))
            .collect();
        Ok(ToolOutput::insights(format_insights(&found.papers), references))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models
are based on recurrent networks.  </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/pdf/1706.03762v7" title="pdf" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1810.04805v2</id>
    <title>BERT</title>
    <summary>We introduce a new language representation model.</summary>
    <author><name>Jacob Devlin</name></author>
  </entry>
</feed>"#;

    struct FixedSource(Result<PaperSearch, UpstreamError>);

    #[async_trait]
    impl PaperSource for FixedSource {
        async fn search(&self, _query: &str) -> Result<PaperSearch, UpstreamError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_parse_feed() {
        let found = parse_atom_feed(SAMPLE_FEED);
        assert_eq!(found.papers.len(), 2);
        assert_eq!(found.datasets, None);

        let first = &found.papers[0];
        assert_eq!(first.title, "Attention Is All You Need");
        assert_eq!(first.link, "http://arxiv.org/abs/1706.03762v7");
        assert_eq!(first.authors, "Ashish Vaswani, Noam Shazeer");
        assert_eq!(
            first.summary,
            "The dominant sequence transduction models are based on recurrent networks."
        );
        assert_eq!(first.published_date, "2017-06-12T17:57:34Z");
        assert_eq!(found.papers[1].published_date, "Unknown");
    }

    #[test]
    fn test_parse_empty_feed() {
        assert!(parse_atom_feed("<feed><title>Empty</title></feed>").papers.is_empty());
    }

    #[test]
    fn test_search_url() {
        let client = ArxivClient::new(&RetrievalConfig::default()).unwrap();
        assert_eq!(
            client.search_url("quantum computing"),
            "https://export.arxiv.org/api/query?search_query=all%3Aquantum%20computing&max_results=10"
        );
    }

    #[test]
    fn test_format_insights() {
        let papers = parse_atom_feed(SAMPLE_FEED).papers;
        let text = format_insights(&papers[1..]);
        assert_eq!(
            text,
            "\n- **BERT** ([source](http://arxiv.org/abs/1810.04805v2))\n\n\"We introduce a new language representation model.\"\n\n"
        );
    }

    #[tokio::test]
    async fn test_tool_insights_with_references() {
        let tool = PaperRetrievalTool::new(Arc::new(FixedSource(Ok(parse_atom_feed(SAMPLE_FEED)))));
        let out = tool.execute(json!({"query": "attention"})).await.unwrap();
        assert_eq!(out.references().len(), 2);
        assert_eq!(out.references()[1].title, "BERT");
        assert!(out.speakable().contains("**Attention Is All You Need**"));
    }

    #[tokio::test]
    async fn test_tool_no_papers_and_failure() {
        let tool = PaperRetrievalTool::new(Arc::new(FixedSource(Ok(PaperSearch::default()))));
        let out = tool.execute(json!({"query": "x"})).await.unwrap();
        assert_eq!(out, ToolOutput::text(NO_PAPERS));

        let tool = PaperRetrievalTool::new(Arc::new(FixedSource(Err(UpstreamError::Request(
            "connection reset".into(),
        )))));
        let out = tool.execute(json!({"query": "x"})).await.unwrap();
        assert!(out.is_error());
    }
}
