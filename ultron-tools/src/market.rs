//! Market data from the Yahoo Finance chart and search endpoints.

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ultron_core::config::FinanceConfig;

use crate::indicators::PricePoint;
use crate::upstream::{UpstreamError, get_json, http_client};

/// A news article about a symbol or query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published_at: String,
    pub summary: String,
}

/// Where price history and market news come from.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily (or `interval`) bars, oldest first. Empty when the symbol is unknown.
    async fn history(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>, UpstreamError>;

    async fn news(&self, query: &str) -> Result<Vec<NewsArticle>, UpstreamError>;
}

pub struct YahooClient {
    client: reqwest::Client,
    chart_base_url: String,
    news_base_url: String,
}

impl YahooClient {
    pub fn new(config: &FinanceConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            chart_base_url: config.chart_base_url.trim_end_matches('/').to_string(),
            news_base_url: config.news_base_url.clone(),
        })
    }

    pub fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}",
            self.chart_base_url,
            urlencoding::encode(&symbol.trim().to_uppercase())
        )
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn history(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>, UpstreamError> {
        let query = [("range", range), ("interval", interval)];
        match get_json(&self.client, &self.chart_url(symbol), &query).await {
            Ok(body) => Ok(parse_chart(&body)),
            // Unknown symbols come back as 404 with an error body
            Err(UpstreamError::Status(404)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn news(&self, query: &str) -> Result<Vec<NewsArticle>, UpstreamError> {
        let params = [("q", query), ("newsCount", "10"), ("quotesCount", "0")];
        let body = get_json(&self.client, &self.news_base_url, &params).await?;
        Ok(parse_news(&body))
    }
}

fn utc_date(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Zip `chart.result[0].timestamp` with `indicators.quote[0]`.
///
/// Bars without a close (holidays, halted sessions) are dropped.
pub fn parse_chart(body: &Value) -> Vec<PricePoint> {
    let result = &body["chart"]["result"][0];
    let Some(timestamps) = result["timestamp"].as_array() else {
        return Vec::new();
    };
    let quote = &result["indicators"]["quote"][0];
    let column = |name: &str, i: usize| quote[name][i].as_f64();

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = utc_date(ts.as_i64()?)?;
            Some(PricePoint {
                date,
                open: column("open", i),
                high: column("high", i),
                low: column("low", i),
                close: column("close", i)?,
                volume: quote["volume"][i].as_u64(),
            })
        })
        .collect()
}

/// Read `news[]`; articles without a title or link are skipped.
pub fn parse_news(body: &Value) -> Vec<NewsArticle> {
    let Some(items) = body["news"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let title = item["title"].as_str().filter(|t| !t.is_empty())?;
            let link = item["link"].as_str().filter(|l| !l.is_empty())?;
            let source = item["source"]
                .as_str()
                .or_else(|| item["publisher"].as_str())
                .unwrap_or("Unknown");
            let published_at = match item["published_at"].as_str() {
                Some(raw) => raw.to_string(),
                None => item["providerPublishTime"]
                    .as_i64()
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            };
            Some(NewsArticle {
                title: title.to_string(),
                link: link.to_string(),
                source: source.to_string(),
                published_at,
                summary: item["summary"].as_str().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_chart() {
        let body = json!({
            "chart": {"result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {"quote": [{
                    "open": [187.15, 184.22, null],
                    "high": [188.44, 185.88, null],
                    "low": [183.89, 183.43, null],
                    "close": [185.64, 184.25, null],
                    "volume": [82488700, 58414500, null]
                }]}
            }], "error": null}
        });
        let bars = parse_chart(&body);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2024-01-02");
        assert_eq!(bars[0].open, Some(187.15));
        assert_eq!(bars[0].volume, Some(82488700));
        assert_eq!(bars[1].date, "2024-01-03");
        assert_eq!(bars[1].close, 184.25);
    }

    #[test]
    fn test_parse_chart_without_result() {
        let body = json!({"chart": {"result": null, "error": {"code": "Not Found"}}});
        assert!(parse_chart(&body).is_empty());
    }

    #[test]
    fn test_parse_news() {
        let body = json!({"news": [
            {
                "title": "Apple unveils new chip",
                "link": "https://example.com/a",
                "publisher": "Reuters",
                "providerPublishTime": 1704205800
            },
            {"title": "", "link": "https://example.com/b"},
            {
                "title": "Markets rally",
                "link": "https://example.com/c",
                "source": "Bloomberg",
                "published_at": "2024-01-03",
                "summary": "Stocks rose."
            }
        ]});
        let news = parse_news(&body);
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].source, "Reuters");
        assert!(news[0].published_at.starts_with("2024-01-02T"));
        assert_eq!(news[1].source, "Bloomberg");
        assert_eq!(news[1].summary, "Stocks rose.");
    }

    #[test]
    fn test_chart_url() {
        let client = YahooClient::new(&FinanceConfig::default()).unwrap();
        assert_eq!(
            client.chart_url(" aapl "),
            "https://query1.finance.yahoo.com/v8/finance/chart/AAPL"
        );
    }
}
