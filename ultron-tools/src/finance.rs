//! Financial tools — price history, market news, and technical indicators.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use ultron_core::config::FinanceConfig;
use ultron_core::error::ToolError;
use ultron_core::registry::{ParamKind, ParamSpec, Tool};
use ultron_core::types::{Reference, ToolOutput};

use crate::indicators::{
    IndicatorKind, PricePoint, bollinger_bands, linear_regression, moving_average,
};
use crate::market::MarketDataSource;

const NO_HISTORY: &str = "No historical data found for the given symbol.";
const HISTORY_FAILED: &str = "Failed to retrieve financial data.";
const NO_NEWS: &str = "No news articles found for this query.";
const NEWS_FAILED: &str = "Failed to retrieve financial news.";

/// Window used when `financial_indicator` gets no period.
pub const DEFAULT_INDICATOR_PERIOD: usize = 20;

/// `financial_fetch`: OHLCV history for a ticker.
pub struct FinancialFetchTool {
    source: Arc<dyn MarketDataSource>,
    default_range: String,
    default_interval: String,
}

impl FinancialFetchTool {
    pub fn new(source: Arc<dyn MarketDataSource>, config: &FinanceConfig) -> Self {
        Self {
            source,
            default_range: config.default_range.clone(),
            default_interval: config.default_interval.clone(),
        }
    }
}

fn history_summary(symbol: &str, history: &[PricePoint]) -> String {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) => {
            let change = (last.close - first.close) / first.close * 100.0;
            format!(
                "{symbol} closed at {:.2} on {}, {:+.1}% since {} ({} data points).",
                last.close,
                last.date,
                change,
                first.date,
                history.len()
            )
        }
        _ => NO_HISTORY.to_string(),
    }
}

#[async_trait]
impl Tool for FinancialFetchTool {
    fn name(&self) -> &str {
        "financial_fetch"
    }

    fn description(&self) -> &str {
        "Fetch historical open/high/low/close/volume data for a stock ticker."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("symbol", ParamKind::String, "Ticker symbol, e.g. AAPL"),
            ParamSpec::optional("range", ParamKind::String, "History range, e.g. 1mo, 6mo, 1y"),
            ParamSpec::optional("interval", ParamKind::String, "Bar interval, e.g. 1d, 1wk"),
        ]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let symbol = args["symbol"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .trim_start_matches('$')
            .to_uppercase();
        let range = args["range"].as_str().unwrap_or(&self.default_range);
        let interval = args["interval"].as_str().unwrap_or(&self.default_interval);

        let history = match self.source.history(&symbol, range, interval).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Price history fetch failed");
                return Ok(ToolOutput::error(HISTORY_FAILED));
            }
        };
        if history.is_empty() {
            return Ok(ToolOutput::error(NO_HISTORY));
        }

        let summary = history_summary(&symbol, &history);
        Ok(ToolOutput::data(
            summary,
            json!({
                "symbol": symbol,
                "range": range,
                "interval": interval,
                "history": history,
            }),
        ))
    }
}

/// `financial_news`: recent articles for a ticker or query.
pub struct FinancialNewsTool {
    source: Arc<dyn MarketDataSource>,
}

impl FinancialNewsTool {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for FinancialNewsTool {
    fn name(&self) -> &str {
        "financial_news"
    }

    fn description(&self) -> &str {
        "Find recent financial news articles for a ticker or search query."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "query",
            ParamKind::String,
            "Ticker or topic to search news for",
        )]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = args["query"].as_str().unwrap_or_default().trim();
        let articles = match self.source.news(query).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "News search failed");
                return Ok(ToolOutput::error(NEWS_FAILED));
            }
        };
        if articles.is_empty() {
            return Ok(ToolOutput::error(NO_NEWS));
        }

        let headlines = articles
            .iter()
            .take(3)
            .map(|a| format!("{} ({})", a.title, a.source))
            .collect::<Vec<_>>()
            .join("; ");
        let summary = format!("Latest on {query}: {headlines}.");
        let references = articles
            .iter()
            .map(|a| Reference::new(a.title.clone(), a.link.clone()))
            .collect();
        Ok(ToolOutput::data(summary, json!({ "articles": articles })).with_references(references))
    }
}

/// Accept either bare closes or full price points.
fn parse_series(raw: &[Value]) -> Result<Vec<PricePoint>, String> {
    raw.iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Number(n) => n
                .as_f64()
                .map(|close| PricePoint::close(i.to_string(), close))
                .ok_or_else(|| format!("series[{i}] is not a finite number")),
            Value::Object(_) => serde_json::from_value(item.clone())
                .map_err(|e| format!("series[{i}] is not a price point: {e}")),
            _ => Err(format!("series[{i}] must be a number or a price point")),
        })
        .collect()
}

/// `financial_indicator`: moving average, Bollinger bands, or a regression line.
pub struct FinancialIndicatorTool;

impl FinancialIndicatorTool {
    fn compute(
        kind: IndicatorKind,
        series: &[PricePoint],
        period: usize,
    ) -> Result<(String, Value), String> {
        let computed = match kind {
            IndicatorKind::MovingAverage => {
                let points = moving_average(series, period).map_err(|e| e.to_string())?;
                let summary = match points.last() {
                    Some(last) => format!(
                        "The {period}-period moving average is {:.2} as of {}.",
                        last.average, last.date
                    ),
                    None => String::new(),
                };
                (summary, json!({ "kind": kind, "period": period, "points": points }))
            }
            IndicatorKind::Bollinger => {
                let points = bollinger_bands(series, period).map_err(|e| e.to_string())?;
                let summary = match points.last() {
                    Some(last) => format!(
                        "Bollinger Bands ({period}) as of {}: upper {:.2}, middle {:.2}, lower {:.2}.",
                        last.date, last.upper, last.middle, last.lower
                    ),
                    None => String::new(),
                };
                (summary, json!({ "kind": kind, "period": period, "points": points }))
            }
            IndicatorKind::LinearRegression => {
                let line = linear_regression(series).map_err(|e| e.to_string())?;
                let next = line.predict(series.len() as f64);
                let trend = if line.slope >= 0.0 { "upward" } else { "downward" };
                (
                    format!(
                        "The trend is {trend} at {:+.3} per interval; next projected close {:.2}.",
                        line.slope, next
                    ),
                    json!({
                        "kind": kind,
                        "slope": line.slope,
                        "intercept": line.intercept,
                        "prediction": next,
                    }),
                )
            }
        };
        Ok(computed)
    }
}

#[async_trait]
impl Tool for FinancialIndicatorTool {
    fn name(&self) -> &str {
        "financial_indicator"
    }

    fn description(&self) -> &str {
        "Compute a technical indicator (moving_average, bollinger, linear_regression) over a price series."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "series",
                ParamKind::Array,
                "Closing prices, or objects with date and close, oldest first",
            ),
            ParamSpec::required(
                "kind",
                ParamKind::String,
                "moving_average, bollinger, or linear_regression",
            ),
            ParamSpec::optional(
                "period",
                ParamKind::Integer,
                "Trailing window size (default 20)",
            ),
        ]
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let raw_kind = args["kind"].as_str().unwrap_or_default();
        let Some(kind) = IndicatorKind::parse(raw_kind) else {
            return Ok(ToolOutput::error(format!(
                "Unknown indicator '{raw_kind}'. Use moving_average, bollinger, or linear_regression."
            )));
        };
        let series = match parse_series(args["series"].as_array().map(Vec::as_slice).unwrap_or_default()) {
            Ok(series) => series,
            Err(reason) => return Ok(ToolOutput::error(reason)),
        };
        let period = args["period"]
            .as_u64()
            .map_or(DEFAULT_INDICATOR_PERIOD, |p| p as usize);

        match Self::compute(kind, &series, period) {
            Ok((summary, data)) => Ok(ToolOutput::data(summary, data)),
            Err(reason) => {
                tracing::debug!(kind = %kind, points = series.len(), period, "Indicator rejected input");
                Ok(ToolOutput::error(reason))
            }
        }
    }
}
