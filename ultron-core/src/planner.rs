//! Tool planning — which tools a turn invokes.
//!
//! The default planner is a keyword intent classifier over the lowercased
//! message. Several intents may fire for one message; each yields its own
//! call, in rule order.

use crate::orchestrator::ConversationContext;
use crate::registry::ToolCall;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

static DOLLAR_TICKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z]{1,5})\b").ok());
static BARE_TICKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5})\b").ok());
static PAGES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*pages?\b").ok());
static SUMMARY_TRIGGER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(who is|what is|tell me about|wikipedia)").ok());

/// Default page count for thesis generation.
pub const DEFAULT_THESIS_PAGES: u64 = 3;

const PAPER_TRIGGERS: [&str; 4] = ["paper", "research", "arxiv", "study"];
const REASONING_TRIGGERS: [&str; 4] = ["why", "explain", "analy", "reason"];

/// Chooses tool calls for a message.
pub trait ToolPlanner: Send + Sync {
    fn plan(&self, message: &str, context: &ConversationContext) -> Vec<ToolCall>;
}

/// Keyword intent classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordPlanner;

impl ToolPlanner for KeywordPlanner {
    fn plan(&self, message: &str, context: &ConversationContext) -> Vec<ToolCall> {
        if !context.requested_calls.is_empty() {
            return context.requested_calls.clone();
        }

        let lower = message.to_lowercase();
        let mut calls = Vec::new();

        let ticker = find_ticker(message, &lower);
        if let Some(symbol) = &ticker {
            calls.push(ToolCall::new("financial_fetch", json!({ "symbol": symbol })));
            if lower.contains("news") {
                calls.push(ToolCall::new("financial_news", json!({ "query": symbol })));
            }
        }

        if lower.contains("thesis") {
            let pages = PAGES
                .as_ref()
                .and_then(|re| re.captures(&lower))
                .and_then(|c| c[1].parse::<u64>().ok())
                .filter(|p| *p > 0)
                .unwrap_or(DEFAULT_THESIS_PAGES);
            calls.push(ToolCall::new(
                "thesis_generation",
                json!({ "query": message, "pages": pages }),
            ));
        }

        if PAPER_TRIGGERS.iter().any(|t| lower.contains(t)) {
            calls.push(ToolCall::new("paper_retrieval", json!({ "query": message })));
        }

        if ticker.is_none()
            && let Some(topic) = summary_topic(message)
        {
            calls.push(ToolCall::new("summary_lookup", json!({ "query": topic })));
        }

        if REASONING_TRIGGERS.iter().any(|t| lower.contains(t)) {
            calls.push(ToolCall::new("deep_reasoning", json!({ "query": message })));
        }

        calls
    }
}

/// A `$TICKER`, or a bare upper-case symbol when the message talks about stocks.
fn find_ticker(message: &str, lower: &str) -> Option<String> {
    if let Some(c) = DOLLAR_TICKER.as_ref()?.captures(message) {
        return Some(c[1].to_uppercase());
    }
    if lower.contains("stock") || lower.contains("share price") {
        return BARE_TICKER
            .as_ref()?
            .captures(message)
            .map(|c| c[1].to_string());
    }
    None
}

/// The subject following a summary trigger, or the whole message.
fn summary_topic(message: &str) -> Option<String> {
    let found = SUMMARY_TRIGGER.as_ref()?.find(message)?;
    let topic = message[found.end()..]
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim();
    let wikipedia = found.as_str().eq_ignore_ascii_case("wikipedia");
    Some(if topic.is_empty() || wikipedia {
        message.trim().to_string()
    } else {
        topic.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan(message: &str) -> Vec<ToolCall> {
        KeywordPlanner.plan(message, &ConversationContext::default())
    }

    fn names(calls: &[ToolCall]) -> Vec<&str> {
        calls.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_no_intent_no_tools() {
        assert!(plan("good morning").is_empty());
    }

    #[test]
    fn test_summary_topic_extraction() {
        let calls = plan("tell me about pirates and treasure");
        assert_eq!(names(&calls), vec!["summary_lookup"]);
        assert_eq!(calls[0].arguments, json!({"query": "pirates and treasure"}));

        let calls = plan("Who is Ada Lovelace?");
        assert_eq!(calls[0].arguments["query"], "Ada Lovelace");
    }

    #[test]
    fn test_summary_topic_with_mixed_width_characters() {
        // 'İ' grows and the Kelvin sign shrinks when lowercased
        let calls = plan("İİwho is \u{212A}x");
        assert_eq!(names(&calls), vec!["summary_lookup"]);
        assert_eq!(calls[0].arguments["query"], "\u{212A}x");

        let calls = plan("WHAT IS Straße?");
        assert_eq!(calls[0].arguments["query"], "Straße");
    }

    #[test]
    fn test_dollar_ticker_with_news() {
        let calls = plan("what is the latest news on $aapl");
        assert_eq!(names(&calls), vec!["financial_fetch", "financial_news"]);
        assert_eq!(calls[0].arguments, json!({"symbol": "AAPL"}));
        assert_eq!(calls[1].arguments, json!({"query": "AAPL"}));
    }

    #[test]
    fn test_bare_ticker_needs_stock_word() {
        assert_eq!(names(&plan("how is the TSLA stock doing")), vec!["financial_fetch"]);
        assert!(plan("TSLA").is_empty());
    }

    #[test]
    fn test_thesis_pages() {
        let calls = plan("write a thesis on black holes, 5 pages");
        assert_eq!(calls[0].name, "thesis_generation");
        assert_eq!(calls[0].arguments["pages"], 5);

        let calls = plan("write a thesis on black holes");
        assert_eq!(calls[0].arguments["pages"], DEFAULT_THESIS_PAGES);
    }

    #[test]
    fn test_multiple_intents() {
        let calls = plan("find research papers and explain why transformers work");
        assert_eq!(names(&calls), vec!["paper_retrieval", "deep_reasoning"]);
    }

    #[test]
    fn test_requested_calls_win() {
        let context = ConversationContext {
            requested_calls: vec![ToolCall::new("task_status", json!({"task_id": "x"}))],
            ..Default::default()
        };
        let calls = KeywordPlanner.plan("tell me about pirates", &context);
        assert_eq!(names(&calls), vec!["task_status"]);
    }
}
