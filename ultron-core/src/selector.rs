//! Expert selection — decides, per message, which persona speaks.
//!
//! Selection runs an ordered chain of [`Matcher`]s. The first matcher to name
//! a persona wins and the store is updated; if every matcher declines, the
//! current persona is kept. The default chain is a deterministic keyword
//! scan followed by a reasoning-delegate fallback.

use crate::brain::LlmProvider;
use crate::personas::{Persona, PersonaStore, Roster};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the persona for a turn was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Keyword,
    Delegate,
    Retained,
}

impl std::fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionSource::Keyword => write!(f, "keyword"),
            SelectionSource::Delegate => write!(f, "delegate"),
            SelectionSource::Retained => write!(f, "retained"),
        }
    }
}

/// The persona chosen for a turn and how.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub persona: Arc<Persona>,
    pub source: SelectionSource,
}

/// One link of the selection chain.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Which source a hit from this matcher is reported as.
    fn source(&self) -> SelectionSource;

    /// Return a roster persona for `message`, or `None` to defer to the next matcher.
    async fn find(&self, message: &str, roster: &Roster) -> Option<Arc<Persona>>;
}

/// Case-sensitive topic substring scan in roster order, then topic order.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    /// The synchronous core of the scan.
    pub fn scan(message: &str, roster: &Roster) -> Option<Arc<Persona>> {
        roster
            .iter()
            .find(|persona| {
                persona.topics.iter().any(|topic| {
                    let topic = topic.trim();
                    !topic.is_empty() && message.contains(topic)
                })
            })
            .cloned()
    }
}

#[async_trait]
impl Matcher for KeywordMatcher {
    fn source(&self) -> SelectionSource {
        SelectionSource::Keyword
    }

    async fn find(&self, message: &str, roster: &Roster) -> Option<Arc<Persona>> {
        Self::scan(message, roster)
    }
}

/// Asks the reasoning delegate to pick a persona id.
pub struct DelegateMatcher {
    delegate: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl DelegateMatcher {
    pub fn new(delegate: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { delegate, timeout }
    }

    /// The routing prompt: every persona on one line, then the message.
    pub fn routing_prompt(message: &str, roster: &Roster) -> String {
        let listing = roster
            .iter()
            .map(|p| format!("ID: {} - name: {} - topics: {}", p.id, p.name, p.topics_line()))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Choose the single best expert persona to answer the user's message.\n\
             Available experts:\n{listing}\n\n\
             User message: {message}\n\n\
             Reply with exactly one expert ID from the list and nothing else."
        )
    }

    /// Reduce a delegate answer to a bare id token.
    pub fn clean_answer(raw: &str) -> &str {
        raw.trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim()
    }
}

#[async_trait]
impl Matcher for DelegateMatcher {
    fn source(&self) -> SelectionSource {
        SelectionSource::Delegate
    }

    async fn find(&self, message: &str, roster: &Roster) -> Option<Arc<Persona>> {
        let prompt = Self::routing_prompt(message, roster);
        debug!(prompt_len = prompt.len(), "Asking delegate to route message");

        let answer =
            match tokio::time::timeout(self.timeout, self.delegate.complete_text(&prompt)).await {
                Ok(Ok(answer)) => answer,
                Ok(Err(e)) => {
                    warn!(error = %e, "Routing delegate failed");
                    return None;
                }
                Err(_) => {
                    warn!(timeout_secs = self.timeout.as_secs(), "Routing delegate timed out");
                    return None;
                }
            };

        let id = Self::clean_answer(&answer);
        let found = roster.find(id).cloned();
        if found.is_none() {
            warn!(answer = %id, "Routing delegate named an unknown persona");
        }
        found
    }
}

/// Runs the matcher chain and updates the persona store on a hit.
pub struct ExpertSelector {
    matchers: Vec<Box<dyn Matcher>>,
}

impl ExpertSelector {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Keyword scan only.
    pub fn keyword_only() -> Self {
        Self::new(vec![Box::new(KeywordMatcher)])
    }

    /// Keyword scan, then the delegate.
    pub fn with_delegate(delegate: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(KeywordMatcher),
            Box::new(DelegateMatcher::new(delegate, timeout)),
        ])
    }

    /// Choose the persona for `message`, writing it to `store` on a match.
    pub async fn select(&self, message: &str, store: &PersonaStore) -> Selection {
        for matcher in &self.matchers {
            if let Some(persona) = matcher.find(message, store.roster()).await {
                info!(persona = %persona.id, source = %matcher.source(), "Persona selected");
                store.set(persona.clone());
                return Selection {
                    persona,
                    source: matcher.source(),
                };
            }
        }
        let persona = store.current();
        info!(persona = %persona.id, "No matcher hit, keeping current persona");
        Selection {
            persona,
            source: SelectionSource::Retained,
        }
    }

    /// Keep the current persona without consulting any matcher.
    pub fn retain(store: &PersonaStore) -> Selection {
        Selection {
            persona: store.current(),
            source: SelectionSource::Retained,
        }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
