//! Core type definitions for Ultron.
//!
//! Messages exchanged with the reasoning delegate, tool definitions, and the
//! structured results tools hand back to the orchestrator.

use serde::{Deserialize, Serialize};

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message sent to or received from the delegate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Token usage reported by the delegate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// A response from the delegate.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    pub usage: TokenUsage,
    pub model: String,
    pub finish_reason: Option<String>,
}

impl CompletionResponse {
    /// The completion text, trimmed.
    pub fn text(&self) -> &str {
        self.message.content.trim()
    }
}

/// A request to the delegate for completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub model: Option<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.7,
            max_tokens: None,
            model: None,
        }
    }
}

impl CompletionRequest {
    /// A single-prompt request, the shape every routing and reasoning call uses.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Default::default()
        }
    }
}

/// Tool definition rendered for delegates and presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A cited source surfaced alongside a spoken response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub link: String,
}

impl Reference {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// The result of a tool invocation.
///
/// Expected failures are carried as `Error` values rather than `Err`, so the
/// orchestrator can voice them through the active persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Directly speakable text.
    Text { text: String },
    /// Synthesized findings plus the sources they came from.
    Insights {
        insights: String,
        references: Vec<Reference>,
    },
    /// Structured data with a short speakable summary.
    Data {
        summary: String,
        data: serde_json::Value,
        #[serde(default)]
        references: Vec<Reference>,
    },
    /// A recoverable failure with a human-readable reason.
    Error { error: String },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text { text: text.into() }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ToolOutput::Error {
            error: reason.into(),
        }
    }

    pub fn insights(insights: impl Into<String>, references: Vec<Reference>) -> Self {
        ToolOutput::Insights {
            insights: insights.into(),
            references,
        }
    }

    pub fn data(summary: impl Into<String>, data: serde_json::Value) -> Self {
        ToolOutput::Data {
            summary: summary.into(),
            data,
            references: Vec::new(),
        }
    }

    /// Attach references to a `Data` or `Insights` output; other kinds are unchanged.
    pub fn with_references(mut self, refs: Vec<Reference>) -> Self {
        match &mut self {
            ToolOutput::Data { references, .. } | ToolOutput::Insights { references, .. } => {
                references.extend(refs)
            }
            ToolOutput::Text { .. } | ToolOutput::Error { .. } => {}
        }
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error { .. })
    }

    /// Reduce the output to text a voice agent can speak.
    pub fn speakable(&self) -> &str {
        match self {
            ToolOutput::Text { text } => text,
            ToolOutput::Insights { insights, .. } => insights,
            ToolOutput::Data { summary, .. } => summary,
            ToolOutput::Error { error } => error,
        }
    }

    pub fn references(&self) -> &[Reference] {
        match self {
            ToolOutput::Insights { references, .. } | ToolOutput::Data { references, .. } => {
                references
            }
            ToolOutput::Text { .. } | ToolOutput::Error { .. } => &[],
        }
    }
}
