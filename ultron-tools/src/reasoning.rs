//! Delegate-backed tools: deep reasoning in a persona's voice and long-form
//! thesis generation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use ultron_core::brain::LlmProvider;
use ultron_core::error::{LlmError, ToolError};
use ultron_core::personas::{Persona, PersonaStore};
use ultron_core::planner::DEFAULT_THESIS_PAGES;
use ultron_core::registry::{ParamKind, ParamSpec, Tool};
use ultron_core::types::{CompletionRequest, Message, ToolOutput};

const DELEGATE_REJECTED: &str = "Failed to get deeper insights.";
const DELEGATE_UNREACHABLE: &str = "Failed to process the reasoning request.";

/// Upper bound on requested thesis length.
pub const MAX_THESIS_PAGES: u64 = 20;
const TOKENS_PER_PAGE: usize = 700;

/// Map a delegate failure to the recoverable message the user hears.
fn delegate_failure(tool: &str, err: &LlmError) -> ToolOutput {
    tracing::warn!(tool = tool, error = %err, "Reasoning delegate failed");
    match err {
        LlmError::ApiRequest { .. } | LlmError::AuthFailed { .. } => {
            ToolOutput::error(DELEGATE_REJECTED)
        }
        _ => ToolOutput::error(DELEGATE_UNREACHABLE),
    }
}

fn persona_prompt(persona: &Persona, topic: &str, history: Option<&str>) -> String {
    let mut prompt = format!(
        "You are {}, an expert with these traits: {}.\n\
         Speak in this style: {}.\n\
         Give a deeper, well-reasoned insight into the topic below. \
         Keep it conversational and no longer than a few sentences.\n\n\
         Topic: {}",
        persona.name, persona.traits, persona.speech_pattern, topic
    );
    if let Some(history) = history.filter(|h| !h.trim().is_empty()) {
        prompt.push_str("\n\nAdditional Context: ");
        prompt.push_str(history.trim());
    }
    prompt
}

/// `deep_reasoning`: a synthesized insight spoken by the active persona.
pub struct DeepReasoningTool {
    delegate: Arc<dyn LlmProvider>,
    personas: Arc<PersonaStore>,
}

impl DeepReasoningTool {
    pub fn new(delegate: Arc<dyn LlmProvider>, personas: Arc<PersonaStore>) -> Self {
        Self { delegate, personas }
    }
}

#[async_trait]
impl Tool for DeepReasoningTool {
    fn name(&self) -> &str {
        "deep_reasoning"
    }

    fn description(&self) -> &str {
        "Reason about a topic in depth and answer in the voice of the current expert."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamKind::String, "The topic to reason about"),
            ParamSpec::optional(
                "history",
                ParamKind::String,
                "Earlier conversation for continuity",
            ),
            ParamSpec::optional(
                "expert_id",
                ParamKind::String,
                "Requested expert id; logged only, the active persona always answers",
            ),
        ]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(90)
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let topic = args["query"].as_str().unwrap_or_default();
        let persona = self.personas.current();
        if let Some(expert_id) = args["expert_id"].as_str()
            && expert_id != persona.id
        {
            tracing::debug!(expert_id, active = %persona.id, "Ignoring requested expert");
        }
        let prompt = persona_prompt(&persona, topic, args["history"].as_str());
        tracing::debug!(persona = %persona.id, prompt = %prompt, "Deep reasoning prompt");

        match self.delegate.complete_text(&prompt).await {
            Ok(text) if text.is_empty() => Ok(ToolOutput::error(DELEGATE_REJECTED)),
            Ok(text) => Ok(ToolOutput::text(format!("{} {}", persona.marker(), text))),
            Err(e) => Ok(delegate_failure(self.name(), &e)),
        }
    }
}

/// Clamp a requested page count into `1..=MAX_THESIS_PAGES`.
pub fn thesis_pages(raw: Option<u64>) -> u64 {
    raw.unwrap_or(DEFAULT_THESIS_PAGES).clamp(1, MAX_THESIS_PAGES)
}

fn thesis_request(topic: &str, pages: u64) -> CompletionRequest {
    let system = "You write rigorous long-form academic theses. Structure every thesis with \
                  a title, an abstract, an introduction, a literature review, a methodology, \
                  a discussion and a conclusion, using markdown headings.";
    let user = format!(
        "Write a thesis of roughly {pages} page(s) (about {} words) on the following topic.\n\n\
         Topic: {topic}",
        pages * 450
    );
    CompletionRequest {
        messages: vec![Message::system(system), Message::user(user)],
        temperature: 0.4,
        max_tokens: Some(pages as usize * TOKENS_PER_PAGE),
        model: None,
    }
}

/// `thesis_generation`: a structured long-form document. Tracked as a background task.
pub struct ThesisGenerationTool {
    delegate: Arc<dyn LlmProvider>,
}

impl ThesisGenerationTool {
    pub fn new(delegate: Arc<dyn LlmProvider>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl Tool for ThesisGenerationTool {
    fn name(&self) -> &str {
        "thesis_generation"
    }

    fn description(&self) -> &str {
        "Generate a structured long-form thesis on a topic. Runs in the background."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamKind::String, "The thesis topic"),
            ParamSpec::optional(
                "pages",
                ParamKind::Integer,
                "Approximate length in pages (1-20, default 3)",
            ),
        ]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    fn long_running(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let topic = args["query"].as_str().unwrap_or_default();
        let pages = thesis_pages(args["pages"].as_u64());
        tracing::info!(topic = %topic, pages, "Generating thesis");

        match self.delegate.complete(thesis_request(topic, pages)).await {
            Ok(response) if response.text().is_empty() => Ok(ToolOutput::error(DELEGATE_REJECTED)),
            Ok(response) => Ok(ToolOutput::text(response.text())),
            Err(e) => Ok(delegate_failure(self.name(), &e)),
        }
    }
}
