//! Orchestrator — runs one conversational turn end to end.
//!
//! A turn selects the persona, plans tool calls, fans them out concurrently,
//! and speaks each result in completion order through the session's
//! [`SpeechSink`], one utterance at a time. Long-running tools are tracked in
//! the [`TaskTracker`] and only awaited up to the configured turn budget.

use crate::brain::LlmProvider;
use crate::config::OrchestratorConfig;
use crate::error::{ToolError, UltronError};
use crate::personas::{Persona, PersonaStore};
use crate::planner::{KeywordPlanner, ToolPlanner};
use crate::registry::{Tool, ToolCall, ToolRegistry, run_prepared};
use crate::selector::{ExpertSelector, SelectionSource};
use crate::speak::SpeakMutex;
use crate::tasks::{TaskId, TaskLookup, TaskTracker};
use crate::types::{Reference, ToolOutput};
use async_trait::async_trait;
use futures::StreamExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spoken when no tools run and the delegate cannot produce a quick thought.
pub const FALLBACK_THOUGHT: &str = "Hmm, let me think about that for a moment.";

/// Per-turn inputs besides the message itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Free-text conversation history attached to tool calls that accept it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    /// The message continues the previous topic; keep the current persona.
    #[serde(default)]
    pub follow_up: bool,
    /// Tool calls requested explicitly; they replace planning.
    #[serde(default)]
    pub requested_calls: Vec<ToolCall>,
}

impl ConversationContext {
    pub fn with_history(history: impl Into<String>) -> Self {
        Self {
            history: Some(history.into()),
            ..Default::default()
        }
    }
}

/// Consumer of spoken utterances, in speaking order.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, utterance: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

#[async_trait]
impl SpeechSink for NoOpSink {
    async fn speak(&self, _utterance: &str) {}
}

/// Records every utterance; used by tests and the CLI transcript.
#[derive(Debug, Default)]
pub struct RecordingSink {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn utterances(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechSink for RecordingSink {
    async fn speak(&self, utterance: &str) {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(utterance.to_string());
    }
}

/// Everything a turn produced.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub persona: Arc<Persona>,
    pub selection: SelectionSource,
    /// Utterances joined by newline.
    pub text: String,
    pub utterances: Vec<String>,
    pub references: Vec<Reference>,
    /// Long-running invocations still processing when the turn ended.
    pub tasks: Vec<TaskId>,
}

/// How one planned call ended within the turn.
enum CallOutcome {
    Finished { tool: String, output: ToolOutput },
    Pending { tool: String, task: TaskId },
}

/// Coordinates persona selection, tool fan-out, and speaking for a session.
pub struct Orchestrator {
    store: Arc<PersonaStore>,
    selector: ExpertSelector,
    planner: Box<dyn ToolPlanner>,
    registry: Arc<ToolRegistry>,
    tracker: Arc<TaskTracker>,
    speak: SpeakMutex,
    sink: Arc<dyn SpeechSink>,
    delegate: Option<Arc<dyn LlmProvider>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// An orchestrator with keyword-only selection, keyword planning and a silent sink.
    pub fn new(
        store: Arc<PersonaStore>,
        registry: Arc<ToolRegistry>,
        tracker: Arc<TaskTracker>,
    ) -> Self {
        Self {
            store,
            selector: ExpertSelector::keyword_only(),
            planner: Box::new(KeywordPlanner),
            registry,
            tracker,
            speak: SpeakMutex::new(),
            sink: Arc::new(NoOpSink),
            delegate: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_selector(mut self, selector: ExpertSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_planner(mut self, planner: Box<dyn ToolPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SpeechSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Delegate used for quick thoughts when a turn plans no tools.
    pub fn with_delegate(mut self, delegate: Arc<dyn LlmProvider>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active persona.
    pub fn persona_state(&self) -> Arc<Persona> {
        self.store.current()
    }

    pub fn persona_store(&self) -> &Arc<PersonaStore> {
        &self.store
    }

    pub fn task_status(&self, id: TaskId) -> TaskLookup {
        self.tracker.status(id)
    }

    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one turn.
    ///
    /// Fails only when a requested call names an unknown tool, or a call
    /// carries arguments that violate its schema; nothing has been spoken then.
    /// Planner intents for tools that are not registered are dropped.
    pub async fn handle_turn(
        &self,
        message: &str,
        context: &ConversationContext,
    ) -> Result<TurnResponse, UltronError> {
        let selection = if context.follow_up {
            debug!("Follow-up message, keeping current persona");
            ExpertSelector::retain(&self.store)
        } else {
            self.selector.select(message, &self.store).await
        };
        let persona = selection.persona.clone();
        let marker = persona.marker();

        let mut calls = self.planner.plan(message, context);
        if context.requested_calls.is_empty() {
            calls.retain(|call| {
                let registered = self.registry.get(&call.name).is_some();
                if !registered {
                    warn!(tool = %call.name, "Planned tool is not registered, skipping");
                }
                registered
            });
        }
        let prepared = self.prepare_calls(calls, context)?;
        info!(
            persona = %persona.id,
            source = %selection.source,
            tools = prepared.len(),
            "Turn planned"
        );

        let mut utterances = Vec::new();
        let mut references: Vec<Reference> = Vec::new();
        let mut tasks = Vec::new();

        if prepared.is_empty() {
            let thought = self.quick_thought(message, &persona, context).await;
            let line = tag(&marker, &thought);
            self.say(&line).await;
            utterances.push(line);
        } else {
            let parallel = self.config.max_parallel_tools.max(1);
            let mut outcomes = futures::stream::iter(
                prepared
                    .into_iter()
                    .map(|(tool, args)| self.invoke(tool, args)),
            )
            .buffer_unordered(parallel);

            while let Some(outcome) = outcomes.next().await {
                let line = match outcome {
                    CallOutcome::Finished { tool, output } => {
                        debug!(tool = %tool, error = output.is_error(), "Tool finished");
                        for reference in output.references() {
                            if !references.contains(reference) {
                                references.push(reference.clone());
                            }
                        }
                        render(&marker, &output)
                    }
                    CallOutcome::Pending { tool, task } => {
                        info!(tool = %tool, task_id = %task, "Tool still running after turn budget");
                        tasks.push(task);
                        format!(
                            "{marker} That one will take a while. I'm working on it in the background, task {task}."
                        )
                    }
                };
                self.say(&line).await;
                utterances.push(line);
            }
        }

        Ok(TurnResponse {
            persona,
            selection: selection.source,
            text: utterances.join("\n"),
            utterances,
            references,
            tasks,
        })
    }

    /// Resolve and validate every call before any of them runs.
    fn prepare_calls(
        &self,
        calls: Vec<ToolCall>,
        context: &ConversationContext,
    ) -> Result<Vec<(Arc<dyn Tool>, serde_json::Value)>, ToolError> {
        calls
            .into_iter()
            .map(|call| {
                let call = if call.history.is_none() {
                    call.with_history(context.history.clone())
                } else {
                    call
                };
                let args = self.registry.call_arguments(&call);
                let tool = self.registry.prepare(&call.name, &args)?;
                Ok((tool, args))
            })
            .collect()
    }

    fn invoke(&self, tool: Arc<dyn Tool>, args: serde_json::Value) -> BoxFuture<'static, CallOutcome> {
        let tracker = self.tracker.clone();
        let wait = Duration::from_secs(self.config.turn_wait_secs);
        Box::pin(async move {
            let name = tool.name().to_string();
            if !tool.long_running() {
                let output = run_prepared(tool, args).await.unwrap_or_else(|e| {
                    warn!(tool = %name, error = %e, "Tool failed");
                    ToolOutput::error(e.to_string())
                });
                return CallOutcome::Finished { tool: name, output };
            }

            let task = tracker.start(&name);
            let mut handle = tokio::spawn(track(tracker, task, tool, args));
            match tokio::time::timeout(wait, &mut handle).await {
                Ok(Ok(output)) => CallOutcome::Finished { tool: name, output },
                Ok(Err(join_error)) => {
                    warn!(tool = %name, error = %join_error, "Background tool task aborted");
                    CallOutcome::Finished {
                        tool: name,
                        output: ToolOutput::error("the background task stopped unexpectedly"),
                    }
                }
                Err(_) => CallOutcome::Pending { tool: name, task },
            }
        })
    }

    async fn say(&self, line: &str) {
        let _permit = self.speak.acquire().await;
        self.sink.speak(line).await;
    }

    async fn quick_thought(
        &self,
        message: &str,
        persona: &Persona,
        context: &ConversationContext,
    ) -> String {
        let Some(delegate) = self.delegate.as_ref().filter(|_| self.config.quick_thoughts) else {
            return FALLBACK_THOUGHT.to_string();
        };
        let prompt = quick_thought_prompt(message, persona, context.history.as_deref());
        match delegate.complete_text(&prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => FALLBACK_THOUGHT.to_string(),
            Err(e) => {
                warn!(error = %e, "Quick thought failed, using fallback");
                FALLBACK_THOUGHT.to_string()
            }
        }
    }
}

/// Run a long-running tool to completion and record the terminal state.
async fn track(
    tracker: Arc<TaskTracker>,
    task: TaskId,
    tool: Arc<dyn Tool>,
    args: serde_json::Value,
) -> ToolOutput {
    let output = run_prepared(tool, args)
        .await
        .unwrap_or_else(|e| ToolOutput::error(e.to_string()));
    let recorded = if output.is_error() {
        tracker.fail(task, output.speakable())
    } else {
        tracker.complete(task, output.clone())
    };
    if let Err(e) = recorded {
        warn!(task_id = %task, error = %e, "Could not record task result");
    }
    output
}

fn quick_thought_prompt(message: &str, persona: &Persona, history: Option<&str>) -> String {
    let mut prompt = format!(
        "You are {}. Traits: {}. Speech pattern: {}.\n",
        persona.name, persona.traits, persona.speech_pattern
    );
    if let Some(history) = history.filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!("Conversation so far:\n{history}\n"));
    }
    prompt.push_str(&format!(
        "Share a quick, natural 2-3 sentence thought in character about: {message}"
    ));
    prompt
}

/// Prefix `text` with the persona marker unless it already carries it.
pub fn tag(marker: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        marker.to_string()
    } else if text.starts_with(marker) {
        text.to_string()
    } else {
        format!("{marker} {text}")
    }
}

/// The spoken line for a tool result.
pub fn render(marker: &str, output: &ToolOutput) -> String {
    match output {
        ToolOutput::Error { error } => {
            format!("{marker} Sorry, I couldn't finish that: {error}")
        }
        other => tag(marker, other.speakable()),
    }
}
