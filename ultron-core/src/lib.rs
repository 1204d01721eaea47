//! # Ultron Core
//!
//! Core library for the Ultron persona agent.
//! Provides persona routing, the tool registry, the speaking slot, task
//! tracking, the reasoning delegate interface (brain), configuration, and the
//! turn orchestrator.

pub mod brain;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod personas;
pub mod planner;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod speak;
pub mod tasks;
pub mod types;
pub mod voice;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider, MockReply};
pub use config::UltronConfig;
pub use error::{Result, UltronError};
pub use orchestrator::{
    ConversationContext, NoOpSink, Orchestrator, RecordingSink, SpeechSink, TurnResponse,
};
pub use personas::{Persona, PersonaStore, Roster};
pub use planner::{KeywordPlanner, ToolPlanner};
pub use registry::{ParamKind, ParamSpec, Tool, ToolCall, ToolRegistry};
pub use selector::{ExpertSelector, Selection, SelectionSource};
pub use speak::{SpeakMutex, SpeakPermit};
pub use tasks::{TaskId, TaskLookup, TaskSnapshot, TaskStatus, TaskTracker};
pub use types::{
    CompletionRequest, CompletionResponse, Message, Reference, Role, TokenUsage, ToolDefinition,
    ToolOutput,
};
pub use voice::{Transcriber, extract_hypothesis};
