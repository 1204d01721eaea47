//! Error types for the Ultron core.
//!
//! Uses `thiserror` for public API error types. Expected failures of tools and
//! delegates are converted into structured values at their boundary; the
//! variants here cover what is allowed to surface to a caller.

use std::path::PathBuf;

/// Top-level error type for the Ultron core library.
#[derive(Debug, thiserror::Error)]
pub enum UltronError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),
}

/// Errors from the reasoning delegate.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from tool registration and dispatch.
///
/// Upstream failures inside a handler are not represented here; handlers
/// report those as `ToolOutput::Error`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from task state transitions.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {id}")]
    NotFound { id: String },

    #[error("Task {id} already finished as {status}")]
    AlreadyFinished { id: String, status: String },

    #[error("Invalid task id: {raw}")]
    InvalidId { raw: String },
}

/// Errors from the speech transcription delegate.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Audio file not found: {path}")]
    AudioNotFound { path: PathBuf },

    #[error("Transcription failed: {message}")]
    TranscriptionFailed { message: String },
}

/// A type alias for results using the top-level `UltronError`.
pub type Result<T> = std::result::Result<T, UltronError>;
