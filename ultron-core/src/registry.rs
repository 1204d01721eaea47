//! Tool Registry — named tools, their argument schemas, and validated dispatch.
//!
//! Tools are registered at startup. Each declares a flat parameter schema that
//! the registry checks before the handler runs, so handlers can assume the
//! shape of their arguments. Handlers report expected failures as
//! `ToolOutput::Error`; the registry turns a timeout into one as well.

use crate::error::ToolError;
use crate::types::{ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Primitive JSON kinds a parameter may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Render a parameter list as a JSON Schema object.
pub fn schema_json(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                json!({ "type": p.kind.as_str(), "description": p.description }),
            )
        })
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check `args` against `params`. Unknown extra fields are allowed.
pub fn validate_args(tool: &str, params: &[ParamSpec], args: &Value) -> Result<(), ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        name: tool.to_string(),
        reason,
    };
    let object = args
        .as_object()
        .ok_or_else(|| invalid("arguments must be a JSON object".to_string()))?;

    for param in params {
        match object.get(&param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(invalid(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) if !param.kind.accepts(value) => {
                return Err(invalid(format!(
                    "parameter '{}' must be of type {}",
                    param.name, param.kind
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Declared parameters, checked by the registry before `execute` runs.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;

    /// Maximum execution time before timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Whether invocations should be tracked as background tasks.
    fn long_running(&self) -> bool {
        false
    }
}

/// A request to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            history: None,
        }
    }

    pub fn with_history(mut self, history: Option<String>) -> Self {
        self.history = history;
        self
    }
}

/// The tool registry holds all registered tools and handles execution.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Returns error if a tool with the same name is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered { name });
        }
        debug!(tool = %name, long_running = tool.long_running(), "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> Result<(), ToolError> {
        if self.tools.remove(name).is_none() {
            return Err(ToolError::NotFound {
                name: name.to_string(),
            });
        }
        debug!(tool = %name, "Unregistered tool");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions with JSON-schema parameters, sorted by name.
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: schema_json(&tool.parameters()),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered tool names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether the named tool is registered and long-running.
    pub fn is_long_running(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.long_running())
    }

    /// Look up and validate a call without running it.
    pub fn prepare(&self, name: &str, args: &Value) -> Result<Arc<dyn Tool>, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        validate_args(name, &tool.parameters(), args)?;
        Ok(tool)
    }

    /// Execute a tool by name with the given arguments, applying timeout.
    ///
    /// Unknown tools and schema violations are errors; a timeout is reported
    /// as `ToolOutput::Error`.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = self.prepare(name, &args)?;
        run_prepared(tool, args).await
    }

    /// Execute a `ToolCall`, attaching its history blob when the tool accepts one.
    pub async fn execute_call(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let args = self.call_arguments(call);
        self.execute(&call.name, args).await
    }

    /// Arguments of `call`, with `history` merged in when the tool declares it.
    pub fn call_arguments(&self, call: &ToolCall) -> Value {
        let mut args = call.arguments.clone();
        if let Some(history) = &call.history
            && let Some(tool) = self.tools.get(&call.name)
            && tool.parameters().iter().any(|p| p.name == "history")
            && let Some(object) = args.as_object_mut()
        {
            object
                .entry("history")
                .or_insert_with(|| Value::String(history.clone()));
        }
        args
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run an already validated tool under its timeout.
pub async fn run_prepared(tool: Arc<dyn Tool>, args: Value) -> Result<ToolOutput, ToolError> {
    let timeout = tool.timeout();
    info!(tool = %tool.name(), timeout_secs = timeout.as_secs(), "Executing tool");

    match tokio::time::timeout(timeout, tool.execute(args)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = %tool.name(), timeout_secs = timeout.as_secs(), "Tool timed out");
            Ok(ToolOutput::error(format!(
                "{} timed out after {}s",
                tool.name(),
                timeout.as_secs()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple echo tool for testing.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input text back"
        }

        fn parameters(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::required("text", ParamKind::String, "Text to echo"),
                ParamSpec::optional("times", ParamKind::Integer, "Repeat count"),
                ParamSpec::optional("history", ParamKind::String, "Conversation so far"),
            ]
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
            let text = args["text"].as_str().unwrap_or_default();
            let times = args["times"].as_u64().unwrap_or(1) as usize;
            let mut out = vec![text; times].join(" ");
            if let Some(h) = args["history"].as_str() {
                out = format!("{out} (after: {h})");
            }
            Ok(ToolOutput::text(format!("Echo: {}", out)))
        }
    }

    /// A slow tool for timeout testing.
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "A tool that takes forever"
        }

        fn parameters(&self) -> Vec<ParamSpec> {
            Vec::new()
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutput::text("done"))
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        fn long_running(&self) -> bool {
            true
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();
        registry
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = registry();
        match registry.register(Arc::new(EchoTool)) {
            Err(ToolError::AlreadyRegistered { name }) => assert_eq!(name, "echo"),
            other => panic!("Expected AlreadyRegistered, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_unregister() {
        let mut registry = registry();
        registry.unregister("echo").unwrap();
        assert!(registry.get("echo").is_none());
        assert!(registry.unregister("echo").is_err());
    }

    #[test]
    fn test_list_names_sorted() {
        assert_eq!(registry().list_names(), vec!["echo", "slow"]);
        assert!(registry().is_long_running("slow"));
        assert!(!registry().is_long_running("echo"));
        assert!(!registry().is_long_running("missing"));
    }

    #[test]
    fn test_list_definitions_schema() {
        let defs = registry().list_definitions();
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["type"], "object");
        assert_eq!(defs[0].parameters["properties"]["text"]["type"], "string");
        assert_eq!(defs[0].parameters["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_execute_tool() {
        let result = registry()
            .execute("echo", json!({"text": "hello", "times": 2}))
            .await
            .unwrap();
        assert_eq!(result, ToolOutput::text("Echo: hello hello"));
    }

    #[tokio::test]
    async fn test_execute_nonexistent_tool() {
        match registry().execute("missing", json!({})).await {
            Err(ToolError::NotFound { name }) => assert_eq!(name, "missing"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_required() {
        let err = registry().execute("echo", json!({})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'echo': missing required parameter 'text'"
        );
    }

    #[tokio::test]
    async fn test_execute_wrong_type() {
        let err = registry()
            .execute("echo", json!({"text": "a", "times": "two"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_execute_non_object_args() {
        let err = registry().execute("echo", json!("hi")).await.unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[tokio::test]
    async fn test_timeout_is_recoverable() {
        let result = registry().execute("slow", json!({})).await.unwrap();
        assert!(result.is_error());
        assert!(result.speakable().contains("timed out"));
    }

    #[tokio::test]
    async fn test_execute_call_attaches_history() {
        let call = ToolCall::new("echo", json!({"text": "hi"}))
            .with_history(Some("user asked earlier".into()));
        let result = registry().execute_call(&call).await.unwrap();
        assert_eq!(result.speakable(), "Echo: hi (after: user asked earlier)");
    }

    #[test]
    fn test_call_arguments_skips_tools_without_history() {
        let call = ToolCall::new("slow", json!({})).with_history(Some("x".into()));
        assert_eq!(registry().call_arguments(&call), json!({}));
    }
}
