//! Configuration system for Ultron.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/ultron/config.toml` and/or `.ultron/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::personas::PersonaConfig;

/// Top-level configuration for an Ultron session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UltronConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub personas: PersonaConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub finance: FinanceConfig,
    /// Optional speech transcription endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
}

/// Configuration for the reasoning delegate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "local".
    pub provider: String,
    /// Model used for routing and reasoning calls.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional API key (takes precedence over the env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Upper bound on a single delegate call.
    pub timeout_secs: u64,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "o1-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
            max_tokens: 2048,
            temperature: 1.0,
        }
    }
}

/// Per-turn orchestration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How long a turn waits on a long-running tool before moving on.
    pub turn_wait_secs: u64,
    /// Maximum tool calls in flight at once within a turn.
    pub max_parallel_tools: usize,
    /// Ask the delegate for a short in-persona remark when no tool is called.
    pub quick_thoughts: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_wait_secs: 20,
            max_parallel_tools: 4,
            quick_thoughts: true,
        }
    }
}

/// Knowledge retrieval endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub wikipedia_base_url: String,
    pub arxiv_base_url: String,
    /// Maximum papers returned per search.
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            wikipedia_base_url: "https://en.wikipedia.org/api/rest_v1/page/summary".to_string(),
            arxiv_base_url: "https://export.arxiv.org/api/query".to_string(),
            max_results: 10,
            timeout_secs: 30,
        }
    }
}

/// Market data endpoints and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    pub chart_base_url: String,
    pub news_base_url: String,
    pub default_range: String,
    pub default_interval: String,
    pub timeout_secs: u64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            chart_base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            news_base_url: "https://query1.finance.yahoo.com/v1/finance/search".to_string(),
            default_range: "1mo".to_string(),
            default_interval: "1d".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Speech transcription delegate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub transcription_url: String,
    #[serde(default = "default_voice_timeout")]
    pub timeout_secs: u64,
}

fn default_voice_timeout() -> u64 {
    60
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `ULTRON_`)
/// 2. Workspace-local config (`.ultron/config.toml`)
/// 3. User config (`~/.config/ultron/config.toml`)
/// 4. Built-in defaults
pub fn load_config(workspace: Option<&Path>) -> Result<UltronConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(UltronConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // ULTRON_LLM__MODEL, ULTRON_ORCHESTRATOR__TURN_WAIT_SECS, ...
    figment = figment.merge(Env::prefixed("ULTRON_").split("__"));

    extract(figment)
}

/// Load configuration from one explicit TOML file on top of the defaults.
pub fn load_config_file(path: &Path) -> Result<UltronConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    extract(Figment::from(Serialized::defaults(UltronConfig::default())).merge(Toml::file(path)))
}

fn extract(figment: Figment) -> Result<UltronConfig, ConfigError> {
    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// `~/.config/ultron/config.toml` (platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ultron", "ultron")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<workspace>/.ultron/config.toml`.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ultron").join("config.toml")
}

/// Write the default configuration to the workspace config file.
///
/// Refuses to overwrite an existing file. Returns the path written.
pub fn write_default_config(workspace: &Path) -> std::io::Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&UltronConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = UltronConfig::default();
        assert_eq!(config.llm.model, "o1-mini");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.orchestrator.max_parallel_tools, 4);
        assert!(config.orchestrator.quick_thoughts);
        assert!(config.personas.delegate_fallback);
        assert!(config.voice.is_none());
        assert_eq!(config.retrieval.max_results, 10);
    }

    #[test]
    fn test_workspace_config_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".ultron");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
[llm]
model = "gpt-4o-mini"
timeout_secs = 5

[personas]
default_persona = "wizard"
delegate_fallback = false

[orchestrator]
turn_wait_secs = 2
"#,
        )
        .unwrap();

        let config = load_config_file(&cfg_dir.join("config.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 5);
        // Untouched keys keep their defaults
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.personas.default_persona.as_deref(), Some("wizard"));
        assert!(!config.personas.delegate_fallback);
        assert_eq!(config.orchestrator.turn_wait_secs, 2);
        assert_eq!(config.orchestrator.max_parallel_tools, 4);
    }

    #[test]
    fn test_layered_load_reads_workspace_file() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".ultron");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[orchestrator]\nmax_parallel_tools = 2\n")
            .unwrap();
        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.orchestrator.max_parallel_tools, 2);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        match load_config_file(&missing) {
            Err(ConfigError::FileNotFound { path }) => assert_eq!(path, missing),
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[orchestrator]\nmax_parallel_tools = \"many\"\n").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_write_default_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = write_default_config(dir.path()).unwrap();
        assert!(path.ends_with(".ultron/config.toml"));

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.finance.default_interval, "1d");

        // Second write must not clobber the file
        assert!(write_default_config(dir.path()).is_err());
    }
}
