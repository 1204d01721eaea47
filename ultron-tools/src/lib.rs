//! # Ultron Tools
//!
//! Built-in tools for the Ultron persona agent: topic summaries, research
//! papers, deep reasoning and thesis generation through the delegate, market
//! data with technical indicators, and background task polling.

pub mod arxiv;
pub mod finance;
pub mod indicators;
pub mod market;
pub mod reasoning;
pub mod task_status;
pub mod upstream;
pub mod wikipedia;

use std::sync::Arc;
use ultron_core::brain::LlmProvider;
use ultron_core::config::UltronConfig;
use ultron_core::personas::PersonaStore;
use ultron_core::registry::{Tool, ToolRegistry};
use ultron_core::tasks::TaskTracker;

/// Shared collaborators the built-in tools are wired to.
#[derive(Clone)]
pub struct ToolDeps {
    pub delegate: Arc<dyn LlmProvider>,
    pub personas: Arc<PersonaStore>,
    pub tracker: Arc<TaskTracker>,
}

/// Register all built-in tools backed by the configured upstream services.
///
/// A tool whose HTTP client cannot be built is skipped with a warning.
pub fn register_builtin_tools(registry: &mut ToolRegistry, config: &UltronConfig, deps: &ToolDeps) {
    let mut tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(reasoning::DeepReasoningTool::new(
            deps.delegate.clone(),
            deps.personas.clone(),
        )),
        Arc::new(reasoning::ThesisGenerationTool::new(deps.delegate.clone())),
        Arc::new(finance::FinancialIndicatorTool),
        Arc::new(task_status::TaskStatusTool::new(deps.tracker.clone())),
    ];

    match wikipedia::WikipediaClient::new(&config.retrieval) {
        Ok(client) => tools.push(Arc::new(wikipedia::SummaryLookupTool::new(Arc::new(client)))),
        Err(e) => tracing::warn!("Skipping summary_lookup: {}", e),
    }
    match arxiv::ArxivClient::new(&config.retrieval) {
        Ok(client) => tools.push(Arc::new(arxiv::PaperRetrievalTool::new(Arc::new(client)))),
        Err(e) => tracing::warn!("Skipping paper_retrieval: {}", e),
    }
    match market::YahooClient::new(&config.finance) {
        Ok(client) => {
            let source: Arc<dyn market::MarketDataSource> = Arc::new(client);
            tools.push(Arc::new(finance::FinancialFetchTool::new(
                source.clone(),
                &config.finance,
            )));
            tools.push(Arc::new(finance::FinancialNewsTool::new(source)));
        }
        Err(e) => tracing::warn!("Skipping market tools: {}", e),
    }

    for tool in tools {
        if let Err(e) = registry.register(tool) {
            tracing::warn!("Failed to register tool: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultron_core::brain::MockLlmProvider;
    use ultron_core::personas::Roster;

    fn deps() -> ToolDeps {
        ToolDeps {
            delegate: Arc::new(MockLlmProvider::new()),
            personas: Arc::new(PersonaStore::new(Roster::builtin())),
            tracker: Arc::new(TaskTracker::new()),
        }
    }

    #[test]
    fn test_register_all_builtin_tools() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &UltronConfig::default(), &deps());

        assert_eq!(
            registry.list_names(),
            vec![
                "deep_reasoning",
                "financial_fetch",
                "financial_indicator",
                "financial_news",
                "paper_retrieval",
                "summary_lookup",
                "task_status",
                "thesis_generation",
            ]
        );
        assert!(registry.is_long_running("thesis_generation"));
        assert!(!registry.is_long_running("summary_lookup"));
    }

    #[test]
    fn test_double_registration_keeps_first() {
        let mut registry = ToolRegistry::new();
        let config = UltronConfig::default();
        register_builtin_tools(&mut registry, &config, &deps());
        register_builtin_tools(&mut registry, &config, &deps());
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_definitions_carry_schemas() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &UltronConfig::default(), &deps());
        let fetch = registry
            .list_definitions()
            .into_iter()
            .find(|d| d.name == "financial_fetch")
            .unwrap();
        assert_eq!(fetch.parameters["required"], serde_json::json!(["symbol"]));
    }
}
