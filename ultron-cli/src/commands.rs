//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use std::path::Path;
use ultron_core::config::{self, UltronConfig};
use ultron_core::personas::Roster;

/// Load the effective configuration: an explicit file, or the layered defaults.
pub fn load(workspace: &Path, explicit: Option<&Path>) -> anyhow::Result<UltronConfig> {
    let loaded = match explicit {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Some(workspace))?,
    };
    Ok(loaded)
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    explicit: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, explicit),
        Commands::Personas => {
            let config = load(workspace, explicit)?;
            print!("{}", personas_listing(&Roster::from_config(&config.personas)?));
            Ok(())
        }
        Commands::Tools => {
            println!("{}", tools_listing(&load(workspace, explicit)?)?);
            Ok(())
        }
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    explicit: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let written = config::write_default_config(workspace)?;
            println!("Created default configuration at: {}", written.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, explicit)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// One line per persona: marker, id, topics.
pub fn personas_listing(roster: &Roster) -> String {
    roster
        .iter()
        .map(|p| format!("  {:<28} {:<18} {}\n", p.marker(), p.id, p.topics_line()))
        .collect()
}

/// Built-in tools with their JSON schemas. Uses a mock delegate; nothing is called.
fn tools_listing(config: &UltronConfig) -> anyhow::Result<String> {
    use std::sync::Arc;
    use ultron_core::{MockLlmProvider, PersonaStore, TaskTracker, ToolRegistry};

    let deps = ultron_tools::ToolDeps {
        delegate: Arc::new(MockLlmProvider::new()),
        personas: Arc::new(PersonaStore::from_config(&config.personas)?),
        tracker: Arc::new(TaskTracker::new()),
    };
    let mut registry = ToolRegistry::new();
    ultron_tools::register_builtin_tools(&mut registry, config, &deps);

    let mut out = format!("Registered tools ({}):\n", registry.len());
    for def in registry.list_definitions() {
        out.push_str(&format!("  - {}: {}\n", def.name, def.description));
        out.push_str(&format!(
            "      {}\n",
            serde_json::to_string(&def.parameters["properties"])?
        ));
    }
    Ok(out)
}
