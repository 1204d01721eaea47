//! Ultron CLI — terminal interface for the persona-routing agent.
//!
//! Runs a single message, a transcribed audio file, or an interactive REPL.

mod commands;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Ultron: talk to a roster of expert personas backed by research and market tools
#[derive(Parser, Debug)]
#[command(name = "ultron", version, about, long_about = None)]
struct Cli {
    /// Message to send (starts interactive mode if omitted)
    message: Option<String>,

    /// Transcribe an audio file and send its hypothesis as the message
    #[arg(short, long, conflicts_with = "message")]
    audio: Option<PathBuf>,

    /// Start with this persona id instead of the configured default
    #[arg(short, long)]
    persona: Option<String>,

    /// Delegate model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (replaces the user and workspace files)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the persona roster
    Personas,
    /// List the built-in tools and their parameters
    Tools,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .ultron/config.toml into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "ultron", "ultron")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ultron.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .or_else(|_| std::env::current_dir())
        .unwrap_or_else(|_| PathBuf::from("."));

    if let Some(command) = cli.command {
        return commands::handle_command(command, &workspace, cli.config.as_deref()).await;
    }

    let mut config = commands::load(&workspace, cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(persona) = &cli.persona {
        config.personas.default_persona = Some(persona.clone());
    }

    let session = repl::Session::build(&config)?;
    if let Some(audio) = &cli.audio {
        repl::run_audio(&session, &config, audio).await
    } else if let Some(message) = cli.message {
        repl::run_single_message(&session, &message).await
    } else {
        repl::run_interactive(session).await
    }
}
