//! Interactive REPL and one-shot turn runners.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ultron_core::providers::create_provider;
use ultron_core::voice::HttpTranscriber;
use ultron_core::{
    ConversationContext, ExpertSelector, LlmProvider, MockLlmProvider, Orchestrator,
    PersonaStore, SpeechSink, TaskLookup, TaskTracker, ToolRegistry, Transcriber, TurnResponse,
    UltronConfig, extract_hypothesis,
};
use ultron_tools::{ToolDeps, register_builtin_tools};

/// Exchanges kept as conversation history for tools.
const HISTORY_TURNS: usize = 6;

/// Prints each utterance the moment it is spoken.
struct ConsoleSink;

#[async_trait]
impl SpeechSink for ConsoleSink {
    async fn speak(&self, utterance: &str) {
        println!("{utterance}");
    }
}

/// A wired orchestrator plus the conversation history of this terminal session.
pub struct Session {
    orchestrator: Orchestrator,
    history: VecDeque<String>,
}

impl Session {
    pub fn build(config: &UltronConfig) -> anyhow::Result<Self> {
        let delegate: Arc<dyn LlmProvider> = match create_provider(&config.llm) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Reasoning delegate init failed: {}. Using mock.", e);
                Arc::new(MockLlmProvider::new())
            }
        };

        let store = Arc::new(PersonaStore::from_config(&config.personas)?);
        let tracker = Arc::new(TaskTracker::new());
        let deps = ToolDeps {
            delegate: delegate.clone(),
            personas: store.clone(),
            tracker: tracker.clone(),
        };
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, config, &deps);

        let selector = if config.personas.delegate_fallback {
            ExpertSelector::with_delegate(
                delegate.clone(),
                Duration::from_secs(config.llm.timeout_secs),
            )
        } else {
            ExpertSelector::keyword_only()
        };

        let orchestrator = Orchestrator::new(store, Arc::new(registry), tracker)
            .with_selector(selector)
            .with_delegate(delegate)
            .with_config(config.orchestrator.clone())
            .with_sink(Arc::new(ConsoleSink));
        Ok(Self::new(orchestrator))
    }

    fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            history: VecDeque::new(),
        }
    }

    fn context(&self, follow_up: bool) -> ConversationContext {
        ConversationContext {
            history: (!self.history.is_empty())
                .then(|| self.history.iter().cloned().collect::<Vec<_>>().join("\n")),
            follow_up,
            requested_calls: Vec::new(),
        }
    }

    fn remember(&mut self, message: &str, response: &TurnResponse) {
        self.history
            .push_back(format!("User: {message}\n{}", response.text));
        while self.history.len() > HISTORY_TURNS {
            self.history.pop_front();
        }
    }

    /// Run one turn; utterances are printed by the sink as they are spoken.
    pub async fn turn(&mut self, message: &str, follow_up: bool) -> anyhow::Result<TurnResponse> {
        let context = self.context(follow_up);
        let response = self.orchestrator.handle_turn(message, &context).await?;
        self.remember(message, &response);
        Ok(response)
    }
}

fn print_footer(response: &TurnResponse) {
    for reference in &response.references {
        println!("  \x1b[2m↳ {} <{}>\x1b[0m", reference.title, reference.link);
    }
    for task in &response.tasks {
        println!("  \x1b[2m⏳ background task {task} (poll with /task {task})\x1b[0m");
    }
}

/// Send one message and exit.
pub async fn run_single_message(session: &Session, message: &str) -> anyhow::Result<()> {
    let context = ConversationContext::default();
    let response = session.orchestrator.handle_turn(message, &context).await?;
    print_footer(&response);
    Ok(())
}

/// Transcribe an audio file and send its hypothesis as one message.
pub async fn run_audio(session: &Session, config: &UltronConfig, audio: &Path) -> anyhow::Result<()> {
    let voice = config
        .voice
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("No [voice] transcription_url configured"))?;
    let transcriber = HttpTranscriber::new(voice)?;
    let transcript = transcriber.transcribe(audio).await?;
    if transcript.trim().is_empty() {
        println!("No transcript generated.");
        return Ok(());
    }
    let message = extract_hypothesis(&transcript);
    println!("\x1b[2m> {message}\x1b[0m");
    run_single_message(session, message).await
}

/// A line entered at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    /// `/more <text>`: continue the previous topic with the same persona.
    FollowUp(&'a str),
    Persona(&'a str),
    Personas,
    Task(&'a str),
    Tasks,
    Tools,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if !line.starts_with('/') {
            return Input::Message(line);
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        match cmd {
            "/quit" | "/exit" | "/q" => Input::Quit,
            "/help" | "/?" => Input::Help,
            "/personas" => Input::Personas,
            "/persona" => Input::Persona(arg),
            "/tasks" => Input::Tasks,
            "/task" => Input::Task(arg),
            "/tools" => Input::Tools,
            "/more" => Input::FollowUp(arg),
            _ => Input::Unknown(cmd),
        }
    }
}

const HELP: &str = "\
Commands:
  /persona <id>   switch the active persona
  /personas       list the roster
  /more <text>    follow up without re-routing the persona
  /task <id>      show a background task
  /tasks          list background tasks
  /tools          list available tools
  /quit           exit";

/// Run the interactive REPL.
pub async fn run_interactive(mut session: Session) -> anyhow::Result<()> {
    let persona = session.orchestrator.persona_state();
    println!("\x1b[1;36m  Ultron\x1b[0m  ·  speaking as {}", persona.marker());
    println!("  Type /help for commands, /quit to exit\n");

    let stdin = io::stdin();
    loop {
        print!("\x1b[1;34m> \x1b[0m");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match Input::parse(&line) {
            Input::Quit => {
                println!("Goodbye!");
                break;
            }
            Input::Help => println!("{HELP}"),
            Input::Personas => {
                let current = session.orchestrator.persona_state();
                for p in session.orchestrator.persona_store().roster().iter() {
                    let mark = if p.id == current.id { "*" } else { " " };
                    println!("{mark} {} ({}): {}", p.marker(), p.id, p.topics_line());
                }
            }
            Input::Persona(id) => match session.orchestrator.persona_store().set_by_id(id) {
                Some(p) => println!("Now speaking as {}", p.marker()),
                None => println!("Unknown persona '{id}'. Try /personas."),
            },
            Input::Task(raw) => match TaskTracker::parse_id(raw) {
                Ok(id) => match session.orchestrator.task_status(id) {
                    TaskLookup::Found(snapshot) => {
                        println!("{}", snapshot.describe());
                        if let Some(result) = &snapshot.result {
                            println!("{}", result.speakable());
                        }
                    }
                    TaskLookup::NotFound => println!("No task found with id {id}."),
                },
                Err(e) => println!("{e}"),
            },
            Input::Tasks => {
                let tasks = session.orchestrator.tracker().list();
                if tasks.is_empty() {
                    println!("No background tasks.");
                }
                for task in tasks {
                    println!("  {}", task.describe());
                }
            }
            Input::Tools => {
                let defs = session.orchestrator.tools().list_definitions();
                println!("Registered tools ({}):", defs.len());
                for def in &defs {
                    println!("  - {}: {}", def.name, def.description);
                }
            }
            Input::Unknown(cmd) => println!("Unknown command {cmd}. Type /help."),
            Input::Message(text) => report(session.turn(text, false).await),
            Input::FollowUp("") => println!("Usage: /more <text>"),
            Input::FollowUp(text) => report(session.turn(text, true).await),
        }
    }
    Ok(())
}

fn report(result: anyhow::Result<TurnResponse>) {
    match result {
        Ok(response) => print_footer(&response),
        Err(e) => println!("\x1b[31mError: {e}\x1b[0m"),
    }
}
