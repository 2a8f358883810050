//! Weather agent CLI
//!
//! Chat with the weather agent from the terminal, one question at a time
//! or in an interactive session.

#![allow(clippy::print_stdout)]

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use application::{MemoryInfo, WeatherAgent};
use clap::{Parser, Subcommand};
use domain::ToolName;
use futures::StreamExt;
use infrastructure::{AppConfig, LlmInferenceAdapter, OpenWeatherAdapter, init_logging};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Weather agent CLI
#[derive(Debug, Parser)]
#[command(name = "weather-agent")]
#[command(author, version, about = "Conversational weather assistant", long_about = None)]
struct Cli {
    /// Verbosity level; overrides `logging.filter`
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// LLM provider (google, openai, anthropic, azure)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Intent classification strategy
    #[arg(long, global = true, value_parser = ["rules", "llm_fallback"])]
    classifier: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a single question
    Chat {
        /// Question to ask
        message: String,

        /// Print the reply as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Interactive session with conversation memory
    ///
    /// Type /info, /tools or /clear at the prompt; /quit or an empty line
    /// at end of input leaves.
    Repl {
        /// Wait for the full reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Show the configured provider, model and memory settings
    Info,

    /// List the tools the agent can call
    Tools,
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

impl Cli {
    /// Command-line settings as dotted config keys
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(provider) = &self.provider {
            overrides.push(("llm.provider", provider.clone()));
        }
        if let Some(model) = &self.model {
            overrides.push(("llm.model", model.clone()));
        }
        if let Some(classifier) = &self.classifier {
            overrides.push(("agent.classifier", classifier.clone()));
        }
        if let Some(filter) = log_filter_from_verbosity(self.verbose) {
            overrides.push(("logging.filter", filter.to_string()));
        }
        overrides
    }
}

fn build_agent(config: &AppConfig) -> anyhow::Result<WeatherAgent> {
    config.validate().context("invalid configuration")?;
    let inference = LlmInferenceAdapter::from_config(&config.llm)?;
    let weather = OpenWeatherAdapter::new(&config.weather)?;
    Ok(WeatherAgent::new(
        Arc::new(inference),
        Arc::new(weather),
        config.agent,
    )?)
}

fn render_info(info: &MemoryInfo) -> String {
    format!(
        "Provider: {}\nModel: {}\nMemory: {}/{} exchanges ({} turns)",
        info.llm_provider,
        info.llm_model,
        info.current_conversations,
        info.max_conversations,
        info.total_turns
    )
}

fn render_tools(tools: &[ToolName]) -> String {
    tools
        .iter()
        .map(|tool| format!("  {:<18} {}", tool.as_str(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn answer(agent: &mut WeatherAgent, message: &str, stream: bool) -> anyhow::Result<()> {
    if !stream {
        let reply = agent.chat(message).await?;
        println!("{reply}");
        return Ok(());
    }

    let mut fragments = agent.stream_chat(message).await?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    println!();
    Ok(())
}

async fn repl(agent: &mut WeatherAgent, stream: bool) -> anyhow::Result<()> {
    println!("Ask me about the weather. /info, /tools, /clear, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {},
            "/quit" | "/exit" => break,
            "/info" => println!("{}", render_info(&agent.get_memory_info())),
            "/tools" => println!("{}", render_tools(agent.available_tools())),
            "/clear" => {
                agent.clear_memory();
                println!("Memory cleared.");
            },
            message => {
                if let Err(e) = answer(agent, message, stream).await {
                    println!("Error: {e}");
                }
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.config.as_deref(), &cli.overrides())
        .context("failed to load configuration")?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Chat { message, stream } => {
            let mut agent = build_agent(&config)?;
            answer(&mut agent, &message, stream).await?;
        },

        Commands::Repl { no_stream } => {
            let mut agent = build_agent(&config)?;
            repl(&mut agent, !no_stream).await?;
        },

        Commands::Info => {
            let agent = build_agent(&config)?;
            println!("{}", render_info(&agent.get_memory_info()));
            println!("Classifier: {:?}", config.agent.classifier);
            println!("Units: {:?}", config.weather.units);
        },

        Commands::Tools => {
            println!("{}", render_tools(&ToolName::ALL));
        },
    }

    Ok(())
}
