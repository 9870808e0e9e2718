mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use travel_core::config::AppConfig;
use travel_core::telemetry::{EventBus, FanoutSink, TelemetrySink, TracingSink};
use travel_core::tool_registry::ToolRegistry;
use travel_core::{OpenAiBackend, TravelAgent};

#[derive(Parser)]
#[command(
    name = "travel-agent",
    about = "A conversational travel planner that answers small talk quickly and plans trips with tools",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/travel-agent/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Override the provider name used for pricing (claude, gemini, local)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Start in fast mode (essential tools only)
    #[arg(long, global = true)]
    fast: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat {
        /// Session name
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Answer a single message and exit
    Ask {
        /// The message to send
        message: Vec<String>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print the config file path
    Path,
}

/// The agent plus the bus its telemetry is published on.
struct Runtime {
    agent: TravelAgent,
    bus: EventBus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "travel_agent=info,travel_core=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) if path.exists() => AppConfig::load_from(path)?,
        Some(_) => AppConfig::default(),
        None => AppConfig::load()?,
    };

    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.provider.api_base = api_base.clone();
    }
    if let Some(provider) = &cli.provider {
        config.provider.name = provider.clone();
    }
    if cli.fast {
        config.agent.fast_mode = true;
    }

    match cli.command {
        Some(Commands::Config { action }) => handle_config_command(action, &config, cli.config),
        Some(Commands::Ask { message }) => {
            let runtime = build_runtime(&config)?;
            ask(&runtime, &message.join(" ")).await
        }
        Some(Commands::Chat { session }) => {
            let runtime = build_runtime(&config)?;
            repl::run(&config, runtime, session).await
        }
        None => {
            let runtime = build_runtime(&config)?;
            repl::run(&config, runtime, None).await
        }
    }
}

fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let mut registry = ToolRegistry::new();
    travel_tools::register_all(&mut registry)?;
    let registry = Arc::new(registry);

    let bus = EventBus::with_capacity(config.telemetry.bus_capacity);
    let bus_sink: Arc<dyn TelemetrySink> = Arc::new(bus.clone());
    let mut sink = FanoutSink::new(vec![bus_sink]);
    if config.telemetry.log_events {
        sink.push(Arc::new(TracingSink));
    }
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(sink);

    let backend = Arc::new(OpenAiBackend::from_config(&config.provider)?);

    tracing::info!(
        "Loaded {} tools, provider: {}, model: {}, endpoint: {}",
        registry.len(),
        config.provider.name,
        config.provider.model,
        config.provider.api_base,
    );

    let agent = TravelAgent::new(config, backend, registry, telemetry);
    Ok(Runtime { agent, bus })
}

async fn ask(runtime: &Runtime, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("ask needs a message");
    }
    let mut session = runtime.agent.new_session("ask");
    let cancel = CancellationToken::new();

    let reply = tokio::select! {
        reply = runtime.agent.chat(&mut session, message, &cancel) => reply?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("cancelled"),
    };

    println!("{}", reply.text);
    tracing::info!(
        intent = reply.intent.as_str(),
        variant = reply.variant.as_str(),
        iterations = reply.iterations,
        tools = reply.tool_invocations.len(),
        cost_usd = reply.turn_cost,
        "Turn complete"
    );
    Ok(())
}

fn handle_config_command(
    action: Option<ConfigAction>,
    config: &AppConfig,
    path: Option<PathBuf>,
) -> Result<()> {
    let path = path.unwrap_or_else(AppConfig::default_path);
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                AppConfig::default().save_to(&path)?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
