use crate::Runtime;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use travel_core::agent::ChatReply;
use travel_core::config::AppConfig;
use travel_core::error::AgentError;
use travel_core::prompts::PromptVariant;
use travel_core::session::Session;
use travel_core::telemetry::TelemetryEventType;
use travel_core::types::Role;

const BANNER: &str = r#"
  ╔═══════════════════════════════════════════╗
  ║          travel-agent v0.1.0              ║
  ║   Plan trips by chatting                  ║
  ╚═══════════════════════════════════════════╝

  Tell me where you'd like to go and press Enter.
  Type /help for commands, Ctrl-C to interrupt an answer.
"#;

const HELP: &str = "  /reset         Clear the conversation (cost is kept)
  /reset-cost    Clear the accumulated cost
  /cost          Show the session's estimated cost
  /fast          Essential tools only (quicker answers)
  /full          All tools
  /tools         List available tools
  /history       Show the conversation so far
  /help          Show this help
  /exit          Quit";

/// Run the interactive REPL.
pub async fn run(config: &AppConfig, runtime: Runtime, session_name: Option<String>) -> Result<()> {
    println!("{}", BANNER);
    println!(
        "  Provider: {}  |  Model: {}  |  Endpoint: {}",
        config.provider.name, config.provider.model, config.provider.api_base
    );
    println!();

    let Runtime { agent, bus } = runtime;
    let mut session = agent.new_session(session_name.unwrap_or_else(|| "default".into()));

    // Tool progress is printed as the loop reports it.
    let mut progress = bus.subscribe_filtered(vec![TelemetryEventType::ToolCompleted]);
    let printer = tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(event) => {
                    let attrs = &event.attributes;
                    let tool = attrs["tool"].as_str().unwrap_or("?");
                    let ok = attrs["success"].as_bool().unwrap_or(false);
                    let ms = attrs["latency_ms"].as_f64().unwrap_or(0.0);
                    let status = if ok { "\x1b[0;32m✓\x1b[0m" } else { "\x1b[0;31m✗\x1b[0m" };
                    println!("  {} \x1b[0;35m{}\x1b[0m ({:.0} ms)", status, tool, ms);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::data_dir().join("repl_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    loop {
        let mode = if session.fast_mode { "fast" } else { "full" };
        let prompt = format!("\x1b[1;36m{}\x1b[0m [{}] \x1b[1;32m❯\x1b[0m ", session.name, mode);

        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if input.starts_with('/') {
                    if !handle_command(input, &mut session, &agent)? {
                        break;
                    }
                    continue;
                }

                let cancel = CancellationToken::new();
                let watcher = tokio::spawn({
                    let cancel = cancel.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            cancel.cancel();
                        }
                    }
                });
                let result = agent.chat(&mut session, input, &cancel).await;
                watcher.abort();

                match result {
                    Ok(reply) => print_reply(&reply),
                    Err(AgentError::Cancelled) => {
                        println!("\x1b[0;33m(interrupted)\x1b[0m");
                    }
                    Err(e) => {
                        eprintln!("\x1b[0;31mAgent error: {}\x1b[0m", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    printer.abort();
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

fn print_reply(reply: &ChatReply) {
    println!("\x1b[1;33massistant\x1b[0m: {}", reply.text);

    let mut meta = format!("{} / {}", reply.intent, reply.variant);
    if reply.intent_fallback {
        meta.push_str(" (keyword)");
    }
    if !reply.tool_invocations.is_empty() {
        meta.push_str(&format!(
            " · {} tools in {} iterations",
            reply.tool_invocations.len(),
            reply.iterations
        ));
    }
    if reply.exhausted {
        meta.push_str(" · iteration budget reached");
    }
    meta.push_str(&format!(" · ${:.4} (session ${:.4})", reply.turn_cost, reply.total_cost));
    println!("\x1b[2m  [{}]\x1b[0m", meta);
}

/// Handle a slash command. Returns `true` to continue the loop, `false` to exit.
fn handle_command(input: &str, session: &mut Session, agent: &travel_core::TravelAgent) -> Result<bool> {
    let cmd = input.split_whitespace().next().unwrap_or(input);

    match cmd {
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            return Ok(false);
        }
        "/reset" => {
            session.reset();
            println!("Conversation cleared.");
        }
        "/reset-cost" => {
            session.reset_cost();
            println!("Cost counter cleared.");
        }
        "/cost" => {
            let totals = session.cost.snapshot();
            println!("  Provider:     {}", session.provider);
            println!("  Estimated:    ${:.4}", totals.total_usd);
            println!("  Model calls:  {}", totals.calls);
            println!(
                "  Tokens:       {} prompt / {} completion",
                totals.prompt_tokens, totals.completion_tokens
            );
            println!("  Cache hits:   {}", totals.cache_hits);
        }
        "/fast" => {
            session.set_fast_mode(true);
            println!("Fast mode on: essential tools only.");
        }
        "/full" => {
            session.set_fast_mode(false);
            println!("Full mode on: all tools available.");
        }
        "/tools" => {
            let tools = agent.tools();
            let names = tools.list_names();
            if names.is_empty() {
                println!("  No tools registered.");
            } else {
                println!("  Available tools ({}), * = fast mode:", names.len());
                for name in names {
                    if let Some(tool) = tools.get(name) {
                        let marker = if PromptVariant::Fast.allows(name) { "*" } else { " " };
                        println!("   {} {} - {}", marker, name, tool.description());
                    }
                }
            }
        }
        "/history" => {
            let turns = session.history.turns();
            if turns.is_empty() {
                println!("  No messages yet.");
            }
            for turn in turns {
                match turn.role {
                    Role::User => println!("  \x1b[1;36myou\x1b[0m: {}", turn.content),
                    Role::Assistant if turn.tool_calls.is_some() => {
                        let names: Vec<&str> = turn
                            .tool_calls
                            .iter()
                            .flatten()
                            .map(|c| c.name.as_str())
                            .collect();
                        println!("  \x1b[2massistant called: {}\x1b[0m", names.join(", "));
                    }
                    Role::Assistant => println!("  \x1b[1;33massistant\x1b[0m: {}", turn.content),
                    Role::Tool => {
                        let first = turn.content.lines().next().unwrap_or("");
                        println!(
                            "  \x1b[2m{}: {}\x1b[0m",
                            turn.tool_name.as_deref().unwrap_or("tool"),
                            first
                        );
                    }
                }
            }
        }
        "/help" | "/?" => println!("{}", HELP),
        _ => {
            println!("Unknown command: {}. Type /help for available commands.", cmd);
        }
    }

    Ok(true)
}
