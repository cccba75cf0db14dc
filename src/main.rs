//! Colloquy - runs the market analysis team in the terminal
//!
//! A human proxy, a price data expert and a plotting assistant take turns
//! until someone says the stop phrase or the turn limit is reached.

use colloquy::llm::LlmConfig;
use colloquy::system_prompt::{
    market_expert_prompt, plot_assistant_prompt, DEFAULT_STOP_PHRASE, DEFAULT_TASK,
    MARKET_EXPERT_NAME, PLOT_ASSISTANT_NAME, USER_NAME,
};
use colloquy::tools::{FetchPriceDataTool, PlotPriceDataTool};
use colloquy::{
    AgentParticipant, ConversationConfig, ConversationScheduler, Entry, Participant,
    ProxyParticipant, ProxyPolicy, TerminationCondition,
};
use futures::StreamExt;
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquy=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let max_turns: u32 = env_or("COLLOQUY_MAX_TURNS", 10);
    let stop_phrase =
        std::env::var("COLLOQUY_STOP_PHRASE").unwrap_or_else(|_| DEFAULT_STOP_PHRASE.to_string());
    let proxy_mode = std::env::var("COLLOQUY_PROXY").unwrap_or_else(|_| "console".to_string());
    let proxy_timeout = Duration::from_secs(env_or("COLLOQUY_PROXY_TIMEOUT_SECS", 300));
    let output_dir = PathBuf::from(
        std::env::var("COLLOQUY_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string()),
    );
    let task = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let task = if task.trim().is_empty() {
        DEFAULT_TASK.to_string()
    } else {
        task
    };

    std::fs::create_dir_all(&output_dir)?;

    let llm_config = LlmConfig::from_env();
    let Some(llm) = llm_config.build_service() else {
        tracing::error!("No LLM API key configured. Set GEMINI_API_KEY or OPENAI_API_KEY.");
        return Err("no LLM API key configured".into());
    };

    // Participants, in speaking order
    let proxy = ProxyParticipant::new(USER_NAME, proxy_policy(&proxy_mode, proxy_timeout)?);
    let expert = AgentParticipant::new(
        MARKET_EXPERT_NAME,
        market_expert_prompt(&stop_phrase),
        llm.clone(),
    )
    .with_tool(FetchPriceDataTool::new(output_dir.clone()));
    let plotter = AgentParticipant::new(
        PLOT_ASSISTANT_NAME,
        plot_assistant_prompt(&stop_phrase),
        llm,
    )
    .with_tool(PlotPriceDataTool::new(output_dir));

    let participants: Vec<Arc<dyn Participant>> =
        vec![Arc::new(proxy), Arc::new(expert), Arc::new(plotter)];

    let termination = if stop_phrase.trim().is_empty() {
        TerminationCondition::turn_limit(max_turns)
    } else {
        TerminationCondition::content_match(stop_phrase, true)
            | TerminationCondition::turn_limit(max_turns)
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let config = ConversationConfig::new(participants, termination).with_cancellation(cancel);
    let scheduler = ConversationScheduler::new(config)?;
    tracing::info!(conv_id = %scheduler.conversation_id(), "Conversation created");

    let mut stream = scheduler.run_stream(task);
    while let Some(entry) = stream.next().await {
        print_entry(&entry);
    }

    let outcome = stream.finish().await?;
    if let Some(failure) = &outcome.failure {
        println!("Participant failure: {failure}");
    }

    Ok(())
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Policy for the human proxy, from `COLLOQUY_PROXY`
fn proxy_policy(mode: &str, timeout: Duration) -> Result<ProxyPolicy, Box<dyn std::error::Error>> {
    if let Some(text) = mode.strip_prefix("reply:") {
        return Ok(ProxyPolicy::FixedReply(text.to_string()));
    }

    match mode {
        "yield" => Ok(ProxyPolicy::Yield),
        "console" => {
            let (tx, policy) = ProxyPolicy::channel(timeout);
            println!("Type a reply and press Enter when it is {USER_NAME}'s turn.");
            std::thread::spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            });
            Ok(policy)
        }
        other => Err(format!("unknown COLLOQUY_PROXY mode '{other}'").into()),
    }
}

/// First Ctrl-C stops before the next step, the second exits
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current step");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

fn print_entry(entry: &Entry) {
    match entry {
        Entry::Utterance { source, text } => println!("{source}: {text}"),
        Entry::ToolCall {
            source,
            tool_name,
            arguments,
        } => println!(
            "{source}: [{tool_name}] {}",
            serde_json::Value::Object(arguments.clone())
        ),
        Entry::ToolResult { tool_name, outcome } => {
            if outcome.is_success() {
                println!("{tool_name}: {}", outcome.content());
            } else {
                println!("{tool_name}: error: {}", outcome.content());
            }
        }
        Entry::StopSignal { reason } => println!("Stop reason: {reason}"),
    }
}
