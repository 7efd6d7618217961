use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use desaas::config::{HistoryPolicy, ProxyConfig};
use desaas::constants;
use desaas::conversation::{flatten_prompt, ConversationTurn};
use desaas::proxy::{build_upstream_request, ChatRequest};

mod chat;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the builder page and the /api/chat proxy.
    Serve {
        #[arg(long, env = "PORT", default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
        #[arg(long, env = "DESAAS_UPSTREAM_URL", help = "Chat endpoint of the hosted code-generation service.")]
        upstream_url: Option<String>,
        #[arg(long, env = "DESAAS_FORWARD_HISTORY", help = "Send prior turns upstream as history instead of an empty list.")]
        forward_history: bool,
        #[arg(long, env = "DESAAS_UPSTREAM_TIMEOUT_SECS", help = "Upstream request timeout; unset keeps the HTTP client default.")]
        upstream_timeout_secs: Option<u64>,
        #[arg(long, env = "DESAAS_TEMPLATE_DIR", default_value = "templates")]
        template_dir: PathBuf,
        #[arg(long, env = "DESAAS_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
    },
    /// Walk through prompt, questions and answers against a running proxy.
    Build {
        #[arg(long, env = "DESAAS_PROXY_URL", help = "Base URL of a running proxy.")]
        proxy_url: Option<String>,
        #[arg(long, help = "Prompt describing the UI; asked interactively when omitted.")]
        prompt: Option<String>,
        #[arg(long, help = "Screenshot to attach to the session.")]
        screenshot: Option<PathBuf>,
        #[arg(long = "answer", help = "Answer for the next question; repeat in question order.")]
        answers: Vec<String>,
        #[arg(long, short, default_value = constants::DEFAULT_ARTIFACT_NAME)]
        output: PathBuf,
    },
    /// Print the prompt and upstream body a conversation file would produce.
    Flatten {
        /// JSON file holding `{"messages": [...]}` or a bare list of turns.
        file: PathBuf,
        #[arg(long, help = "Show the body with prior turns as history.")]
        forward_history: bool,
    },
}

fn read_turns(file: &Path) -> Result<Vec<ConversationTurn>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Conversation file is not valid JSON")?;
    let turns = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        serde_json::from_value::<ChatRequest>(value)?.messages
    };
    Ok(turns)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,desaas=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            upstream_url,
            forward_history,
            upstream_timeout_secs,
            template_dir,
            static_dir,
        } => {
            let mut config = upstream_url.map(ProxyConfig::new).unwrap_or_default();
            config = config
                .with_history_policy(HistoryPolicy::from_flag(forward_history))
                .with_upstream_timeout(upstream_timeout_secs.map(Duration::from_secs));
            config.template_dir = template_dir;
            config.static_dir = static_dir;

            info!("Starting proxy on port {}...", port);
            let server = desaas::start_web_server(port, config);
            tokio::pin!(server);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down.");
                }
                res = &mut server => {
                    if let Err(e) = &res {
                        error!("Web server failed: {:?}", e);
                    }
                    res?;
                }
            }
        }
        Commands::Build {
            proxy_url,
            prompt,
            screenshot,
            answers,
            output,
        } => {
            let proxy_url = proxy_url.unwrap_or_else(|| constants::PROXY_URL.clone());
            chat::run_build_session(chat::BuildOptions {
                proxy_url,
                prompt,
                screenshot,
                answers,
                output,
            })
            .await
            .context("Build session failed")?;
        }
        Commands::Flatten {
            file,
            forward_history,
        } => {
            let turns = read_turns(&file)?;
            println!("{}", flatten_prompt(&turns));
            let request = build_upstream_request(&turns, HistoryPolicy::from_flag(forward_history));
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }

    Ok(())
}
