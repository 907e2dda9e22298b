use std::path::PathBuf;

use agent_chat::config::default_config_path;
use agent_chat::{LogSnapshot, Renderer, WidgetConfig, load_config, widget};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "agent-chat")]
#[command(about = "Chat with a streaming agent over a WebSocket")]
struct Cli {
    /// Chat endpoint (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Author id for your own messages (overrides config)
    #[arg(long)]
    own_id: Option<String>,

    /// Config file (defaults to <config dir>/agent-chat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show tool invocations and their arguments
    #[arg(long)]
    show_tool_calls: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "agent_chat=debug,chat_transport=debug,agent_convo=debug,info"
    } else {
        "agent_chat=info,chat_transport=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = resolve_config(&cli)?;
    info!(url = %config.url, "starting agent-chat");
    run(config).await
}

fn resolve_config(cli: &Cli) -> Result<WidgetConfig> {
    let path = cli.config.clone().or_else(default_config_path);
    let mut config: WidgetConfig = load_config(path.as_deref())
        .extract()
        .with_context(|| match &path {
            Some(p) => format!("Failed to load configuration from {}", p.display()),
            None => "Failed to load configuration".to_string(),
        })?;

    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(own_id) = &cli.own_id {
        config.own_id = own_id.clone();
    }
    if cli.show_tool_calls {
        config.show_tool_calls = true;
    }
    Ok(config)
}

async fn run(config: WidgetConfig) -> Result<()> {
    if !config.chat_name.is_empty() {
        println!("== {} ==", config.chat_name);
    }

    let renderer = Renderer::new(config.own_id.clone(), config.show_tool_calls);
    let chat = widget::mount(config);
    let render_task = tokio::spawn(render_loop(renderer, chat.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "/quit" => break,
            "/stop" => chat.cancel(),
            "" => {}
            _ => {
                if let Err(err) = chat.submit(&line) {
                    eprintln!("{}", err);
                }
            }
        }
    }

    chat.unmount().await;
    if let Err(err) = render_task.await {
        debug!(error = %err, "render task ended abnormally");
    }
    Ok(())
}

async fn render_loop(mut renderer: Renderer, mut snapshots: watch::Receiver<LogSnapshot>) {
    let mut stdout = std::io::stdout();
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Err(err) = renderer.render(&snapshot, &mut stdout) {
            debug!(error = %err, "failed to write to stdout");
            break;
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
