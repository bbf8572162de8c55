// coedit: headless participant. Each stdin line replaces the document.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use coedit_engine::{EngineConfig, HostEditor, MemoryEditor, SyncPlugin, WsConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "coedit", about = "Headless real-time collaborative editing participant")]
struct Cli {
    /// Editor page URL carrying `docId` and `userId` query parameters.
    #[arg(long, default_value = "http://localhost/")]
    page_url: String,

    /// Socket endpoint, overriding the config file.
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file (default: ~/.coedit/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    let editor = Arc::new(MemoryEditor::default());
    let typed = Arc::new(Mutex::new(String::new()));
    let _printer = {
        let typed = Arc::clone(&typed);
        editor.subscribe_to_content_change(Box::new(move |content| {
            if *typed.lock().expect("typed line lock poisoned") != content {
                println!("remote: {content}");
            }
        }))
    };

    let mut plugin =
        SyncPlugin::initialize(&config, &cli.page_url, Arc::clone(&editor), WsConnector)
            .context("failed to initialize sync plugin")?;
    plugin.start();
    info!(
        doc_id = %plugin.identity().doc_id,
        user_id = %plugin.identity().user_id,
        endpoint = %config.endpoint,
        "coedit participant running"
    );

    if let Some(mut status) = plugin.subscribe_status() {
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let label = *status.borrow_and_update();
                println!("status: {label}");
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                *typed.lock().expect("typed line lock poisoned") = line.clone();
                editor.set_content(&line);
            }
        }
    }

    plugin.stop().await;
    Ok(())
}
