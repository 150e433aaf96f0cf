use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    Connectivity, EngineCommand, HttpImageLoader, HttpQuizApi, SyncEngine, SystemClock,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod terminal;

use commands::{command_name, parse_command, Input, HELP};
use terminal::TerminalView;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a chat quiz session")]
struct Args {
    /// Settings file (defaults to ./quiz.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    chat_id: Option<i64>,
    #[arg(long)]
    user_id: Option<i64>,
    /// Name shown in the rematch lobby.
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if args.chat_id.is_some() {
        settings.chat_id = args.chat_id;
    }
    if args.user_id.is_some() {
        settings.user_id = args.user_id;
    }
    if args.name.is_some() {
        settings.display_name = args.name;
    }
    let session = settings.session_key()?;

    let api = HttpQuizApi::new(&settings.server_url, session)
        .with_context(|| format!("invalid server url {}", settings.server_url))?;
    let view = TerminalView::new(std::io::stdout(), session.user_id);
    let mut engine = SyncEngine::new(
        settings.engine.clone(),
        session,
        Arc::new(api),
        Arc::new(HttpImageLoader::new()),
        Box::new(view),
        Arc::new(SystemClock),
    )
    .with_image_proxy(settings.server_url.clone());
    if let Some(name) = settings.display_name.clone() {
        engine = engine.with_display_name(name);
    }

    let mut connectivity = engine.connectivity();
    tokio::spawn(async move {
        while connectivity.changed().await.is_ok() {
            let state = *connectivity.borrow_and_update();
            match state {
                Connectivity::Degraded => eprintln!("(connection unstable, retrying)"),
                Connectivity::Online => tracing::debug!("cli: connection restored"),
            }
        }
    });

    let (tx, rx) = mpsc::channel(32);
    let engine_task = tokio::spawn(engine.run(rx));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line, &settings.engine) {
            Ok(None) => {}
            Ok(Some(Input::Help)) => println!("{HELP}"),
            Ok(Some(Input::Command(command))) => {
                let quit = command == EngineCommand::Shutdown;
                tracing::debug!(command = command_name(&command), "queued cli->engine command");
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }

    let _ = tx.send(EngineCommand::Shutdown).await;
    engine_task.await.context("engine task failed")?;
    Ok(())
}
