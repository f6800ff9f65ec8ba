mod commands;
mod state;

use anyhow::{Context, Result};
use chatcut_assistant::{CommandLoop, HttpAssistant, HttpPreprocessor};
use chatcut_core::config::EditorConfig;
use chatcut_core::types::Project;
use chatcut_render::FfmpegProcessor;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use commands::Command;
use state::{App, Flow};

/// Edit a video timeline by chatting with an assistant.
#[derive(Debug, Parser)]
#[command(name = "chatcut", version)]
struct Args {
    /// Config file (defaults to the user config dir, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Open a saved .chatcut project instead of starting empty
    #[arg(long)]
    project: Option<PathBuf>,

    /// Run without the mpv preview window
    #[arg(long)]
    no_preview: bool,

    /// Media files to import and lay out back to back
    media: Vec<PathBuf>,
}

fn check_dependencies() {
    let deps = [
        ("ffmpeg", "transforms and export"),
        ("ffprobe", "media file analysis"),
    ];

    let missing: Vec<_> = deps
        .iter()
        .filter(|(bin, _)| {
            std::process::Command::new(bin)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .is_err()
        })
        .collect();

    if !missing.is_empty() {
        eprintln!("\n=== chatcut: missing required dependencies ===\n");
        for (bin, purpose) in &missing {
            eprintln!("  x {bin} -- {purpose}");
        }
        eprintln!("\nInstall with:");
        eprintln!("  sudo apt install ffmpeg\n");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    check_dependencies();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EditorConfig::resolve(args.config.as_deref()).context("loading config")?;
    let project = match &args.project {
        Some(path) => Project::load_from_file(path)
            .with_context(|| format!("opening {}", path.display()))?,
        None => Project::from_config("Untitled", &config.timeline),
    };

    let assistant = Arc::new(HttpAssistant::from_config(&config.assistant)?);
    let preprocessor = Arc::new(HttpPreprocessor::from_config(&config.assistant)?);
    let processor = Arc::new(FfmpegProcessor::new(config.media.derived_dir.clone()));
    let max_steps = config.assistant.max_steps;

    let mut app = App::new(
        &config,
        project,
        |session| CommandLoop::new(session, assistant, processor, max_steps),
        preprocessor,
        !args.no_preview,
    );

    for path in &args.media {
        if let Err(e) = app.import(path).await {
            eprintln!("{e:#}");
        }
    }

    println!("chatcut ready. Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{e:#}");
                continue;
            }
        };
        match app.handle(command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("error: {e:#}"),
        }
    }
    Ok(())
}
