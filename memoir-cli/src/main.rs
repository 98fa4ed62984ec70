//! Life-story interview on the terminal.
//!
//! Reads one answer per line from stdin. Lines starting with `#` are
//! commands; `#help` lists them.
//!
//! ```bash
//! cargo run -p memoir-cli -- --writer ada --load ada.memoir.json
//! ```
//!
//! Environment:
//! - `ANTHROPIC_API_KEY`: required unless `--offline` or `MEMOIR_OFFLINE=1`
//! - `MEMOIR_MODEL`: model override
//! - `MEMOIR_CONFIG`: path to a JSON engine config
//! - `MEMOIR_LOG`: log filter, for example `memoir_core=debug`

mod repl;

use anyhow::Context;
use memoir_core::{ClaudeGenerator, EngineConfig, InterviewEngine, MemoryStore, WriterId};
use std::sync::{Arc, Once};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Log to stderr, filtered by `MEMOIR_LOG`. Falls back to warnings only
/// so the interview itself stays readable.
fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("MEMOIR_LOG")
            .unwrap_or_else(|_| EnvFilter::new("memoir_core=warn,memoir=warn"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}

/// Command-line options.
#[derive(Debug, Default)]
struct Options {
    writer: Option<String>,
    load: Option<String>,
    offline: bool,
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--writer" => {
                options.writer = args.get(i + 1).cloned();
                i += 1;
            }
            "--load" => {
                options.load = args.get(i + 1).cloned();
                i += 1;
            }
            "--offline" => options.offline = true,
            _ => {}
        }
        i += 1;
    }
    options
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn print_help() {
    println!("memoir - guided life-story interview");
    println!();
    println!("Usage: memoir [--writer <id>] [--load <archive>] [--offline]");
    println!();
    println!("Type answers one per line. Type #help inside the interview for commands.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let options = parse_args(&args);

    let mut config = match std::env::var("MEMOIR_CONFIG") {
        Ok(path) => EngineConfig::load(&path)
            .await
            .with_context(|| format!("loading config from {path}"))?,
        Err(_) => EngineConfig::default(),
    };
    if let Ok(model) = std::env::var("MEMOIR_MODEL") {
        config = config.with_model(model);
    }

    let store = Arc::new(MemoryStore::new());
    let offline = options.offline || env_flag("MEMOIR_OFFLINE");
    let engine = if offline {
        info!("running offline with the canned question bank");
        InterviewEngine::offline(config, store)
    } else {
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
            eprintln!("Set it in a .env file, or run with --offline.");
            std::process::exit(1);
        }
        let mut generator = ClaudeGenerator::from_env()
            .context("creating Claude client")?
            .with_timeout(config.generation.timeout());
        if let Some(model) = &config.generation.model {
            generator = generator.with_model(model.clone());
        }
        InterviewEngine::new(config, Arc::new(generator), store)
    };

    let writer = options
        .writer
        .map(WriterId::new)
        .unwrap_or_else(WriterId::generate);

    repl::run(engine, writer, options.load.as_deref()).await
}
