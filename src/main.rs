//! Scrivener entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build provider, store and chat service
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run the console until shutdown (with `-i`), else print status and exit

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scrivener::chat::ChatService;
use scrivener::error::AppError;
use scrivener::{config, logger};

const USAGE: &str = "\
Usage: scrivener [OPTIONS]

Options:
  -h, --help            Print help
  -i, --interactive     Open the chat console
  -f, --config <PATH>   Configuration file (default: config/default.toml)
  -v, -vv, -vvv, -vvvv  Log warn, info, debug, trace";

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = args.interactive,
        "config loaded"
    );

    let service = ChatService::from_config(&config)?;

    println!("✓ {} ready", config.name);
    println!("  llm:    provider={} model={}", config.llm.provider, config.llm.openai.model);
    println!("  store:  {} ({})", service.store().store_type(), config.work_dir.display());
    println!("  prompts: {}", config.prompts_dir.display());

    if !args.interactive {
        println!("  run with -i for the interactive console");
        return Ok(());
    }

    if let Err(e) = service.llm().ping().await {
        warn!(error = %e, "llm provider unreachable; replies will fail until it is back");
    }

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    run_console(service, shutdown).await?;

    println!("Bye :) ...");
    Ok(())
}

#[cfg(feature = "console")]
async fn run_console(service: ChatService, shutdown: CancellationToken) -> Result<(), AppError> {
    scrivener::console::run(service, shutdown).await
}

#[cfg(not(feature = "console"))]
async fn run_console(_service: ChatService, _shutdown: CancellationToken) -> Result<(), AppError> {
    warn!("interactive mode requested but the console feature is not compiled in");
    Ok(())
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs { log_level: logger::level_for_verbosity(verbosity), interactive, config_path }
}
