//! Sublime console front-end
//!
//! Usage:
//!     sublime --config bot.toml message1.txt message2.txt
//!     echo 'run bf ...' | sublime
//!
//! Every file is one message. Messages are handled concurrently, each on its
//! own blocking task, and their reports are printed to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use sublime::console::ConsoleReporter;
use sublime::message::mentions;
use sublime::{BotConfig, Dispatch, InboundMessage, Orchestrator};
use sublime_intent::Catalog;
use sublime_logging::{init_logging, LogConfig};
use sublime_sandbox::SandboxPipeline;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sublime", about = "Build and run asm2bf/brainfuck from plain-English requests")]
struct Cli {
    /// Bot configuration (TOML)
    #[arg(long, env = "SUBLIME_CONFIG")]
    config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long)]
    verbose: bool,

    /// Author name used in replies
    #[arg(long, default_value = "console")]
    author: String,

    /// Treat messages as channel posts that must mention this bot id
    #[arg(long)]
    bot_id: Option<String>,

    /// Where attachments are written
    #[arg(long, default_value = ".")]
    attach_dir: PathBuf,

    /// Message files; reads one message from stdin when empty
    files: Vec<PathBuf>,
}

type SandboxOrchestrator = Orchestrator<SandboxPipeline>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "sublime",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => BotConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BotConfig::default(),
    };

    let pipeline = SandboxPipeline::new(config.toolchain.to_toolchain_config());
    info!("Starting Sublime");
    info!("  Supervisor: {}", config.toolchain.supervisor.display());
    info!("  Work dir: {}", config.toolchain.work_dir.display());
    info!("  Command threshold: {}", config.command_threshold);

    let orchestrator: Arc<SandboxOrchestrator> =
        Arc::new(Orchestrator::new(Catalog::standard(), config, pipeline));
    let stdout = Arc::new(Mutex::new(std::io::stdout()));

    let messages = read_messages(&cli.files)?;
    let mut tasks = JoinSet::new();
    for (label, content) in messages {
        let message = inbound(&cli, content);
        let reporter = ConsoleReporter::new(
            label.clone(),
            cli.author.clone(),
            cli.attach_dir.clone(),
            Arc::clone(&stdout),
        );
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn_blocking(move || (label, orchestrator.handle(&message, &reporter)));
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (label, result) = joined.context("Message task panicked")?;
        match result {
            Ok(Dispatch::Ignored) => info!("[{}] ignored (not addressed to the bot)", label),
            Ok(dispatch) => info!("[{}] {:?}", label, dispatch),
            Err(e) => {
                failures += 1;
                error!("[{}] failed to report: {:#}", label, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} message(s) could not be reported", failures);
    }
    Ok(())
}

fn inbound(cli: &Cli, content: String) -> InboundMessage {
    let mut message = InboundMessage::direct(cli.author.clone(), content);
    if let Some(bot_id) = &cli.bot_id {
        message.direct = false;
        message.mentions_bot = mentions(&message.content, bot_id);
    }
    message
}

fn read_messages(files: &[PathBuf]) -> Result<Vec<(String, String)>> {
    if files.is_empty() {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read message from stdin")?;
        return Ok(vec![("stdin".to_string(), content)]);
    }

    files
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read message {}", path.display()))?;
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "message".to_string());
            Ok((format!("{}-{}", index, stem), content))
        })
        .collect()
}
