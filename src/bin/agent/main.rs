use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use browser_agent::types::DEFAULT_MAX_STEPS;
use browser_agent::{Agent, AgentConfig, ChromeBrowser, ChromeOptions, OpenAiModel};
use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

/// Drive Chrome with a language model until a task is done.
#[derive(Parser, Debug)]
#[command(name = "agent", version)]
struct Cli {
    /// What the agent should do, in plain language.
    task: String,

    /// Maximum number of actions before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Pause between steps, in milliseconds.
    #[arg(long, default_value_t = 0)]
    step_delay_ms: u64,

    /// Log prompts, replies and page digests.
    #[arg(long)]
    debug: bool,

    /// Save a screenshot when the task fails.
    #[arg(long)]
    screenshot_on_error: bool,

    #[arg(long, requires = "screenshot_on_error")]
    screenshot_path: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// DevTools websocket URL of a running Chrome to attach to.
    #[arg(long)]
    attach: Option<String>,

    /// Overrides OPENAI_MODEL.
    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value_t = 60)]
    llm_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    action_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "info,agent=debug,planner=debug,executor=debug,hands=debug,llm=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AgentConfig::default()
        .with_max_steps(cli.max_steps)
        .with_step_delay(Duration::from_millis(cli.step_delay_ms))
        .with_debug_mode(cli.debug)
        .with_llm_timeout(Duration::from_secs(cli.llm_timeout_secs))
        .with_action_timeout(Duration::from_secs(cli.action_timeout_secs));
    if cli.screenshot_on_error {
        config = config.with_screenshot_on_error(cli.screenshot_path);
    }

    let mut model = OpenAiModel::from_env()?;
    if let Some(name) = cli.model {
        model = model.with_model(name);
    }
    tracing::info!(model = model.model(), "language model ready");

    let browser = ChromeBrowser::new(ChromeOptions {
        headless: !cli.headed,
        chrome_path: cli.chrome_path,
        attach_url: cli.attach,
        ..Default::default()
    });

    let mut agent = Agent::new(config, Box::new(browser), Arc::new(model));

    let handle = agent.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling task");
            handle.cancel();
        }
    });

    let outcome = agent.execute_task(&cli.task).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_success() {
        tracing::warn!(termination = ?outcome.termination, "task did not finish");
        std::process::exit(2);
    }
    Ok(())
}
