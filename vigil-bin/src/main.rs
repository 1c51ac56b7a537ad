use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use vigil_agent::{AutonomyController, AutonomyState};
use vigil_config::{ConfigLoader, LoggingConfig, VigilConfig};
use vigil_core::{ActivityLog, TaskSpec};
use vigil_desktop::{ActionExecutor, ScreenCapture, ScrotCapture, XdoBackend};
use vigil_desktop::backend::DesktopBackend;
use vigil_safety::SafetyGovernor;
use vigil_server::{ServerContext, start_server};
use vigil_vision::{DecisionEngine, OpenAiProvider};

#[derive(Parser)]
#[command(name = "vigil", version, about = "Safety-governed autonomous desktop operator")]
struct Cli {
    /// Path to vigil.toml (default: ~/.vigil/vigil.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP control surface (the default)
    Serve,
    /// Run one autonomous task to completion, then exit
    Run {
        /// Natural-language goal for the vision model
        #[arg(long)]
        task: String,
        /// Maximum loop iterations
        #[arg(long)]
        steps: Option<u32>,
        /// Wall-clock deadline in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Capture the screen and write it to a file
    Screenshot {
        #[arg(short, long, default_value = "screen.png")]
        output: PathBuf,
    },
    /// List the desktop's windows
    Windows,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> vigil_core::Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => cmd_serve(config).await,
        Command::Run {
            task,
            steps,
            deadline_secs,
        } => cmd_run(config, task, steps, deadline_secs).await,
        Command::Screenshot { output } => cmd_screenshot(config, output).await,
        Command::Windows => cmd_windows(config).await,
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// The wired core: everything both the loop and the control surface share.
/// Constructed once here and passed by reference everywhere — no globals.
struct Runtime {
    governor: Arc<SafetyGovernor>,
    log: Arc<ActivityLog>,
    executor: Arc<ActionExecutor>,
    autonomy: Arc<AutonomyController>,
}

fn build_runtime(config: &VigilConfig) -> Runtime {
    let backend = Arc::new(XdoBackend::new(&config.desktop));
    let capture = Arc::new(ScrotCapture::new(&config.desktop));
    let governor = Arc::new(SafetyGovernor::new(&config.safety));
    let log = Arc::new(ActivityLog::new());
    let executor = Arc::new(ActionExecutor::new(
        backend,
        capture.clone(),
        governor.clone(),
        log.clone(),
    ));

    // Without a key every decision tick fails closed into a logged no-op;
    // the manual control surface still works.
    let api_key = config.agent.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("⚠️  No vision API key configured — autonomy will idle.");
        eprintln!("   Set agent.api_key in vigil.toml or export OPENAI_API_KEY.");
    }
    let provider =
        Arc::new(OpenAiProvider::new(api_key).with_base_url(config.agent.base_url.clone()));
    let engine = Arc::new(
        DecisionEngine::new(provider, config.agent.model.clone())
            .with_limits(config.agent.max_tokens, config.agent.temperature)
            .with_timeout(Duration::from_secs(config.agent.decision_timeout_secs))
            .with_history_window(config.agent.history_window),
    );
    let autonomy = Arc::new(
        AutonomyController::new(
            executor.clone(),
            capture.clone(),
            engine,
            governor.clone(),
            log.clone(),
        )
        .with_tick_interval(Duration::from_secs_f64(config.agent.tick_interval_secs)),
    );

    Runtime {
        governor,
        log,
        executor,
        autonomy,
    }
}

async fn cmd_serve(config: VigilConfig) -> vigil_core::Result<()> {
    println!("🛡  Vigil v{}", env!("CARGO_PKG_VERSION"));
    println!("   Model: {}", config.agent.model);
    println!(
        "   Safety: {} actions / {}s, {} restricted zone(s), {} forbidden title(s)",
        config.safety.max_actions,
        config.safety.window_secs,
        config.safety.restricted_zones.len(),
        config.safety.forbidden_titles.len()
    );
    println!("   Listening on http://{}", config.server.listen);
    println!();

    let runtime = build_runtime(&config);
    let ctx = ServerContext {
        executor: runtime.executor,
        autonomy: runtime.autonomy,
        governor: runtime.governor,
        log: runtime.log,
        default_step_budget: config.agent.default_step_budget,
    };
    start_server(config.server, ctx).await
}

async fn cmd_run(
    config: VigilConfig,
    task: String,
    steps: Option<u32>,
    deadline_secs: Option<u64>,
) -> vigil_core::Result<()> {
    let default_budget = config.agent.default_step_budget;
    let runtime = build_runtime(&config);

    let mut spec = TaskSpec::new(task.clone(), steps.unwrap_or(default_budget));
    if let Some(secs) = deadline_secs {
        spec = spec.with_deadline(chrono::Utc::now() + chrono::Duration::seconds(secs as i64));
    }

    println!("🤖 Running task: {task}");
    runtime.autonomy.start(spec)?;

    while runtime.autonomy.state() != AutonomyState::Stopped {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("✅ Done — {} activity record(s):", runtime.log.len());
    for record in runtime.log.recent(10) {
        println!(
            "   {} {:?} {:?}",
            record.timestamp.format("%H:%M:%S"),
            record.op,
            record.outcome
        );
    }
    Ok(())
}

async fn cmd_screenshot(config: VigilConfig, output: PathBuf) -> vigil_core::Result<()> {
    let capture = ScrotCapture::new(&config.desktop);
    let frame = capture.capture().await?;
    std::fs::write(&output, &frame.png)?;
    println!("📸 {} ({} bytes)", output.display(), frame.len());
    Ok(())
}

async fn cmd_windows(config: VigilConfig) -> vigil_core::Result<()> {
    let backend = XdoBackend::new(&config.desktop);
    let windows = backend.list_windows().await?;
    if windows.is_empty() {
        println!("no windows");
        return Ok(());
    }
    for w in windows {
        println!("{}  [{}] {}  {}", w.id, w.desktop, w.class, w.title);
    }
    Ok(())
}
