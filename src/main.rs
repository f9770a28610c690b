use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dutycycle::cli::{Cli, Command};
use dutycycle::config::ProjectConfig;
use dutycycle::executor::{executor_from_name, Executor};
use dutycycle::manager::{manager_from_name, Manager};
use dutycycle::mission::Mission;
use dutycycle::orchestrator::{CancellationToken, Orchestrator, OrchestratorConfig};
use dutycycle::retry::RetryPolicy;
use dutycycle::session::log::ExecutionLog;
use dutycycle::session::store::{JsonFileSessionStore, SessionStore};
use dutycycle::telemetry::{TelemetrySink, TracingTelemetrySink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "dutycycle=info",
        1 => "dutycycle=debug",
        _ => "dutycycle=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cwd = std::env::current_dir()?;
    let (config, config_path) = ProjectConfig::load(&cwd)?;

    match config_path {
        Some(ref p) => info!("loaded config from {}", p.display()),
        None => info!("no .orchestrator/config.toml found, using defaults"),
    }

    let session_root = config.resolved_session_dir(config_path.as_deref(), &cwd);

    match cli.command {
        Command::Run { mission_file, manager, executor, resume } => {
            run(&config, &session_root, &mission_file, manager, executor, resume).await
        }
        Command::Status { mission_file, json } => status(&session_root, &mission_file, json).await,
        Command::Config { json } => show_config(&config, config_path.as_deref(), json),
    }
}

fn resolve_manager(name: &str) -> Result<Box<dyn Manager>> {
    manager_from_name(name).with_context(|| format!("unknown manager backend: {name}"))
}

fn resolve_executor(name: &str) -> Result<Box<dyn Executor>> {
    executor_from_name(name).with_context(|| format!("unknown executor backend: {name}"))
}

async fn run(
    config: &ProjectConfig,
    session_root: &Path,
    mission_file: &Path,
    manager_override: Option<String>,
    executor_override: Option<String>,
    resume: bool,
) -> Result<()> {
    let mut mission = Mission::load(mission_file)?;

    let manager_name = manager_override.as_deref().unwrap_or(&config.orchestrator.manager);
    let executor_name = executor_override.as_deref().unwrap_or(&config.orchestrator.executor);
    let manager = resolve_manager(manager_name)?;
    let executor = resolve_executor(executor_name)?;

    let store: Arc<dyn SessionStore> = Arc::new(JsonFileSessionStore::new(session_root));

    if resume {
        match store.find_active(&mission.id).await? {
            Some(existing) => info!(session_id = %existing.session_id, "resuming most recent active session"),
            None => info!("no active session found for this mission, starting a new one"),
        }
    }

    let orchestrator_config = OrchestratorConfig {
        retry_policy: RetryPolicy { max_attempts: config.orchestrator.max_retries, ..RetryPolicy::default() },
        ..OrchestratorConfig::default()
    };

    let log_path = session_root.join(format!("{}.jsonl", mission.id));
    let log = Arc::new(ExecutionLog::new(&log_path)?);

    let cancellation = CancellationToken::new();
    let signal_cancellation = cancellation.clone();
    ctrlc::set_handler(move || {
        info!("received interrupt signal, stopping before next iteration");
        signal_cancellation.cancel();
    })
    .context("failed to install signal handler")?;

    let telemetry: Box<dyn TelemetrySink> = Box::new(TracingTelemetrySink);
    let orchestrator = Orchestrator::new(manager, executor, store, telemetry)
        .with_config(orchestrator_config)
        .with_cancellation(cancellation)
        .with_execution_log(log);

    let result = orchestrator.orchestrate(&mut mission).await?;
    info!(
        session_id = %result.session_id,
        iterations = result.iterations,
        percent = result.final_progress.percent,
        "orchestration run finished"
    );

    Ok(())
}

async fn status(session_root: &Path, mission_file: &Path, json: bool) -> Result<()> {
    let mission = Mission::load(mission_file)?;
    let store = JsonFileSessionStore::new(session_root);

    let Some(session) = store.find_active(&mission.id).await? else {
        println!("no active session found for mission '{}'", mission.id);
        return Ok(());
    };

    let progress = dutycycle::progress::progress(&mission);

    if json {
        let payload = serde_json::json!({
            "session_id": session.session_id,
            "current_phase": session.current_phase,
            "iterations": session.iterations,
            "percent": progress.percent,
            "phase_label": progress.phase_label,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("session:   {}", session.session_id);
        println!("phase:     {:?}", session.current_phase);
        println!("iterations: {}", session.iterations);
        println!("progress:  {}% ({})", progress.percent, progress.phase_label);
    }

    Ok(())
}

fn show_config(config: &ProjectConfig, config_path: Option<&Path>, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::json!({
            "manager": config.orchestrator.manager,
            "executor": config.orchestrator.executor,
            "max_retries": config.orchestrator.max_retries,
            "session_dir": config.orchestrator.session_dir,
            "log_filter": config.logging.filter,
            "config_path": config_path.map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("manager:      {}", config.orchestrator.manager);
        println!("executor:     {}", config.orchestrator.executor);
        println!("max_retries:  {}", config.orchestrator.max_retries);
        println!("session_dir:  {}", config.orchestrator.session_dir);
        match config_path {
            Some(p) => println!("loaded from:  {}", p.display()),
            None => println!("loaded from:  (defaults, no config file found)"),
        }
    }
    Ok(())
}
