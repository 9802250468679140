//! session-tracker: records runs of a desktop application as calendar events.
//!
//! Polls the process table for one executable and, each time it stops
//! running, inserts a Google Calendar event covering the run.
//!
//! ## Subcommands
//!
//! - `run` (default): start the polling loop until Ctrl+C / SIGTERM
//! - `check`: validate config and credentials, print the effective settings
//! - `probe`: sample the process table once

mod google;
mod logging;
mod oauth;

use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracker_core::{
    format_duration, IntervalTicker, ProcessMonitor, RecorderSettings, SessionRecorder,
    SysinfoMonitor, SystemClock, TrackerConfig,
};

use google::GoogleCalendarWriter;
use oauth::TokenStore;

#[derive(Parser)]
#[command(name = "session-tracker")]
#[command(about = "Records application sessions as calendar events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Track sessions until interrupted
    Run(Overrides),

    /// Validate configuration and calendar credentials
    Check(Overrides),

    /// Report whether the target process is running right now
    Probe(Overrides),
}

/// Flags that override the config file and environment.
#[derive(Args, Default)]
struct Overrides {
    /// Config file (default: ~/.session-tracker/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Executable name to watch (e.g. cs2.exe)
    #[arg(long, value_name = "NAME")]
    process: Option<String>,

    /// Seconds between process-table samples
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Target calendar identifier
    #[arg(long, value_name = "ID")]
    calendar_id: Option<String>,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Run(Overrides::default())) {
        Commands::Run(overrides) => run(&overrides),
        Commands::Check(overrides) => check(&overrides),
        Commands::Probe(overrides) => probe(&overrides),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "session-tracker failed");
        std::process::exit(1);
    }
}

fn resolve_config(overrides: &Overrides) -> Result<TrackerConfig, String> {
    let mut config = TrackerConfig::load(overrides.config.clone())?;
    config.apply_env_overrides(|key| env::var(key).ok())?;

    if let Some(process) = &overrides.process {
        config.process_name = process.clone();
    }
    if let Some(interval) = overrides.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(calendar_id) = &overrides.calendar_id {
        config.calendar_id = calendar_id.clone();
    }
    Ok(config)
}

/// Config plus a calendar writer with a live token. Everything that can make
/// the tracker refuse to start happens here.
fn prepare(overrides: &Overrides) -> Result<(TrackerConfig, GoogleCalendarWriter), String> {
    let config = resolve_config(overrides)?;
    config.validate()?;

    let token_path = config.resolved_token_path()?;
    let tokens = TokenStore::load(&token_path)?;
    let writer = GoogleCalendarWriter::connect(tokens)?;
    Ok((config, writer))
}

fn run(overrides: &Overrides) -> Result<(), String> {
    let (config, writer) = prepare(overrides)?;
    tracing::info!(
        process = %config.process_name,
        interval_secs = config.poll_interval_secs,
        calendar = %config.calendar_id,
        "Authenticated with calendar"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&shutdown)?;

    let mut recorder = SessionRecorder::new(
        SysinfoMonitor::new(),
        writer,
        SystemClock,
        RecorderSettings::from_config(&config),
    );
    let mut ticker = IntervalTicker::new(config.poll_interval(), shutdown);

    if let Some(session) = recorder.run(&mut ticker) {
        let duration = session.duration().map(format_duration).unwrap_or_default();
        tracing::info!(duration = %duration, "Flushed open session at shutdown");
    }
    Ok(())
}

fn install_signal_handlers(flag: &Arc<AtomicBool>) -> Result<(), String> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .map_err(|e| format!("Failed to install handler for signal {}: {}", signal, e))?;
    }
    Ok(())
}

fn check(overrides: &Overrides) -> Result<(), String> {
    let (config, writer) = prepare(overrides)?;
    let expiry = writer
        .tokens()
        .expires_at()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    println!("process:        {}", config.process_name);
    println!("poll interval:  {}s", config.poll_interval_secs);
    println!("calendar:       {}", config.calendar_id);
    println!("summary:        {}", config.summary);
    println!(
        "time zone:      {}",
        config.time_zone.as_deref().unwrap_or("(offset only)")
    );
    println!("token file:     {}", writer.tokens().path().display());
    println!("token expiry:   {}", expiry);
    println!(
        "token scopes:   {}",
        writer.tokens().credentials().scopes.join(", ")
    );
    println!("can refresh:    {}", writer.tokens().can_refresh());
    println!("flush on exit:  {}", config.flush_on_shutdown);
    println!("OK");
    Ok(())
}

fn probe(overrides: &Overrides) -> Result<(), String> {
    let config = resolve_config(overrides)?;
    if config.process_name.trim().is_empty() {
        return Err("process name must not be empty".to_string());
    }

    let mut monitor = SysinfoMonitor::new();
    let running = monitor
        .is_target_running(&config.process_name)
        .map_err(|e| e.to_string())?;
    println!(
        "{}: {}",
        config.process_name,
        if running { "running" } else { "not running" }
    );
    Ok(())
}
