mod config;

use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use uptime_api::state::AppState;
use uptime_api::{Availability, TargetStatus};
use uptime_core::{
    event_channel, ChannelSink, EventDispatcher, EventKind, HttpProbe, MonitorEvent,
    PolicyConfig, Probe, RunningSupervisor, Supervisor, SupervisorError, Target, TracingSink,
    DEFAULT_INTERVAL,
};

use crate::config::AppConfig;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn version_string() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let version = env!("CARGO_PKG_VERSION");
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            version.to_string()
        } else {
            format!("{version} ({hash})")
        }
    })
}

/// Website uptime monitor: checks HTTP endpoints on fixed intervals and reports downtime.
#[derive(Parser)]
#[command(name = "uptime-monitor", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor every configured target until Ctrl+C or SIGTERM.
    Run {
        /// Path to a TOML config file, or a `.json` file in the older layout.
        /// Defaults to `uptime.toml` or `config.json` in the working directory.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra URL to monitor, added after the configured targets.
        #[arg(long)]
        url: Option<String>,

        /// Check interval in seconds for `--url`.
        #[arg(long, requires = "url")]
        interval: Option<u64>,

        /// Serve the status API on this address (e.g. 127.0.0.1:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Log output format: pretty or json. Overrides config file.
        #[arg(long)]
        log_format: Option<String>,

        /// Also append log lines to this file. Overrides config file.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Watch a single URL with a live terminal view (no log lines, no API server).
    Watch {
        /// URL to monitor.
        url: String,

        /// Check interval in seconds.
        #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs())]
        interval: u64,

        /// Per-request timeout in seconds.
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Attempts per check cycle.
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Seconds to wait between attempts.
        #[arg(long, default_value_t = 5)]
        retry_delay: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            url,
            interval,
            listen,
            log_format,
            log_file,
        } => {
            let overrides = RunOverrides {
                url,
                interval,
                listen,
                log_format,
                log_file,
            };
            run_monitor(config, overrides).await;
        }
        Commands::Watch {
            url,
            interval,
            timeout,
            retries,
            retry_delay,
        } => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();
            let policy = PolicyConfig::default()
                .with_timeout(Duration::from_secs(timeout))
                .with_max_retries(retries)
                .with_retry_delay(Duration::from_secs(retry_delay));
            let target = Target::new(url, Duration::from_secs(interval));
            run_watch(target, policy).await;
        }
    }
}

/// Command-line values that take precedence over the config file.
struct RunOverrides {
    url: Option<String>,
    interval: Option<u64>,
    listen: Option<SocketAddr>,
    log_format: Option<String>,
    log_file: Option<PathBuf>,
}

async fn run_monitor(config_path: Option<PathBuf>, overrides: RunOverrides) {
    let config_path = config_path.or_else(|| config::find_default_config(Path::new(".")));
    let app_config = match config_path {
        Some(ref path) => match AppConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                init_tracing(overrides.log_format.as_deref().unwrap_or("pretty"), None);
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    let log_format = overrides
        .log_format
        .unwrap_or_else(|| app_config.server.log_format.clone());
    if let Err(e) = config::validate_log_format(&log_format) {
        init_tracing("pretty", None);
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    let log_file_path = overrides.log_file.or_else(|| app_config.server.log_file.clone());
    let log_file = match log_file_path.as_deref().map(open_log_file).transpose() {
        Ok(file) => file,
        Err(e) => {
            init_tracing(&log_format, None);
            tracing::error!(error = %e, "Failed to open log file");
            std::process::exit(1);
        }
    };
    init_tracing(&log_format, log_file);

    if let Some(ref path) = config_path {
        tracing::info!(path = %path.display(), "Loaded config file");
    }
    if let Some(ref path) = log_file_path {
        tracing::info!(path = %path.display(), "Appending logs to file");
    }

    let mut targets = app_config.targets();
    if let Some(url) = overrides.url {
        let interval = overrides
            .interval
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INTERVAL);
        targets.push(Target::new(url, interval));
    }
    if let Err(e) = config::validate_targets(&targets) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    let policy = app_config.policy.to_policy_config();
    if let Err(e) = config::validate_policy(&policy) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
    let listen = overrides.listen.or(app_config.server.listen);

    let probe: Arc<dyn Probe> = match HttpProbe::new() {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let (event_tx, event_rx) = event_channel();
    let state = AppState::new(&targets).with_policy(policy.clone());
    let dispatcher = EventDispatcher::new(event_rx)
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(state.clone()));
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    tracing::info!(
        targets = targets.len(),
        timeout_secs = policy.timeout.as_secs_f64(),
        max_retries = policy.max_retries,
        retry_delay_secs = policy.retry_delay.as_secs_f64(),
        "Monitoring {} targets",
        targets.len()
    );

    let supervisor = Supervisor::new(targets, policy, probe, Arc::new(ChannelSink::new(event_tx)));
    let (running, listener) = match start_monitoring(supervisor, listen).await {
        Ok(started) => started,
        Err(e) => {
            drain_events(dispatcher_handle).await;
            tracing::error!(error = %e, "Monitoring did not start");
            std::process::exit(1);
        }
    };

    let (api_stop_tx, api_stop_rx) = oneshot::channel::<()>();
    let api_handle = listener.map(|listener| {
        let shutdown = async move {
            let _ = api_stop_rx.await;
        };
        tokio::spawn(async move {
            if let Err(e) = uptime_api::serve(listener, state, shutdown).await {
                tracing::error!(error = %e, "Status API failed");
            }
        })
    });

    uptime_api::shutdown_signal().await;
    tracing::info!("Shutdown requested, stopping monitors");
    let report = running.shutdown().await;

    let _ = api_stop_tx.send(());
    if let Some(handle) = api_handle {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Status API did not shut down in time");
        }
    }

    drain_events(dispatcher_handle).await;
    tracing::info!(
        stopped = report.stopped,
        abandoned = report.abandoned,
        failed = report.failed,
        "Shutdown complete"
    );
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("failed to bind status API on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Starts the monitors, then binds the status API if one is requested.
///
/// Nothing is bound when the target list is rejected. A bind failure stops
/// the monitors that were already started.
async fn start_monitoring(
    supervisor: Supervisor,
    listen: Option<SocketAddr>,
) -> Result<(RunningSupervisor, Option<TcpListener>), StartupError> {
    let running = supervisor.start()?;

    let Some(addr) = listen else {
        return Ok((running, None));
    };
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok((running, Some(listener))),
        Err(source) => {
            running.shutdown().await;
            Err(StartupError::Bind { addr, source })
        }
    }
}

/// Waits for the dispatcher to flush once the supervisor dropped the last sender.
async fn drain_events(handle: JoinHandle<()>) {
    match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
        Ok(_) => tracing::debug!("Event dispatcher drained"),
        Err(_) => tracing::warn!("Event dispatcher did not drain in time"),
    }
}

async fn run_watch(target: Target, policy: PolicyConfig) {
    let valid = config::validate_targets(std::slice::from_ref(&target))
        .and_then(|_| config::validate_policy(&policy));
    if let Err(e) = valid {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }

    let probe: Arc<dyn Probe> = match HttpProbe::new() {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let multi = MultiProgress::new();
    let msg_style =
        ProgressStyle::with_template("{wide_msg}").unwrap_or_else(|_| ProgressStyle::default_spinner());

    multi
        .println(format!(
            "{} {}",
            style("uptime-monitor").bold(),
            style(version_string()).dim()
        ))
        .ok();
    multi
        .println(format!("  {} {}", style("url:     ").dim(), style(&target.url).bold()))
        .ok();
    multi
        .println(format!("  {} {}s", style("interval:").dim(), target.interval.as_secs()))
        .ok();
    multi
        .println(format!("  {} {}s", style("timeout: ").dim(), policy.timeout.as_secs()))
        .ok();
    multi
        .println(format!(
            "  {} {} attempts, {}s apart",
            style("retries: ").dim(),
            policy.max_retries,
            policy.retry_delay.as_secs()
        ))
        .ok();
    multi.println("").ok();
    multi
        .println(format!("{}", style("Press Ctrl+C to stop").dim()))
        .ok();
    multi.println("").ok();

    let mut status = TargetStatus::new(&target);
    let (event_tx, mut event_rx) = event_channel();

    let running = match Supervisor::new(
        vec![target],
        policy,
        probe,
        Arc::new(ChannelSink::new(event_tx)),
    )
    .start()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let status_bar = multi.add(ProgressBar::new_spinner().with_style(msg_style));
    status_bar.set_message(format_status(&status));

    let shutdown = uptime_api::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                status.apply(&event);
                if let Some(line) = format_event(&event) {
                    multi.println(line).ok();
                }
                status_bar.set_message(format_status(&status));
            }
            _ = &mut shutdown => break,
        }
    }

    status_bar.finish_and_clear();
    let report = running.shutdown().await;
    let suffix = if report.failed > 0 {
        " (monitor task failed)"
    } else if report.abandoned > 0 {
        " (last check abandoned)"
    } else {
        ""
    };
    multi
        .println(format!("\n{}{}", style("Monitor stopped.").dim(), suffix))
        .ok();
}

fn format_event(event: &MonitorEvent) -> Option<String> {
    let ts = event.timestamp.format("%H:%M:%S");
    let label = format!("{:<8}", event.kind.to_string());

    let (label, detail) = match &event.kind {
        EventKind::Up { .. } => (style(label).green(), "reachable".to_string()),
        EventKind::CheckRetry {
            attempt,
            max_retries,
            ..
        } => (
            style(label).yellow(),
            format!("retry attempt {}/{}", attempt, max_retries),
        ),
        EventKind::Downtime {
            reason,
            consecutive_failures,
            ..
        } => (
            style(label).red().bold(),
            format!("{} (consecutive failures: {})", reason, consecutive_failures),
        ),
        EventKind::MonitorError { message, .. } => (style(label).red(), message.clone()),
        EventKind::StartupFailed { reason } => (style(label).red().bold(), reason.clone()),
        EventKind::Started { .. } | EventKind::Stopped => return None,
    };

    Some(format!("  {}  {} {}", style(ts).dim(), label, detail))
}

fn format_status(status: &TargetStatus) -> String {
    let badge = match status.status {
        Availability::Up => style("● UP").green().bold(),
        Availability::Down => style("● DOWN").red().bold(),
        Availability::Unknown => style("● WAITING").dim(),
    };
    let last = status
        .last_checked
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into());

    format!(
        "{}\n  {:<10} checks={:<6} failures={:<6} streak={:<4} last={}",
        style("─".repeat(56)).dim(),
        badge,
        status.checks,
        status.failures,
        status.consecutive_failures,
        style(last).dim()
    )
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the stdout layer and, when a file is given, a plain-text layer appending to it.
fn init_tracing(log_format: &str, log_file: Option<File>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout = match log_format {
        "json" => fmt::layer().json().boxed(),
        _ => fmt::layer().boxed(),
    };
    let file = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();
}
