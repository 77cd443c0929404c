//! fleetwatch CLI — run the health monitor and inspect what it recorded.
//!
//! # Usage
//!
//! ```text
//! fleetwatch run
//! fleetwatch check --json
//! fleetwatch errors -n 50
//! fleetwatch alerts
//! fleetwatch ack 12
//! fleetwatch report --kind agent_crash --severity high --message "worker exited" --agent w1
//! fleetwatch suggest file_conflict
//! ```

mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use fleetwatch_core::clock::SystemClock;
use fleetwatch_core::config::MonitorConfig;
use fleetwatch_core::escalation::SuggestionCatalog;
use fleetwatch_core::infrastructure::ProcessRunner;
use fleetwatch_core::snapshot::SysinfoSampler;
use fleetwatch_core::{EventSubmission, FaultHandler, FleetError, HealthMonitor};


#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Fault detection and escalation for an agent fleet")]
#[command(version)]
struct Cli {
    /// Directory holding fleetwatch.yaml (default: $FLEETWATCH_CONFIG_DIR or ~/.config/fleetwatch)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the health monitor until interrupted
    Run,
    /// Run every health check once
    Check,
    /// Show recently recorded faults
    Errors {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Show recent alerts
    Alerts {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Acknowledge an alert
    Ack { id: u64 },
    /// Resolve the issue behind an alert
    Resolve { id: u64 },
    /// Report a fault observed outside the monitor
    Report {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        severity: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        agent: Option<String>,
        /// Extra detail as key=value (repeatable)
        #[arg(long = "detail", value_parser = parse_detail)]
        details: Vec<(String, Value)>,
    },
    /// Show agent liveness
    Status,
    /// List suggested remediation steps for a fault kind
    Suggest { kind: String },
}


static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_stop(_signal: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    let handler = request_stop as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}


fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fleetwatch=info,fleetwatch_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fleetwatch: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<(), FleetError> {
    let config_dir = cli.config_dir.clone().unwrap_or_else(resolve_config_dir);

    if let Command::Suggest { kind } = &cli.command {
        let steps = SuggestionCatalog.suggestions_for_name(kind);
        return print_output(cli.json, &steps, || render::numbered(&steps));
    }

    let config = MonitorConfig::load(&config_dir)?;
    let handler = Arc::new(FaultHandler::from_config(
        &config,
        Arc::new(SysinfoSampler::new()),
        Arc::new(SystemClock),
    ));

    match cli.command {
        Command::Run => run_monitor(&config, handler),
        Command::Check => {
            let monitor = HealthMonitor::from_config(&config, handler, Arc::new(ProcessRunner));
            let report = monitor.run_tick();
            print_output(cli.json, &report, || render::tick_report(&report))
        }
        Command::Errors { count } => {
            let events = handler.recent_errors(count);
            print_output(cli.json, &events, || render::events(&events))
        }
        Command::Alerts { count } => {
            let alerts = handler.alerts(count);
            print_output(cli.json, &alerts, || render::alerts(&alerts))
        }
        Command::Ack { id } => {
            let alert = handler.acknowledge(id)?;
            print_output(cli.json, &alert, || format!("acknowledged alert {}", alert.id))
        }
        Command::Resolve { id } => {
            let record = handler.resolve_issue(id)?;
            print_output(cli.json, &record, || format!("resolved issue for alert {}", record.alert_id))
        }
        Command::Report {
            kind,
            severity,
            message,
            agent,
            details,
        } => {
            let submission = EventSubmission {
                kind,
                severity,
                message,
                agent_id: agent,
                details: details.into_iter().collect::<Map<String, Value>>(),
                timestamp: None,
            };
            let alert = handler.submit(submission)?;
            print_output(cli.json, &alert, || match &alert {
                Some(a) => format!("recorded; escalated as alert {}", a.id),
                None => "recorded; below escalation threshold".to_string(),
            })
        }
        Command::Status => {
            let status = handler.agent_status();
            print_output(cli.json, &status, || render::status_table(&status))
        }
        Command::Suggest { .. } => Ok(()),
    }
}

fn run_monitor(config: &MonitorConfig, handler: Arc<FaultHandler>) -> Result<(), FleetError> {
    install_signal_handlers();
    let monitor = HealthMonitor::from_config(config, handler, Arc::new(ProcessRunner));
    let handle = monitor
        .spawn()
        .map_err(|e| FleetError::Config(format!("cannot start monitor thread: {}", e)))?;
    tracing::info!(agents = config.agents.len(), "monitoring; Ctrl-C to stop");

    while !STOP_REQUESTED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }
    tracing::info!("stop requested, finishing current tick");
    handle.stop();
    Ok(())
}

fn print_output<T: serde::Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), FleetError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let out = text();
        if !out.is_empty() {
            println!("{}", out);
        }
    }
    Ok(())
}

/// `key=value`; the value is taken as JSON when it parses, else as a string.
fn parse_detail(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in {:?}", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLEETWATCH_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("fleetwatch")
}
