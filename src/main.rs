//! hivewatch service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Load inventory, build stores, clients and scan services
//!   6. `--once`: one manual sweep, print each environment's status, exit
//!   7. Otherwise run the scheduler until Ctrl-C

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hivewatch::config;
use hivewatch::error::AppError;
use hivewatch::inventory::{Inventory, InventoryStore};
use hivewatch::logger;
use hivewatch::probe::actuator::{ActuatorClient, ActuatorSnapshot};
use hivewatch::probe::tomcat::{TomcatManagerClient, TomcatSnapshot};
use hivewatch::scan::{ManualScanner, ScanScheduler, ScanService};
use hivewatch::status::EnvironmentStatusQuery;
use hivewatch::store::{MemoryScanStateStore, ScanStateStore};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let level = logger::resolve(args.verbosity, &config.log_level);
    logger::init(&level)?;

    let inventory = Arc::new(Inventory::load(&config.inventory_path)?);
    let only_env = match args.env.as_deref() {
        Some(key) => Some(
            inventory
                .find_environment(key)
                .map(|e| e.id)
                .ok_or_else(|| AppError::NotFound(format!("environment {key}")))?,
        ),
        None => None,
    };
    info!(
        service = %config.service_name,
        inventory = %config.inventory_path.display(),
        environments = inventory.environments()?.len(),
        targets = inventory.target_count(),
        effective_log_level = %level.directive,
        "config loaded"
    );

    let inventory: Arc<dyn InventoryStore> = inventory;
    let tomcat_states: Arc<dyn ScanStateStore<TomcatSnapshot>> = Arc::new(MemoryScanStateStore::<TomcatSnapshot>::new());
    let actuator_states: Arc<dyn ScanStateStore<ActuatorSnapshot>> = Arc::new(MemoryScanStateStore::<ActuatorSnapshot>::new());
    let max_concurrency = config.scans.max_concurrency;

    let tomcat_scans = Arc::new(ScanService::<TomcatManagerClient>::new(
        inventory.clone(),
        tomcat_states.clone(),
        TomcatManagerClient::new(),
        max_concurrency,
    ));
    let actuator_scans = Arc::new(ScanService::<ActuatorClient>::new(
        inventory.clone(),
        actuator_states.clone(),
        ActuatorClient::new(),
        max_concurrency,
    ));
    let status = EnvironmentStatusQuery::new(inventory.clone(), tomcat_states, actuator_states);

    if args.once {
        let manual = ManualScanner::new(tomcat_scans, actuator_scans, config.scans.manual_enabled);
        for env in inventory.environments()? {
            if only_env.is_some_and(|id| id != env.id) {
                continue;
            }
            let scan = manual.scan_environment(env.id).await?;
            info!(env = %env.name, tomcat = scan.tomcat.len(), actuator = scan.actuator.len(), "environment scanned");
            let report = status.status(env.id)?;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Io(std::io::Error::other(e)))?;
            println!("{json}");
        }
        return Ok(());
    }

    // Shared shutdown token, cancelled by Ctrl-C.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let scheduler = ScanScheduler::new(
        inventory.clone(),
        tomcat_scans,
        actuator_scans,
        config.scans.scheduler.clone(),
    );
    scheduler.run(shutdown).await;

    for env in inventory.environments()? {
        match status.status(env.id) {
            Ok(s) => info!(env = %env.name, verdict = %s.verdict, blocks = s.block_issues, warns = s.warn_issues, "final status"),
            Err(e) => warn!(env = %env.name, error = %e, "status unavailable"),
        }
    }
    info!("shutdown complete");
    Ok(())
}

struct CliArgs {
    verbosity: u8,
    config_path: Option<String>,
    once: bool,
    env: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut once = false;
    let mut env = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: hivewatch [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("      --once                 Scan every environment once, print status JSON and exit");
                println!("      --env <NAME|ID>        Scan only this environment (requires --once)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "--once" => once = true,
            "--env" => {
                if let Some(key) = iter.next() {
                    env = Some(key);
                } else {
                    eprintln!("error: --env requires an environment name or id");
                    std::process::exit(1);
                }
            }
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

    let args = CliArgs { verbosity, config_path, once, env };
    if let Err(msg) = args.check() {
        eprintln!("error: {msg}");
        std::process::exit(1);
    }
    args
}

impl CliArgs {
    fn check(&self) -> Result<(), &'static str> {
        if self.env.is_some() && !self.once {
            return Err("--env only applies with --once");
        }
        Ok(())
    }
}
