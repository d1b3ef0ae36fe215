/*
* VM Placement Manager Command Line Interface
* -------------------------------------------
*
* Command Structure:
* ---------------
* vm-placement-manager [-H endpoint] [-P port] [-U user] [--password pw] [-D] [-N]
* ├── list <vms|hosts|clusters> [-v NAME]...   // inventory, optionally filtered by name
* ├── migrate -v <NAME|all>... [-s SRC] -d DST // move VMs, "all" needs a source host
* ├── balance -X HOST -X HOST [...]            // spread VMs by memory over >= 2 hosts
* └── init [--force]                           // write config/default.toml
*
* Global switches:
*   -D  debug logging plus JSON dumps of listed objects
*   -N  simulate only, every migration reports what it would have done
*
* Ctrl-C during a migrate/balance run abandons whatever has not settled yet,
* those pairs are reported as cancelled.
*
* Exit codes: 0 ok (individual migration failures are reported, not fatal),
* 1 session/config trouble, 2 bad arguments, 3 host or VM not found.
*/

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

use crate::cluster::{Orchestrator, WorkloadSelection};
use crate::config::{generate_default_config, Settings};
use crate::core::{connect, InventoryGateway};
use crate::errors::ManagerResult;
use crate::migration::{MigrationOptions, MigrationOutcome, MigrationReport};
use crate::monitoring::RunSummary;
use crate::utils::display_gb;

#[derive(Parser, Debug)]
#[command(name = "vm-placement-manager")]
#[command(about = "List, migrate and memory-balance virtual machines across hosts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Management endpoint (file://inventory.json for a snapshot)
    #[arg(short = 'H', long = "host", value_name = "ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    #[arg(short = 'P', long, global = true)]
    pub port: Option<u16>,

    #[arg(short = 'U', long, global = true)]
    pub user: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Add debug verbosity to command output
    #[arg(short = 'D', long, global = true)]
    pub debug: bool,

    /// Simulate actions, nothing is migrated
    #[arg(short = 'N', long = "noact", global = true)]
    pub noact: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List inventory objects
    List {
        #[arg(value_enum)]
        kind: ListKind,
        #[arg(short = 'v', long = "vmnames", value_name = "NAME")]
        names: Vec<String>,
    },
    /// Migrate VMs to a destination host
    Migrate {
        #[arg(short = 'v', long = "vmnames", value_name = "NAME")]
        vmnames: Vec<String>,
        #[arg(short, long)]
        source: Option<String>,
        #[arg(short, long)]
        dest: Option<String>,
    },
    /// Balance VMs across hosts by configured memory
    Balance {
        #[arg(short = 'X', long = "drs", value_name = "HOST")]
        hosts: Vec<String>,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Vms,
    Hosts,
    Clusters,
}

/// Load layered settings and put the command line on top.
pub fn load_settings(cli: &Cli) -> ManagerResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::new_from_file(path)?,
        None => Settings::new()?,
    };

    if let Some(endpoint) = &cli.endpoint {
        settings.session.endpoint = endpoint.clone();
    }
    if let Some(port) = cli.port {
        settings.session.port = port;
    }
    if let Some(user) = &cli.user {
        settings.session.user = user.clone();
    }
    if cli.password.is_some() {
        settings.session.password = cli.password.clone();
    }
    settings.logging.debug |= cli.debug;
    settings.migration.simulate_only |= cli.noact;

    Ok(settings)
}

pub fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run(cli: Cli, settings: Settings) -> ManagerResult<()> {
    let debug = settings.logging.debug;

    match cli.command {
        Commands::Init { force } => handle_init_command(force),
        Commands::List { kind, names } => {
            let gateway = connect(&settings.session).await?;
            handle_list_command(gateway.as_ref(), kind, &names, debug).await
        }
        Commands::Migrate { vmnames, source, dest } => {
            let gateway = connect(&settings.session).await?;
            let mut orchestrator = build_orchestrator(gateway, &settings);
            let reports = orchestrator
                .run_single_migration(
                    WorkloadSelection::from_names(vmnames),
                    source.as_deref(),
                    dest.as_deref().unwrap_or_default(),
                )
                .await?;
            print_reports(&reports);
            Ok(())
        }
        Commands::Balance { hosts } => {
            let gateway = connect(&settings.session).await?;
            let mut orchestrator = build_orchestrator(gateway, &settings);
            let reports = orchestrator
                .run_balance(&hosts, settings.migration.simulate_only)
                .await?;
            print_reports(&reports);
            Ok(())
        }
    }
}

fn build_orchestrator(gateway: Arc<dyn InventoryGateway>, settings: &Settings) -> Orchestrator {
    let orchestrator =
        Orchestrator::new(gateway, MigrationOptions::from_settings(&settings.migration))
            .with_dispatch_concurrency(settings.migration.dispatch_concurrency);

    // Ctrl-C stops waiting on relocations, tasks already issued keep running server side
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted! Abandoning outstanding migrations");
            cancel.cancel();
        }
    });

    orchestrator
}

async fn handle_list_command(
    gateway: &dyn InventoryGateway,
    kind: ListKind,
    names: &[String],
    debug: bool,
) -> ManagerResult<()> {
    let filter = (!names.is_empty()).then_some(names);

    match kind {
        ListKind::Vms => {
            let vms = gateway.list_workloads(filter).await?;
            for vm in &vms {
                println!("{} {}", "NAME:".bold(), vm.name);
                println!("HOST: {}", vm.host.as_deref().unwrap_or("-"));
                println!("MEM:  {}", vm.memory_mb);
                println!("STATE: {}", vm.power_state);
                if vm.template {
                    println!("{}", "TEMPLATE".yellow());
                }
                dump(debug, vm);
            }
            println!("TOTAL VMS: {}", vms.len());
        }
        ListKind::Hosts => {
            let hosts = gateway.list_hosts(filter).await?;
            for host in &hosts {
                println!("{} {}", "NAME:".bold(), host.name);
                println!("MEMORY: {} GB", display_gb(host.memory_bytes));
                dump(debug, host);
            }
            println!("TOTAL HOSTS: {}", hosts.len());
        }
        ListKind::Clusters => {
            let clusters = gateway.list_clusters(filter).await?;
            for cluster in &clusters {
                println!("{} {}", "NAME:".bold(), cluster.name);
                dump(debug, cluster);
            }
        }
    }

    Ok(())
}

fn dump<T: Serialize>(debug: bool, value: &T) {
    if !debug {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json.dimmed()),
        Err(e) => warn!("Could not dump object: {}", e),
    }
}

fn print_reports(reports: &[MigrationReport]) {
    for report in reports {
        match &report.outcome {
            Ok(MigrationOutcome::Migrated { result }) => {
                let detail = result.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default();
                println!(
                    "{} {} migrated to {}{} in {}ms",
                    "✓".green(),
                    report.workload,
                    report.destination,
                    detail,
                    report.elapsed().num_milliseconds()
                );
            }
            Ok(MigrationOutcome::Skipped(reason)) => {
                println!(
                    "{} {} -> {}: {}",
                    "-".yellow(),
                    report.workload,
                    report.destination,
                    reason
                );
            }
            Err(e) => {
                println!(
                    "{} {} -> {}: {}",
                    "✗".red(),
                    report.workload,
                    report.destination,
                    e
                );
            }
        }
    }

    let summary = RunSummary::from_reports(reports);
    summary.log();
    println!("{}", summary.to_string().bold());
}

fn handle_init_command(force: bool) -> ManagerResult<()> {
    let config_dir = PathBuf::from(
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string()),
    );
    if config_dir.exists() && !force {
        warn!("Configuration directory already exists. Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = generate_default_config();
    let config_str = toml::to_string_pretty(&default_config)?;
    std::fs::write(config_dir.join("default.toml"), config_str)?;

    info!(path = %config_dir.display(), "Wrote default configuration");
    println!("{} Default configuration generated", "✓".green());
    Ok(())
}
