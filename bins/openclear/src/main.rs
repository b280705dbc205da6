//! OpenClear engine binary
//!
//! Commands for initializing, validating, and running the settlement,
//! margin, and reconciliation engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::outbox::{LogNotifier, Outbox};
use config::{
    generate_default_config, load_config, save_config, validate_config, CollateralCatalog,
    RegionRegistry,
};
use derivatives::{DerivativesService, InMemoryContractStore, MarketDataStore};
use margin::{InMemoryMarginStore, MarginService, PositionSource};
use observability::{init_logging, LogFormat};
use reconciliation::{
    InMemoryRecordStore, InternalLedgerView, LedgerViewProvider, ReconciliationEngine,
    ReconciliationScheduler, ReconciliationType, StaticLedgerView,
};
use settlement::{
    InMemoryInstructionStore, NetworkRegistry, SettlementService, SimulatedClearingClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "openclear", about = "Derivatives settlement, margin, and reconciliation engine")]
struct Cli {
    /// Log output format: pretty, json, or compact
    #[arg(long, default_value = "pretty", env = "OPENCLEAR_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the engine
    Start {
        /// Path to the engine configuration file
        #[arg(long, default_value = "config/openclear.yaml")]
        config: PathBuf,

        /// Prometheus metrics port (disabled when omitted)
        #[arg(long)]
        metrics_port: Option<u16>,

        /// Seconds between scheduled reconciliation sweeps
        #[arg(long, default_value_t = 3600)]
        recon_interval_secs: u64,
    },
    /// Validate a configuration file and print the report
    Validate {
        #[arg(long, default_value = "config/openclear.yaml")]
        config: PathBuf,
    },
    /// Write a default configuration file
    Init {
        #[arg(long, default_value = "config/openclear.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("openclear", cli.log_format)?;

    match cli.command {
        Commands::Start {
            config,
            metrics_port,
            recon_interval_secs,
        } => start_engine(&config, metrics_port, recon_interval_secs).await,
        Commands::Validate { config } => validate_command(&config),
        Commands::Init { output } => init_command(&output),
    }
}

async fn start_engine(
    config_path: &Path,
    metrics_port: Option<u16>,
    recon_interval_secs: u64,
) -> Result<()> {
    let config = load_config(config_path)?;
    let report = validate_config(&config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "configuration warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start engine due to configuration errors");
    }

    if let Some(port) = metrics_port {
        observability::init_metrics(port)?;
    }

    info!(
        engine = %config.engine.name,
        regions = config.regions.len(),
        networks = config.networks.len(),
        "Starting OpenClear"
    );

    // Reference data, shared read-only across all workflows
    let regions = Arc::new(RegionRegistry::from_config(&config));
    let catalog = Arc::new(CollateralCatalog::from_config(&config));
    let networks = Arc::new(NetworkRegistry::new(config.networks.clone()));
    let outbox = Outbox::new();

    // Engine services
    let contract_store = InMemoryContractStore::new();
    let derivatives = DerivativesService::new(
        Arc::clone(&contract_store) as Arc<dyn derivatives::ContractStore>,
        Arc::clone(&regions),
        Arc::new(MarketDataStore::new()),
    );
    let margin_store = Arc::new(InMemoryMarginStore::new());
    let margin = MarginService::new(
        Arc::clone(&margin_store) as Arc<dyn margin::MarginAccountStore>,
        Arc::clone(&derivatives) as Arc<dyn PositionSource>,
        Arc::clone(&regions),
        catalog,
        Arc::clone(&outbox),
    );
    let instruction_store = InMemoryInstructionStore::new();
    let _settlement = SettlementService::new(
        Arc::clone(&instruction_store) as Arc<dyn settlement::InstructionStore>,
        contract_store,
        Arc::clone(&margin),
        Arc::clone(&networks),
        Arc::new(SimulatedClearingClient::new(Duration::from_millis(250))),
        Arc::clone(&regions),
        Arc::clone(&outbox),
        config.workflow.clone(),
    );

    // Reconciliation against the (simulated) external ledger feeds
    let internal_view = Arc::new(InternalLedgerView::new(
        Arc::clone(&derivatives) as Arc<dyn PositionSource>,
        margin_store,
        instruction_store,
    ));
    let recon_engine = ReconciliationEngine::new(
        internal_view as Arc<dyn LedgerViewProvider>,
        vec![
            StaticLedgerView::new("clearing_house") as Arc<dyn LedgerViewProvider>,
            StaticLedgerView::new("custodian") as Arc<dyn LedgerViewProvider>,
            StaticLedgerView::new("counterparty") as Arc<dyn LedgerViewProvider>,
        ],
        InMemoryRecordStore::new(),
        Arc::clone(&outbox),
    );
    let scheduler = ReconciliationScheduler::new(recon_engine, ReconciliationType::Daily);

    // Background tasks run until shutdown flips
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let outbox_task = tokio::spawn(Arc::clone(&outbox).run(
        Arc::new(LogNotifier),
        Duration::from_secs(5),
        shutdown_rx.clone(),
    ));
    let expiry_task = tokio::spawn(Arc::clone(&margin).run_call_expiry(
        Duration::from_secs(60),
        shutdown_rx.clone(),
    ));
    let recon_task = tokio::spawn(
        scheduler.run(Duration::from_secs(recon_interval_secs), shutdown_rx),
    );

    info!("OpenClear running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received, stopping background tasks");
    shutdown_tx.send(true).ok();
    let _ = outbox_task.await;
    let _ = expiry_task.await;
    let _ = recon_task.await;

    info!("OpenClear stopped");
    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Engine: {}", config.engine.name);
    println!("Version: {}", config.engine.version);
    println!("Regions: {}", config.regions.len());
    println!("Collateral types: {}", config.collateral.len());
    println!("Clearing networks: {}", config.networks.len());

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - 4 regulatory regions (US, EU, UK, APAC)");
    println!("  - 3 collateral types with haircuts");
    println!("  - 3 clearing networks with a generic cash fallback");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize margin and settlement rules");
    println!(
        "  2. Run 'openclear validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'openclear start --config {:?}' to start the engine",
        output_path
    );

    Ok(())
}
