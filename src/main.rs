//! linode-ddns - dynamic DNS daemon for Linode.

use clap::{Parser, Subcommand};
use linode_ddns::cache;
use linode_ddns::config::Config;
use linode_ddns::detector::{IpDetector, IpObserver};
use linode_ddns::providers::create_provider;
use linode_ddns::reconciler::{CycleReport, Reconciler};
use linode_ddns::scheduler::Scheduler;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linode-ddns")]
#[command(about = "Keep Linode DNS records pointed at your public IP")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon until SIGINT/SIGTERM
    Daemon {
        /// Override the poll interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run a single reconciliation cycle
    Once {
        /// Rewrite records even if they already match
        #[arg(short, long)]
        force: bool,

        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current IP and how each record resolves
    Status,

    /// Validate configuration and credentials
    Validate,

    /// Write an example configuration file
    Init,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("linode-ddns/config.toml")),
        Some(PathBuf::from("/etc/linode-ddns/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    let config_path = get_config_path(cli.config);

    match cli.command {
        Commands::Init => cmd_init(config_path)?,
        Commands::Daemon { interval } => {
            let mut config = Config::load_from(&config_path)?;
            if let Some(secs) = interval {
                config.poll_interval_secs = secs;
                config.validate()?;
            }
            cmd_daemon(config).await?;
        }
        Commands::Once { force, json } => {
            let config = Config::load_from(&config_path)?;
            cmd_once(config, force, json).await?;
        }
        Commands::Status => {
            let config = Config::load_from(&config_path)?;
            cmd_status(config).await?;
        }
        Commands::Validate => {
            let config = Config::load_from(&config_path)?;
            cmd_validate(config).await?;
        }
    }

    Ok(())
}

fn build_reconciler(config: &Config) -> anyhow::Result<Reconciler> {
    let observer = IpDetector::with_timeout(config.ip_services.clone(), config.observe_timeout())?;
    let provider = create_provider(config)?;
    Ok(Reconciler::new(
        Box::new(observer),
        provider,
        config.domains.clone(),
    ))
}

async fn cmd_daemon(config: Config) -> anyhow::Result<()> {
    let mut reconciler = build_reconciler(&config)?;
    let scheduler = Scheduler::new(config.poll_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received, stopping after the current cycle");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(&mut reconciler, shutdown_rx).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn cmd_once(config: Config, force: bool, json: bool) -> anyhow::Result<()> {
    let mut reconciler = build_reconciler(&config)?;

    let report = if force {
        reconciler.run_forced_cycle().await
    } else {
        reconciler.run_cycle().await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.is_aborted() || report.failed() > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(report: &CycleReport) {
    match (&report.observed_ip, &report.observation_error) {
        (Some(ip), _) => println!("Current IP: {}", ip),
        (None, Some(e)) => println!("Failed to detect IP: {}", e),
        (None, None) => {}
    }
    println!();

    for entry in &report.specs {
        println!("  {}: {}", entry.spec, entry.outcome);
    }
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&config)?;

    println!("linode-ddns Status");
    println!("==================\n");

    match reconciler.observer().observe().await {
        Ok(ip) => println!("Current Public IP: {}", ip),
        Err(e) => println!("Failed to detect IP: {}", e),
    }

    println!("\nRecords ({}):", reconciler.provider().name());
    println!("---------");

    let resolutions = cache::resolve(reconciler.provider(), reconciler.specs()).await;
    for (spec, resolution) in reconciler.specs().iter().zip(resolutions) {
        match resolution {
            Ok(resolved) => println!(
                "  {}: {} (domain {}, record {})",
                spec, resolved.target, resolved.handle.domain_id, resolved.handle.resource_id
            ),
            Err(e) => println!("  {}: {}", spec, e),
        }
    }

    Ok(())
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");
    println!("  Poll interval: {}s", config.poll_interval_secs);
    println!("  Records: {}", config.domains.len());

    let provider = create_provider(&config)?;

    print!("  Credentials ({}): ", provider.name());
    let domains = match provider.list_domains().await {
        Ok(domains) => {
            println!("OK ({} domains visible)", domains.len());
            domains
        }
        Err(e) => {
            println!("FAILED - {}", e);
            std::process::exit(1);
        }
    };

    let mut all_valid = true;
    for spec in &config.domains {
        if domains.iter().any(|d| d.domain == spec.domain) {
            println!("  {}: domain found", spec);
        } else {
            println!("  {}: domain {} not found", spec, spec.domain);
            all_valid = false;
        }
    }

    println!();

    if all_valid {
        println!("Configuration is valid.");
    } else {
        println!("Some domains are not visible to this token.");
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_init(path: PathBuf) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    Config::example().save_to(&path)?;
    println!("Wrote example configuration to {}", path.display());
    println!("Set LINODE_TOKEN or edit api_key, then run 'linode-ddns validate'.");

    Ok(())
}
