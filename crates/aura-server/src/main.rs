// ============================================
// File: crates/aura-server/src/main.rs
// ============================================
//! # Aura Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the Aura fleet server binary.
//! Handles CLI parsing, logging setup, and server initialization.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading and validation
//! - Server execution
//!
//! ## Usage
//! ```bash
//! # Start provisioning RPC and the release orchestrator
//! aura-server start --config /etc/aura/server.toml
//!
//! # Other commands
//! aura-server validate          # Validate config file
//! aura-server default-config    # Print a default config
//! aura-server root-cert         # Print the root CA certificate
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A missing config file falls back to defaults plus env overrides
//! - `root-cert` creates the root on disk if paths are set and it is absent
//! - Exits with status 2 when the configuration is unreadable or invalid
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aura_server::{pki, Server, ServerConfig, ServerError};

// ============================================
// CLI Definition
// ============================================

/// Aura IoT fleet server
#[derive(Parser, Debug)]
#[command(name = "aura-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the provisioning service and release orchestrator
    Start {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH", default_value = "/etc/aura/server.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH", default_value = "/etc/aura/server.toml")]
        config: PathBuf,
    },

    /// Print the default configuration as TOML
    DefaultConfig,

    /// Print the root CA certificate (PEM)
    RootCert {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH", default_value = "/etc/aura/server.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging("info");

    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::DefaultConfig => {
            print!("{}", ServerConfig::default().to_toml());
            Ok(())
        }
        Commands::RootCert { config } => cmd_root_cert(config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(exit_code(&e));
    }
}

// ============================================
// Commands
// ============================================

/// Starts the server.
async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path).await?;

    init_logging(&config.logging.level);

    info!("════════════════════════════════════════");
    info!("RPC listen:   {}", config.provisioning.listen_addr);
    info!("MQTT broker:  {}", config.transport.mqtt_config().broker_addr());
    info!("Canary size:  {}", config.orchestrator.canary_size);
    info!("Fleet size:   {}", config.fleet.bootstrap_tokens.len());
    info!("════════════════════════════════════════");

    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Provisioning:");
    println!("   Listen:        {}", config.provisioning.listen_addr);
    println!("   Challenge TTL: {}s", config.provisioning.challenge_ttl_secs);
    println!("   Signatures:    {}", if config.provisioning.require_signature { "required" } else { "optional" });
    println!();
    println!("Transport:");
    println!("   Broker:        {}", config.transport.mqtt_config().broker_addr());
    println!("   Topic prefix:  {}", config.transport.topic_prefix);
    println!("   Device host:   {}:{}", config.transport.public_host, config.transport.public_port);
    println!();
    println!("Orchestrator:");
    println!("   Poll interval: {}s", config.orchestrator.poll_interval_secs);
    println!("   Canary size:   {}", config.orchestrator.canary_size);
    println!("   Rollback at:   < {:.0}%", config.orchestrator.health.rollback_threshold * 100.0);
    println!();
    println!("Fleet:");
    println!("   Devices:       {}", config.fleet.bootstrap_tokens.len());
    println!();

    Ok(())
}

/// Prints the root CA certificate.
async fn cmd_root_cert(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path).await?;
    let ca = pki::load_or_initialize(config.pki.ca_settings(), config.pki.root_paths()).await?;
    print!("{}", ca.root_certificate_pem());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Exit status: 2 for configuration errors, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ServerError>() {
        Some(e) if e.is_config_error() => 2,
        _ => 1,
    }
}

/// Loads config from `path`, or defaults with env overrides if absent.
async fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        return Ok(ServerConfig::load(path).await?);
    }

    info!("Config file {} not found, using defaults", path.display());
    let mut config = ServerConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
