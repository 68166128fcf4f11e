// ============================================
// File: crates/aura-server/src/server.rs
// ============================================
//! # Server
//!
//! ## Creation Reason
//! Wires the CA, record and blob stores, provisioning service, MQTT session
//! and orchestrator together and manages their lifecycle.
//!
//! ## Main Functionality
//! - `Server::new`: build every component against a live MQTT broker
//! - `Server::with_bus`: same, over any `PubSub` (tests, embedding)
//! - `Server::run`: spawn tasks, wait for shutdown, join
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────────────┐     │
//! │  │ RPC Task   │  │ Orchestrator │  │ Challenge Sweep  │     │
//! │  │            │  │ Task         │  │ Task             │     │
//! │  │ Bootstrap  │  │ poll ticks   │  │ expire           │     │
//! │  │ Provision  │  │              │  │ challenges       │     │
//! │  └─────┬──────┘  └──────┬───────┘  └──────────────────┘     │
//! │        │                │                                   │
//! │        ▼                ▼                                   │
//! │  ┌──────────────┐ ┌────────────┐ ┌───────────────────────┐  │
//! │  │ Provisioning │ │ FleetClient│◀│ MQTT event loop       │  │
//! │  │ Service + CA │ │            │ │ (status → health)     │  │
//! │  └──────┬───────┘ └────────────┘ └───────────────────────┘  │
//! │         ▼                                                   │
//! │  ┌───────────────────────────────┐                          │
//! │  │ RecordStore / FirmwareStore   │                          │
//! │  └───────────────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Graceful shutdown waits up to 5s per task
//! - All services are Arc-wrapped for sharing
//! - Provisioning and the orchestrator only share the record store
//! - The binary exposes no firmware upload or release creation surface.
//!   An embedding caller registers images through `Server::firmware()`
//!   and creates releases through `Server::records()`; the orchestrator
//!   picks them up on its next tick
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aura_common::time::now;
use aura_transport::traits::PubSub;
use aura_transport::{FleetClient, MqttPubSub};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handlers::rpc;
use crate::orchestrator::Orchestrator;
use crate::pki;
use crate::services::{ChallengeStore, FirmwareRegistry, ProvisioningService};
use crate::storage::{LocalFirmwareStore, MemoryRecordStore, RecordStore};

/// Time each task gets to finish during shutdown.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// Server
// ============================================

/// Aura fleet server.
///
/// # Lifecycle
/// 1. Create with `Server::new(config).await`
/// 2. Start with `server.run().await`
/// 3. Shutdown via Ctrl+C or `server.shutdown()`
pub struct Server {
    config: ServerConfig,
    records: Arc<dyn RecordStore>,
    firmware: FirmwareRegistry,
    provisioning: Arc<ProvisioningService>,
    orchestrator: Arc<Orchestrator>,
    fleet: FleetClient,
    shutdown: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Builds the server and starts the MQTT session.
    ///
    /// # Errors
    /// Returns error if the CA, stores or MQTT session cannot be set up.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let bus = MqttPubSub::connect(config.transport.mqtt_config())
            .map_err(|e| ServerError::startup_failed(format!("MQTT session: {e}")))?;
        Self::with_bus(config, Arc::new(bus)).await
    }

    /// Builds the server over an existing pub/sub session.
    ///
    /// # Errors
    /// Returns error if the CA or stores cannot be set up, or the
    /// orchestrator handlers cannot subscribe.
    pub async fn with_bus(config: ServerConfig, bus: Arc<dyn PubSub>) -> Result<Self> {
        let ca = pki::load_or_initialize(config.pki.ca_settings(), config.pki.root_paths()).await?;

        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        register_fleet(records.as_ref(), &config.fleet.bootstrap_tokens).await?;

        let blobs = LocalFirmwareStore::open(&config.storage.firmware_dir).await?;
        let firmware = FirmwareRegistry::new(Arc::clone(&records), Arc::new(blobs));

        let challenges = Arc::new(ChallengeStore::new(config.provisioning.challenge_ttl()));
        let provisioning = Arc::new(ProvisioningService::new(
            Arc::clone(&records),
            Arc::new(ca),
            challenges,
            config.provisioning_settings(),
        ));

        let fleet = FleetClient::new(bus, config.transport.topic_layout());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&records),
            fleet.clone(),
            config.orchestrator.settings(),
        ));
        orchestrator.attach_handlers().await?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            devices = config.fleet.bootstrap_tokens.len(),
            firmware_dir = %config.storage.firmware_dir.display(),
            "Server components initialized"
        );

        Ok(Self {
            config,
            records,
            firmware,
            provisioning,
            orchestrator,
            fleet,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }

    /// Runs the server until shutdown.
    ///
    /// # Errors
    /// Returns error if the RPC listener cannot be bound.
    pub async fn run(&self) -> Result<()> {
        info!("Starting Aura server v{}", env!("CARGO_PKG_VERSION"));

        let listener = TcpListener::bind(self.config.provisioning.listen_addr)
            .await
            .map_err(|e| ServerError::startup_failed(format!("RPC bind failed: {e}")))?;

        let mut tasks = Vec::new();
        tasks.push(("rpc", self.spawn_rpc_task(listener)));
        tasks.push(("orchestrator", self.spawn_orchestrator_task()));
        tasks.push(("challenge-sweep", self.spawn_sweep_task()));

        info!("Server started successfully");

        self.wait_for_shutdown().await;

        info!("Shutting down server...");
        self.shutdown();

        for (name, task) in tasks {
            match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out during shutdown", name),
            }
        }

        if let Err(e) = self.fleet.disconnect().await {
            warn!("MQTT disconnect error: {}", e);
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.orchestrator.stop();
        let _ = self.shutdown_tx.send(());
    }

    /// Shared record store.
    #[must_use]
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Firmware registry.
    ///
    /// The only way to add images to a running server; pair with
    /// [`RecordStore::create_release`] on [`Server::records`] to roll one out.
    #[must_use]
    pub const fn firmware(&self) -> &FirmwareRegistry {
        &self.firmware
    }

    /// Provisioning service.
    #[must_use]
    pub fn provisioning(&self) -> &Arc<ProvisioningService> {
        &self.provisioning
    }

    /// Release orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn spawn_rpc_task(&self, listener: TcpListener) -> JoinHandle<()> {
        let router = rpc::router(Arc::clone(&self.provisioning));
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) = rpc::serve(listener, router, shutdown_rx).await {
                warn!("RPC server error: {}", e);
            }
        })
    }

    fn spawn_orchestrator_task(&self) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    }

    fn spawn_sweep_task(&self) -> JoinHandle<()> {
        let shutdown = Arc::clone(&self.shutdown);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let challenges = Arc::clone(self.provisioning.challenges());
        let period = self.config.provisioning.sweep_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Sweep task received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }
                        challenges.sweep_expired(now());
                    }
                }
            }
        })
    }

    async fn wait_for_shutdown(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = ctrl_c => info!("Received shutdown signal"),
            _ = shutdown_rx.recv() => info!("Shutdown requested"),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.provisioning.listen_addr)
            .field("broker", &self.config.transport.mqtt_config().broker_addr())
            .finish()
    }
}

/// Pre-registers one device per configured bootstrap token.
async fn register_fleet(records: &dyn RecordStore, tokens: &[String]) -> Result<()> {
    for token in tokens {
        let device = records.create_device(token).await?;
        debug!(device_id = %device.id, "Registered device");
    }
    Ok(())
}
