// ============================================
// File: crates/aura-server/src/lib.rs
// ============================================
//! # Aura Server Library
//!
//! ## Creation Reason
//! Provides the control-plane side of the Aura fleet: enrolling devices
//! with certificates from the platform CA, and rolling firmware out to
//! them in health-gated stages over MQTT.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Component wiring and lifecycle
//! - [`services`]: Business logic services
//!   - [`services::challenge`]: One-time challenge store
//!   - [`services::provisioning`]: Bootstrap / Provision flow
//!   - [`services::firmware`]: Firmware upload and integrity
//! - [`orchestrator`]: Release state machine, health, rollout loop
//! - [`storage`]: Record and firmware blob stores
//! - [`handlers`]: Provisioning RPC over HTTP/JSON
//! - [`pki`]: Root CA persistence
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Aura Server                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌──────────────┐     ┌─────────────────┐   │
//! │  │   Config    │────►│    Server    │────►│  RPC Handlers   │   │
//! │  └─────────────┘     └──────┬───────┘     └────────┬────────┘   │
//! │                             │                      │            │
//! │         ┌───────────────────┼──────────────────────┘            │
//! │         ▼                   ▼                                   │
//! │  ┌──────────────┐    ┌──────────────┐     ┌─────────────────┐   │
//! │  │ Provisioning │    │ Orchestrator │────►│ Health Tracker  │   │
//! │  │ + Challenges │    │              │     └─────────────────┘   │
//! │  └──────┬───────┘    └──────┬───────┘                           │
//! │         ▼                   ▼                                   │
//! │  ┌─────────────────────────────────┐                            │
//! │  │  RecordStore  /  FirmwareStore  │                            │
//! │  └─────────────────────────────────┘                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer                             │
//! │        FleetClient  ──►  MqttPubSub (rumqttc)  ──►  broker      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Device → Bootstrap → challenge → Provision → certificate + key
//! Orchestrator → update/command → Device → update/status → Health
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Records are in memory; release progress restarts from the
//!   persisted stage after a restart
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod pki;
pub mod server;
pub mod services;
pub mod storage;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{ProvisioningError, Result, ServerError};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use server::Server;
pub use services::{ChallengeStore, FirmwareRegistry, ProvisioningService};
