//! Staged Rollout Integration Tests
//!
//! Drives the orchestrator tick by tick against an in-memory broker and
//! record store, with devices simulated by injecting update-status
//! messages:
//!
//! - Firmware upload → release → canary dispatch
//! - Canary health → rollback or promotion
//! - Production health → completion
//! - Small fleets that can never reach the count thresholds
//! - Overlapping releases competing for the same devices
//! - Rollback commands that fail and are re-sent on later ticks

use std::sync::Arc;

use aura_common::DeviceId;
use aura_core::crypto::sha256_hex;
use aura_core::protocol::{TopicLayout, UpdateCommand};
use aura_server::orchestrator::{HealthPolicy, Orchestrator, OrchestratorSettings};
use aura_server::storage::{
    Device, Firmware, LocalFirmwareStore, MemoryRecordStore, NewRelease, RecordStore, Release,
    ReleaseStage, ReleaseStatus,
};
use aura_server::FirmwareRegistry;
use aura_transport::traits::PubSub;
use aura_transport::{FleetClient, MemoryBroker};

// ════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════

struct Harness {
    records: Arc<MemoryRecordStore>,
    broker: Arc<MemoryBroker>,
    registry: FirmwareRegistry,
    orchestrator: Orchestrator,
    _dir: tempfile::TempDir,
}

async fn harness(canary_size: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let records = Arc::new(MemoryRecordStore::new());
    let blobs = LocalFirmwareStore::open(dir.path().join("fw")).await.unwrap();
    let registry = FirmwareRegistry::new(records.clone(), Arc::new(blobs));

    let broker = Arc::new(MemoryBroker::new());
    let fleet = FleetClient::new(broker.clone(), TopicLayout::default());
    let orchestrator = Orchestrator::new(
        records.clone(),
        fleet,
        OrchestratorSettings {
            canary_size,
            policy: HealthPolicy::default(),
            ..OrchestratorSettings::default()
        },
    );
    orchestrator.attach_handlers().await.unwrap();

    Harness {
        records,
        broker,
        registry,
        orchestrator,
        _dir: dir,
    }
}

impl Harness {
    async fn devices(&self, count: usize) -> Vec<Device> {
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            out.push(self.records.create_device(&format!("token-{i}")).await.unwrap());
        }
        out
    }

    async fn release(&self, version: &str) -> (Firmware, Release) {
        let firmware = self
            .registry
            .upload(version, "integration", vec![0xA5u8; 10])
            .await
            .unwrap();
        let release = self
            .records
            .create_release(NewRelease::for_firmware(firmware.id))
            .await
            .unwrap();
        (firmware, release)
    }

    async fn current(&self, release: &Release) -> Release {
        self.records.get_release(&release.id).await.unwrap()
    }

    fn report(&self, device: &DeviceId, status: &str) {
        let topic = format!("aura/devices/{device}/update/status");
        let payload = format!(r#"{{"device_id":"{device}","status":"{status}","progress":100}}"#);
        assert_eq!(self.broker.inject(&topic, payload), 1);
    }

    fn commands(&self) -> Vec<UpdateCommand> {
        self.broker
            .published_with_suffix("/update/command")
            .into_iter()
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }

    fn rollbacks(&self) -> usize {
        self.broker.published_with_suffix("/update/rollback").len()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CANARY DISPATCH
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn upload_then_release_dispatches_canary_wave() {
    let h = harness(5).await;
    let devices = h.devices(7).await;
    let (firmware, release) = h.release("1.2.0").await;

    assert_eq!(firmware.checksum, sha256_hex(&[0xA5; 10]));
    assert_eq!(release.status, ReleaseStatus::Pending);

    h.orchestrator.tick().await.unwrap();

    let release = h.current(&release).await;
    assert_eq!(release.status, ReleaseStatus::InProgress);
    assert_eq!(release.stage, ReleaseStage::Canary);

    let commands = h.commands();
    assert_eq!(commands.len(), 5);
    for (cmd, device) in commands.iter().zip(&devices) {
        assert_eq!(cmd.device_id, device.id);
        assert_eq!(cmd.version, "1.2.0");
        assert_eq!(cmd.checksum, firmware.checksum);
        assert_eq!(cmd.firmware_url, firmware.location);
    }
}

#[tokio::test]
async fn canary_waits_for_outstanding_reports() {
    let h = harness(5).await;
    let devices = h.devices(7).await;
    let (_, release) = h.release("1.2.0").await;

    h.orchestrator.tick().await.unwrap();
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.commands().len(), 5);

    for d in &devices[..5] {
        h.report(&d.id, "completed");
    }
    h.orchestrator.tick().await.unwrap();

    assert_eq!(h.commands().len(), 7);
    assert_eq!(h.current(&release).await.stage, ReleaseStage::Canary);
}

// ════════════════════════════════════════════════════════════════════════════
// ROLLBACK
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn healthy_canary_is_not_rolled_back() {
    let h = harness(10).await;
    let devices = h.devices(12).await;
    let (_, release) = h.release("2.0.0").await;
    h.orchestrator.tick().await.unwrap();

    for d in &devices[..5] {
        h.report(&d.id, "completed");
    }
    h.report(&devices[5].id, "failed");
    h.orchestrator.tick().await.unwrap();

    let current = h.current(&release).await;
    assert_eq!(current.status, ReleaseStatus::InProgress);
    assert_eq!(current.stage, ReleaseStage::Canary);
    assert_eq!(h.rollbacks(), 0);
}

#[tokio::test]
async fn failing_canary_rolls_back_whole_fleet() {
    let h = harness(10).await;
    let devices = h.devices(12).await;
    let (_, release) = h.release("2.0.0").await;
    h.orchestrator.tick().await.unwrap();

    for d in &devices[..4] {
        h.report(&d.id, "completed");
    }
    h.report(&devices[4].id, "failed");
    h.report(&devices[5].id, "error");
    h.orchestrator.tick().await.unwrap();

    let current = h.current(&release).await;
    assert_eq!(current.status, ReleaseStatus::RolledBack);
    assert_eq!(current.stage, ReleaseStage::Rollback);
    assert_eq!(h.rollbacks(), 12);
    assert!(!h.orchestrator.health().contains(&release.id));

    // Terminal releases are left alone
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.rollbacks(), 12);
}

#[tokio::test]
async fn rollback_needs_minimum_observations() {
    let h = harness(10).await;
    let devices = h.devices(12).await;
    let (_, release) = h.release("2.0.0").await;
    h.orchestrator.tick().await.unwrap();

    for d in &devices[..4] {
        h.report(&d.id, "failed");
    }
    h.orchestrator.tick().await.unwrap();

    assert_eq!(h.current(&release).await.status, ReleaseStatus::InProgress);
}

#[tokio::test]
async fn failed_rollback_commands_are_resent() {
    let h = harness(10).await;
    let devices = h.devices(12).await;
    let (_, release) = h.release("2.1.0").await;
    h.orchestrator.tick().await.unwrap();

    let unreachable = format!("aura/devices/{}/update/rollback", devices[11].id);
    h.broker.fail_topic(unreachable.clone());

    for d in &devices[..4] {
        h.report(&d.id, "completed");
    }
    h.report(&devices[4].id, "failed");
    h.report(&devices[5].id, "failed");
    h.orchestrator.tick().await.unwrap();

    // The broadcast carries on past the failed device
    assert_eq!(h.current(&release).await.status, ReleaseStatus::RolledBack);
    assert_eq!(h.rollbacks(), 11);
    assert_eq!(h.orchestrator.undelivered_rollbacks(), 1);

    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.rollbacks(), 11);
    assert_eq!(h.orchestrator.undelivered_rollbacks(), 1);

    h.broker.restore_topic(&unreachable);
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.rollbacks(), 12);
    assert_eq!(h.orchestrator.undelivered_rollbacks(), 0);
    assert_eq!(
        h.broker.published_with_suffix("/update/rollback").last().unwrap().topic,
        unreachable
    );

    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.rollbacks(), 12);
}

#[tokio::test]
async fn rollback_during_broker_outage_is_delivered_after_reconnect() {
    let h = harness(10).await;
    let devices = h.devices(6).await;
    let (_, release) = h.release("2.2.0").await;
    h.orchestrator.tick().await.unwrap();

    for d in &devices[..3] {
        h.report(&d.id, "completed");
    }
    for d in &devices[3..] {
        h.report(&d.id, "failed");
    }

    h.broker.set_connected(false);
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.current(&release).await.status, ReleaseStatus::RolledBack);
    assert_eq!(h.rollbacks(), 0);
    assert_eq!(h.orchestrator.undelivered_rollbacks(), 6);

    h.broker.set_connected(true);
    assert!(h.broker.is_connected());
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.rollbacks(), 6);
    assert_eq!(h.orchestrator.undelivered_rollbacks(), 0);
}

// ════════════════════════════════════════════════════════════════════════════
// PROMOTION AND COMPLETION
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn canary_promotes_and_widens_to_fleet() {
    let h = harness(20).await;
    let devices = h.devices(25).await;
    let (_, release) = h.release("3.0.0").await;
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.commands().len(), 20);

    for d in &devices[..11] {
        h.report(&d.id, "completed");
    }
    h.orchestrator.tick().await.unwrap();

    let current = h.current(&release).await;
    assert_eq!(current.status, ReleaseStatus::InProgress);
    assert_eq!(current.stage, ReleaseStage::Production);

    let commanded: Vec<DeviceId> = h.commands().into_iter().map(|c| c.device_id).collect();
    assert_eq!(commanded.len(), 25);
    assert!(devices.iter().all(|d| commanded.contains(&d.id)));
}

#[tokio::test]
async fn production_completes_after_enough_reports() {
    let h = harness(5).await;
    let devices = h.devices(55).await;
    let (_, release) = h.release("4.0.0").await;
    h.records
        .update_release_state(&release.id, ReleaseStatus::InProgress, ReleaseStage::Production)
        .await
        .unwrap();

    // Health starts from zero and production dispatches everywhere
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.commands().len(), 55);

    for d in &devices[..51] {
        h.report(&d.id, "success");
    }
    h.orchestrator.tick().await.unwrap();

    let current = h.current(&release).await;
    assert_eq!(current.status, ReleaseStatus::Completed);
    assert_eq!(current.stage, ReleaseStage::Completed);
    assert!(!h.orchestrator.health().contains(&release.id));
}

#[tokio::test]
async fn small_fleet_runs_to_completion() {
    let h = harness(5).await;
    let devices = h.devices(3).await;
    let (_, release) = h.release("5.0.0").await;

    h.orchestrator.tick().await.unwrap();
    for d in &devices {
        h.report(&d.id, "completed");
    }

    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.current(&release).await.stage, ReleaseStage::Production);

    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.current(&release).await.status, ReleaseStatus::Completed);
    assert_eq!(h.commands().len(), 3);
}

#[tokio::test]
async fn small_unhealthy_fleet_rolls_back() {
    let h = harness(5).await;
    let devices = h.devices(2).await;
    let (_, release) = h.release("5.0.1").await;

    h.orchestrator.tick().await.unwrap();
    h.report(&devices[0].id, "completed");
    h.report(&devices[1].id, "failed");
    h.orchestrator.tick().await.unwrap();

    assert_eq!(h.current(&release).await.status, ReleaseStatus::RolledBack);
    assert_eq!(h.rollbacks(), 2);
}

// ════════════════════════════════════════════════════════════════════════════
// STATUS ACCOUNTING
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn only_first_terminal_report_counts() {
    let h = harness(5).await;
    let devices = h.devices(1).await;
    let (_, release) = h.release("6.0.0").await;
    h.orchestrator.tick().await.unwrap();

    let device = &devices[0].id;
    h.report(device, "downloading");
    h.report(device, "completed");
    h.report(device, "completed");
    h.report(device, "failed");

    let health = h.orchestrator.health().snapshot(&release.id).unwrap();
    assert_eq!(health.devices_observed, 1);
    assert_eq!(health.success_count, 1);
    assert_eq!(health.failure_count, 0);
}

#[tokio::test]
async fn reports_from_uncommanded_devices_are_ignored() {
    let h = harness(1).await;
    let devices = h.devices(2).await;
    let (_, release) = h.release("6.1.0").await;
    h.orchestrator.tick().await.unwrap();

    h.report(&devices[1].id, "failed");
    h.report(&DeviceId::generate(), "failed");

    let health = h.orchestrator.health().snapshot(&release.id).unwrap();
    assert_eq!(health.devices_observed, 0);
    assert_eq!(health.failure_count, 0);
}

#[tokio::test]
async fn malformed_status_is_dropped() {
    let h = harness(5).await;
    let devices = h.devices(1).await;
    let (_, release) = h.release("6.2.0").await;
    h.orchestrator.tick().await.unwrap();

    let topic = format!("aura/devices/{}/update/status", devices[0].id);
    h.broker.inject(&topic, b"not json");

    let health = h.orchestrator.health().snapshot(&release.id).unwrap();
    assert_eq!(health.devices_observed, 0);
}

// ════════════════════════════════════════════════════════════════════════════
// OVERLAPPING RELEASES
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn recommanded_device_reports_to_newer_release() {
    let h = harness(5).await;
    let devices = h.devices(7).await;
    let (_, older) = h.release("7.0.0").await;
    h.orchestrator.tick().await.unwrap();

    let (_, newer) = h.release("7.1.0").await;
    h.orchestrator.tick().await.unwrap();
    assert_eq!(h.commands().len(), 10);

    h.report(&devices[0].id, "completed");

    let old_health = h.orchestrator.health().snapshot(&older.id).unwrap();
    let new_health = h.orchestrator.health().snapshot(&newer.id).unwrap();
    assert_eq!(old_health.devices_observed, 0);
    assert_eq!(old_health.superseded_count(), 5);
    assert_eq!(old_health.awaiting_reports(), 0);
    assert_eq!(new_health.devices_observed, 1);
    assert_eq!(new_health.awaiting_reports(), 4);
}

#[tokio::test]
async fn overlapping_releases_both_reach_terminal_state() {
    let h = harness(5).await;
    let devices = h.devices(7).await;
    let (_, older) = h.release("8.0.0").await;
    h.orchestrator.tick().await.unwrap();

    // Canary selection is list ordered, so the newer release takes over
    // the same five devices
    let (_, newer) = h.release("8.1.0").await;
    h.orchestrator.tick().await.unwrap();

    for _ in 0..5 {
        for d in &devices {
            h.report(&d.id, "completed");
        }
        h.orchestrator.tick().await.unwrap();
    }

    let older = h.current(&older).await;
    let newer = h.current(&newer).await;
    assert_eq!(older.status, ReleaseStatus::Completed);
    assert_eq!(newer.status, ReleaseStatus::Completed);
    assert_eq!(h.rollbacks(), 0);
    assert!(h.orchestrator.health().is_empty());
}
