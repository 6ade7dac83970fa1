//! Camera session
//!
//! [`CameraSession`] ties the device catalog, one [`SlotController`] per
//! slot and the presentation-only mirror flags together, and exposes the
//! intents a user interface issues. Every slot-scoped intent is gated on
//! the session permission; slot failures stay on their slot.

use crate::config::SessionConfig;
use crate::event::{EventStream, SessionEvent};
use crate::view::{SessionView, SlotView};
use dualcam_core::{CameraDevice, DualCamError, PermissionState, SlotId, TrackLedger};
use dualcam_media::snapshot as capture_snapshot;
use dualcam_media::{
    get_platform_backend, CaptureBackend, DeviceCatalog, MediaError, SlotController,
    SlotSnapshot, SnapshotWriter, StartOutcome, ToggleOutcome,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[cfg(feature = "diagnostics")]
use dualcam_diagnostics::SessionReport;

/// Outcome of starting one slot during [`CameraSession::apply_selections`]
pub type SlotStartResult = (SlotId, Result<StartOutcome, DualCamError>);

/// A dual-slot camera session
pub struct CameraSession {
    config: SessionConfig,
    backend: Arc<dyn CaptureBackend>,
    catalog: DeviceCatalog,
    ledger: Arc<TrackLedger>,
    slots: Vec<SlotController>,
    mirrored: RwLock<Vec<bool>>,
    writer: SnapshotWriter,
    events: broadcast::Sender<SessionEvent>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    init: tokio::sync::Mutex<()>,
}

impl CameraSession {
    /// Create a session on `backend`. No hardware is touched until
    /// [`initialize`](CameraSession::initialize).
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        config: SessionConfig,
    ) -> Result<Self, DualCamError> {
        config.validate()?;

        let ledger = Arc::new(TrackLedger::new());
        let settings = config.capture_settings();
        let slot_ids: Vec<SlotId> = (0..config.slot_count)
            .filter_map(SlotId::from_index)
            .collect();

        let slots = slot_ids
            .iter()
            .map(|&slot| SlotController::new(slot, backend.clone(), ledger.clone(), settings))
            .collect();
        let mirrored = slot_ids
            .iter()
            .map(|&slot| config.mirrored_for(slot))
            .collect();
        let (events, _) = broadcast::channel(config.event_capacity);

        info!(
            "Created camera session with {} slot(s) on {} backend",
            slot_ids.len(),
            backend.name()
        );

        Ok(Self {
            catalog: DeviceCatalog::new(backend.clone()),
            writer: SnapshotWriter::new(config.snapshot_dir.clone()),
            backend,
            ledger,
            slots,
            mirrored: RwLock::new(mirrored),
            events,
            forwarders: Mutex::new(Vec::new()),
            init: tokio::sync::Mutex::new(()),
            config,
        })
    }

    /// Create a session on the platform's default capture backend
    pub fn with_platform_backend(config: SessionConfig) -> Result<Self, DualCamError> {
        Self::new(get_platform_backend(), config)
    }

    /// Run the permission probe and enumerate cameras.
    ///
    /// On the first successful call device N is selected for slot N, and
    /// with `auto_start` every selected slot is started. Start failures
    /// stay on their slot and do not fail this call. A denied probe is
    /// terminal for the session. Concurrent calls wait for the first one
    /// and return its outcome. Must be called from within a Tokio runtime.
    pub async fn initialize(&self) -> Result<Vec<CameraDevice>, DualCamError> {
        let _guard = self.init.lock().await;
        self.spawn_forwarders();

        let before = self.catalog.permission();
        let result = self.catalog.request_permission_and_enumerate().await;
        let after = self.catalog.permission();
        if after != before {
            info!("Camera permission {}", after);
            self.emit(SessionEvent::PermissionChanged { state: after });
        }

        let devices = result.map_err(DualCamError::from)?;
        if before.is_resolved() {
            return Ok(devices);
        }

        self.emit(SessionEvent::DevicesEnumerated {
            devices: devices.clone(),
        });

        for (controller, device) in self.slots.iter().zip(&devices) {
            controller.reassign_device(Some(&device.id));
            self.emit(SessionEvent::SelectionChanged {
                slot: controller.slot(),
                device_id: Some(device.id.clone()),
            });
        }

        if self.config.auto_start {
            self.apply_selections().await?;
        }

        Ok(devices)
    }

    /// Session permission state
    pub fn permission(&self) -> PermissionState {
        self.catalog.permission()
    }

    /// Enumerated cameras, empty until permission is granted
    pub fn devices(&self) -> Vec<CameraDevice> {
        self.catalog.devices()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Slot ids of this session, in order
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(SlotController::slot).collect()
    }

    /// Controller of `slot`
    pub fn slot(&self, slot: SlotId) -> Result<&SlotController, DualCamError> {
        self.slots
            .get(slot.index())
            .ok_or(DualCamError::InvalidSlot {
                slot: slot.number(),
                slot_count: self.slots.len(),
            })
    }

    /// Open `device_id` on `slot`, replacing whatever the slot holds.
    ///
    /// An empty id is a no-op. Device failures are returned and leave the
    /// slot `Failed`; the other slot is unaffected.
    pub async fn start(&self, slot: SlotId, device_id: &str) -> Result<StartOutcome, DualCamError> {
        let controller = self.slot(slot)?;
        self.ensure_granted()?;
        Ok(controller.start(device_id).await?)
    }

    /// Release the slot's stream and return it to idle.
    ///
    /// Allowed in every permission state. Returns the number of hardware
    /// tracks stopped.
    pub fn stop(&self, slot: SlotId) -> Result<u32, DualCamError> {
        Ok(self.slot(slot)?.stop())
    }

    /// Stop an active slot, otherwise start its selected device
    pub async fn toggle(&self, slot: SlotId) -> Result<ToggleOutcome, DualCamError> {
        let controller = self.slot(slot)?;
        self.ensure_granted()?;
        Ok(controller.toggle().await?)
    }

    /// Change the device selected for `slot` and stop the slot.
    ///
    /// `None` or an empty id unassigns the slot. Never opens hardware.
    pub fn reassign_device(&self, slot: SlotId, device_id: Option<&str>) -> Result<(), DualCamError> {
        let controller = self.slot(slot)?;
        self.ensure_granted()?;

        let before = controller.selection();
        controller.reassign_device(device_id);
        let after = controller.selection();
        if after != before {
            self.emit(SessionEvent::SelectionChanged {
                slot,
                device_id: after,
            });
        }
        Ok(())
    }

    /// Start every slot on its current selection.
    ///
    /// Slots start concurrently; unassigned slots are skipped with
    /// [`StartOutcome::NoDevice`]. One entry per slot, in slot order.
    pub async fn apply_selections(&self) -> Result<Vec<SlotStartResult>, DualCamError> {
        self.ensure_granted()?;

        let starts = self.slots.iter().map(|controller| async move {
            let result = controller.start_selected().await;
            (controller.slot(), result.map_err(DualCamError::from))
        });
        Ok(join_all(starts).await)
    }

    /// Save a PNG of the slot's current frame.
    ///
    /// Returns `Ok(None)` when the slot holds no stream or when the frame
    /// could not be encoded. Never changes slot state.
    pub async fn snapshot(&self, slot: SlotId) -> Result<Option<PathBuf>, DualCamError> {
        let controller = self.slot(slot)?;

        match capture_snapshot(controller, &self.writer).await {
            Ok(Some(path)) => {
                self.emit(SessionEvent::SnapshotSaved {
                    slot,
                    path: path.clone(),
                });
                Ok(Some(path))
            }
            Ok(None) => Ok(None),
            Err(err @ (MediaError::CaptureEncodeFailure { .. } | MediaError::CaptureNotActive)) => {
                debug!("{}: snapshot dropped: {}", slot, err);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Flip the slot's rendered video. Presentation only.
    pub fn set_mirrored(&self, slot: SlotId, mirrored: bool) -> Result<(), DualCamError> {
        self.slot(slot)?;

        let changed = {
            let mut flags = self.mirrored.write();
            let flag = &mut flags[slot.index()];
            let changed = *flag != mirrored;
            *flag = mirrored;
            changed
        };

        if changed {
            debug!("{}: mirrored {}", slot, mirrored);
            self.emit(SessionEvent::MirrorChanged { slot, mirrored });
        }
        Ok(())
    }

    /// Whether the slot renders mirrored
    pub fn mirrored(&self, slot: SlotId) -> Result<bool, DualCamError> {
        self.slot(slot)?;
        Ok(self.mirrored.read()[slot.index()])
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Watch the snapshots of one slot
    pub fn watch_slot(&self, slot: SlotId) -> Result<watch::Receiver<SlotSnapshot>, DualCamError> {
        Ok(self.slot(slot)?.subscribe())
    }

    /// Render model of the session
    pub fn view(&self) -> SessionView {
        let devices = self.catalog.devices();
        let mirrored = self.mirrored.read().clone();
        let slots = self
            .slots
            .iter()
            .zip(mirrored)
            .map(|(controller, mirrored)| SlotView::new(&controller.snapshot(), mirrored, &devices))
            .collect();

        SessionView {
            screen: self.catalog.permission().into(),
            devices,
            slots,
        }
    }

    /// Hardware track ledger shared by the slots
    pub fn ledger(&self) -> &TrackLedger {
        &self.ledger
    }

    /// Diagnostics report of the current session state
    #[cfg(feature = "diagnostics")]
    pub fn report(&self) -> SessionReport {
        let snapshots: Vec<SlotSnapshot> = self.slots.iter().map(SlotController::snapshot).collect();
        SessionReport::collect(
            self.backend.name(),
            self.catalog.permission(),
            self.catalog.devices().len(),
            &snapshots,
            &self.ledger,
        )
    }

    /// Stop every slot. Returns the number of hardware tracks stopped.
    pub fn shutdown(&self) -> u32 {
        let released: u32 = self.slots.iter().map(SlotController::stop).sum();
        info!("Camera session shut down, released {} track(s)", released);
        released
    }

    fn ensure_granted(&self) -> Result<(), DualCamError> {
        match self.catalog.permission() {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(DualCamError::PermissionDenied {
                reason: "camera access was denied for this session".to_string(),
            }),
            actual @ PermissionState::NotYetRequested => Err(DualCamError::InvalidState {
                expected: PermissionState::Granted.to_string(),
                actual: actual.to_string(),
            }),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn spawn_forwarders(&self) {
        let mut forwarders = self.forwarders.lock();
        if !forwarders.is_empty() {
            return;
        }

        for controller in &self.slots {
            let mut updates = controller.subscribe();
            let events = self.events.clone();
            forwarders.push(tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let snapshot = updates.borrow_and_update().clone();
                    let _ = events.send(SessionEvent::SlotStateChanged { snapshot });
                }
            }));
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        for forwarder in self.forwarders.lock().drain(..) {
            forwarder.abort();
        }
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("backend", &self.backend.name())
            .field("permission", &self.catalog.permission())
            .field("slots", &self.slots.len())
            .finish()
    }
}
