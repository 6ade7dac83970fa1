//! Device catalog
//!
//! Runs the one-time permission probe and enumerates video inputs. The
//! catalog owns the session's [`PermissionState`]; the device list is
//! populated once and stays fixed for the session. Concurrent callers
//! share a single probe.

use crate::capture::{CaptureBackend, StreamConstraints};
use crate::error::{MediaError, MediaResult};
use dualcam_core::{CameraDevice, PermissionState};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct DeviceCatalog {
    backend: Arc<dyn CaptureBackend>,
    permission: RwLock<PermissionState>,
    devices: RwLock<Vec<CameraDevice>>,
    probe: Mutex<()>,
}

impl DeviceCatalog {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            permission: RwLock::new(PermissionState::NotYetRequested),
            devices: RwLock::new(Vec::new()),
            probe: Mutex::new(()),
        }
    }

    /// Probe for capture permission, then list video inputs in platform order.
    ///
    /// The probe stream only unlocks device labels and is released before
    /// enumeration. Once the permission is resolved, later calls return the
    /// cached outcome without touching the hardware; calls made while the
    /// probe is running wait for its outcome.
    pub async fn request_permission_and_enumerate(&self) -> MediaResult<Vec<CameraDevice>> {
        let _guard = self.probe.lock().await;
        match self.permission() {
            PermissionState::Granted => return Ok(self.devices()),
            PermissionState::Denied => {
                return Err(MediaError::PermissionDenied {
                    reason: "camera access was denied earlier in this session".to_string(),
                })
            }
            PermissionState::NotYetRequested => {}
        }

        debug!("Requesting capture permission via {}", self.backend.name());
        let mut probe = match self.backend.open_stream(&StreamConstraints::probe()).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.deny(e)),
        };
        probe.release();

        let raw = match self.backend.enumerate_devices().await {
            Ok(raw) => raw,
            Err(e) => return Err(self.deny(e)),
        };

        let devices: Vec<CameraDevice> = raw.iter().filter_map(CameraDevice::from_raw).collect();
        if devices.is_empty() {
            return Err(self.deny(MediaError::PermissionDenied {
                reason: "no video input devices".to_string(),
            }));
        }

        *self.devices.write() = devices.clone();
        self.resolve(PermissionState::Granted);
        info!("Found {} camera(s)", devices.len());
        for device in &devices {
            debug!("  {} ({})", device.label, device.id);
        }

        Ok(devices)
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.read()
    }

    pub fn devices(&self) -> Vec<CameraDevice> {
        self.devices.read().clone()
    }

    pub fn find(&self, device_id: &str) -> Option<CameraDevice> {
        self.devices
            .read()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
    }

    fn deny(&self, cause: MediaError) -> MediaError {
        warn!("Camera permission denied: {}", cause);
        self.resolve(PermissionState::Denied);
        self.devices.write().clear();
        match cause {
            denied @ MediaError::PermissionDenied { .. } => denied,
            other => MediaError::PermissionDenied {
                reason: other.to_string(),
            },
        }
    }

    fn resolve(&self, next: PermissionState) {
        let mut permission = self.permission.write();
        if permission.can_transition_to(next) {
            *permission = next;
        }
    }
}
