//! In-process capture backend for tests, demos and builds without native capture
//!
//! Devices can be made busy, unplugged or zero-sized, permission can be
//! refused, and acquisitions can be held open to reproduce late results.
//! Every track open and stop is counted.

use super::{CaptureBackend, StreamConstraints};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{
    ActiveStream, CaptureTrack, TrackSettings, VideoFrame, VideoPixelFormat, VideoResolution,
};
use async_trait::async_trait;
use dualcam_core::RawDeviceInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// How a mock device answers open requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDeviceBehavior {
    Available,
    /// Claimed by another process
    Busy,
    /// Listed but gone when opened
    Unplugged,
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub info: RawDeviceInfo,
    pub native_resolution: VideoResolution,
    pub behavior: MockDeviceBehavior,
}

impl MockDevice {
    pub fn camera(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            info: RawDeviceInfo::video(device_id, label),
            native_resolution: VideoResolution::HD,
            behavior: MockDeviceBehavior::Available,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<MockDevice>,
    permission_denied: bool,
    open_tracks: HashMap<String, String>,
    opened_total: u64,
    stopped_total: u64,
    open_requests: Vec<Option<String>>,
    pending: usize,
    next_track: u64,
}

/// Mock capture backend
#[derive(Debug, Clone)]
pub struct MockCaptureBackend {
    state: Arc<Mutex<MockState>>,
    hold: watch::Sender<bool>,
}

impl Default for MockCaptureBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MockCaptureBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                ..MockState::default()
            })),
            hold,
        }
    }

    /// Backend with one available camera per label, ids `cam0`, `cam1`, ...
    pub fn with_cameras(labels: &[&str]) -> Self {
        let devices = labels
            .iter()
            .enumerate()
            .map(|(i, label)| MockDevice::camera(format!("cam{}", i), *label))
            .collect();
        Self::new(devices)
    }

    pub fn add_device(&self, device: MockDevice) {
        self.state.lock().devices.push(device);
    }

    /// Refuse every capture request, including the permission probe
    pub fn deny_permission(&self) {
        self.state.lock().permission_denied = true;
    }

    pub fn set_behavior(&self, device_id: &str, behavior: MockDeviceBehavior) {
        if let Some(device) = self.find_device_mut(device_id, |d| d.behavior = behavior) {
            debug!("mock {}: behavior {:?}", device, behavior);
        }
    }

    pub fn set_native_resolution(&self, device_id: &str, resolution: VideoResolution) {
        self.find_device_mut(device_id, |d| d.native_resolution = resolution);
    }

    /// Park every open request until [`resume_acquisitions`] is called
    ///
    /// [`resume_acquisitions`]: MockCaptureBackend::resume_acquisitions
    pub fn hold_acquisitions(&self) {
        self.hold.send_replace(true);
    }

    pub fn resume_acquisitions(&self) {
        self.hold.send_replace(false);
    }

    /// Requests currently parked by [`hold_acquisitions`]
    ///
    /// [`hold_acquisitions`]: MockCaptureBackend::hold_acquisitions
    pub fn pending_acquisitions(&self) -> usize {
        self.state.lock().pending
    }

    /// Live tracks across all devices
    pub fn open_track_count(&self) -> usize {
        self.state.lock().open_tracks.len()
    }

    pub fn open_tracks_for(&self, device_id: &str) -> usize {
        self.state
            .lock()
            .open_tracks
            .values()
            .filter(|d| d.as_str() == device_id)
            .count()
    }

    pub fn opened_total(&self) -> u64 {
        self.state.lock().opened_total
    }

    pub fn stopped_total(&self) -> u64 {
        self.state.lock().stopped_total
    }

    /// Device ids of every open request received, `None` for probes
    pub fn open_requests(&self) -> Vec<Option<String>> {
        self.state.lock().open_requests.clone()
    }

    fn find_device_mut(&self, device_id: &str, f: impl FnOnce(&mut MockDevice)) -> Option<String> {
        let mut state = self.state.lock();
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.info.device_id == device_id)?;
        f(device);
        Some(device.info.device_id.clone())
    }

    async fn wait_until_released(&self) {
        let mut rx = self.hold.subscribe();
        if !*rx.borrow() {
            return;
        }

        self.state.lock().pending += 1;
        // Sender lives in self, so wait_for only fails if self is gone.
        let _ = rx.wait_for(|held| !*held).await;
        self.state.lock().pending -= 1;
    }

    fn open_locked(
        &self,
        state: &mut MockState,
        constraints: &StreamConstraints,
    ) -> MediaResult<ActiveStream> {
        if state.permission_denied {
            return Err(MediaError::PermissionDenied {
                reason: "capture access refused".to_string(),
            });
        }

        let device = match &constraints.device_id {
            Some(id) => state
                .devices
                .iter()
                .find(|d| &d.info.device_id == id)
                .cloned()
                .ok_or_else(|| MediaError::DeviceUnavailable {
                    device_id: id.clone(),
                })?,
            None => state
                .devices
                .iter()
                .find(|d| d.behavior == MockDeviceBehavior::Available)
                .cloned()
                .ok_or_else(|| MediaError::PermissionDenied {
                    reason: "no capture device".to_string(),
                })?,
        };

        let device_id = device.info.device_id.clone();
        match device.behavior {
            MockDeviceBehavior::Available => {}
            MockDeviceBehavior::Busy => return Err(MediaError::DeviceBusy { device_id }),
            MockDeviceBehavior::Unplugged => {
                return Err(MediaError::DeviceUnavailable { device_id })
            }
        }

        state.next_track += 1;
        let track_id = format!("mock-track-{}", state.next_track);
        state.open_tracks.insert(track_id.clone(), device_id.clone());
        state.opened_total += 1;

        let track = MockTrack {
            id: track_id,
            device_id: device_id.clone(),
            settings: TrackSettings {
                resolution: device.native_resolution,
                frame_rate: Some(constraints.frame_rate),
            },
            live: AtomicBool::new(true),
            backend: self.state.clone(),
        };

        Ok(ActiveStream::new(device_id, vec![Arc::new(track)]))
    }
}

#[async_trait]
impl CaptureBackend for MockCaptureBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> MediaResult<ActiveStream> {
        self.state
            .lock()
            .open_requests
            .push(constraints.device_id.clone());

        self.wait_until_released().await;

        let mut state = self.state.lock();
        self.open_locked(&mut state, constraints)
    }

    async fn enumerate_devices(&self) -> MediaResult<Vec<RawDeviceInfo>> {
        let state = self.state.lock();
        if state.permission_denied {
            return Err(MediaError::PermissionDenied {
                reason: "capture access refused".to_string(),
            });
        }
        Ok(state.devices.iter().map(|d| d.info.clone()).collect())
    }
}

#[derive(Debug)]
struct MockTrack {
    id: String,
    device_id: String,
    settings: TrackSettings,
    live: AtomicBool,
    backend: Arc<Mutex<MockState>>,
}

#[async_trait]
impl CaptureTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn grab_frame(&self) -> MediaResult<VideoFrame> {
        if !self.is_live() {
            return Err(MediaError::CaptureNotActive);
        }

        let VideoResolution { width, height } = self.settings.resolution;
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x % 256) as u8);
                data.push((y % 256) as u8);
                data.push(0x80);
            }
        }

        Ok(VideoFrame {
            width,
            height,
            format: VideoPixelFormat::RGB24,
            data,
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
        })
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            let mut state = self.backend.lock();
            state.open_tracks.remove(&self.id);
            state.stopped_total += 1;
        }
    }
}
