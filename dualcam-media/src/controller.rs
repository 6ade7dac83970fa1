//! Slot stream controller
//!
//! Owns the lifecycle of the single live stream a display slot may hold:
//!
//! ```text
//! Idle --start--> Acquiring --ok--> Active
//!                           \--err-> Failed
//! Active | Failed | Acquiring --stop--> Idle
//! Active --start--> Acquiring   (old stream released first)
//! ```
//!
//! Each `start` is tagged with a per-slot request number. An acquisition
//! that resolves after a newer `start`, `stop` or `reassign_device` has
//! been issued is released immediately and never reaches the slot state.
//! State changes are published as [`SlotSnapshot`]s on a watch channel.

use crate::capture::{CaptureBackend, StreamConstraints};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{ActiveStream, CaptureTrack, VideoResolution};
use dualcam_core::{SlotId, TrackLedger};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Capture hints applied to every stream a slot opens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub ideal_resolution: VideoResolution,
    pub frame_rate: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ideal_resolution: VideoResolution::HD,
            frame_rate: 30.0,
        }
    }
}

/// Why a slot failed, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotFailure {
    /// User-facing message
    pub message: String,
    /// Diagnostic code of the underlying error
    pub code: &'static str,
}

impl SlotFailure {
    fn from_error(err: &MediaError) -> Self {
        Self {
            message: err.user_message(),
            code: err.code(),
        }
    }
}

/// Owned state of one slot.
///
/// Stream and error can never be set together, and the transitional
/// `Acquiring` state carries neither.
#[derive(Debug, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Acquiring {
        request: u64,
        device_id: String,
    },
    Active(ActiveStream),
    Failed(SlotFailure),
}

impl SlotState {
    pub fn stream(&self) -> Option<&ActiveStream> {
        match self {
            SlotState::Active(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SlotState::Failed(failure) => Some(&failure.message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SlotState::Acquiring { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SlotState::Active(_))
    }

    fn status(&self) -> SlotStatus {
        match self {
            SlotState::Idle => SlotStatus::Idle,
            SlotState::Acquiring { device_id, .. } => SlotStatus::Acquiring {
                device_id: device_id.clone(),
            },
            SlotState::Active(stream) => SlotStatus::Active {
                stream_id: stream.id().to_string(),
                device_id: stream.device_id().to_string(),
                resolution: stream.resolution(),
            },
            SlotState::Failed(failure) => SlotStatus::Failed(failure.clone()),
        }
    }
}

/// Observable status of a slot, without ownership of the stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SlotStatus {
    Idle,
    Acquiring {
        device_id: String,
    },
    Active {
        stream_id: String,
        device_id: String,
        resolution: Option<VideoResolution>,
    },
    Failed(SlotFailure),
}

/// State published to observers after every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    pub slot: SlotId,
    pub status: SlotStatus,
    /// Device the slot starts on toggle; `None` means unassigned
    pub selection: Option<String>,
    /// Increments on every published change
    pub revision: u64,
}

impl SlotSnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, SlotStatus::Acquiring { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SlotStatus::Active { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.status, SlotStatus::Idle)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SlotStatus::Failed(failure) => Some(&failure.message),
            _ => None,
        }
    }

    pub fn stream_id(&self) -> Option<&str> {
        match &self.status {
            SlotStatus::Active { stream_id, .. } => Some(stream_id),
            _ => None,
        }
    }
}

/// Result of a `start` call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The slot now holds the new stream
    Active,
    /// A newer operation ran while acquiring; the stream was released
    Superseded,
    /// Empty device id; nothing happened
    NoDevice,
}

/// Result of a `toggle` call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Stopped,
    Started(StartOutcome),
}

struct SlotCell {
    state: SlotState,
    selection: Option<String>,
    latest_request: u64,
    revision: u64,
}

struct SlotInner {
    slot: SlotId,
    backend: Arc<dyn CaptureBackend>,
    ledger: Arc<TrackLedger>,
    settings: CaptureSettings,
    cell: Mutex<SlotCell>,
    snapshots: watch::Sender<SlotSnapshot>,
}

/// Controller for one display slot. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct SlotController {
    inner: Arc<SlotInner>,
}

impl SlotController {
    pub fn new(
        slot: SlotId,
        backend: Arc<dyn CaptureBackend>,
        ledger: Arc<TrackLedger>,
        settings: CaptureSettings,
    ) -> Self {
        let (snapshots, _) = watch::channel(SlotSnapshot {
            slot,
            status: SlotStatus::Idle,
            selection: None,
            revision: 0,
        });

        Self {
            inner: Arc::new(SlotInner {
                slot,
                backend,
                ledger,
                settings,
                cell: Mutex::new(SlotCell {
                    state: SlotState::Idle,
                    selection: None,
                    latest_request: 0,
                    revision: 0,
                }),
                snapshots,
            }),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.inner.slot
    }

    /// Open `device_id` on this slot.
    ///
    /// Any stream the slot holds is released before the new request is
    /// issued. An empty id is a no-op. On failure the slot moves to
    /// `Failed` and the error is returned; the sibling slot is untouched.
    pub async fn start(&self, device_id: &str) -> MediaResult<StartOutcome> {
        let slot = self.inner.slot;
        if device_id.is_empty() {
            debug!("{}: start ignored, no device assigned", slot);
            return Ok(StartOutcome::NoDevice);
        }

        let settings = self.inner.settings;
        let constraints =
            StreamConstraints::for_device(device_id, settings.ideal_resolution, settings.frame_rate);
        constraints.validate()?;

        let (request, previous) = {
            let mut cell = self.inner.cell.lock();
            let previous = take_stream(&mut cell);
            cell.latest_request += 1;
            let request = cell.latest_request;
            cell.state = SlotState::Acquiring {
                request,
                device_id: device_id.to_string(),
            };
            self.publish(&mut cell);
            (request, previous)
        };
        self.release_stream(previous);

        info!("{}: acquiring {} (request {})", slot, device_id, request);
        let result = self.inner.backend.open_stream(&constraints).await;

        let mut cell = self.inner.cell.lock();
        if cell.latest_request != request {
            drop(cell);
            if let Ok(mut stream) = result {
                stream.release();
            }
            debug!(
                "{}: discarded superseded acquisition of {} (request {})",
                slot, device_id, request
            );
            return Ok(StartOutcome::Superseded);
        }

        match result {
            Ok(stream) => {
                self.inner.ledger.record_open(slot, stream.track_count());
                info!(
                    "{}: active on {} ({})",
                    slot,
                    device_id,
                    stream
                        .resolution()
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "unknown size".to_string())
                );
                cell.state = SlotState::Active(stream);
                self.publish(&mut cell);
                Ok(StartOutcome::Active)
            }
            Err(err) => {
                warn!("{}: could not open {}: {}", slot, device_id, err);
                cell.state = SlotState::Failed(SlotFailure::from_error(&err));
                self.publish(&mut cell);
                Err(err)
            }
        }
    }

    /// Release the held stream, if any, and return to `Idle`.
    ///
    /// Hardware is released before this returns. An acquisition still in
    /// flight is invalidated and will be released when it resolves.
    /// Returns the number of hardware tracks stopped.
    pub fn stop(&self) -> u32 {
        let previous = {
            let mut cell = self.inner.cell.lock();
            let was_idle = matches!(cell.state, SlotState::Idle);
            let previous = take_stream(&mut cell);
            cell.latest_request += 1;

            if !was_idle {
                cell.state = SlotState::Idle;
                self.publish(&mut cell);
            }
            previous
        };

        let released = self.release_stream(previous);
        if released > 0 {
            info!("{}: stopped", self.inner.slot);
        }
        released
    }

    /// Stop when active, otherwise start the selected device
    pub async fn toggle(&self) -> MediaResult<ToggleOutcome> {
        let selection = {
            let cell = self.inner.cell.lock();
            if cell.state.is_active() {
                None
            } else {
                Some(cell.selection.clone().unwrap_or_default())
            }
        };

        match selection {
            None => {
                self.stop();
                Ok(ToggleOutcome::Stopped)
            }
            Some(device_id) => self.start(&device_id).await.map(ToggleOutcome::Started),
        }
    }

    /// Change the selected device and stop the slot. Never opens hardware.
    pub fn reassign_device(&self, device_id: Option<&str>) {
        let selection = device_id.filter(|id| !id.is_empty()).map(str::to_string);
        {
            let mut cell = self.inner.cell.lock();
            if cell.selection != selection {
                debug!("{}: selection {:?} -> {:?}", self.inner.slot, cell.selection, selection);
                cell.selection = selection;
                self.publish(&mut cell);
            }
        }
        self.stop();
    }

    /// Start the currently selected device
    pub async fn start_selected(&self) -> MediaResult<StartOutcome> {
        let selection = self.selection().unwrap_or_default();
        self.start(&selection).await
    }

    pub fn selection(&self) -> Option<String> {
        self.inner.cell.lock().selection.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.cell.lock().state.is_active()
    }

    /// Track to read snapshot frames from, when active
    pub fn frame_source(&self) -> Option<Arc<dyn CaptureTrack>> {
        self.inner
            .cell
            .lock()
            .state
            .stream()
            .and_then(ActiveStream::frame_source)
    }

    /// Inspect the owned state
    pub fn with_state<R>(&self, f: impl FnOnce(&SlotState) -> R) -> R {
        f(&self.inner.cell.lock().state)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SlotSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Stop a stream taken out of the slot. Call without the slot lock held.
    fn release_stream(&self, stream: Option<ActiveStream>) -> u32 {
        let Some(mut stream) = stream else {
            return 0;
        };

        let released = stream.release();
        self.inner.ledger.record_release(self.inner.slot, released);
        debug!(
            "{}: released stream {} on {}",
            self.inner.slot,
            stream.id(),
            stream.device_id()
        );
        released
    }

    fn publish(&self, cell: &mut SlotCell) {
        cell.revision += 1;
        self.inner.snapshots.send_replace(SlotSnapshot {
            slot: self.inner.slot,
            status: cell.state.status(),
            selection: cell.selection.clone(),
            revision: cell.revision,
        });
    }
}

/// Move the held stream out of the slot, leaving it `Idle`
fn take_stream(cell: &mut SlotCell) -> Option<ActiveStream> {
    if !cell.state.is_active() {
        return None;
    }

    match std::mem::take(&mut cell.state) {
        SlotState::Active(stream) => Some(stream),
        _ => None,
    }
}

impl std::fmt::Debug for SlotController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotController")
            .field("slot", &self.inner.slot)
            .field("backend", &self.inner.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::MockCaptureBackend;

    fn controller(backend: &MockCaptureBackend) -> SlotController {
        SlotController::new(
            SlotId::FIRST,
            Arc::new(backend.clone()),
            Arc::new(TrackLedger::new()),
            CaptureSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_start_publishes_acquiring_then_active() {
        let backend = MockCaptureBackend::with_cameras(&["Front"]);
        let slot = controller(&backend);
        let mut rx = slot.subscribe();

        assert_eq!(slot.start("cam0").await.unwrap(), StartOutcome::Active);

        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.is_active());
        assert_eq!(snapshot.revision, 2);
        assert!(slot.with_state(|s| s.stream().is_some() && s.error().is_none()));
    }

    #[tokio::test]
    async fn test_stop_publishes_idle() {
        let backend = MockCaptureBackend::with_cameras(&["Front"]);
        let slot = controller(&backend);
        slot.start("cam0").await.unwrap();
        let mut rx = slot.subscribe();
        let revision = rx.borrow().revision;

        assert_eq!(slot.stop(), 1);

        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert!(published.is_idle());
        assert_eq!(published.revision, revision + 1);
        assert!(slot.with_state(|s| matches!(s, SlotState::Idle)));
    }

    #[tokio::test]
    async fn test_restart_publishes_acquiring_over_active() {
        let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
        let slot = controller(&backend);
        slot.start("cam0").await.unwrap();

        slot.start("cam1").await.unwrap();

        let snapshot = slot.snapshot();
        assert_eq!(snapshot.revision, 4);
        assert!(matches!(
            snapshot.status,
            SlotStatus::Active { ref device_id, .. } if device_id == "cam1"
        ));
    }

    /// Track whose stop reads the slot it belongs to
    #[derive(Debug)]
    struct ReentrantTrack {
        slot: Arc<Mutex<Option<SlotController>>>,
        active_during_stop: Arc<Mutex<Option<bool>>>,
    }

    #[async_trait::async_trait]
    impl CaptureTrack for ReentrantTrack {
        fn id(&self) -> &str {
            "reentrant"
        }

        fn device_id(&self) -> &str {
            "cam0"
        }

        fn settings(&self) -> crate::tracks::TrackSettings {
            crate::tracks::TrackSettings {
                resolution: VideoResolution::VGA,
                frame_rate: None,
            }
        }

        fn is_live(&self) -> bool {
            true
        }

        async fn grab_frame(&self) -> MediaResult<crate::tracks::VideoFrame> {
            Err(MediaError::CaptureNotActive)
        }

        fn stop(&self) {
            let slot = self.slot.lock().clone();
            if let Some(slot) = slot {
                *self.active_during_stop.lock() = Some(slot.is_active());
            }
        }
    }

    struct ReentrantBackend {
        slot: Arc<Mutex<Option<SlotController>>>,
        active_during_stop: Arc<Mutex<Option<bool>>>,
    }

    #[async_trait::async_trait]
    impl CaptureBackend for ReentrantBackend {
        fn name(&self) -> &str {
            "reentrant"
        }

        async fn open_stream(&self, _: &StreamConstraints) -> MediaResult<ActiveStream> {
            let track = ReentrantTrack {
                slot: self.slot.clone(),
                active_during_stop: self.active_during_stop.clone(),
            };
            Ok(ActiveStream::new("cam0", vec![Arc::new(track)]))
        }

        async fn enumerate_devices(&self) -> MediaResult<Vec<dualcam_core::RawDeviceInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_hardware_stops_outside_slot_lock() {
        let shared = Arc::new(Mutex::new(None));
        let active_during_stop = Arc::new(Mutex::new(None));
        let backend = ReentrantBackend {
            slot: shared.clone(),
            active_during_stop: active_during_stop.clone(),
        };
        let slot = SlotController::new(
            SlotId::FIRST,
            Arc::new(backend),
            Arc::new(TrackLedger::new()),
            CaptureSettings::default(),
        );
        *shared.lock() = Some(slot.clone());
        tokio_test::block_on(slot.start("cam0")).unwrap();

        // A track stop that re-enters the slot deadlocks if the lock is held
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let stopping = slot.clone();
        std::thread::spawn(move || {
            let _ = done_tx.send(stopping.stop());
        });
        let released = done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("stop blocked on the slot lock");

        assert_eq!(released, 1);
        assert_eq!(*active_during_stop.lock(), Some(false));
        shared.lock().take();
    }

    #[tokio::test]
    async fn test_failed_state_has_no_stream() {
        let backend = MockCaptureBackend::with_cameras(&["Front"]);
        let slot = controller(&backend);

        let err = slot.start("missing").await.unwrap_err();
        assert!(matches!(err, MediaError::DeviceUnavailable { .. }));
        slot.with_state(|s| {
            assert!(s.stream().is_none());
            assert!(s.error().is_some());
            assert!(!s.is_loading());
        });
    }

    #[tokio::test]
    async fn test_stop_on_failed_resets_to_idle() {
        let backend = MockCaptureBackend::with_cameras(&["Front"]);
        let slot = controller(&backend);
        let _ = slot.start("missing").await;

        assert_eq!(slot.stop(), 0);
        assert!(slot.snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_reassign_unassigns_on_empty_id() {
        let backend = MockCaptureBackend::with_cameras(&["Front"]);
        let slot = controller(&backend);

        slot.reassign_device(Some("cam0"));
        assert_eq!(slot.selection().as_deref(), Some("cam0"));
        slot.reassign_device(Some(""));
        assert_eq!(slot.selection(), None);
        assert_eq!(slot.toggle().await.unwrap(), ToggleOutcome::Started(StartOutcome::NoDevice));
    }
}
