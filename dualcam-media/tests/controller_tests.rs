//! Slot stream controller lifecycle tests
//!
//! Exercises the controller against the mock backend: state shape,
//! hardware release on every transition, slot independence and late
//! acquisition results.

use dualcam_core::{SlotId, TrackLedger};
use dualcam_media::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn controller(slot: SlotId, backend: &MockCaptureBackend, ledger: &Arc<TrackLedger>) -> SlotController {
    SlotController::new(
        slot,
        Arc::new(backend.clone()),
        ledger.clone(),
        CaptureSettings::default(),
    )
}

async fn wait_for_pending(backend: &MockCaptureBackend, count: usize) {
    for _ in 0..1000 {
        if backend.pending_acquisitions() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("acquisitions never reached the backend");
}

fn assert_state_shape(slot: &SlotController) {
    slot.with_state(|state| {
        assert!(!(state.stream().is_some() && state.error().is_some()));
        if state.is_loading() {
            assert!(state.stream().is_none());
            assert!(state.error().is_none());
        }
    });
}

// ============================================================================
// STATE SHAPE
// ============================================================================

#[tokio::test]
async fn test_state_shape_holds_through_lifecycle() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    backend.set_behavior("cam1", MockDeviceBehavior::Busy);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);

    assert_state_shape(&slot);
    slot.start("cam0").await.unwrap();
    assert_state_shape(&slot);
    let _ = slot.start("cam1").await;
    assert_state_shape(&slot);
    slot.toggle().await.unwrap();
    assert_state_shape(&slot);
    slot.stop();
    assert_state_shape(&slot);
}

#[tokio::test]
async fn test_loading_is_visible_while_acquiring() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    backend.hold_acquisitions();

    let pending = tokio::spawn({
        let slot = slot.clone();
        async move { slot.start("cam0").await }
    });
    wait_for_pending(&backend, 1).await;

    let snapshot = slot.snapshot();
    assert!(snapshot.is_loading());
    assert!(snapshot.error().is_none());
    assert!(snapshot.stream_id().is_none());
    assert_state_shape(&slot);

    backend.resume_acquisitions();
    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Active);
    assert!(slot.snapshot().is_active());
}

// ============================================================================
// HARDWARE RELEASE
// ============================================================================

#[tokio::test]
async fn test_restart_releases_previous_track() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);

    slot.start("cam0").await.unwrap();
    slot.start("cam1").await.unwrap();

    assert_eq!(backend.open_tracks_for("cam0"), 0);
    assert_eq!(backend.open_tracks_for("cam1"), 1);
    assert_eq!(backend.stopped_total(), 1);

    let usage = ledger.usage(SlotId::FIRST);
    assert_eq!(usage.peak_live, 1);
    assert_eq!(usage.live, 1);
    assert!(ledger.warnings().is_empty());
}

#[tokio::test]
async fn test_restart_into_failure_still_releases() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    backend.set_behavior("cam1", MockDeviceBehavior::Unplugged);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);

    slot.start("cam0").await.unwrap();
    let err = slot.start("cam1").await.unwrap_err();

    assert!(matches!(err, MediaError::DeviceUnavailable { .. }));
    assert_eq!(backend.open_track_count(), 0);
    assert_eq!(ledger.usage(SlotId::FIRST).live, 0);
}

#[tokio::test]
async fn test_stop_on_idle_touches_no_hardware() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    let before = slot.snapshot();

    assert_eq!(slot.stop(), 0);
    assert_eq!(slot.stop(), 0);

    assert!(backend.open_requests().is_empty());
    assert_eq!(backend.stopped_total(), 0);
    assert_eq!(slot.snapshot(), before);
}

#[tokio::test]
async fn test_toggle_stops_active_slot() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    slot.reassign_device(Some("cam0"));

    assert_eq!(
        slot.toggle().await.unwrap(),
        ToggleOutcome::Started(StartOutcome::Active)
    );
    assert_eq!(slot.toggle().await.unwrap(), ToggleOutcome::Stopped);

    assert!(slot.snapshot().is_idle());
    assert_eq!(backend.open_tracks_for("cam0"), 0);
    assert_eq!(backend.stopped_total(), 1);
}

#[tokio::test]
async fn test_toggle_retries_failed_slot() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    backend.set_behavior("cam0", MockDeviceBehavior::Busy);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    slot.reassign_device(Some("cam0"));

    assert!(slot.toggle().await.is_err());
    assert!(slot.snapshot().error().is_some());

    backend.set_behavior("cam0", MockDeviceBehavior::Available);
    slot.toggle().await.unwrap();
    assert!(slot.snapshot().is_active());
}

// ============================================================================
// SELECTION
// ============================================================================

#[tokio::test]
async fn test_reassign_stops_without_opening() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);

    slot.start("cam0").await.unwrap();
    let requests = backend.open_requests().len();

    slot.reassign_device(Some("cam1"));

    assert!(slot.snapshot().is_idle());
    assert_eq!(slot.selection().as_deref(), Some("cam1"));
    assert_eq!(backend.open_requests().len(), requests);
    assert_eq!(backend.open_track_count(), 0);

    slot.start_selected().await.unwrap();
    assert_eq!(backend.open_tracks_for("cam1"), 1);
}

#[tokio::test]
async fn test_empty_device_is_a_no_op() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::SECOND, &backend, &ledger);

    assert_eq!(slot.start("").await.unwrap(), StartOutcome::NoDevice);
    assert!(slot.snapshot().is_idle());
    assert_eq!(slot.snapshot().revision, 0);
    assert!(backend.open_requests().is_empty());
}

// ============================================================================
// SLOT INDEPENDENCE
// ============================================================================

#[tokio::test]
async fn test_two_slots_two_devices() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let first = controller(SlotId::FIRST, &backend, &ledger);
    let second = controller(SlotId::SECOND, &backend, &ledger);

    first.start("cam0").await.unwrap();
    second.start("cam1").await.unwrap();

    let a = first.snapshot();
    let b = second.snapshot();
    assert!(a.is_active() && b.is_active());
    assert_ne!(a.stream_id(), b.stream_id());
    assert_eq!(ledger.total_live(), 2);
}

#[tokio::test]
async fn test_operations_on_one_slot_leave_the_other_alone() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let first = controller(SlotId::FIRST, &backend, &ledger);
    let second = controller(SlotId::SECOND, &backend, &ledger);

    second.start("cam1").await.unwrap();
    let untouched = second.snapshot();

    first.start("cam0").await.unwrap();
    first.reassign_device(Some("cam1"));
    let _ = first.start("missing").await;
    first.toggle().await.unwrap();
    first.stop();

    assert_eq!(second.snapshot(), untouched);
    assert_eq!(backend.open_tracks_for("cam1"), 1);
    assert_eq!(ledger.usage(SlotId::SECOND).live, 1);
}

#[tokio::test]
async fn test_busy_device_fails_only_its_slot() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    backend.set_behavior("cam0", MockDeviceBehavior::Busy);
    let ledger = Arc::new(TrackLedger::new());
    let first = controller(SlotId::FIRST, &backend, &ledger);
    let second = controller(SlotId::SECOND, &backend, &ledger);

    second.start("cam1").await.unwrap();
    let err = first.start("cam0").await.unwrap_err();

    assert!(matches!(err, MediaError::DeviceBusy { .. }));
    let failed = first.snapshot();
    assert_eq!(failed.error(), Some(OPEN_CAMERA_FAILED_MESSAGE));
    assert!(matches!(
        failed.status,
        SlotStatus::Failed(SlotFailure { code: "DEVICE_BUSY", .. })
    ));
    assert!(second.snapshot().is_active());
}

// ============================================================================
// LATE ACQUISITION RESULTS
// ============================================================================

#[tokio::test]
async fn test_stop_while_acquiring_releases_late_stream() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    backend.hold_acquisitions();

    let pending = tokio::spawn({
        let slot = slot.clone();
        async move { slot.start("cam0").await }
    });
    wait_for_pending(&backend, 1).await;

    slot.stop();
    assert!(slot.snapshot().is_idle());

    backend.resume_acquisitions();
    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Superseded);

    assert!(slot.snapshot().is_idle());
    assert_eq!(backend.opened_total(), 1);
    assert_eq!(backend.open_track_count(), 0);
    assert_eq!(ledger.usage(SlotId::FIRST).live, 0);
}

#[tokio::test]
async fn test_reassign_while_acquiring_discards_result() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    backend.hold_acquisitions();

    let pending = tokio::spawn({
        let slot = slot.clone();
        async move { slot.start("cam0").await }
    });
    wait_for_pending(&backend, 1).await;

    slot.reassign_device(Some("cam1"));
    backend.resume_acquisitions();

    assert_eq!(pending.await.unwrap().unwrap(), StartOutcome::Superseded);
    assert!(slot.snapshot().is_idle());
    assert_eq!(backend.open_track_count(), 0);
}

#[tokio::test]
async fn test_newest_start_wins() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    backend.hold_acquisitions();

    let older = tokio::spawn({
        let slot = slot.clone();
        async move { slot.start("cam0").await }
    });
    wait_for_pending(&backend, 1).await;
    let newer = tokio::spawn({
        let slot = slot.clone();
        async move { slot.start("cam1").await }
    });
    wait_for_pending(&backend, 2).await;

    backend.resume_acquisitions();
    let older = older.await.unwrap().unwrap();
    let newer = newer.await.unwrap().unwrap();

    assert_eq!(older, StartOutcome::Superseded);
    assert_eq!(newer, StartOutcome::Active);
    assert_eq!(backend.open_tracks_for("cam0"), 0);
    assert_eq!(backend.open_tracks_for("cam1"), 1);
    assert!(matches!(
        slot.snapshot().status,
        SlotStatus::Active { ref device_id, .. } if device_id == "cam1"
    ));
}

// ============================================================================
// OBSERVERS
// ============================================================================

#[tokio::test]
async fn test_subscribers_see_every_settled_state() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    backend.set_native_resolution("cam0", VideoResolution::VGA);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    let mut rx = slot.subscribe();

    slot.start("cam0").await.unwrap();
    assert!(rx.has_changed().unwrap());
    let active = rx.borrow_and_update().clone();
    assert!(matches!(
        active.status,
        SlotStatus::Active { resolution: Some(VideoResolution::VGA), .. }
    ));

    slot.stop();
    timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("no snapshot published after stop")
        .unwrap();
    assert!(rx.borrow().is_idle());
}

#[tokio::test]
async fn test_subscribers_see_reassign_stop_the_slot() {
    let backend = MockCaptureBackend::with_cameras(&["Front", "Back"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::FIRST, &backend, &ledger);
    slot.start("cam0").await.unwrap();
    let mut rx = slot.subscribe();

    slot.reassign_device(Some("cam1"));

    timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("no snapshot published after reassign")
        .unwrap();
    let latest = rx.borrow_and_update().clone();
    assert!(latest.is_idle());
    assert_eq!(latest.selection.as_deref(), Some("cam1"));
    assert_eq!(backend.open_track_count(), 0);
}

#[tokio::test]
async fn test_toggle_off_is_visible_to_subscribers() {
    let backend = MockCaptureBackend::with_cameras(&["Front"]);
    let ledger = Arc::new(TrackLedger::new());
    let slot = controller(SlotId::SECOND, &backend, &ledger);
    slot.reassign_device(Some("cam0"));
    slot.toggle().await.unwrap();
    let mut rx = slot.subscribe();

    assert_eq!(slot.toggle().await.unwrap(), ToggleOutcome::Stopped);

    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_idle());
    assert_eq!(ledger.usage(SlotId::SECOND).live, 0);
}
