//! Native camera capture through nokhwa
//!
//! nokhwa cameras are not `Send`, so every open stream gets a dedicated
//! worker thread that owns the camera. The track talks to the worker over
//! a command channel; stopping the track stops the camera stream and joins
//! the worker before returning.

use super::{CaptureBackend, StreamConstraints};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{
    ActiveStream, CaptureTrack, TrackSettings, VideoFrame, VideoPixelFormat, VideoResolution,
};
use async_trait::async_trait;
use dualcam_core::RawDeviceInfo;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{Camera, NokhwaError};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const BACKEND_NAME: &str = "nokhwa";

/// nokhwa-backed capture (V4L2, AVFoundation, Media Foundation)
#[derive(Debug)]
pub struct NativeCaptureBackend {
    api: ApiBackend,
}

impl Default for NativeCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeCaptureBackend {
    pub fn new() -> Self {
        Self {
            api: ApiBackend::Auto,
        }
    }

    async fn query_devices(&self) -> MediaResult<Vec<RawDeviceInfo>> {
        let api = self.api;
        let cameras = tokio::task::spawn_blocking(move || nokhwa::query(api))
            .await
            .map_err(|e| backend_error(format!("device query task failed: {}", e)))?
            .map_err(|e| backend_error(e.to_string()))?;

        Ok(cameras
            .iter()
            .map(|info| RawDeviceInfo::video(info.index().to_string(), info.human_name()))
            .collect())
    }
}

#[async_trait]
impl CaptureBackend for NativeCaptureBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> MediaResult<ActiveStream> {
        constraints.validate()?;

        let device_id = match &constraints.device_id {
            Some(id) => id.clone(),
            None => {
                #[cfg(target_os = "macos")]
                request_os_permission().await?;

                self.query_devices()
                    .await?
                    .into_iter()
                    .next()
                    .map(|d| d.device_id)
                    .ok_or_else(|| MediaError::PermissionDenied {
                        reason: "no capture device".to_string(),
                    })?
            }
        };

        let track = NativeTrack::open(device_id.clone(), constraints).await?;
        Ok(ActiveStream::new(device_id, vec![Arc::new(track)]))
    }

    async fn enumerate_devices(&self) -> MediaResult<Vec<RawDeviceInfo>> {
        self.query_devices().await
    }
}

#[cfg(target_os = "macos")]
async fn request_os_permission() -> MediaResult<()> {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    nokhwa::nokhwa_initialize(move |granted| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(granted);
        }
    });

    match rx.await {
        Ok(true) => Ok(()),
        _ => Err(MediaError::PermissionDenied {
            reason: "camera access not authorized".to_string(),
        }),
    }
}

enum WorkerCommand {
    Grab(oneshot::Sender<MediaResult<VideoFrame>>),
    Stop,
}

#[derive(Debug)]
struct NativeTrack {
    id: String,
    device_id: String,
    settings: TrackSettings,
    commands: Mutex<Option<mpsc::Sender<WorkerCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NativeTrack {
    async fn open(device_id: String, constraints: &StreamConstraints) -> MediaResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::channel();

        let worker_device = device_id.clone();
        let resolution = constraints.ideal_resolution;
        let frame_rate = constraints.frame_rate.round() as u32;

        let worker = std::thread::Builder::new()
            .name(format!("dualcam-capture-{}", device_id))
            .spawn(move || {
                run_worker(worker_device, resolution, frame_rate, ready_tx, command_rx)
            })?;

        let settings = match ready_rx.await {
            Ok(Ok(settings)) => settings,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(backend_error("capture worker exited during open"));
            }
        };

        info!(
            "Opened camera {} at {} (requested {})",
            device_id, settings.resolution, resolution
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id,
            settings,
            commands: Mutex::new(Some(command_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

#[async_trait]
impl CaptureTrack for NativeTrack {
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
        self.commands.lock().is_some()
    }

    async fn grab_frame(&self) -> MediaResult<VideoFrame> {
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let commands = self.commands.lock();
            let sender = commands.as_ref().ok_or(MediaError::CaptureNotActive)?;
            sender
                .send(WorkerCommand::Grab(reply_tx))
                .map_err(|_| MediaError::CaptureNotActive)?;
        }

        reply_rx.await.map_err(|_| MediaError::CaptureNotActive)?
    }

    fn stop(&self) {
        let Some(sender) = self.commands.lock().take() else {
            return;
        };
        let _ = sender.send(WorkerCommand::Stop);

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Capture worker for {} panicked", self.device_id);
            }
        }
        debug!("Stopped camera track {} on {}", self.id, self.device_id);
    }
}

impl Drop for NativeTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    device_id: String,
    resolution: VideoResolution,
    frame_rate: u32,
    ready: oneshot::Sender<MediaResult<TrackSettings>>,
    commands: mpsc::Receiver<WorkerCommand>,
) {
    let format = CameraFormat::new(
        Resolution::new(resolution.width, resolution.height),
        FrameFormat::MJPEG,
        frame_rate,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    let mut camera = match Camera::new(parse_index(&device_id), requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(map_open_error(&device_id, e)));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(map_open_error(&device_id, e)));
        return;
    }

    let native = camera.resolution();
    let settings = TrackSettings {
        resolution: VideoResolution::new(native.width(), native.height()),
        frame_rate: Some(f64::from(camera.frame_rate())),
    };

    if ready.send(Ok(settings)).is_ok() {
        // Ends on Stop or when the track is dropped.
        while let Ok(command) = commands.recv() {
            match command {
                WorkerCommand::Grab(reply) => {
                    let _ = reply.send(grab(&mut camera));
                }
                WorkerCommand::Stop => break,
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!("Failed to stop camera {}: {}", device_id, e);
    }
}

fn grab(camera: &mut Camera) -> MediaResult<VideoFrame> {
    let buffer = camera.frame().map_err(|e| backend_error(e.to_string()))?;
    let image = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| MediaError::CaptureEncodeFailure {
            reason: e.to_string(),
        })?;

    Ok(VideoFrame {
        width: image.width(),
        height: image.height(),
        format: VideoPixelFormat::RGB24,
        data: image.into_raw(),
        timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
    })
}

fn parse_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

fn map_open_error(device_id: &str, err: NokhwaError) -> MediaError {
    let message = err.to_string().to_lowercase();
    if message.contains("busy") || message.contains("in use") {
        return MediaError::DeviceBusy {
            device_id: device_id.to_string(),
        };
    }
    if message.contains("permission") || message.contains("not authorized") {
        return MediaError::PermissionDenied { reason: message };
    }

    match err {
        NokhwaError::OpenDeviceError(..) | NokhwaError::OpenStreamError(..) => {
            MediaError::DeviceUnavailable {
                device_id: device_id.to_string(),
            }
        }
        other => backend_error(other.to_string()),
    }
}

fn backend_error(message: impl Into<String>) -> MediaError {
    MediaError::Backend {
        backend: BACKEND_NAME.to_string(),
        message: message.into(),
    }
}
