//! Still capture of a slot's current frame
//!
//! Reads one frame at the stream's native size, encodes it as PNG and
//! writes `capture-{slot}-{epoch millis}.png` into the snapshot directory.
//! Never touches slot state.

use crate::controller::SlotController;
use crate::error::{MediaError, MediaResult};
use crate::tracks::{CaptureTrack, VideoFrame, VideoPixelFormat};
use dualcam_core::SlotId;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name for a snapshot of `slot` taken at `timestamp_millis`
pub fn snapshot_file_name(slot: SlotId, timestamp_millis: i64) -> String {
    format!("capture-{}-{}.png", slot.number(), timestamp_millis)
}

/// Encode a frame as PNG
pub fn encode_png(frame: &VideoFrame) -> MediaResult<Vec<u8>> {
    if frame.width == 0 || frame.height == 0 {
        return Err(MediaError::CaptureEncodeFailure {
            reason: format!("frame has no pixels ({})", frame.resolution()),
        });
    }
    if frame.data.len() != frame.expected_len() {
        return Err(MediaError::CaptureEncodeFailure {
            reason: format!(
                "expected {} bytes for {} frame, got {}",
                frame.expected_len(),
                frame.resolution(),
                frame.data.len()
            ),
        });
    }

    let image = match frame.format {
        VideoPixelFormat::RGB24 => {
            RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
                .map(DynamicImage::ImageRgb8)
        }
        VideoPixelFormat::RGBA32 => {
            RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
                .map(DynamicImage::ImageRgba8)
        }
    }
    .ok_or_else(|| MediaError::CaptureEncodeFailure {
        reason: "frame buffer does not match its dimensions".to_string(),
    })?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| MediaError::CaptureEncodeFailure {
            reason: e.to_string(),
        })?;
    Ok(png.into_inner())
}

/// Local "download" side channel for snapshots
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an encoded snapshot and return its path
    pub async fn save(&self, slot: SlotId, png: &[u8]) -> MediaResult<PathBuf> {
        let name = snapshot_file_name(slot, chrono::Utc::now().timestamp_millis());
        let path = self.dir.join(name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, png).await?;
        info!("{}: saved snapshot {}", slot, path.display());
        Ok(path)
    }
}

/// Grab, encode and save one frame from `track`
pub async fn capture_track(
    slot: SlotId,
    track: &dyn CaptureTrack,
    writer: &SnapshotWriter,
) -> MediaResult<PathBuf> {
    let frame = track.grab_frame().await?;
    debug!("{}: grabbed {} frame for snapshot", slot, frame.resolution());
    let png = encode_png(&frame)?;
    writer.save(slot, &png).await
}

/// Snapshot the slot's current frame.
///
/// Returns `Ok(None)` without side effects when the slot holds no stream.
pub async fn snapshot(
    controller: &SlotController,
    writer: &SnapshotWriter,
) -> MediaResult<Option<PathBuf>> {
    let Some(track) = controller.frame_source() else {
        debug!("{}: snapshot skipped, slot not active", controller.slot());
        return Ok(None);
    };

    capture_track(controller.slot(), track.as_ref(), writer)
        .await
        .map(Some)
}
