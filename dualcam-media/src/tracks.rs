//! Track abstractions and video frame types

use crate::error::MediaResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Supported raw pixel formats for grabbed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoPixelFormat {
    RGB24,
    RGBA32,
}

impl VideoPixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            VideoPixelFormat::RGB24 => 3,
            VideoPixelFormat::RGBA32 => 4,
        }
    }
}

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD: Self = Self::new(1280, 720);
    pub const FULL_HD: Self = Self::new(1920, 1080);
    pub const VGA: Self = Self::new(640, 480);

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Single decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of `data`
    pub format: VideoPixelFormat,
    /// Tightly packed pixel rows
    pub data: Vec<u8>,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl VideoFrame {
    /// Byte length `data` must have for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.width, self.height)
    }
}

/// Settings the platform actually applied to a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSettings {
    /// Native frame size, which may differ from the requested hint
    pub resolution: VideoResolution,
    /// Frames per second, when known
    pub frame_rate: Option<f64>,
}

/// One hardware track of a live capture session
#[async_trait]
pub trait CaptureTrack: Send + Sync + fmt::Debug {
    /// Track identifier, unique per backend
    fn id(&self) -> &str;

    /// Device the track is bound to
    fn device_id(&self) -> &str;

    fn settings(&self) -> TrackSettings;

    /// Whether the hardware is still capturing
    fn is_live(&self) -> bool;

    /// Read the current frame
    async fn grab_frame(&self) -> MediaResult<VideoFrame>;

    /// Stop the hardware capture. Calling it again is a no-op.
    fn stop(&self);
}

/// Live capture session bound to exactly one device.
///
/// Owned by exactly one slot. Not `Clone`: the only way to hand a stream
/// to another owner is to move it. Tracks are stopped by [`release`] or,
/// failing that, on drop.
///
/// [`release`]: ActiveStream::release
pub struct ActiveStream {
    id: String,
    device_id: String,
    tracks: Vec<Arc<dyn CaptureTrack>>,
    released: bool,
}

impl ActiveStream {
    pub fn new(device_id: impl Into<String>, tracks: Vec<Arc<dyn CaptureTrack>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            tracks,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn track_count(&self) -> u32 {
        self.tracks.len() as u32
    }

    /// Native resolution of the first video track
    pub fn resolution(&self) -> Option<VideoResolution> {
        self.tracks.first().map(|t| t.settings().resolution)
    }

    /// Track snapshots read frames from
    pub fn frame_source(&self) -> Option<Arc<dyn CaptureTrack>> {
        if self.released {
            return None;
        }
        self.tracks.first().cloned()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop every hardware track. Returns the number of tracks stopped,
    /// zero when the stream was already released.
    pub fn release(&mut self) -> u32 {
        if self.released {
            return 0;
        }
        self.released = true;

        for track in &self.tracks {
            track.stop();
        }
        debug!(
            "Released stream {} on device {} ({} track(s))",
            self.id,
            self.device_id,
            self.tracks.len()
        );
        self.tracks.len() as u32
    }
}

impl fmt::Debug for ActiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveStream")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.release();
    }
}
