// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture subsystem

use std::sync::Arc;
use std::time::Instant;

use crate::errors::CaptureError;

/// Rotation correction in degrees (clockwise)
///
/// Camera sensors may be physically mounted at an angle relative to the
/// device. The tag records the rotation that must be applied to a frame
/// or photo to bring it upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation (already upright)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees
    Rotate180,
    /// 270 degrees clockwise
    Rotate270,
}

impl Rotation {
    /// Create a rotation from an integer degree value (normalised to 0-360)
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees % 360 {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Check if applying the rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A single preview frame
///
/// Pixel data is packed RGB24 behind an `Arc` so frames can be cloned
/// out of the mailbox without copying. A new frame always replaces any
/// unread prior frame; nothing downstream may assume it sees every one.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB pixel data, row-major, no padding
    pub data: Arc<[u8]>,
    /// Rotation correction to apply for display
    pub rotation: Rotation,
    /// Timestamp when the frame was decoded
    pub captured_at: Instant,
    /// Monotonic sequence number, assigned by the mailbox on write
    pub sequence: u64,
}

impl Frame {
    /// Create a frame from packed RGB bytes
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            rotation,
            captured_at: Instant::now(),
            sequence: 0,
        }
    }
}

/// A raw still photo before orientation normalization and cropping
#[derive(Debug, Clone)]
pub struct RawPhoto {
    pub image: image::RgbImage,
    /// Rotation that must be applied to bring the photo upright
    pub orientation: Rotation,
}

/// A finished still photo: upright orientation, fixed crop applied
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub image: image::RgbImage,
}

impl CapturedPhoto {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Capture session state
///
/// Transitions are one-directional: Idle -> Configuring ->
/// {Running, ConfigFailed}; Running -> Stopped. ConfigFailed and
/// Stopped are terminal for a session instance; restarting requires a
/// new engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Running,
    ConfigFailed,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Configuring => write!(f, "Configuring"),
            SessionState::Running => write!(f, "Running"),
            SessionState::ConfigFailed => write!(f, "ConfigFailed"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Typed events delivered to the registered session observer
///
/// Invoked from the capture worker thread; observers must not block.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A preview frame was written to the mailbox
    FrameDelivered { sequence: u64 },
    /// A still-photo request completed successfully
    PhotoCaptured,
    /// The capture worker hit an error it could not recover from
    SessionError(CaptureError),
}

/// Observer callback for capture events, registered once per session
pub type CaptureObserver = Box<dyn Fn(&CaptureEvent) + Send + Sync>;

/// Information about an enumerable capture device
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Human-readable device name (V4L2 card)
    pub name: String,
    /// Driver name
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
}
