// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture backend
//!
//! Implements [`CaptureDevice`] over the kernel V4L2 interface: raw
//! ioctls for control queries and writes, and a memory-mapped stream
//! for frame delivery. The stream runs on an internal reader thread
//! that owns the device handle and pushes decoded RGB frames over a
//! bounded channel; `read_frame` receives from that channel.
//!
//! Control ID handling inspired by
//! [cameractrls](https://github.com/soyersoyer/cameractrls).

use std::collections::HashSet;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TrySendError, channel, sync_channel};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::constants::FRAME_READ_TIMEOUT;
use crate::errors::{CaptureError, ConfigError};

use super::device::{CaptureDevice, FocusMode};
use super::format::{mjpg_to_rgb, yuyv_to_rgb};
use super::types::DeviceInfo;

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_USER: u32 = 0x00980000;
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CTRL_CLASS_FLASH: u32 = 0x009c0000;

const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;
const V4L2_CID_FLASH_CLASS_BASE: u32 = V4L2_CTRL_CLASS_FLASH | 0x900;

// ===== V4L2 Control IDs (User Class) =====

/// Automatic white balance
pub const V4L2_CID_AUTO_WHITE_BALANCE: u32 = V4L2_CID_BASE + 12;
/// Gain control
pub const V4L2_CID_GAIN: u32 = V4L2_CID_BASE + 19;
/// White balance temperature in Kelvin
pub const V4L2_CID_WHITE_BALANCE_TEMPERATURE: u32 = V4L2_CID_BASE + 26;
/// Backlight compensation (driver-side low-light aid)
pub const V4L2_CID_BACKLIGHT_COMPENSATION: u32 = V4L2_CID_BASE + 28;

// ===== V4L2 Control IDs (Camera Class) =====

/// Exposure mode: Auto, Manual, Shutter Priority, Aperture Priority
pub const V4L2_CID_EXPOSURE_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 1;
/// Absolute exposure time in 100µs units
pub const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 2;
/// Auto focus enable
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
/// Absolute zoom position
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
/// Exposure compensation (EV bias) in 0.001 EV units
pub const V4L2_CID_AUTO_EXPOSURE_BIAS: u32 = V4L2_CID_CAMERA_CLASS_BASE + 19;
/// ISO sensitivity value
pub const V4L2_CID_ISO_SENSITIVITY: u32 = V4L2_CID_CAMERA_CLASS_BASE + 23;
/// Auto ISO control
pub const V4L2_CID_ISO_SENSITIVITY_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 24;
/// One-shot auto focus trigger (button control)
pub const V4L2_CID_AUTO_FOCUS_START: u32 = V4L2_CID_CAMERA_CLASS_BASE + 28;

// ===== V4L2 Control IDs (Flash Class) =====

/// LED mode: none, flash, torch
pub const V4L2_CID_FLASH_LED_MODE: u32 = V4L2_CID_FLASH_CLASS_BASE + 1;

// ===== V4L2 Exposure Auto Menu Values =====

/// Automatic exposure time and iris
pub const V4L2_EXPOSURE_AUTO: i32 = 0;
/// Manual exposure time and iris
pub const V4L2_EXPOSURE_MANUAL: i32 = 1;
/// Auto exposure time, manual iris (aperture priority)
pub const V4L2_EXPOSURE_APERTURE_PRIORITY: i32 = 3;

// ===== V4L2 Flash LED Mode Menu Values =====

pub const V4L2_FLASH_LED_MODE_NONE: i32 = 0;
pub const V4L2_FLASH_LED_MODE_TORCH: i32 = 2;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr
// where dir: 2=READ, 1=WRITE, 3=READ|WRITE

/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

// ===== V4L2 ioctl Structures =====

/// V4L2 control get/set structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

/// V4L2 query control structure
#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Information about a V4L2 control
#[derive(Debug, Clone)]
struct ControlInfo {
    minimum: i32,
    maximum: i32,
    flags: u32,
}

impl ControlInfo {
    fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }
}

/// Query if a control exists and get its information
fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };

    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        flags: qctrl.flags,
    })
}

/// Set value of a control
fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), ConfigError> {
    let file = File::open(device_path)
        .map_err(|e| ConfigError::ControlRejected(format!("failed to open device: {}", e)))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };

    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(ConfigError::ControlRejected(format!(
            "control {:#x}: {}",
            control_id, errno
        )));
    }

    // Check if the driver accepted our value
    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

/// Check if a control is available on the device
fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id)
        .map(|info| !info.is_disabled())
        .unwrap_or(false)
}

/// Process-wide registry of device paths whose configuration lock is held
fn lock_registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Requested stream format; the driver may negotiate it down
const PREFERRED_WIDTH: u32 = 1920;
const PREFERRED_HEIGHT: u32 = 1080;
/// Reader-to-consumer channel depth; full means the consumer is behind
/// and the frame is dropped
const STREAM_CHANNEL_DEPTH: usize = 2;

/// Running stream worker state
struct StreamWorker {
    thread: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    frames: Receiver<(Vec<u8>, u32, u32)>,
}

/// A V4L2 video device
pub struct V4l2Device {
    path: String,
    info: DeviceInfo,
    worker: Option<StreamWorker>,
    locked: bool,
}

impl V4l2Device {
    /// Open a device node and read its identity
    pub fn open(path: &str) -> Result<Self, CaptureError> {
        let device = Device::with_path(path)
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", path, e)))?;
        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", path, e)))?;

        Ok(Self {
            path: path.to_string(),
            info: DeviceInfo {
                name: caps.card,
                driver: caps.driver,
                path: path.to_string(),
            },
            worker: None,
            locked: false,
        })
    }

    /// Enumerate capture devices by scanning /dev/video*
    pub fn enumerate() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        let entries: Vec<_> = std::fs::read_dir("/dev")
            .into_iter()
            .flatten()
            .flatten()
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("video"))
                    .unwrap_or(false)
            })
            .collect();

        for entry in entries {
            let path = entry.path().to_string_lossy().to_string();
            let Ok(device) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = device.query_caps() else {
                continue;
            };
            debug!(path = %path, card = %caps.card, driver = %caps.driver, "Found V4L2 device");
            devices.push(DeviceInfo {
                name: caps.card,
                driver: caps.driver,
                path,
            });
        }

        devices.sort_by(|a, b| a.path.cmp(&b.path));
        devices
    }

    fn require_lock(&self) -> Result<(), ConfigError> {
        if self.locked {
            Ok(())
        } else {
            Err(ConfigError::ControlRejected(
                "configuration lock not held".into(),
            ))
        }
    }
}

impl CaptureDevice for V4l2Device {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn request_access(&mut self) -> bool {
        match File::open(&self.path) {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %self.path, "Permission denied opening capture device");
                false
            }
            // Other failures surface later as DeviceUnavailable.
            Err(_) => true,
        }
    }

    fn lock_configuration(&mut self) -> Result<(), ConfigError> {
        let mut registry = lock_registry()
            .lock()
            .map_err(|_| ConfigError::LockUnavailable("lock registry poisoned".into()))?;
        if !registry.insert(self.path.clone()) {
            return Err(ConfigError::LockUnavailable(format!(
                "{} is already being configured",
                self.path
            )));
        }
        self.locked = true;
        Ok(())
    }

    fn unlock_configuration(&mut self) {
        if self.locked {
            if let Ok(mut registry) = lock_registry().lock() {
                registry.remove(&self.path);
            }
            self.locked = false;
        }
    }

    fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        match mode {
            FocusMode::ContinuousAuto => has_control(&self.path, V4L2_CID_FOCUS_AUTO),
            FocusMode::Auto => has_control(&self.path, V4L2_CID_AUTO_FOCUS_START),
        }
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), ConfigError> {
        self.require_lock()?;
        match mode {
            FocusMode::ContinuousAuto => set_control(&self.path, V4L2_CID_FOCUS_AUTO, 1),
            // Button control: writing any value triggers one focus sweep.
            FocusMode::Auto => set_control(&self.path, V4L2_CID_AUTO_FOCUS_START, 1),
        }
    }

    fn supports_auto_white_balance(&self) -> bool {
        has_control(&self.path, V4L2_CID_AUTO_WHITE_BALANCE)
    }

    fn supports_locked_white_balance(&self) -> bool {
        has_control(&self.path, V4L2_CID_AUTO_WHITE_BALANCE)
            && has_control(&self.path, V4L2_CID_WHITE_BALANCE_TEMPERATURE)
    }

    fn set_white_balance_auto(&mut self) -> Result<(), ConfigError> {
        self.require_lock()?;
        set_control(&self.path, V4L2_CID_AUTO_WHITE_BALANCE, 1)
    }

    fn set_white_balance_locked(
        &mut self,
        temperature: f32,
        tint: f32,
    ) -> Result<(), ConfigError> {
        self.require_lock()?;
        set_control(&self.path, V4L2_CID_AUTO_WHITE_BALANCE, 0)?;
        set_control(
            &self.path,
            V4L2_CID_WHITE_BALANCE_TEMPERATURE,
            temperature as i32,
        )?;
        // V4L2 has no tint axis; temperature is the only knob.
        debug!(tint, "White balance tint has no V4L2 control, recorded only");
        Ok(())
    }

    fn supports_auto_exposure(&self) -> bool {
        has_control(&self.path, V4L2_CID_EXPOSURE_AUTO)
    }

    fn supports_locked_exposure(&self) -> bool {
        has_control(&self.path, V4L2_CID_EXPOSURE_AUTO)
            && has_control(&self.path, V4L2_CID_EXPOSURE_ABSOLUTE)
    }

    fn set_exposure_auto(&mut self, bias_ev: f32) -> Result<(), ConfigError> {
        self.require_lock()?;
        // Aperture priority is the common UVC auto mode; plain auto is
        // the fallback.
        if set_control(
            &self.path,
            V4L2_CID_EXPOSURE_AUTO,
            V4L2_EXPOSURE_APERTURE_PRIORITY,
        )
        .is_err()
        {
            set_control(&self.path, V4L2_CID_EXPOSURE_AUTO, V4L2_EXPOSURE_AUTO)?;
        }
        if bias_ev != 0.0 {
            if has_control(&self.path, V4L2_CID_AUTO_EXPOSURE_BIAS) {
                // Bias control units are 0.001 EV.
                set_control(
                    &self.path,
                    V4L2_CID_AUTO_EXPOSURE_BIAS,
                    (bias_ev * 1000.0) as i32,
                )?;
            } else {
                debug!(bias_ev, "Exposure bias control not available, skipping");
            }
        }
        Ok(())
    }

    fn set_exposure_locked(&mut self, duration: Duration, iso: u32) -> Result<(), ConfigError> {
        self.require_lock()?;
        set_control(&self.path, V4L2_CID_EXPOSURE_AUTO, V4L2_EXPOSURE_MANUAL)?;
        // EXPOSURE_ABSOLUTE units are 100µs.
        let exposure_units = (duration.as_micros() / 100).max(1) as i32;
        set_control(&self.path, V4L2_CID_EXPOSURE_ABSOLUTE, exposure_units)?;

        if has_control(&self.path, V4L2_CID_ISO_SENSITIVITY) {
            if has_control(&self.path, V4L2_CID_ISO_SENSITIVITY_AUTO) {
                set_control(&self.path, V4L2_CID_ISO_SENSITIVITY_AUTO, 0)?;
            }
            set_control(&self.path, V4L2_CID_ISO_SENSITIVITY, iso as i32)?;
        } else if has_control(&self.path, V4L2_CID_GAIN) {
            // No ISO control on most UVC cameras; gain is the nearest
            // equivalent. Scale is driver-specific, treat ISO 100 as
            // the control's minimum.
            if let Some(ctrl) = query_control(&self.path, V4L2_CID_GAIN) {
                let gain = ctrl.minimum + ((iso as i32 - 100) / 100).max(0);
                set_control(&self.path, V4L2_CID_GAIN, gain.min(ctrl.maximum))?;
            }
        } else {
            debug!(iso, "No ISO or gain control available, skipping");
        }
        Ok(())
    }

    fn has_torch(&self) -> bool {
        has_control(&self.path, V4L2_CID_FLASH_LED_MODE)
    }

    fn set_torch(&mut self, on: bool) -> Result<(), ConfigError> {
        self.require_lock()?;
        let mode = if on {
            V4L2_FLASH_LED_MODE_TORCH
        } else {
            V4L2_FLASH_LED_MODE_NONE
        };
        set_control(&self.path, V4L2_CID_FLASH_LED_MODE, mode)
    }

    fn supports_low_light_boost(&self) -> bool {
        has_control(&self.path, V4L2_CID_BACKLIGHT_COMPENSATION)
    }

    fn set_low_light_boost(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.require_lock()?;
        set_control(
            &self.path,
            V4L2_CID_BACKLIGHT_COMPENSATION,
            i32::from(enabled),
        )
    }

    fn max_zoom_factor(&self) -> f32 {
        match query_control(&self.path, V4L2_CID_ZOOM_ABSOLUTE) {
            Some(ctrl) if ctrl.maximum > ctrl.minimum && ctrl.minimum > 0 => {
                ctrl.maximum as f32 / ctrl.minimum as f32
            }
            _ => 1.0,
        }
    }

    fn set_zoom_factor(&mut self, factor: f32) -> Result<(), ConfigError> {
        self.require_lock()?;
        let ctrl = query_control(&self.path, V4L2_CID_ZOOM_ABSOLUTE).ok_or_else(|| {
            ConfigError::ControlRejected("zoom control not available".into())
        })?;
        let value = ((ctrl.minimum as f32) * factor) as i32;
        set_control(
            &self.path,
            V4L2_CID_ZOOM_ABSOLUTE,
            value.clamp(ctrl.minimum, ctrl.maximum),
        )
    }

    fn start_stream(&mut self) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let path = self.path.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let (frame_tx, frame_rx) = sync_channel(STREAM_CHANNEL_DEPTH);
        let (init_tx, init_rx) = channel();

        // The device handle and the memory-mapped stream borrow each
        // other, so both live on the reader thread.
        let thread = thread::spawn(move || {
            let init = (|| -> Result<(Device, v4l::Format), CaptureError> {
                let device = Device::with_path(&path)
                    .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", path, e)))?;

                let fourcc_yuyv = FourCC::new(b"YUYV");
                let fourcc_mjpg = FourCC::new(b"MJPG");

                let format =
                    v4l::Format::new(PREFERRED_WIDTH, PREFERRED_HEIGHT, fourcc_yuyv);
                let actual = match device.set_format(&format) {
                    Ok(f) if f.fourcc == fourcc_yuyv => f,
                    _ => {
                        let format =
                            v4l::Format::new(PREFERRED_WIDTH, PREFERRED_HEIGHT, fourcc_mjpg);
                        device.set_format(&format).map_err(|e| {
                            CaptureError::CaptureFailed(format!("failed to set format: {}", e))
                        })?
                    }
                };

                info!(
                    width = actual.width,
                    height = actual.height,
                    fourcc = ?actual.fourcc,
                    "V4L2 stream format configured"
                );
                Ok((device, actual))
            })();

            let (device, format) = match init {
                Ok(ok) => {
                    let _ = init_tx.send(Ok(()));
                    ok
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            let mut stream = match Stream::with_buffers(&device, Type::VideoCapture, 4) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Failed to create V4L2 stream");
                    return;
                }
            };

            let fourcc_yuyv = FourCC::new(b"YUYV");

            while !stop_clone.load(Ordering::SeqCst) {
                let (buf, _meta) = match stream.next() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "Failed to capture frame");
                        continue;
                    }
                };

                let decoded = if format.fourcc == fourcc_yuyv {
                    Some((
                        yuyv_to_rgb(buf, format.width, format.height),
                        format.width,
                        format.height,
                    ))
                } else {
                    mjpg_to_rgb(buf)
                };

                let Some(frame) = decoded else {
                    continue;
                };

                match frame_tx.try_send(frame) {
                    Ok(()) => {}
                    // Consumer behind; drop this frame.
                    Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }

            debug!("V4L2 reader thread exiting");
        });

        match init_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(StreamWorker {
                    thread: Some(thread),
                    stop,
                    frames: frame_rx,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::CaptureFailed(
                    "stream reader thread died during init".into(),
                ))
            }
        }
    }

    fn stop_stream(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            // Drain so the reader is not blocked on a full channel.
            while worker.frames.try_recv().is_ok() {}
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!("V4L2 reader thread panicked");
                }
            }
        }
    }

    fn read_frame(&mut self) -> Result<(Vec<u8>, u32, u32), CaptureError> {
        let worker = self
            .worker
            .as_ref()
            .ok_or(CaptureError::SessionNotRunning)?;
        match worker.frames.recv_timeout(FRAME_READ_TIMEOUT) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => {
                Err(CaptureError::CaptureFailed("frame read timed out".into()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::DeviceUnavailable(
                "stream reader thread exited".into(),
            )),
        }
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        self.stop_stream();
        self.unlock_configuration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_id_values() {
        // Verify control IDs match expected values
        assert_eq!(V4L2_CID_AUTO_WHITE_BALANCE, 0x0098090c);
        assert_eq!(V4L2_CID_WHITE_BALANCE_TEMPERATURE, 0x0098091a);
        assert_eq!(V4L2_CID_EXPOSURE_AUTO, 0x009a0901);
        assert_eq!(V4L2_CID_EXPOSURE_ABSOLUTE, 0x009a0902);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a090c);
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a090d);
        assert_eq!(V4L2_CID_AUTO_EXPOSURE_BIAS, 0x009a0913);
        assert_eq!(V4L2_CID_FLASH_LED_MODE, 0x009c0901);
    }

    #[test]
    fn test_lock_registry_is_exclusive() {
        let registry = lock_registry();
        {
            let mut held = registry.lock().unwrap();
            assert!(held.insert("/dev/video-test".to_string()));
            assert!(!held.insert("/dev/video-test".to_string()));
            held.remove("/dev/video-test");
        }
    }
}
