// SPDX-License-Identifier: GPL-3.0-only

//! Capture device capability surface and the fixed-parameter controller
//!
//! The capture core depends only on the [`CaptureDevice`] trait; the
//! V4L2 backend is one implementation. [`DeviceController`] applies the
//! deterministic imaging configuration every trusted frame depends on:
//! focus, white balance, exposure, torch, low-light boost and zoom are
//! fixed before streaming starts and are never touched again by the
//! streaming path. Re-configuration requires a new session.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{
    DEFAULT_EXPOSURE_BIAS_EV, DEFAULT_EXPOSURE_DURATION, DEFAULT_EXPOSURE_ISO,
    DEFAULT_WB_TEMPERATURE, DEFAULT_WB_TINT,
};
use crate::errors::{CaptureError, ConfigError};

use super::types::DeviceInfo;

/// Focus mode applied during configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusMode {
    /// Continuously refocus while streaming
    ContinuousAuto,
    /// Focus once at configuration time
    Auto,
}

/// White balance policy, caller-selectable
///
/// Both variants are valid configurations; neither is hardwired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WhiteBalancePolicy {
    /// Continuous auto white balance
    ContinuousAuto,
    /// White balance locked to a fixed temperature/tint pair
    Locked { temperature: f32, tint: f32 },
}

impl Default for WhiteBalancePolicy {
    fn default() -> Self {
        WhiteBalancePolicy::ContinuousAuto
    }
}

/// Exposure policy, caller-selectable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExposurePolicy {
    /// Auto exposure with an optional EV bias offset
    Auto { bias_ev: f32 },
    /// Exposure locked to an explicit duration and ISO
    Locked { duration: Duration, iso: u32 },
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        ExposurePolicy::Auto {
            bias_ev: DEFAULT_EXPOSURE_BIAS_EV,
        }
    }
}

/// The selectable half of the device configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CapturePolicies {
    pub white_balance: WhiteBalancePolicy,
    pub exposure: ExposurePolicy,
}

impl CapturePolicies {
    /// The fully locked variant (fixed white balance and exposure)
    pub fn locked() -> Self {
        Self {
            white_balance: WhiteBalancePolicy::Locked {
                temperature: DEFAULT_WB_TEMPERATURE,
                tint: DEFAULT_WB_TINT,
            },
            exposure: ExposurePolicy::Locked {
                duration: DEFAULT_EXPOSURE_DURATION,
                iso: DEFAULT_EXPOSURE_ISO,
            },
        }
    }
}

/// Snapshot of the configuration actually applied to the device
///
/// `None` entries record capabilities the device does not support
/// (skipped, not fatal). Values are fixed at configure time and are not
/// mutated by the streaming path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceConfiguration {
    pub focus_mode: Option<FocusMode>,
    pub white_balance: Option<WhiteBalancePolicy>,
    pub exposure: Option<ExposurePolicy>,
    pub torch_on: bool,
    pub zoom_factor: f32,
}

/// Capability surface of a physical capture device
///
/// Mirrors what the capture core needs and nothing more: a scoped
/// configuration lock, per-capability probes and setters, and the
/// streaming/still-capture entry points.
pub trait CaptureDevice: Send {
    /// Device identity for logging and enumeration
    fn info(&self) -> DeviceInfo;

    /// Request camera access. Blocks until granted or denied; the
    /// engine caches the answer so a denial is never re-prompted.
    fn request_access(&mut self) -> bool;

    /// Acquire the device configuration lock
    fn lock_configuration(&mut self) -> Result<(), ConfigError>;
    /// Release the device configuration lock
    fn unlock_configuration(&mut self);

    fn supports_focus_mode(&self, mode: FocusMode) -> bool;
    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), ConfigError>;

    fn supports_auto_white_balance(&self) -> bool;
    fn supports_locked_white_balance(&self) -> bool;
    fn set_white_balance_auto(&mut self) -> Result<(), ConfigError>;
    fn set_white_balance_locked(&mut self, temperature: f32, tint: f32)
        -> Result<(), ConfigError>;

    fn supports_auto_exposure(&self) -> bool;
    fn supports_locked_exposure(&self) -> bool;
    fn set_exposure_auto(&mut self, bias_ev: f32) -> Result<(), ConfigError>;
    fn set_exposure_locked(&mut self, duration: Duration, iso: u32) -> Result<(), ConfigError>;

    fn has_torch(&self) -> bool;
    fn set_torch(&mut self, on: bool) -> Result<(), ConfigError>;

    fn supports_low_light_boost(&self) -> bool;
    fn set_low_light_boost(&mut self, enabled: bool) -> Result<(), ConfigError>;

    /// Maximum supported zoom factor (1.0 when zoom is fixed)
    fn max_zoom_factor(&self) -> f32;
    fn set_zoom_factor(&mut self, factor: f32) -> Result<(), ConfigError>;

    /// Start frame delivery
    fn start_stream(&mut self) -> Result<(), CaptureError>;
    /// Stop frame delivery
    fn stop_stream(&mut self);
    /// Read the next decoded frame as packed RGB bytes plus dimensions.
    /// Blocks up to the device's internal read deadline.
    fn read_frame(&mut self) -> Result<(Vec<u8>, u32, u32), CaptureError>;
}

/// Applies the fixed, idempotent device configuration
pub struct DeviceController;

impl DeviceController {
    /// Configure the device for deterministic imaging
    ///
    /// All mutations happen inside a single acquisition of the device's
    /// configuration lock, released on every exit path. Failure to
    /// acquire the lock leaves the device unmodified. Individual steps
    /// degrade gracefully: a missing capability or rejected control is
    /// skipped and recorded as absent in the returned snapshot.
    pub fn configure(
        device: &mut dyn CaptureDevice,
        policies: &CapturePolicies,
    ) -> Result<DeviceConfiguration, ConfigError> {
        device.lock_configuration()?;
        let configuration = Self::apply_steps(device, policies);
        device.unlock_configuration();

        info!(
            device = %device.info().name,
            ?configuration,
            "Device configuration applied"
        );
        Ok(configuration)
    }

    fn apply_steps(
        device: &mut dyn CaptureDevice,
        policies: &CapturePolicies,
    ) -> DeviceConfiguration {
        let mut config = DeviceConfiguration {
            torch_on: false,
            zoom_factor: 1.0,
            ..Default::default()
        };

        // Focus: continuous auto, else one-shot auto
        if device.supports_focus_mode(FocusMode::ContinuousAuto) {
            match device.set_focus_mode(FocusMode::ContinuousAuto) {
                Ok(()) => config.focus_mode = Some(FocusMode::ContinuousAuto),
                Err(e) => warn!(error = %e, "Continuous auto-focus rejected"),
            }
        } else if device.supports_focus_mode(FocusMode::Auto) {
            match device.set_focus_mode(FocusMode::Auto) {
                Ok(()) => config.focus_mode = Some(FocusMode::Auto),
                Err(e) => warn!(error = %e, "Auto-focus rejected"),
            }
        } else {
            debug!("No auto-focus support, skipping");
        }

        // White balance: policy-selected
        match policies.white_balance {
            WhiteBalancePolicy::ContinuousAuto => {
                if device.supports_auto_white_balance() {
                    match device.set_white_balance_auto() {
                        Ok(()) => config.white_balance = Some(WhiteBalancePolicy::ContinuousAuto),
                        Err(e) => warn!(error = %e, "Auto white balance rejected"),
                    }
                } else {
                    debug!("Continuous auto white balance not supported, skipping");
                }
            }
            WhiteBalancePolicy::Locked { temperature, tint } => {
                if device.supports_locked_white_balance() {
                    match device.set_white_balance_locked(temperature, tint) {
                        Ok(()) => {
                            config.white_balance =
                                Some(WhiteBalancePolicy::Locked { temperature, tint })
                        }
                        Err(e) => warn!(error = %e, "Locked white balance rejected"),
                    }
                } else {
                    debug!("Locked white balance not supported, skipping");
                }
            }
        }

        // Exposure: policy-selected
        match policies.exposure {
            ExposurePolicy::Auto { bias_ev } => {
                if device.supports_auto_exposure() {
                    match device.set_exposure_auto(bias_ev) {
                        Ok(()) => config.exposure = Some(ExposurePolicy::Auto { bias_ev }),
                        Err(e) => warn!(error = %e, "Auto exposure rejected"),
                    }
                } else {
                    debug!("Auto exposure not supported, skipping");
                }
            }
            ExposurePolicy::Locked { duration, iso } => {
                if device.supports_locked_exposure() {
                    match device.set_exposure_locked(duration, iso) {
                        Ok(()) => config.exposure = Some(ExposurePolicy::Locked { duration, iso }),
                        Err(e) => warn!(error = %e, "Locked exposure rejected"),
                    }
                } else {
                    debug!("Locked exposure not supported, skipping");
                }
            }
        }

        // Torch forced off if present
        if device.has_torch() {
            if let Err(e) = device.set_torch(false) {
                warn!(error = %e, "Failed to force torch off");
            }
        }

        // Low-light boost disabled if present
        if device.supports_low_light_boost() {
            if let Err(e) = device.set_low_light_boost(false) {
                warn!(error = %e, "Failed to disable low-light boost");
            }
        }

        // Zoom reset to 1.0 when the device supports more
        if device.max_zoom_factor() > 1.0 {
            if let Err(e) = device.set_zoom_factor(1.0) {
                warn!(error = %e, "Failed to reset zoom");
            }
        }

        config
    }
}
