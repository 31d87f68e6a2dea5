// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture subsystem
//!
//! A session is built from a [`CaptureDevice`] (the V4L2 backend in
//! production, mocks in tests), configured once by the
//! [`DeviceController`], and driven by the [`CaptureEngine`]: preview
//! frames land in a latest-wins mailbox and still photos go through the
//! processing pipeline.

pub mod device;
pub mod engine;
pub mod format;
pub mod mailbox;
pub mod types;
pub mod v4l2_device;

pub use device::{
    CaptureDevice, CapturePolicies, DeviceConfiguration, DeviceController, ExposurePolicy,
    FocusMode, WhiteBalancePolicy,
};
pub use engine::CaptureEngine;
pub use mailbox::FrameMailbox;
pub use types::{
    CaptureEvent, CaptureObserver, CapturedPhoto, DeviceInfo, Frame, RawPhoto, Rotation,
    SessionState,
};
pub use v4l2_device::V4l2Device;
