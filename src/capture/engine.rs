// SPDX-License-Identifier: GPL-3.0-only

//! Capture session engine
//!
//! Ties the device, the configuration controller, the frame mailbox and
//! the still-photo pipeline together behind a small session API:
//! authorize, start, observe frames, capture a photo, stop.
//!
//! State transitions are one-directional. `start()` moves Idle ->
//! Configuring -> Running (or ConfigFailed); `stop()` moves Running ->
//! Stopped and joins the worker thread before returning, so no frame is
//! delivered after it returns. A stopped or failed engine is inert;
//! restarting means building a new one.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::constants::{CAPTURE_TIMEOUT, PREVIEW_ROTATION_DEGREES};
use crate::errors::CaptureError;
use crate::photo::StillPhotoPipeline;

use super::device::{CaptureDevice, CapturePolicies, DeviceConfiguration, DeviceController};
use super::mailbox::FrameMailbox;
use super::types::{
    CaptureEvent, CaptureObserver, CapturedPhoto, Frame, RawPhoto, Rotation, SessionState,
};

type PhotoSender = SyncSender<Result<RawPhoto, CaptureError>>;

/// Worker thread driving the preview loop
///
/// Runs the step closure until it breaks on its own or `stop` is
/// called. `stop` joins the thread, so callers get the synchronous
/// shutdown the session contract requires.
struct CaptureWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl CaptureWorker {
    fn spawn<F>(mut step: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            debug!("Preview worker started");
            while !stop_flag.load(Ordering::SeqCst) {
                if step().is_break() {
                    debug!("Preview loop stopped itself");
                    break;
                }
            }
            debug!("Preview worker exiting");
        });
        Self {
            handle: Some(handle),
            stop,
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Preview worker panicked");
            }
        }
    }
}

/// Shared state between the engine and its capture worker thread
struct Shared {
    device: Mutex<Box<dyn CaptureDevice>>,
    mailbox: FrameMailbox,
    state: Mutex<SessionState>,
    observer: Mutex<Option<CaptureObserver>>,
    /// Completion slot for an in-flight still-photo request, tagged
    /// with the request id. The worker takes the sender, so a request
    /// completes at most once; the id lets a timed-out caller clear
    /// only its own entry.
    pending_photo: Mutex<Option<(u64, PhotoSender)>>,
}

impl Shared {
    fn notify(&self, event: &CaptureEvent) {
        if let Ok(observer) = self.observer.lock() {
            if let Some(observer) = observer.as_ref() {
                observer(event);
            }
        }
    }

    fn set_state(&self, next: SessionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }
}

/// A single capture session over one device
pub struct CaptureEngine {
    shared: Arc<Shared>,
    policies: CapturePolicies,
    pipeline: StillPhotoPipeline,
    configuration: Option<DeviceConfiguration>,
    /// Cached authorization answer; a denial is never re-prompted
    authorization: Mutex<Option<bool>>,
    worker: Option<CaptureWorker>,
    photo_requests: AtomicU64,
    capture_timeout: Duration,
}

impl CaptureEngine {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        policies: CapturePolicies,
        pipeline: StillPhotoPipeline,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                device: Mutex::new(device),
                mailbox: FrameMailbox::new(),
                state: Mutex::new(SessionState::Idle),
                observer: Mutex::new(None),
                pending_photo: Mutex::new(None),
            }),
            policies,
            pipeline,
            configuration: None,
            authorization: Mutex::new(None),
            worker: None,
            photo_requests: AtomicU64::new(0),
            capture_timeout: CAPTURE_TIMEOUT,
        }
    }

    /// Register the session observer. Replaces any prior observer.
    pub fn set_observer(&self, observer: CaptureObserver) {
        if let Ok(mut slot) = self.shared.observer.lock() {
            *slot = Some(observer);
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Stopped)
    }

    /// Configuration snapshot recorded by the last successful `start()`
    pub fn configuration(&self) -> Option<&DeviceConfiguration> {
        self.configuration.as_ref()
    }

    /// The newest preview frame, if any has been delivered
    pub fn latest_frame(&self) -> Option<Frame> {
        self.shared.mailbox.latest()
    }

    /// Sequence number of the newest delivered frame (0 before any)
    pub fn last_frame_sequence(&self) -> u64 {
        self.shared.mailbox.last_sequence()
    }

    /// Request camera access, caching the answer
    ///
    /// The underlying device is only prompted once per engine; repeated
    /// calls return the cached result.
    pub fn request_authorization(&self) -> bool {
        let mut cached = match self.authorization.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if let Some(granted) = *cached {
            return granted;
        }
        let granted = match self.shared.device.lock() {
            Ok(mut device) => device.request_access(),
            Err(_) => false,
        };
        *cached = Some(granted);
        if !granted {
            warn!("Camera access denied");
        }
        granted
    }

    /// Configure the device and start frame delivery
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state() != SessionState::Idle {
            return Err(CaptureError::CaptureFailed(format!(
                "cannot start from state {}",
                self.state()
            )));
        }
        if !self.request_authorization() {
            return Err(CaptureError::AuthorizationDenied);
        }

        self.shared.set_state(SessionState::Configuring);

        let configuration = {
            let mut device = self
                .shared
                .device
                .lock()
                .map_err(|_| CaptureError::DeviceUnavailable("device lock poisoned".into()))?;

            let configuration =
                match DeviceController::configure(device.as_mut(), &self.policies) {
                    Ok(c) => c,
                    Err(e) => {
                        self.shared.set_state(SessionState::ConfigFailed);
                        return Err(CaptureError::ConfigurationFailed(e));
                    }
                };

            if let Err(e) = device.start_stream() {
                self.shared.set_state(SessionState::ConfigFailed);
                return Err(e);
            }
            configuration
        };
        self.configuration = Some(configuration);

        let shared = Arc::clone(&self.shared);
        let rotation = Rotation::from_degrees(PREVIEW_ROTATION_DEGREES);
        self.worker = Some(CaptureWorker::spawn(move || {
            Self::loop_iteration(&shared, rotation)
        }));

        self.shared.set_state(SessionState::Running);
        info!("Capture session running");
        Ok(())
    }

    /// One worker iteration: read, publish, fulfill any pending photo
    fn loop_iteration(shared: &Shared, rotation: Rotation) -> ControlFlow<()> {
        let read = match shared.device.lock() {
            Ok(mut device) => device.read_frame(),
            Err(_) => return ControlFlow::Break(()),
        };

        let (data, width, height) = match read {
            Ok(frame) => frame,
            Err(CaptureError::DeviceUnavailable(msg)) => {
                warn!(error = %msg, "Capture device lost, stopping loop");
                Self::fail_pending(shared, CaptureError::DeviceUnavailable(msg.clone()));
                shared.notify(&CaptureEvent::SessionError(CaptureError::DeviceUnavailable(
                    msg,
                )));
                return ControlFlow::Break(());
            }
            Err(e) => {
                warn!(error = %e, "Frame read failed, retrying");
                return ControlFlow::Continue(());
            }
        };

        let frame = Frame::from_rgb(data, width, height, rotation);

        // Fulfill an in-flight still request with this frame. Taking the
        // sender guarantees single completion; a send to an abandoned
        // receiver (timed-out caller) is silently dropped.
        let pending = shared
            .pending_photo
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some((_, sender)) = pending {
            let raw = image::RgbImage::from_raw(width, height, frame.data.to_vec())
                .map(|image| RawPhoto {
                    image,
                    orientation: rotation,
                })
                .ok_or_else(|| {
                    CaptureError::CaptureFailed("frame buffer size mismatch".into())
                });
            let _ = sender.send(raw);
        }

        let sequence = shared.mailbox.write(frame);
        shared.notify(&CaptureEvent::FrameDelivered { sequence });
        ControlFlow::Continue(())
    }

    fn fail_pending(shared: &Shared, error: CaptureError) {
        let pending = shared
            .pending_photo
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some((_, sender)) = pending {
            let _ = sender.send(Err(error));
        }
    }

    /// Remove the pending completion only when it still belongs to
    /// `request_id`; a later request may have installed its own sender
    /// after the worker consumed this one.
    fn clear_pending_if(shared: &Shared, request_id: u64) {
        if let Ok(mut pending) = shared.pending_photo.lock() {
            if pending.as_ref().is_some_and(|(id, _)| *id == request_id) {
                pending.take();
            }
        }
    }

    /// Capture one still photo through the processing pipeline
    ///
    /// Blocks until the next frame arrives or the capture deadline
    /// expires. One request at a time; a second concurrent request fails
    /// rather than queueing.
    pub fn capture_photo(&self) -> Result<CapturedPhoto, CaptureError> {
        if self.state() != SessionState::Running {
            return Err(CaptureError::SessionNotRunning);
        }

        let request_id = self.photo_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = sync_channel(1);
        {
            let mut pending = self
                .shared
                .pending_photo
                .lock()
                .map_err(|_| CaptureError::CaptureFailed("pending slot poisoned".into()))?;
            if pending.is_some() {
                return Err(CaptureError::CaptureFailed(
                    "a capture is already in progress".into(),
                ));
            }
            *pending = Some((request_id, sender));
        }

        let raw = match receiver.recv_timeout(self.capture_timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Self::clear_pending_if(&self.shared, request_id);
                return Err(CaptureError::Timeout);
            }
        };

        let photo = self.pipeline.process(raw)?;
        self.shared.notify(&CaptureEvent::PhotoCaptured);
        Ok(photo)
    }

    /// Stop frame delivery and join the worker thread
    ///
    /// Synchronous: after this returns no further frame reaches the
    /// mailbox or the observer. Safe to call in any state, repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        Self::fail_pending(&self.shared, CaptureError::SessionNotRunning);
        if let Ok(mut device) = self.shared.device.lock() {
            device.stop_stream();
        }
        self.shared.set_state(SessionState::Stopped);
        info!("Capture session stopped");
    }

    #[cfg(test)]
    fn set_capture_timeout(&mut self, timeout: Duration) {
        self.capture_timeout = timeout;
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
