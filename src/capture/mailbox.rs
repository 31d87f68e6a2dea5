// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame mailbox
//!
//! The capture loop publishes each decoded frame here; readers always
//! see the newest frame and never a queue. A write replaces any unread
//! prior frame, so a slow consumer observes gaps in the sequence
//! numbers rather than growing latency.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::Frame;

/// Latest-wins slot holding at most one frame
#[derive(Default)]
pub struct FrameMailbox {
    slot: Mutex<Option<Frame>>,
    sequence: AtomicU64,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, replacing any unread one
    ///
    /// Assigns the frame's monotonic sequence number and returns it.
    pub fn write(&self, mut frame: Frame) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        frame.sequence = sequence;
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
        sequence
    }

    /// Clone out the newest frame without consuming it
    pub fn latest(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    /// Take the newest frame, leaving the slot empty
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Sequence number of the most recently written frame (0 before any)
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Rotation;

    fn frame(marker: u8) -> Frame {
        Frame::from_rgb(vec![marker; 12], 2, 2, Rotation::None)
    }

    #[test]
    fn test_empty_before_first_write() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.latest().is_none());
        assert_eq!(mailbox.last_sequence(), 0);
    }

    #[test]
    fn test_latest_wins() {
        let mailbox = FrameMailbox::new();
        mailbox.write(frame(1));
        mailbox.write(frame(2));
        mailbox.write(frame(3));

        let latest = mailbox.latest().unwrap();
        assert_eq!(latest.data[0], 3);
        assert_eq!(latest.sequence, 3);
    }

    #[test]
    fn test_take_consumes() {
        let mailbox = FrameMailbox::new();
        mailbox.write(frame(7));
        assert!(mailbox.take().is_some());
        assert!(mailbox.latest().is_none());
        // The sequence counter is untouched by reads.
        assert_eq!(mailbox.last_sequence(), 1);
    }

    #[test]
    fn test_sequence_strictly_increasing() {
        let mailbox = FrameMailbox::new();
        let a = mailbox.write(frame(0));
        let b = mailbox.write(frame(0));
        let c = mailbox.write(frame(0));
        assert!(a < b && b < c);
    }
}
