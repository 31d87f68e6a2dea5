// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the preview frame mailbox

use std::sync::Arc;
use std::thread;

use patchscan::capture::types::{Frame, Rotation};
use patchscan::capture::FrameMailbox;

fn frame(marker: u8) -> Frame {
    Frame::from_rgb(vec![marker; 48], 4, 4, Rotation::Rotate270)
}

#[test]
fn test_no_frame_before_first_write() {
    let mailbox = FrameMailbox::new();
    assert!(mailbox.latest().is_none());
    assert!(mailbox.take().is_none());
}

#[test]
fn test_writer_replaces_unread_frames() {
    let mailbox = FrameMailbox::new();
    for marker in 1..=5 {
        mailbox.write(frame(marker));
    }

    // Only the newest survives; the reader sees the gap in sequences.
    let latest = mailbox.latest().unwrap();
    assert_eq!(latest.data[0], 5);
    assert_eq!(latest.sequence, 5);
}

#[test]
fn test_sequences_are_strictly_increasing_across_threads() {
    let mailbox = Arc::new(FrameMailbox::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for _ in 0..50 {
                    mailbox.write(frame(0));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(mailbox.last_sequence(), 200);
}

#[test]
fn test_frame_keeps_rotation_tag() {
    let mailbox = FrameMailbox::new();
    mailbox.write(frame(9));
    assert_eq!(mailbox.latest().unwrap().rotation, Rotation::Rotate270);
}
