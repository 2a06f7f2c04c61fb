//! Capture source capability.
//!
//! The capture loop only needs these operations, so it can run against a real
//! [`Camera`](crate::Camera) or a scripted fake.

use crate::camera::CameraError;
use crate::frame::Frame;
use std::time::Duration;

pub trait CaptureSource {
    /// Block until the next frame is available.
    ///
    /// Returns the frame and its capture timestamp. Errors are hard failures;
    /// callers should not retry.
    fn read(&mut self) -> Result<(Frame, Duration), CameraError>;

    /// Number of frames successfully read so far. Never decreases.
    fn frame_count(&self) -> u64;

    /// Stop streaming and release device buffers. Further reads fail.
    fn close(&mut self) {}
}
