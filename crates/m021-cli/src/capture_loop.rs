//! Capture → display loop and the throughput summary printed on exit.

use crate::display::{DisplayError, DisplaySurface, KEY_ESCAPE};
use m021_hw::{CameraError, CaptureSource};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Key that stops the loop.
pub const CANCEL_KEY: u32 = KEY_ESCAPE;

/// How long each iteration waits for window events.
pub const WAIT_KEY_DELAY: Duration = Duration::from_millis(1);

const PROGRESS_EVERY: u64 = 100;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("capture failed: {0}")]
    Capture(#[from] CameraError),
    #[error("display failed: {0}")]
    Display(#[from] DisplayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

impl LoopState {
    /// Transition on a polled key. `Stopped` is terminal.
    pub fn on_key(self, key: Option<u32>) -> Self {
        match (self, key) {
            (Self::Running, Some(k)) if k & 0xFF == CANCEL_KEY => Self::Stopped,
            (state, _) => state,
        }
    }
}

/// Frames retrieved over the loop's wall-clock lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub frames: u64,
    pub elapsed: Duration,
}

impl Throughput {
    /// Frames per second; zero when no time has elapsed.
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames in {:.2} seconds = {:.2} fps",
            self.frames,
            self.elapsed.as_secs_f64(),
            self.fps()
        )
    }
}

/// Read, show and poll until the cancel key arrives.
///
/// Elapsed time is taken when the loop exits, before the display is closed.
/// The display is closed on every exit path. A read or display failure
/// ends the loop immediately and is returned as-is.
pub fn run<S, D>(source: &mut S, display: &mut D) -> Result<Throughput, LoopError>
where
    S: CaptureSource,
    D: DisplaySurface,
{
    let start = Instant::now();
    let result = drive(source, display);
    let elapsed = start.elapsed();
    display.close();
    result?;

    let frames = source.frame_count();
    tracing::info!(frames, elapsed_ms = elapsed.as_millis() as u64, "capture loop stopped");
    Ok(Throughput { frames, elapsed })
}

fn drive<S, D>(source: &mut S, display: &mut D) -> Result<(), LoopError>
where
    S: CaptureSource,
    D: DisplaySurface,
{
    let mut state = LoopState::Running;
    while state == LoopState::Running {
        let (frame, timestamp) = source.read()?;
        display.show(&frame)?;

        let count = source.frame_count();
        if count % PROGRESS_EVERY == 0 {
            tracing::debug!(
                frames = count,
                seq = frame.sequence,
                ts_us = timestamp.as_micros() as u64,
                "capture progress"
            );
        }

        state = state.on_key(display.wait_key(WAIT_KEY_DELAY)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use m021_hw::Frame;

    /// Yields 1x1 frames; fails on read number `fail_at` (1-based) if set.
    struct FakeSource {
        count: u64,
        fail_at: Option<u64>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self { count: 0, fail_at: None }
        }
    }

    impl CaptureSource for FakeSource {
        fn read(&mut self) -> Result<(Frame, Duration), CameraError> {
            if self.fail_at == Some(self.count + 1) {
                return Err(CameraError::CaptureFailed("unplugged".into()));
            }
            self.count += 1;
            let frame = Frame {
                data: vec![0, 0, 0],
                width: 1,
                height: 1,
                sequence: self.count as u32,
            };
            Ok((frame, Duration::from_millis(self.count * 33)))
        }

        fn frame_count(&self) -> u64 {
            self.count
        }
    }

    /// Returns `keys[i]` after the i-th shown frame, `None` past the end.
    struct FakeDisplay {
        keys: Vec<Option<u32>>,
        shown: Vec<u32>,
        polls: usize,
        closed: usize,
        fail_show: bool,
        close_delay: Duration,
    }

    impl FakeDisplay {
        fn with_keys(keys: Vec<Option<u32>>) -> Self {
            Self {
                keys,
                shown: Vec::new(),
                polls: 0,
                closed: 0,
                fail_show: false,
                close_delay: Duration::ZERO,
            }
        }
    }

    impl DisplaySurface for FakeDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
            if self.fail_show {
                return Err(DisplayError::NoWindow);
            }
            self.shown.push(frame.sequence);
            Ok(())
        }

        fn wait_key(&mut self, delay: Duration) -> Result<Option<u32>, DisplayError> {
            assert_eq!(delay, WAIT_KEY_DELAY);
            let key = self.keys.get(self.polls).copied().flatten();
            self.polls += 1;
            Ok(key)
        }

        fn close(&mut self) {
            std::thread::sleep(self.close_delay);
            self.closed += 1;
        }
    }

    #[test]
    fn test_stops_on_escape() {
        let mut source = FakeSource::new();
        let mut display = FakeDisplay::with_keys(vec![None, None, Some(CANCEL_KEY)]);

        let summary = run(&mut source, &mut display).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(display.shown, vec![1, 2, 3]);
        assert_eq!(display.closed, 1);
    }

    #[test]
    fn test_elapsed_excludes_display_teardown() {
        let mut source = FakeSource::new();
        let mut display = FakeDisplay::with_keys(vec![Some(CANCEL_KEY)]);
        display.close_delay = Duration::from_millis(300);

        let summary = run(&mut source, &mut display).unwrap();
        assert_eq!(display.closed, 1);
        assert!(
            summary.elapsed < display.close_delay,
            "elapsed {:?} includes window teardown",
            summary.elapsed
        );
    }

    #[test]
    fn test_other_keys_ignored() {
        let mut source = FakeSource::new();
        let keys = vec![Some('q' as u32), Some(13), Some(CANCEL_KEY)];
        let mut display = FakeDisplay::with_keys(keys);

        let summary = run(&mut source, &mut display).unwrap();
        assert_eq!(summary.frames, 3);
    }

    #[test]
    fn test_cancel_key_masked_to_low_byte() {
        let mut source = FakeSource::new();
        let mut display = FakeDisplay::with_keys(vec![Some(0x1000 | CANCEL_KEY)]);

        let summary = run(&mut source, &mut display).unwrap();
        assert_eq!(summary.frames, 1);
    }

    #[test]
    fn test_capture_failure_propagates_and_closes_display() {
        let mut source = FakeSource {
            count: 0,
            fail_at: Some(3),
        };
        let mut display = FakeDisplay::with_keys(Vec::new());

        let err = run(&mut source, &mut display).unwrap_err();
        assert!(matches!(err, LoopError::Capture(CameraError::CaptureFailed(_))));
        assert_eq!(display.shown, vec![1, 2]);
        assert_eq!(display.closed, 1);
    }

    #[test]
    fn test_display_failure_propagates() {
        let mut source = FakeSource::new();
        let mut display = FakeDisplay::with_keys(Vec::new());
        display.fail_show = true;

        let err = run(&mut source, &mut display).unwrap_err();
        assert!(matches!(err, LoopError::Display(DisplayError::NoWindow)));
        assert_eq!(display.closed, 1);
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(LoopState::Running.on_key(None), LoopState::Running);
        assert_eq!(LoopState::Running.on_key(Some(32)), LoopState::Running);
        assert_eq!(LoopState::Running.on_key(Some(CANCEL_KEY)), LoopState::Stopped);
        assert_eq!(LoopState::Stopped.on_key(None), LoopState::Stopped);
    }

    #[test]
    fn test_fps_is_count_over_elapsed() {
        let t = Throughput {
            frames: 300,
            elapsed: Duration::from_secs(8),
        };
        assert_eq!(t.fps(), 300.0 / 8.0);

        let t = Throughput {
            frames: 7,
            elapsed: Duration::from_millis(250),
        };
        assert_eq!(t.fps(), 7.0 / 0.25);
    }

    #[test]
    fn test_fps_zero_elapsed() {
        let t = Throughput {
            frames: 5,
            elapsed: Duration::ZERO,
        };
        assert_eq!(t.fps(), 0.0);
    }

    #[test]
    fn test_summary_format() {
        let t = Throughput {
            frames: 150,
            elapsed: Duration::from_millis(2500),
        };
        assert_eq!(t.to_string(), "150 frames in 2.50 seconds = 60.00 fps");
    }
}
