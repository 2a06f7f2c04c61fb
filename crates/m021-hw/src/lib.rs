//! m021-hw — Capture configuration, V4L2 camera access and frame processing.
//!
//! Targets the Leopard Imaging LI-USB30-M021 but works with any V4L2
//! capture device delivering YUYV, GREY, Y16 or 8-bit Bayer frames.

pub mod camera;
pub mod config;
pub mod frame;
pub mod quirks;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use config::{CaptureConfig, ColorCorrection, ConfigError};
pub use frame::{BayerPattern, Frame};
pub use source::CaptureSource;
