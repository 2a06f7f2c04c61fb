//! V4L2 camera capture via the `v4l` crate.

use crate::config::{CaptureConfig, ColorCorrection};
use crate::frame::{self, BayerPattern, Frame, FrameError};
use crate::quirks::{self, Payload};
use crate::source::CaptureSource;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Number of mmap buffers queued with the driver.
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame decode failed: {0}")]
    Frame(#[from] FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// How the negotiated payload is turned into BGR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
    /// 8-bit raw Bayer mosaic.
    Bayer8(BayerPattern),
    /// 16-bit little-endian raw Bayer mosaic, shifted down to 8 bits.
    Bayer16 { pattern: BayerPattern, shift: u32 },
}

impl PixelFormat {
    /// Map a negotiated fourcc to a decoder, honouring a sensor quirk when the
    /// advertised YUYV is really something else.
    fn from_fourcc(fourcc: FourCC, quirk: Option<&quirks::SensorInfo>) -> Option<Self> {
        let fmt = match &fourcc.repr {
            b"YUYV" => match quirk {
                Some(q) if q.payload == Payload::Bayer16 => Self::Bayer16 {
                    pattern: q.pattern,
                    shift: q.shift,
                },
                Some(q) => Self::Bayer8(q.pattern),
                None => Self::Yuyv,
            },
            b"GREY" => Self::Grey,
            b"Y16 " | b"Y16\0" => Self::Y16,
            b"BA81" => Self::Bayer8(BayerPattern::Bggr),
            b"GBRG" => Self::Bayer8(BayerPattern::Gbrg),
            b"GRBG" => Self::Bayer8(BayerPattern::Grbg),
            b"RGGB" => Self::Bayer8(BayerPattern::Rggb),
            _ => return None,
        };
        Some(fmt)
    }

    /// Decode one raw buffer into packed BGR with color correction applied.
    pub fn decode(
        self,
        buf: &[u8],
        width: u32,
        height: u32,
        correction: ColorCorrection,
    ) -> Result<Vec<u8>, FrameError> {
        match self {
            Self::Yuyv => frame::yuyv_to_bgr(buf, width, height, correction),
            Self::Grey => frame::grey_to_bgr(buf, width, height, correction),
            Self::Y16 => {
                let gray = frame::bayer16_to_bayer8(buf, width, height, 8)?;
                frame::grey_to_bgr(&gray, width, height, correction)
            }
            Self::Bayer8(pattern) => frame::bayer_to_bgr(buf, width, height, pattern, correction),
            Self::Bayer16 { pattern, shift } => {
                let bayer = frame::bayer16_to_bayer8(buf, width, height, shift)?;
                frame::bayer_to_bgr(&bayer, width, height, pattern, correction)
            }
        }
    }
}

/// Bytes of `buf` the driver reports as filled; the whole buffer when
/// `bytesused` is unset or larger than the mapping.
fn filled(buf: &[u8], bytesused: u32) -> &[u8] {
    let used = bytesused as usize;
    if used > 0 && used <= buf.len() {
        &buf[..used]
    } else {
        buf
    }
}

/// Driver `timeval` as a `Duration`; negative fields clamp to zero.
fn driver_timestamp(sec: i64, usec: i64) -> Duration {
    Duration::new(sec.max(0) as u64, (usec.clamp(0, 999_999) * 1000) as u32)
}

/// Turns dequeued buffers into frames and counts the ones that decode.
#[derive(Debug, Clone, Copy)]
struct FrameDecoder {
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    correction: ColorCorrection,
    frame_count: u64,
}

impl FrameDecoder {
    fn decode(
        &mut self,
        buf: &[u8],
        bytesused: u32,
        sec: i64,
        usec: i64,
        sequence: u32,
    ) -> Result<(Frame, Duration), CameraError> {
        let data = self.pixel_format.decode(
            filled(buf, bytesused),
            self.width,
            self.height,
            self.correction,
        )?;

        self.frame_count += 1;

        let frame = Frame {
            data,
            width: self.width,
            height: self.height,
            sequence,
        };
        Ok((frame, driver_timestamp(sec, usec)))
    }
}

/// Streaming V4L2 camera handle.
pub struct Camera {
    // Declared before the device so buffers are unmapped before the fd closes.
    stream: Option<MmapStream<'static>>,
    _device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    decoder: FrameDecoder,
}

impl Camera {
    /// Open the camera named by `config`, negotiate its frame size and start streaming.
    pub fn open(config: &CaptureConfig) -> Result<Self, CameraError> {
        let device_path = config.device_path();
        if !Path::new(&device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path));
        }

        let device = Device::with_path(&device_path).map_err(|e| {
            if e.raw_os_error() == Some(libc::EBUSY) {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = %device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        let quirk = quirks::quirk_for_device(&device_path);
        if let Some(q) = quirk {
            tracing::info!(name = %q.device.name, payload = ?q.sensor.payload, "applying sensor quirk");
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = config.width();
        fmt.height = config.height();

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        if negotiated.width != config.width() || negotiated.height != config.height() {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "requested {}x{}, driver offered {}x{}",
                config.width(),
                config.height(),
                negotiated.width,
                negotiated.height
            )));
        }

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc, quirk.map(|q| &q.sensor))
            .ok_or_else(|| {
                CameraError::FormatNegotiationFailed(format!(
                    "unsupported pixel format: {fourcc:?} (need YUYV, GREY, Y16 or 8-bit Bayer)"
                ))
            })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            pixel_format = ?pixel_format,
            "negotiated format"
        );

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        Ok(Self {
            stream: Some(stream),
            _device: device,
            width: negotiated.width,
            height: negotiated.height,
            device_path,
            decoder: FrameDecoder {
                pixel_format,
                width: negotiated.width,
                height: negotiated.height,
                correction: config.correction(),
                frame_count: 0,
            },
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.decoder.pixel_format
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl CaptureSource for Camera {
    fn read(&mut self) -> Result<(Frame, Duration), CameraError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::CaptureFailed("stream closed".into()))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        self.decoder.decode(
            buf,
            meta.bytesused,
            meta.timestamp.sec as i64,
            meta.timestamp.usec as i64,
            meta.sequence,
        )
    }

    fn frame_count(&self) -> u64 {
        self.decoder.frame_count
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(
                device = %self.device_path,
                frames = self.decoder.frame_count,
                "capture stream stopped"
            );
        }
    }
}
