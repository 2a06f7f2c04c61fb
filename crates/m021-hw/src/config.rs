//! Validated capture parameters.
//!
//! A [`CaptureConfig`] is built once from user input and handed by value to
//! the capture source. Construction is the only place values are checked.

use std::fmt;
use thiserror::Error;

/// Inclusive range accepted for each color-correction offset (`int8_t`).
pub const CORRECTION_MIN: i64 = i8::MIN as i64;
pub const CORRECTION_MAX: i64 = i8::MAX as i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidArgument { field, .. } => field,
        }
    }
}

/// Signed per-channel offsets added to every captured pixel.
///
/// Stored in B, G, R order, the order the capture source consumes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCorrection {
    pub blue: i8,
    pub green: i8,
    pub red: i8,
}

impl ColorCorrection {
    pub const NONE: Self = Self {
        blue: 0,
        green: 0,
        red: 0,
    };

    pub fn new(blue: i8, green: i8, red: i8) -> Self {
        Self { blue, green, red }
    }

    /// Parse a comma-separated triplet such as `"-1,-3,-5"`.
    ///
    /// An absent or empty string yields all zeros.
    pub fn parse(input: Option<&str>) -> Result<Self, ConfigError> {
        let Some(input) = input.filter(|s| !s.is_empty()) else {
            return Ok(Self::NONE);
        };

        let items: Vec<&str> = input.split(',').collect();
        if items.len() != 3 {
            return Err(ConfigError::invalid(
                "color-corr",
                format!("color corrections must be a list of length 3, got {}", items.len()),
            ));
        }

        let mut values = [0i8; 3];
        for (slot, item) in values.iter_mut().zip(&items) {
            let item = item.trim();
            let value: i64 = item.parse().map_err(|_| {
                ConfigError::invalid("color-corr", format!("'{item}' is not an integer"))
            })?;
            if !(CORRECTION_MIN..=CORRECTION_MAX).contains(&value) {
                return Err(ConfigError::invalid(
                    "color-corr",
                    format!(
                        "value {value} out of range ({CORRECTION_MIN} <= x <= {CORRECTION_MAX})"
                    ),
                ));
            }
            *slot = value as i8;
        }

        Ok(Self::new(values[0], values[1], values[2]))
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Add the offsets to a packed BGR24 buffer in place, saturating at 0 and 255.
    pub fn apply_bgr(&self, bgr: &mut [u8]) {
        if self.is_none() {
            return;
        }
        for px in bgr.chunks_exact_mut(3) {
            px[0] = px[0].saturating_add_signed(self.blue);
            px[1] = px[1].saturating_add_signed(self.green);
            px[2] = px[2].saturating_add_signed(self.red);
        }
    }
}

impl fmt::Display for ColorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.blue, self.green, self.red)
    }
}

/// Capture parameters: device index, frame size and color correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    device: u32,
    width: u32,
    height: u32,
    correction: ColorCorrection,
}

impl CaptureConfig {
    /// Validate raw user input.
    ///
    /// Rules are checked in order (device, dimensions, color correction) and
    /// the first violation is reported.
    pub fn new(
        device: i64,
        width: i64,
        height: i64,
        color_corr: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if device < 0 {
            return Err(ConfigError::invalid(
                "device",
                "device value can't be less than zero",
            ));
        }
        let device = u32::try_from(device)
            .map_err(|_| ConfigError::invalid("device", format!("{device} is too large")))?;

        if width <= 0 || height <= 0 {
            let field = if width <= 0 { "width" } else { "height" };
            return Err(ConfigError::invalid(
                field,
                "frame width/height must be greater than zero",
            ));
        }
        let width = u32::try_from(width)
            .map_err(|_| ConfigError::invalid("width", format!("{width} is too large")))?;
        let height = u32::try_from(height)
            .map_err(|_| ConfigError::invalid("height", format!("{height} is too large")))?;

        let correction = ColorCorrection::parse(color_corr)?;

        Ok(Self {
            device,
            width,
            height,
            correction,
        })
    }

    pub fn device(&self) -> u32 {
        self.device
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn correction(&self) -> ColorCorrection {
        self.correction
    }

    /// V4L2 node for the configured index, e.g. `/dev/video0`.
    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.device)
    }
}
