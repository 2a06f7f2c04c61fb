//! Frame type and pixel processing — raw Bayer unpacking, demosaic, YUYV/GREY to BGR.

use crate::config::ColorCorrection;
use serde::Deserialize;

/// A captured color frame, packed BGR24.
#[derive(Clone, Debug)]
pub struct Frame {
    /// BGR pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Driver sequence number of the dequeued buffer.
    pub sequence: u32,
}

/// Color filter array layout, named by the first two rows' top-left 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BayerPattern {
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

/// Channel index in BGR order.
const B: usize = 0;
const G: usize = 1;
const R: usize = 2;

impl BayerPattern {
    /// BGR channel sampled at (x, y).
    fn channel_at(self, x: usize, y: usize) -> usize {
        let block = match self {
            Self::Rggb => [[R, G], [G, B]],
            Self::Grbg => [[G, R], [B, G]],
            Self::Gbrg => [[G, B], [R, G]],
            Self::Bggr => [[B, G], [G, R]],
        };
        block[y & 1][x & 1]
    }
}

/// Unpack little-endian 16-bit raw samples to 8 bits by right-shifting.
///
/// The M021 delivers 12-bit samples in 16-bit words, so `shift` is 4 there.
pub fn bayer16_to_bayer8(
    raw: &[u8],
    width: u32,
    height: u32,
    shift: u32,
) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if raw.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: raw.len(),
        });
    }
    Ok(raw[..expected]
        .chunks_exact(2)
        .map(|w| {
            let value = u16::from_le_bytes([w[0], w[1]]) >> shift.min(15);
            value.min(255) as u8
        })
        .collect())
}

/// Bilinear demosaic of an 8-bit Bayer mosaic into packed BGR, then color correction.
///
/// A pixel keeps its own sample for its own channel; the other two channels
/// are the mean of same-channel samples in its 3x3 neighbourhood.
pub fn bayer_to_bgr(
    bayer: &[u8],
    width: u32,
    height: u32,
    pattern: BayerPattern,
    correction: ColorCorrection,
) -> Result<Vec<u8>, FrameError> {
    let w = width as usize;
    let h = height as usize;
    if bayer.len() < w * h {
        return Err(FrameError::InvalidLength {
            expected: w * h,
            actual: bayer.len(),
        });
    }

    let mut bgr = vec![0u8; w * h * 3];
    for y in 0..h {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let own = pattern.channel_at(x, y);

            let mut sum = [0u32; 3];
            let mut count = [0u32; 3];
            for ny in y0..=y1 {
                for nx in x0..=x1 {
                    let c = pattern.channel_at(nx, ny);
                    sum[c] += bayer[ny * w + nx] as u32;
                    count[c] += 1;
                }
            }

            let out = &mut bgr[(y * w + x) * 3..(y * w + x) * 3 + 3];
            for c in [B, G, R] {
                out[c] = if c == own {
                    bayer[y * w + x]
                } else if count[c] > 0 {
                    ((sum[c] + count[c] / 2) / count[c]) as u8
                } else {
                    0
                };
            }
        }
    }

    correction.apply_bgr(&mut bgr);
    Ok(bgr)
}

/// Convert packed YUYV (4:2:2) to BGR using the BT.601 integer approximation.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_bgr(
    yuyv: &[u8],
    width: u32,
    height: u32,
    correction: ColorCorrection,
) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut bgr = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as i32 - 128;
        let v = quad[3] as i32 - 128;
        for y in [quad[0], quad[2]] {
            let c = y as i32;
            let r = c + ((359 * v) >> 8);
            let g = c - ((88 * u + 183 * v) >> 8);
            let b = c + ((454 * u) >> 8);
            bgr.extend([clamp_u8(b), clamp_u8(g), clamp_u8(r)]);
        }
    }

    correction.apply_bgr(&mut bgr);
    Ok(bgr)
}

/// Replicate an 8-bit grayscale buffer into all three BGR channels.
pub fn grey_to_bgr(
    gray: &[u8],
    width: u32,
    height: u32,
    correction: ColorCorrection,
) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    if gray.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: gray.len(),
        });
    }
    let mut bgr: Vec<u8> = gray[..pixels].iter().flat_map(|&p| [p, p, p]).collect();
    correction.apply_bgr(&mut bgr);
    Ok(bgr)
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
