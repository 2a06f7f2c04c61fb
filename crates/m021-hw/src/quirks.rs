//! Sensor quirks database.
//!
//! Maps camera USB VID:PID to how the sensor's payload must be decoded when
//! it does not match the advertised fourcc. Quirk files are embedded at
//! compile time from `contrib/hw/*.toml`.

use crate::frame::BayerPattern;
use serde::Deserialize;
use std::sync::OnceLock;

/// Compile-time embedded quirk for the Leopard Imaging LI-USB30-M021.
const QUIRK_2A0B_00F5: &str = include_str!("../../../contrib/hw/2a0b-00f5.toml");

static QUIRK_DB: OnceLock<Vec<QuirkFile>> = OnceLock::new();

/// Top-level quirk file structure (one per `contrib/hw/*.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct QuirkFile {
    pub device: QuirkDevice,
    pub sensor: SensorInfo,
}

/// Camera identification fields from the `[device]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QuirkDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: String,
}

/// Payload decoding parameters from the `[sensor]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SensorInfo {
    pub payload: Payload,
    pub pattern: BayerPattern,
    /// Right shift from the sensor bit depth down to 8 bits.
    #[serde(default)]
    pub shift: u32,
}

/// Actual layout of the bytes the sensor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// One 8-bit Bayer sample per pixel.
    Bayer8,
    /// One little-endian 16-bit Bayer sample per pixel.
    Bayer16,
}

fn quirk_db() -> &'static Vec<QuirkFile> {
    QUIRK_DB.get_or_init(|| {
        let mut db = Vec::new();
        for src in [QUIRK_2A0B_00F5] {
            match toml::from_str::<QuirkFile>(src) {
                Ok(q) => db.push(q),
                Err(e) => tracing::error!(error = %e, "bad quirk TOML"),
            }
        }
        db
    })
}

/// Look up a quirk by USB vendor:product ID.
pub fn lookup_quirk(vid: u16, pid: u16) -> Option<&'static QuirkFile> {
    quirk_db()
        .iter()
        .find(|q| q.device.vendor_id == vid && q.device.product_id == pid)
}

/// Look up the quirk for a `/dev/videoN` node, if it is a known USB camera.
pub fn quirk_for_device(device_path: &str) -> Option<&'static QuirkFile> {
    let (vid, pid) = get_usb_ids(device_path)?;
    tracing::debug!(
        device = device_path,
        vid = %format!("{vid:04x}"),
        pid = %format!("{pid:04x}"),
        "resolved USB ids"
    );
    lookup_quirk(vid, pid)
}

/// Read USB VID:PID from sysfs for a `/dev/videoN` device.
///
/// Returns `None` if the device is not USB or sysfs is unavailable.
pub fn get_usb_ids(device_path: &str) -> Option<(u16, u16)> {
    // /dev/video0 → "video0"
    let dev_name = std::path::Path::new(device_path).file_name()?.to_str()?;
    // /sys/class/video4linux/video0/device links to the USB interface dir;
    // its parent is the USB device dir holding idVendor/idProduct.
    let device_link = format!("/sys/class/video4linux/{dev_name}/device");
    let interface_dir = std::fs::canonicalize(&device_link).ok()?;
    let usb_device_dir = interface_dir.parent()?;

    let vid_str = std::fs::read_to_string(usb_device_dir.join("idVendor")).ok()?;
    let pid_str = std::fs::read_to_string(usb_device_dir.join("idProduct")).ok()?;

    let vid = u16::from_str_radix(vid_str.trim(), 16).ok()?;
    let pid = u16::from_str_radix(pid_str.trim(), 16).ok()?;
    Some((vid, pid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_quirks_parse() {
        assert_eq!(quirk_db().len(), 1);
    }

    #[test]
    fn test_m021_quirk() {
        let q = lookup_quirk(0x2a0b, 0x00f5).expect("M021 quirk");
        assert_eq!(q.sensor.payload, Payload::Bayer16);
        assert_eq!(q.sensor.pattern, BayerPattern::Grbg);
        assert_eq!(q.sensor.shift, 4);
    }

    #[test]
    fn test_unknown_device_has_no_quirk() {
        assert!(lookup_quirk(0x046d, 0x0825).is_none());
    }

    #[test]
    fn test_usb_ids_missing_node() {
        assert!(get_usb_ids("/dev/video-does-not-exist").is_none());
    }
}
