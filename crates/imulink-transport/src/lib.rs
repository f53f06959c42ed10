//! Transports for IMU sensors: BLE, USB serial, and recorded-file
//! playback.
//!
//! The live transports implement [`imulink_device::Link`] and feed the
//! shared session from a background task; [`replay::ReplayDevice`]
//! iterates a captured stream offline.

pub mod ble;
pub mod error;
pub mod replay;
pub mod usb;

pub use ble::{
    ble_device, BleDevice, BleLink, BleScanner, DiscoveredSensor, IMU_RX_CHAR_UUID,
    IMU_SERVICE_UUID, IMU_TX_CHAR_UUID,
};
pub use error::{Result, TransportError};
pub use replay::{playback_device, PlaybackDevice, ReplayDevice, ReplayLink};
pub use usb::{usb_device, UsbDevice, UsbLink, USB_BAUD_RATE};

/// Host clock in nanoseconds since the Unix epoch, for receive
/// timestamps.
pub(crate) fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
