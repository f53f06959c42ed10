//! Host-side driver stack for wearable IMU sensors.
//!
//! The sensors speak a CRC-protected binary framing protocol over BLE
//! notifications or a USB serial port. This crate re-exports the whole
//! stack:
//!
//! - [`pkg`]: command codes, typed packages, and the payload registry
//! - [`codec`]: frame encoding and the incremental [`codec::Unpacker`]
//! - [`device`]: the shared [`device::Session`] and [`device::Device`]
//!   handle with the init handshake and ack correlation
//! - [`transport`]: BLE and USB links plus recorded-file playback
//!
//! A typical live session:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use imulink::device::InitOptions;
//! use imulink::transport::{ble_device, BleScanner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = BleScanner::new().await?;
//! let peripheral = scanner
//!     .find_by_name("IMU_ab1234", Duration::from_secs(5))
//!     .await?;
//!
//! let mut device = ble_device(peripheral);
//! device.connect().await?;
//! let info = device.init(&InitOptions::default()).await?;
//! println!("connected to {}", info.device_name());
//!
//! while let Some(package) = device.session().apoll().await {
//!     println!("{}", package.type_name());
//! }
//! # Ok(())
//! # }
//! ```

pub use imulink_codec as codec;
pub use imulink_device as device;
pub use imulink_pkg as pkg;
pub use imulink_transport as transport;

pub use imulink_device::{Device, DeviceError, DeviceState, InitOptions, Session};
pub use imulink_pkg::{Package, PkgError};
