//! Typed package model and command-code registry for the IMU wire protocol.
//!
//! Every frame payload the sensor can send or receive is described by one
//! [`Package`] variant. The [`registry`] module maps each 16-bit command code
//! to its decoder, encoder, and size metadata. Fixed-layout packages have a
//! payload length derived from the variant; variable-layout packages
//! (filename/chunk-bearing) carry their length explicitly.

pub mod code;
pub mod error;
pub mod fields;
pub mod package;
pub mod registry;

pub use code::command_name;
pub use error::{PkgError, Result};
pub use fields::FieldValue;
pub use package::{
    ClockRoundtrip, DeviceInfo, MeasurementMode, Package, QuatFixedRt, SensorErrorInfo,
    SensorState, Status,
};
pub use registry::{decode, encode, size_of, PayloadSize};
