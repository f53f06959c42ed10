//! Device session layer for IMU sensors.
//!
//! A [`Session`] holds everything a transport and a consumer share: the
//! frame parser, the package queue with in-band connect/disconnect
//! sentinels, listener registries, and the latest status and identity.
//! [`Device`] wraps a session together with a [`Link`] transport and
//! implements the command surface, including the init handshake that
//! brings a sensor into a known idle state.

pub mod device;
pub mod error;
pub mod listener;
pub mod queue;
pub mod session;

pub use device::{Device, InitOptions, Link, DEFAULT_ACK_TIMEOUT};
pub use error::{DeviceError, Result};
pub use listener::{
    ListenerId, Listeners, PackageListener, RawChunkListener, RawDataListener, StateListener,
};
pub use queue::{PackageQueue, QueueEntry};
pub use session::{DeviceState, Latch, Session};
