use std::time::Duration;

use thiserror::Error;

/// Errors raised by the device session layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The operation requires a connected device.
    #[error("device is not connected")]
    NotConnected,

    /// The sensor is recording and the caller did not allow aborting it.
    #[error("sensor is recording; stop the recording first")]
    Recording,

    /// The sensor is streaming and the caller did not allow aborting it.
    #[error("sensor is streaming; stop streaming first")]
    Streaming,

    /// No acknowledgement arrived within the deadline.
    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),

    /// The sensor rejected a command.
    #[error("sensor rejected command 0x{command:04x} with error code {error_code}")]
    Sensor { command: u16, error_code: u8 },

    #[error(transparent)]
    Codec(#[from] imulink_codec::CodecError),

    #[error(transparent)]
    Pkg(#[from] imulink_pkg::PkgError),

    /// Failure in the underlying transport link.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DeviceError {
    /// Wrap a transport-specific error.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DeviceError::Transport(err.into())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
