use thiserror::Error;

/// Errors raised while setting up or driving a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("no bluetooth adapter available")]
    NoAdapter,

    #[error("device {0:?} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} missing on peripheral")]
    CharacteristicMissing(uuid::Uuid),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
