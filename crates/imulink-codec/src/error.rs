use thiserror::Error;

/// Errors raised while framing or unframing the sensor byte stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte at a frame boundary is not the start marker.
    #[error("invalid start byte 0x{0:02x}")]
    InvalidStartByte(u8),

    /// The carried CRC-32 does not match the one computed over the frame.
    #[error("crc mismatch for command 0x{code:04x}: computed 0x{computed:08x}, carried 0x{carried:08x}")]
    CrcMismatch {
        code: u16,
        computed: u32,
        carried: u32,
    },

    /// A real-time chunk announced more frame bytes than it carries.
    #[error("real-time chunk truncated: have {have} bytes, need {need}")]
    RtTruncated { have: usize, need: usize },

    /// The real-time count byte encodes more frames than the protocol allows.
    #[error("invalid real-time count byte 0x{0:02x}")]
    RtCount(u8),

    #[error(transparent)]
    Pkg(#[from] imulink_pkg::PkgError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
