/// Errors reported by the package registry.
///
/// An unknown command code and a known code with a wrong byte count are kept
/// distinct on purpose: the frame codec skips the former (the frame boundary
/// is still trustworthy) and treats the latter as fatal.
#[derive(Debug, thiserror::Error)]
pub enum PkgError {
    /// No package variant is registered for this command code.
    #[error("unknown command code 0x{0:04X}")]
    UnknownCommand(u16),

    /// A fixed-layout payload arrived with an unexpected byte count.
    #[error("unexpected payload size for 0x{code:04X}: {actual} != {expected}")]
    SizeMismatch {
        code: u16,
        expected: usize,
        actual: usize,
    },

    /// A variable-layout payload is shorter than its fixed prefix.
    #[error("truncated payload for 0x{code:04X}: {actual} bytes, need at least {min}")]
    Truncated {
        code: u16,
        min: usize,
        actual: usize,
    },

    /// The encoded payload exceeds the wire limit of the u8 length field.
    #[error("payload too large for 0x{code:04X} ({size} bytes, max 255)")]
    PayloadTooLarge { code: u16, size: usize },
}

pub type Result<T> = std::result::Result<T, PkgError>;
