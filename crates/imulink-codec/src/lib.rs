//! Frame codec for the IMU sensor wire protocol.
//!
//! Every message travels as an 8-byte header (start marker, payload
//! length, CRC-32, command code) followed by the payload. The
//! [`Unpacker`] turns an arbitrarily chunked byte stream back into typed
//! packages and handles the real-time notification format, stream
//! resynchronization, and the stop-streaming drain.

pub mod error;
pub mod frame;
pub mod unpacker;

pub use error::{CodecError, Result};
pub use frame::{
    encode_frame, encode_to_bytes, frame_checksum, peek_header, FrameHeader, HEADER_SIZE,
    MAX_PAYLOAD, START_BYTE,
};
pub use unpacker::{Unpacker, RT_MAX_FRAMES};
