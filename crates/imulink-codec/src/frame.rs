use bytes::{BufMut, Bytes, BytesMut};

use imulink_pkg::{registry, Package, PkgError};

use crate::error::{CodecError, Result};

/// Frame header: start byte (1) + payload length (1) + CRC-32 (4 LE) +
/// command code (2 LE) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Start-of-frame marker.
pub const START_BYTE: u8 = 0x02;

/// The payload length travels as a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// A parsed frame header. The checksum covers the command code and the
/// payload, not the header bytes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: usize,
    pub checksum: u32,
    pub code: u16,
}

impl FrameHeader {
    /// Total frame size on the wire (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload_len
    }
}

/// Parse a header from the front of `src` without consuming anything.
///
/// Returns `Ok(None)` if fewer than [`HEADER_SIZE`] bytes are available.
pub fn peek_header(src: &[u8]) -> Result<Option<FrameHeader>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }
    if src[0] != START_BYTE {
        return Err(CodecError::InvalidStartByte(src[0]));
    }
    let payload_len = src[1] as usize;
    let checksum = u32::from_le_bytes(src[2..6].try_into().unwrap());
    let code = u16::from_le_bytes(src[6..8].try_into().unwrap());
    Ok(Some(FrameHeader {
        payload_len,
        checksum,
        code,
    }))
}

/// CRC-32 over the command code bytes followed by the payload.
pub fn frame_checksum(code: u16, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&code.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a package into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬─────────────┬────────────┬──────────────────┐
/// │ Start (1B) │ Length     │ CRC-32      │ Command    │ Payload           │
/// │ 0x02       │ (1B)       │ (4B LE)     │ (2B LE)    │ (Length bytes)    │
/// └────────────┴────────────┴─────────────┴────────────┴──────────────────┘
/// ```
pub fn encode_frame(pkg: &Package, dst: &mut BytesMut) -> Result<()> {
    let (code, payload) = registry::encode(pkg);
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::Pkg(PkgError::PayloadTooLarge {
            code,
            size: payload.len(),
        }));
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(START_BYTE);
    dst.put_u8(payload.len() as u8);
    dst.put_u32_le(frame_checksum(code, &payload));
    dst.put_u16_le(code);
    dst.put_slice(&payload);
    Ok(())
}

/// Encode a package into a standalone buffer, for transports that write
/// one frame per call.
pub fn encode_to_bytes(pkg: &Package) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_frame(pkg, &mut buf)?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imulink_pkg::code;

    #[test]
    fn encode_peek_roundtrip() {
        let pkg = Package::CmdStartRealTimeStreaming {
            mode: 2,
            rate_limit: 60,
        };
        let buf = encode_to_bytes(&pkg).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 3);
        assert_eq!(buf[0], START_BYTE);

        let header = peek_header(&buf).unwrap().unwrap();
        assert_eq!(header.payload_len, 3);
        assert_eq!(header.code, code::CMD_START_REAL_TIME_STREAMING);
        assert_eq!(
            header.checksum,
            frame_checksum(header.code, &buf[HEADER_SIZE..])
        );
        assert_eq!(header.wire_size(), buf.len());
    }

    #[test]
    fn checksum_covers_command_code() {
        // Same payload under two codes must not share a checksum.
        assert_ne!(
            frame_checksum(code::CMD_START_RECORDING, &[]),
            frame_checksum(code::CMD_STOP_RECORDING, &[])
        );
    }

    #[test]
    fn peek_incomplete_header() {
        assert!(peek_header(&[START_BYTE, 0x00, 0x01]).unwrap().is_none());
    }

    #[test]
    fn peek_rejects_bad_start_byte() {
        let buf = [0x55u8; HEADER_SIZE];
        assert!(matches!(
            peek_header(&buf),
            Err(CodecError::InvalidStartByte(0x55))
        ));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let pkg = Package::CmdSetRecordingConfig {
            filename: Bytes::from(vec![b'a'; MAX_PAYLOAD + 1]),
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(&pkg, &mut buf),
            Err(CodecError::Pkg(PkgError::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn empty_payload_frame() {
        let buf = encode_to_bytes(&Package::CmdGetDeviceInfo).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let header = peek_header(&buf).unwrap().unwrap();
        assert_eq!(header.payload_len, 0);
        assert_eq!(header.checksum, frame_checksum(header.code, &[]));
    }
}
