//! Incremental frame parser over an unreliable chunked byte stream.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use imulink_pkg::{code, registry, Package, PkgError};

use crate::error::{CodecError, Result};
use crate::frame::{frame_checksum, peek_header, HEADER_SIZE};

/// Largest number of complete frames a real-time chunk may carry ahead of
/// its raw remainder.
pub const RT_MAX_FRAMES: usize = 3;

/// Incremental parser that turns transport chunks into [`Package`]s.
///
/// Chunk boundaries carry no meaning: a frame may span any number of
/// `feed` calls. Frames pushed through [`Unpacker::extract_rt_packages`]
/// are delivered ahead of buffered bytes, in arrival order.
///
/// Fatal errors are sticky. A failing frame is left at the front of the
/// buffer, so every subsequent call reports the same error until the
/// caller resets the parser with [`Unpacker::clear`].
#[derive(Debug, Default)]
pub struct Unpacker {
    buf: BytesMut,
    rt_fifo: VecDeque<Package>,
    resync: bool,
    ack_wait: bool,
}

impl Unpacker {
    /// Parser for a stream known to begin at a frame boundary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that silently discards leading garbage until the first
    /// frame parses. After that first frame, corruption is fatal again.
    /// Used for recordings that may start mid-frame.
    pub fn with_resync() -> Self {
        Self {
            resync: true,
            ..Self::default()
        }
    }

    /// Append raw transport bytes to the parse buffer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Drop all buffered bytes and queued real-time packages, and clear
    /// any armed ack-wait. The parser is ready for a fresh stream.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.rt_fifo.clear();
        self.resync = false;
        self.ack_wait = false;
    }

    /// Number of bytes waiting in the parse buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Arm ack-wait mode: all buffered and future bytes are discarded
    /// until a valid `AckStopStreamingAndClearBuffer` frame appears. The
    /// sensor keeps emitting stale measurement bytes for a short while
    /// after a stop command, and those may be cut mid-frame.
    pub fn wait_for_stop_streaming_ack(&mut self) {
        self.ack_wait = true;
    }

    /// Split a real-time notification into its frame prefix and raw
    /// remainder.
    ///
    /// The first byte encodes the frame count as `0xFF - n` with
    /// `n <= `[`RT_MAX_FRAMES`]. The `n` complete CRC-checked frames that
    /// follow are queued for [`Unpacker::next_package`]; the untouched
    /// remainder is returned for zero-copy sample decoding. A
    /// `DataClockRoundtrip` found here gets its zero
    /// `host_receive_timestamp` backfilled from `host_receive_timestamp`.
    pub fn extract_rt_packages<'a>(
        &mut self,
        chunk: &'a [u8],
        host_receive_timestamp: Option<i64>,
    ) -> Result<&'a [u8]> {
        let Some((&count_byte, mut rest)) = chunk.split_first() else {
            return Ok(chunk);
        };
        let count = (0xFFu8.wrapping_sub(count_byte)) as usize;
        if count > RT_MAX_FRAMES {
            return Err(CodecError::RtCount(count_byte));
        }
        for _ in 0..count {
            let header = match peek_header(rest)? {
                Some(header) => header,
                None => {
                    return Err(CodecError::RtTruncated {
                        have: rest.len(),
                        need: HEADER_SIZE,
                    })
                }
            };
            let total = header.wire_size();
            if rest.len() < total {
                return Err(CodecError::RtTruncated {
                    have: rest.len(),
                    need: total,
                });
            }
            let payload = &rest[HEADER_SIZE..total];
            let computed = frame_checksum(header.code, payload);
            if computed != header.checksum {
                return Err(CodecError::CrcMismatch {
                    code: header.code,
                    computed,
                    carried: header.checksum,
                });
            }
            match registry::decode(header.code, payload) {
                Ok(mut pkg) => {
                    if let (Package::DataClockRoundtrip(roundtrip), Some(ts)) =
                        (&mut pkg, host_receive_timestamp)
                    {
                        if roundtrip.host_receive_timestamp == 0 {
                            roundtrip.host_receive_timestamp = ts;
                        }
                    }
                    self.rt_fifo.push_back(pkg);
                }
                Err(PkgError::UnknownCommand(code)) => {
                    tracing::warn!(code = %format_args!("{code:#06x}"), "skipping unknown command in real-time chunk");
                }
                Err(err) => return Err(CodecError::Pkg(err)),
            }
            rest = &rest[total..];
        }
        Ok(rest)
    }

    /// Next complete package, or `Ok(None)` if the buffer holds no
    /// complete frame yet. Real-time packages queued by
    /// [`Unpacker::extract_rt_packages`] come first.
    pub fn next_package(&mut self) -> Result<Option<Package>> {
        if let Some(pkg) = self.rt_fifo.pop_front() {
            return Ok(Some(pkg));
        }
        if self.ack_wait {
            return self.scan_for_stop_ack();
        }
        loop {
            let header = match peek_header(&self.buf) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(None),
                Err(_) if self.resync => {
                    self.buf.advance(1);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let total = header.wire_size();
            if self.buf.len() < total {
                return Ok(None);
            }
            let payload = &self.buf[HEADER_SIZE..total];
            let computed = frame_checksum(header.code, payload);
            if computed != header.checksum {
                if self.resync {
                    self.buf.advance(1);
                    continue;
                }
                return Err(CodecError::CrcMismatch {
                    code: header.code,
                    computed,
                    carried: header.checksum,
                });
            }
            match registry::decode(header.code, payload) {
                Ok(pkg) => {
                    self.buf.advance(total);
                    self.resync = false;
                    return Ok(Some(pkg));
                }
                Err(PkgError::UnknownCommand(code)) => {
                    // Firmware ahead of this library. Skip the frame, the
                    // stream stays aligned.
                    tracing::warn!(code = %format_args!("{code:#06x}"), "skipping frame with unknown command");
                    self.buf.advance(total);
                }
                Err(err) => return Err(CodecError::Pkg(err)),
            }
        }
    }

    /// Drop bytes one at a time until a valid stop-streaming ack frame
    /// parses, then resume normal framing from right after it.
    fn scan_for_stop_ack(&mut self) -> Result<Option<Package>> {
        loop {
            let header = match peek_header(&self.buf) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(None),
                Err(_) => {
                    self.buf.advance(1);
                    continue;
                }
            };
            if header.code != code::ACK_STOP_STREAMING_AND_CLEAR_BUFFER {
                self.buf.advance(1);
                continue;
            }
            let total = header.wire_size();
            if self.buf.len() < total {
                return Ok(None);
            }
            let payload = &self.buf[HEADER_SIZE..total];
            if frame_checksum(header.code, payload) != header.checksum {
                self.buf.advance(1);
                continue;
            }
            let pkg = registry::decode(header.code, payload)?;
            self.buf.advance(total);
            self.ack_wait = false;
            return Ok(Some(pkg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_to_bytes, START_BYTE};
    use bytes::{BufMut, BytesMut};
    use imulink_pkg::package::{DeviceInfo, SensorState, Status};

    fn frame(pkg: &Package) -> Vec<u8> {
        encode_to_bytes(pkg).unwrap().to_vec()
    }

    fn raw_frame(code: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(START_BYTE);
        buf.put_u8(payload.len() as u8);
        buf.put_u32_le(frame_checksum(code, payload));
        buf.put_u16_le(code);
        buf.put_slice(payload);
        buf.to_vec()
    }

    fn device_info() -> Package {
        Package::DataDeviceInfo(DeviceInfo {
            serial: 0x42,
            hw_version: 1,
            fw_major: 1,
            fw_minor: 0,
            fw_patch: 3,
        })
    }

    fn status(state: SensorState) -> Package {
        Package::DataStatus(Status {
            sensor_state: state,
            battery_percent: 50,
            charging: false,
            storage_free_kib: 1024,
            uptime_seconds: 60,
            timestamp: 1_000,
        })
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let mut wire = frame(&device_info());
        wire.extend(frame(&status(SensorState::Idle)));

        let mut unpacker = Unpacker::new();
        let mut out = Vec::new();
        // Worst case: one byte per feed call.
        for byte in wire {
            unpacker.feed(&[byte]);
            while let Some(pkg) = unpacker.next_package().unwrap() {
                out.push(pkg);
            }
        }
        assert_eq!(out, vec![device_info(), status(SensorState::Idle)]);
        assert_eq!(unpacker.buffered(), 0);
    }

    #[test]
    fn resync_drops_leading_garbage_once() {
        let mut wire = vec![0xde, 0xad, 0xbe, 0xef];
        wire.extend(frame(&device_info()));

        let mut unpacker = Unpacker::with_resync();
        unpacker.feed(&wire);
        assert_eq!(unpacker.next_package().unwrap(), Some(device_info()));

        // Resync only covers the head of the stream.
        unpacker.feed(&[0x00; HEADER_SIZE]);
        assert!(matches!(
            unpacker.next_package(),
            Err(CodecError::InvalidStartByte(0x00))
        ));
    }

    #[test]
    fn fatal_errors_are_sticky() {
        let mut wire = frame(&device_info());
        wire[3] ^= 0xff; // Corrupt the checksum.

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);
        assert!(matches!(
            unpacker.next_package(),
            Err(CodecError::CrcMismatch { .. })
        ));
        // Nothing was consumed, the same error repeats.
        assert!(matches!(
            unpacker.next_package(),
            Err(CodecError::CrcMismatch { .. })
        ));
        assert_eq!(unpacker.buffered(), wire.len());

        unpacker.clear();
        assert_eq!(unpacker.next_package().unwrap(), None);
    }

    #[test]
    fn unknown_command_skips_one_frame() {
        let mut wire = raw_frame(0x7777, &[1, 2, 3]);
        wire.extend(frame(&device_info()));

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);
        assert_eq!(unpacker.next_package().unwrap(), Some(device_info()));
        assert_eq!(unpacker.next_package().unwrap(), None);
    }

    #[test]
    fn wrong_sized_known_frame_is_fatal() {
        // A known code whose payload length disagrees with the registry.
        let wire = raw_frame(code::DATA_DEVICE_INFO, &[0u8; 3]);
        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);
        assert!(matches!(
            unpacker.next_package(),
            Err(CodecError::Pkg(PkgError::SizeMismatch { .. }))
        ));
    }

    #[test]
    fn rt_chunk_splits_frames_from_remainder() {
        let roundtrip = Package::DataClockRoundtrip(imulink_pkg::package::ClockRoundtrip {
            sensor_timestamp: 77,
            host_send_timestamp: 123,
            host_receive_timestamp: 0,
        });
        let mut chunk = vec![0xfd]; // Two frames ahead of the samples.
        chunk.extend(frame(&roundtrip));
        chunk.extend(frame(&status(SensorState::Streaming)));
        chunk.extend([0xAA; 40]); // Raw sample remainder.

        let mut unpacker = Unpacker::new();
        let rest = unpacker.extract_rt_packages(&chunk, Some(999)).unwrap();
        assert_eq!(rest, &[0xAA; 40][..]);

        // Backfilled receive timestamp, delivered ahead of buffered bytes.
        unpacker.feed(&frame(&device_info()));
        match unpacker.next_package().unwrap() {
            Some(Package::DataClockRoundtrip(rt)) => {
                assert_eq!(rt.host_receive_timestamp, 999);
                assert_eq!(rt.host_send_timestamp, 123);
            }
            other => panic!("expected clock roundtrip, got {other:?}"),
        }
        assert_eq!(
            unpacker.next_package().unwrap(),
            Some(status(SensorState::Streaming))
        );
        assert_eq!(unpacker.next_package().unwrap(), Some(device_info()));
    }

    #[test]
    fn rt_chunk_without_frames_passes_through() {
        let chunk = [0xffu8, 9, 9, 9];
        let mut unpacker = Unpacker::new();
        let rest = unpacker.extract_rt_packages(&chunk, None).unwrap();
        assert_eq!(rest, &[9, 9, 9][..]);
    }

    #[test]
    fn rt_count_byte_is_validated() {
        let mut unpacker = Unpacker::new();
        assert!(matches!(
            unpacker.extract_rt_packages(&[0x10, 0, 0], None),
            Err(CodecError::RtCount(0x10))
        ));
        let truncated = [0xfeu8, START_BYTE, 0x00];
        assert!(matches!(
            unpacker.extract_rt_packages(&truncated, None),
            Err(CodecError::RtTruncated { have: 2, need: 8 })
        ));
    }

    #[test]
    fn ack_wait_discards_until_stop_ack() {
        let mut wire = frame(&status(SensorState::Streaming));
        wire.extend([0x13, 0x37]); // Mid-frame cut from the stale stream.
        wire.extend(frame(&Package::AckStopStreamingAndClearBuffer));
        wire.extend(frame(&device_info()));

        let mut unpacker = Unpacker::new();
        unpacker.wait_for_stop_streaming_ack();
        unpacker.feed(&wire);

        assert_eq!(
            unpacker.next_package().unwrap(),
            Some(Package::AckStopStreamingAndClearBuffer)
        );
        // Framing resumes normally right after the ack.
        assert_eq!(unpacker.next_package().unwrap(), Some(device_info()));
        assert_eq!(unpacker.next_package().unwrap(), None);
    }

    #[test]
    fn ack_wait_survives_partial_ack_frame() {
        let ack = frame(&Package::AckStopStreamingAndClearBuffer);
        let mut unpacker = Unpacker::new();
        unpacker.wait_for_stop_streaming_ack();
        unpacker.feed(&ack[..5]);
        assert_eq!(unpacker.next_package().unwrap(), None);
        unpacker.feed(&ack[5..]);
        assert_eq!(
            unpacker.next_package().unwrap(),
            Some(Package::AckStopStreamingAndClearBuffer)
        );
    }
}
