//! Static mapping from command code to decoder, encoder, and size metadata.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::code::*;
use crate::error::{PkgError, Result};
use crate::package::{
    ClockRoundtrip, DeviceInfo, MeasurementMode, Package, QuatFixedRt, SensorErrorInfo,
    SensorState, Status, ACC_Z_BURST_SAMPLES_LEN, FULL_PACKED_SAMPLES_LEN, RAW_BURST_SAMPLES_LEN,
};

/// Payload size metadata for a registered command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSize {
    /// The payload length is a constant derived from the variant.
    Fixed(usize),
    /// The payload carries its length explicitly (filename/chunk-bearing).
    Variable,
}

const STATUS_SIZE: usize = 19;
const DEVICE_INFO_SIZE: usize = 8;
const CLOCK_ROUNDTRIP_SIZE: usize = 24;
const MEASUREMENT_MODE_SIZE: usize = 29;
const QUAT_FIXED_RT_SIZE: usize = 18;

/// Expected payload size for a command code, or `None` if the code is not
/// registered.
pub fn size_of(code: u16) -> Option<PayloadSize> {
    use PayloadSize::*;
    let size = match code {
        CMD_GET_DEVICE_INFO => Fixed(0),
        CMD_SET_ABSOLUTE_TIME => Fixed(8),
        CMD_SET_MEASUREMENT_MODE | DATA_MEASUREMENT_MODE => Fixed(MEASUREMENT_MODE_SIZE),
        CMD_SET_RECORDING_CONFIG | DATA_RECORDING_CONFIG => Variable,
        CMD_START_RECORDING | CMD_STOP_RECORDING => Fixed(0),
        CMD_START_STREAMING | CMD_STOP_STREAMING_AND_CLEAR_BUFFER => Fixed(0),
        CMD_START_REAL_TIME_STREAMING => Fixed(3),
        CMD_FS_LIST_FILES | CMD_FS_STOP_GET_BYTES | CMD_FS_FORMAT_FILESYSTEM => Fixed(0),
        CMD_FS_GET_SIZE | CMD_FS_GET_BYTES | CMD_FS_DELETE_FILE => Variable,
        ACK_START_RECORDING | ACK_STOP_RECORDING | ACK_STOP_STREAMING_AND_CLEAR_BUFFER => Fixed(0),
        ACK_FS_DELETE_FILE | ACK_FS_FORMAT_FILESYSTEM => Fixed(0),
        DATA_STATUS => Fixed(STATUS_SIZE),
        DATA_DEVICE_INFO => Fixed(DEVICE_INFO_SIZE),
        DATA_CLOCK_ROUNDTRIP => Fixed(CLOCK_ROUNDTRIP_SIZE),
        DATA_QUAT_FIXED_RT => Fixed(QUAT_FIXED_RT_SIZE),
        DATA_FULL_PACKED => Fixed(8 + FULL_PACKED_SAMPLES_LEN),
        DATA_RAW_BURST => Fixed(8 + RAW_BURST_SAMPLES_LEN),
        DATA_ACC_Z_BURST => Fixed(8 + ACC_Z_BURST_SAMPLES_LEN),
        DATA_FS_FILE_COUNT => Fixed(2),
        DATA_FS_FILE | DATA_FS_SIZE | DATA_FS_BYTES => Variable,
        SENSOR_ERROR => Fixed(3),
        _ => return None,
    };
    Some(size)
}

/// Decode a payload into a typed [`Package`].
///
/// Unknown codes and wrong byte counts are distinct failures; the frame
/// codec recovers from the former and treats the latter as fatal.
pub fn decode(code: u16, payload: &[u8]) -> Result<Package> {
    match size_of(code) {
        None => return Err(PkgError::UnknownCommand(code)),
        Some(PayloadSize::Fixed(expected)) if payload.len() != expected => {
            return Err(PkgError::SizeMismatch {
                code,
                expected,
                actual: payload.len(),
            })
        }
        Some(_) => {}
    }

    let mut buf = payload;
    let pkg = match code {
        CMD_GET_DEVICE_INFO => Package::CmdGetDeviceInfo,
        CMD_SET_ABSOLUTE_TIME => Package::CmdSetAbsoluteTime {
            new_timestamp: buf.get_i64_le(),
        },
        CMD_SET_MEASUREMENT_MODE => Package::CmdSetMeasurementMode(decode_mode(&mut buf)),
        DATA_MEASUREMENT_MODE => Package::DataMeasurementMode(decode_mode(&mut buf)),
        CMD_SET_RECORDING_CONFIG => Package::CmdSetRecordingConfig {
            filename: Bytes::copy_from_slice(buf),
        },
        DATA_RECORDING_CONFIG => Package::DataRecordingConfig {
            filename: Bytes::copy_from_slice(buf),
        },
        CMD_START_RECORDING => Package::CmdStartRecording,
        CMD_STOP_RECORDING => Package::CmdStopRecording,
        CMD_START_STREAMING => Package::CmdStartStreaming,
        CMD_STOP_STREAMING_AND_CLEAR_BUFFER => Package::CmdStopStreamingAndClearBuffer,
        CMD_START_REAL_TIME_STREAMING => Package::CmdStartRealTimeStreaming {
            mode: buf.get_u8(),
            rate_limit: buf.get_u16_le(),
        },
        CMD_FS_LIST_FILES => Package::CmdFsListFiles,
        CMD_FS_GET_SIZE => Package::CmdFsGetSize {
            filename: Bytes::copy_from_slice(buf),
        },
        CMD_FS_GET_BYTES => {
            require(code, buf.len(), 8)?;
            Package::CmdFsGetBytes {
                start_pos: buf.get_u32_le(),
                end_pos: buf.get_u32_le(),
                filename: Bytes::copy_from_slice(buf),
            }
        }
        CMD_FS_STOP_GET_BYTES => Package::CmdFsStopGetBytes,
        CMD_FS_DELETE_FILE => Package::CmdFsDeleteFile {
            filename: Bytes::copy_from_slice(buf),
        },
        CMD_FS_FORMAT_FILESYSTEM => Package::CmdFsFormatFilesystem,
        ACK_START_RECORDING => Package::AckStartRecording,
        ACK_STOP_RECORDING => Package::AckStopRecording,
        ACK_STOP_STREAMING_AND_CLEAR_BUFFER => Package::AckStopStreamingAndClearBuffer,
        ACK_FS_DELETE_FILE => Package::AckFsDeleteFile,
        ACK_FS_FORMAT_FILESYSTEM => Package::AckFsFormatFilesystem,
        DATA_STATUS => Package::DataStatus(Status {
            sensor_state: SensorState::from_raw(buf.get_u8()),
            battery_percent: buf.get_u8(),
            charging: buf.get_u8() != 0,
            storage_free_kib: buf.get_u32_le(),
            uptime_seconds: buf.get_u32_le(),
            timestamp: buf.get_u64_le(),
        }),
        DATA_DEVICE_INFO => Package::DataDeviceInfo(DeviceInfo {
            serial: buf.get_u32_le(),
            hw_version: buf.get_u8(),
            fw_major: buf.get_u8(),
            fw_minor: buf.get_u8(),
            fw_patch: buf.get_u8(),
        }),
        DATA_CLOCK_ROUNDTRIP => Package::DataClockRoundtrip(ClockRoundtrip {
            sensor_timestamp: buf.get_u64_le(),
            host_send_timestamp: buf.get_i64_le(),
            host_receive_timestamp: buf.get_i64_le(),
        }),
        DATA_QUAT_FIXED_RT => Package::DataQuatFixedRt(QuatFixedRt {
            timestamp: buf.get_u64_le(),
            quat: buf.get_u64_le(),
            heading_delta_centirad: buf.get_i16_le(),
        }),
        DATA_FULL_PACKED => Package::DataFullPacked {
            timestamp: buf.get_u64_le(),
            samples: Bytes::copy_from_slice(buf),
        },
        DATA_RAW_BURST => Package::DataRawBurst {
            timestamp: buf.get_u64_le(),
            samples: Bytes::copy_from_slice(buf),
        },
        DATA_ACC_Z_BURST => Package::DataAccZBurst {
            timestamp: buf.get_u64_le(),
            samples: Bytes::copy_from_slice(buf),
        },
        DATA_FS_FILE_COUNT => Package::DataFsFileCount {
            file_count: buf.get_u16_le(),
        },
        DATA_FS_FILE => {
            require(code, buf.len(), 6)?;
            Package::DataFsFile {
                index: buf.get_u16_le(),
                size: buf.get_u32_le(),
                filename: Bytes::copy_from_slice(buf),
            }
        }
        DATA_FS_SIZE => {
            require(code, buf.len(), 4)?;
            Package::DataFsSize {
                file_size: buf.get_u32_le(),
                filename: Bytes::copy_from_slice(buf),
            }
        }
        DATA_FS_BYTES => {
            require(code, buf.len(), 4)?;
            Package::DataFsBytes {
                offset: buf.get_u32_le(),
                payload: Bytes::copy_from_slice(buf),
            }
        }
        SENSOR_ERROR => Package::SensorError(SensorErrorInfo {
            command: buf.get_u16_le(),
            error_code: buf.get_u8(),
        }),
        _ => return Err(PkgError::UnknownCommand(code)),
    };
    Ok(pkg)
}

/// Encode a package into its command code and payload bytes.
pub fn encode(pkg: &Package) -> (u16, Bytes) {
    let mut buf = BytesMut::new();
    match pkg {
        Package::CmdGetDeviceInfo
        | Package::CmdStartRecording
        | Package::CmdStopRecording
        | Package::CmdStartStreaming
        | Package::CmdStopStreamingAndClearBuffer
        | Package::CmdFsListFiles
        | Package::CmdFsStopGetBytes
        | Package::CmdFsFormatFilesystem
        | Package::AckStartRecording
        | Package::AckStopRecording
        | Package::AckStopStreamingAndClearBuffer
        | Package::AckFsDeleteFile
        | Package::AckFsFormatFilesystem => {}
        Package::CmdSetAbsoluteTime { new_timestamp } => buf.put_i64_le(*new_timestamp),
        Package::CmdSetMeasurementMode(mode) | Package::DataMeasurementMode(mode) => {
            encode_mode(mode, &mut buf)
        }
        Package::CmdSetRecordingConfig { filename }
        | Package::DataRecordingConfig { filename }
        | Package::CmdFsGetSize { filename }
        | Package::CmdFsDeleteFile { filename } => buf.put_slice(filename),
        Package::CmdStartRealTimeStreaming { mode, rate_limit } => {
            buf.put_u8(*mode);
            buf.put_u16_le(*rate_limit);
        }
        Package::CmdFsGetBytes {
            start_pos,
            end_pos,
            filename,
        } => {
            buf.put_u32_le(*start_pos);
            buf.put_u32_le(*end_pos);
            buf.put_slice(filename);
        }
        Package::DataStatus(status) => {
            buf.put_u8(status.sensor_state.as_raw());
            buf.put_u8(status.battery_percent);
            buf.put_u8(status.charging as u8);
            buf.put_u32_le(status.storage_free_kib);
            buf.put_u32_le(status.uptime_seconds);
            buf.put_u64_le(status.timestamp);
        }
        Package::DataDeviceInfo(info) => {
            buf.put_u32_le(info.serial);
            buf.put_u8(info.hw_version);
            buf.put_u8(info.fw_major);
            buf.put_u8(info.fw_minor);
            buf.put_u8(info.fw_patch);
        }
        Package::DataClockRoundtrip(roundtrip) => {
            buf.put_u64_le(roundtrip.sensor_timestamp);
            buf.put_i64_le(roundtrip.host_send_timestamp);
            buf.put_i64_le(roundtrip.host_receive_timestamp);
        }
        Package::DataQuatFixedRt(quat) => {
            buf.put_u64_le(quat.timestamp);
            buf.put_u64_le(quat.quat);
            buf.put_i16_le(quat.heading_delta_centirad);
        }
        Package::DataFullPacked { timestamp, samples }
        | Package::DataRawBurst { timestamp, samples }
        | Package::DataAccZBurst { timestamp, samples } => {
            buf.put_u64_le(*timestamp);
            buf.put_slice(samples);
        }
        Package::DataFsFileCount { file_count } => buf.put_u16_le(*file_count),
        Package::DataFsFile {
            index,
            size,
            filename,
        } => {
            buf.put_u16_le(*index);
            buf.put_u32_le(*size);
            buf.put_slice(filename);
        }
        Package::DataFsSize {
            file_size,
            filename,
        } => {
            buf.put_u32_le(*file_size);
            buf.put_slice(filename);
        }
        Package::DataFsBytes { offset, payload } => {
            buf.put_u32_le(*offset);
            buf.put_slice(payload);
        }
        Package::SensorError(err) => {
            buf.put_u16_le(err.command);
            buf.put_u8(err.error_code);
        }
    }
    (pkg.code(), buf.freeze())
}

fn decode_mode(buf: &mut &[u8]) -> MeasurementMode {
    MeasurementMode {
        timestamp: buf.get_u64_le(),
        sync_id: buf.get_u64_le(),
        full_float_200hz_enabled: buf.get_u8() != 0,
        full_fixed_mode: buf.get_u8(),
        full_packed_mode: buf.get_u8(),
        quat_float_mode: buf.get_u8(),
        quat_fixed_mode: buf.get_u8(),
        quat_packed_mode: buf.get_u8(),
        status_mode: buf.get_u8(),
        calib_data_mode: buf.get_u8(),
        process_extension_mode: buf.get_u8(),
        sync_mode: buf.get_u8(),
        disable_bias_estimation: buf.get_u8() != 0,
        disable_mag_dist_rejection: buf.get_u8() != 0,
        disable_mag_data: buf.get_u8() != 0,
    }
}

fn encode_mode(mode: &MeasurementMode, buf: &mut BytesMut) {
    buf.put_u64_le(mode.timestamp);
    buf.put_u64_le(mode.sync_id);
    buf.put_u8(mode.full_float_200hz_enabled as u8);
    buf.put_u8(mode.full_fixed_mode);
    buf.put_u8(mode.full_packed_mode);
    buf.put_u8(mode.quat_float_mode);
    buf.put_u8(mode.quat_fixed_mode);
    buf.put_u8(mode.quat_packed_mode);
    buf.put_u8(mode.status_mode);
    buf.put_u8(mode.calib_data_mode);
    buf.put_u8(mode.process_extension_mode);
    buf.put_u8(mode.sync_mode);
    buf.put_u8(mode.disable_bias_estimation as u8);
    buf.put_u8(mode.disable_mag_dist_rejection as u8);
    buf.put_u8(mode.disable_mag_data as u8);
}

fn require(code: u16, actual: usize, min: usize) -> Result<()> {
    if actual < min {
        return Err(PkgError::Truncated { code, min, actual });
    }
    Ok(())
}
