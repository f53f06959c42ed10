use bytes::Bytes;

use crate::code;

/// Measurement state reported by the sensor in [`Status`] packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Idle,
    Recording,
    Streaming,
    /// A state value this host library does not know. Preserved instead of
    /// rejected so a status package can never break the stream.
    Unknown(u8),
}

impl SensorState {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SensorState::Idle,
            1 => SensorState::Recording,
            2 => SensorState::Streaming,
            other => SensorState::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            SensorState::Idle => 0,
            SensorState::Recording => 1,
            SensorState::Streaming => 2,
            SensorState::Unknown(raw) => raw,
        }
    }
}

/// Periodic status package (`DataStatus`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub sensor_state: SensorState,
    pub battery_percent: u8,
    pub charging: bool,
    /// Free recording storage in KiB.
    pub storage_free_kib: u32,
    pub uptime_seconds: u32,
    /// Sensor clock in nanoseconds.
    pub timestamp: u64,
}

/// Device identity package (`DataDeviceInfo`).
///
/// The device name shown to users is derived from `serial` as
/// `IMU_{serial:06x}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: u32,
    pub hw_version: u8,
    pub fw_major: u8,
    pub fw_minor: u8,
    pub fw_patch: u8,
}

impl DeviceInfo {
    /// Device name derived from the serial number, e.g. `IMU_ab1234`.
    pub fn device_name(&self) -> String {
        format!("IMU_{:06x}", self.serial)
    }
}

/// Clock synchronization package (`DataClockRoundtrip`).
///
/// The sensor sends `host_receive_timestamp` as zero; the session backfills
/// it exactly once with the host receive time of the carrying chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockRoundtrip {
    /// Sensor clock at send time, nanoseconds.
    pub sensor_timestamp: u64,
    /// Host clock when the triggering command was sent, nanoseconds.
    pub host_send_timestamp: i64,
    /// Host clock when this package was received, nanoseconds. Zero until
    /// backfilled.
    pub host_receive_timestamp: i64,
}

/// Measurement mode configuration, sent with `CmdSetMeasurementMode` and
/// echoed back in `DataMeasurementMode`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementMode {
    pub timestamp: u64,
    pub full_float_200hz_enabled: bool,
    pub full_fixed_mode: u8,
    pub full_packed_mode: u8,
    pub quat_float_mode: u8,
    pub quat_fixed_mode: u8,
    pub quat_packed_mode: u8,
    pub status_mode: u8,
    pub calib_data_mode: u8,
    pub process_extension_mode: u8,
    pub sync_mode: u8,
    /// Shared by all sensors of one synchronized measurement.
    pub sync_id: u64,
    pub disable_bias_estimation: bool,
    pub disable_mag_dist_rejection: bool,
    pub disable_mag_data: bool,
}

/// Real-time orientation package (`DataQuatFixedRt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuatFixedRt {
    /// Sensor clock in nanoseconds.
    pub timestamp: u64,
    /// Compressed 64-bit quaternion; decoding is left to numeric helpers.
    pub quat: u64,
    /// 6D-to-9D heading correction in centiradians.
    pub heading_delta_centirad: i16,
}

/// Error report from the sensor, referencing the command that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorErrorInfo {
    /// Command code of the package the sensor rejected.
    pub command: u16,
    pub error_code: u8,
}

/// Payload byte count of the packed sample block in [`Package::DataFullPacked`].
pub const FULL_PACKED_SAMPLES_LEN: usize = 144;
/// Payload byte count of the raw ADC block in [`Package::DataRawBurst`].
pub const RAW_BURST_SAMPLES_LEN: usize = 192;
/// Payload byte count of the accelerometer-z block in [`Package::DataAccZBurst`].
pub const ACC_Z_BURST_SAMPLES_LEN: usize = 128;

/// One decoded frame payload; one variant per command code.
#[derive(Debug, Clone, PartialEq)]
pub enum Package {
    CmdGetDeviceInfo,
    CmdSetAbsoluteTime {
        /// Host clock in nanoseconds since the Unix epoch.
        new_timestamp: i64,
    },
    CmdSetMeasurementMode(MeasurementMode),
    CmdSetRecordingConfig {
        filename: Bytes,
    },
    CmdStartRecording,
    CmdStopRecording,
    CmdStartStreaming,
    CmdStopStreamingAndClearBuffer,
    CmdStartRealTimeStreaming {
        mode: u8,
        rate_limit: u16,
    },
    CmdFsListFiles,
    CmdFsGetSize {
        filename: Bytes,
    },
    CmdFsGetBytes {
        start_pos: u32,
        /// Zero means "until end of file".
        end_pos: u32,
        filename: Bytes,
    },
    CmdFsStopGetBytes,
    CmdFsDeleteFile {
        filename: Bytes,
    },
    CmdFsFormatFilesystem,

    AckStartRecording,
    AckStopRecording,
    AckStopStreamingAndClearBuffer,
    AckFsDeleteFile,
    AckFsFormatFilesystem,

    DataStatus(Status),
    DataDeviceInfo(DeviceInfo),
    DataClockRoundtrip(ClockRoundtrip),
    DataMeasurementMode(MeasurementMode),
    DataRecordingConfig {
        filename: Bytes,
    },
    DataQuatFixedRt(QuatFixedRt),
    DataFullPacked {
        timestamp: u64,
        /// Packed gyr/acc/mag samples, [`FULL_PACKED_SAMPLES_LEN`] bytes.
        samples: Bytes,
    },
    DataRawBurst {
        timestamp: u64,
        samples: Bytes,
    },
    DataAccZBurst {
        timestamp: u64,
        samples: Bytes,
    },
    DataFsFileCount {
        file_count: u16,
    },
    DataFsFile {
        index: u16,
        size: u32,
        filename: Bytes,
    },
    DataFsSize {
        file_size: u32,
        filename: Bytes,
    },
    DataFsBytes {
        offset: u32,
        payload: Bytes,
    },
    SensorError(SensorErrorInfo),
}

impl Package {
    /// The command code this variant travels under.
    pub fn code(&self) -> u16 {
        match self {
            Package::CmdGetDeviceInfo => code::CMD_GET_DEVICE_INFO,
            Package::CmdSetAbsoluteTime { .. } => code::CMD_SET_ABSOLUTE_TIME,
            Package::CmdSetMeasurementMode(_) => code::CMD_SET_MEASUREMENT_MODE,
            Package::CmdSetRecordingConfig { .. } => code::CMD_SET_RECORDING_CONFIG,
            Package::CmdStartRecording => code::CMD_START_RECORDING,
            Package::CmdStopRecording => code::CMD_STOP_RECORDING,
            Package::CmdStartStreaming => code::CMD_START_STREAMING,
            Package::CmdStopStreamingAndClearBuffer => code::CMD_STOP_STREAMING_AND_CLEAR_BUFFER,
            Package::CmdStartRealTimeStreaming { .. } => code::CMD_START_REAL_TIME_STREAMING,
            Package::CmdFsListFiles => code::CMD_FS_LIST_FILES,
            Package::CmdFsGetSize { .. } => code::CMD_FS_GET_SIZE,
            Package::CmdFsGetBytes { .. } => code::CMD_FS_GET_BYTES,
            Package::CmdFsStopGetBytes => code::CMD_FS_STOP_GET_BYTES,
            Package::CmdFsDeleteFile { .. } => code::CMD_FS_DELETE_FILE,
            Package::CmdFsFormatFilesystem => code::CMD_FS_FORMAT_FILESYSTEM,
            Package::AckStartRecording => code::ACK_START_RECORDING,
            Package::AckStopRecording => code::ACK_STOP_RECORDING,
            Package::AckStopStreamingAndClearBuffer => code::ACK_STOP_STREAMING_AND_CLEAR_BUFFER,
            Package::AckFsDeleteFile => code::ACK_FS_DELETE_FILE,
            Package::AckFsFormatFilesystem => code::ACK_FS_FORMAT_FILESYSTEM,
            Package::DataStatus(_) => code::DATA_STATUS,
            Package::DataDeviceInfo(_) => code::DATA_DEVICE_INFO,
            Package::DataClockRoundtrip(_) => code::DATA_CLOCK_ROUNDTRIP,
            Package::DataMeasurementMode(_) => code::DATA_MEASUREMENT_MODE,
            Package::DataRecordingConfig { .. } => code::DATA_RECORDING_CONFIG,
            Package::DataQuatFixedRt(_) => code::DATA_QUAT_FIXED_RT,
            Package::DataFullPacked { .. } => code::DATA_FULL_PACKED,
            Package::DataRawBurst { .. } => code::DATA_RAW_BURST,
            Package::DataAccZBurst { .. } => code::DATA_ACC_Z_BURST,
            Package::DataFsFileCount { .. } => code::DATA_FS_FILE_COUNT,
            Package::DataFsFile { .. } => code::DATA_FS_FILE,
            Package::DataFsSize { .. } => code::DATA_FS_SIZE,
            Package::DataFsBytes { .. } => code::DATA_FS_BYTES,
            Package::SensorError(_) => code::SENSOR_ERROR,
        }
    }

    /// The variant name as shown in the offline bulk view.
    pub fn type_name(&self) -> &'static str {
        code::command_name(self.code())
    }

    /// True for high-volume measurement/transfer packages that an aborted
    /// streaming session may legitimately discard. This is an explicit
    /// per-variant tag; control, acknowledgement, and status packages are
    /// never bulk data.
    pub fn is_bulk_data(&self) -> bool {
        matches!(
            self,
            Package::DataQuatFixedRt(_)
                | Package::DataFullPacked { .. }
                | Package::DataRawBurst { .. }
                | Package::DataAccZBurst { .. }
                | Package::DataFsBytes { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_state_raw_roundtrip() {
        for raw in [0u8, 1, 2, 7, 255] {
            assert_eq!(SensorState::from_raw(raw).as_raw(), raw);
        }
        assert_eq!(SensorState::from_raw(2), SensorState::Streaming);
        assert_eq!(SensorState::from_raw(9), SensorState::Unknown(9));
    }

    #[test]
    fn device_name_from_serial() {
        let info = DeviceInfo {
            serial: 0xab1234,
            hw_version: 2,
            fw_major: 1,
            fw_minor: 4,
            fw_patch: 0,
        };
        assert_eq!(info.device_name(), "IMU_ab1234");
    }

    #[test]
    fn bulk_data_tags() {
        assert!(Package::DataFullPacked {
            timestamp: 0,
            samples: Bytes::from(vec![0; FULL_PACKED_SAMPLES_LEN]),
        }
        .is_bulk_data());
        assert!(Package::DataFsBytes {
            offset: 0,
            payload: Bytes::from_static(b"x"),
        }
        .is_bulk_data());
        assert!(!Package::AckStopStreamingAndClearBuffer.is_bulk_data());
        assert!(!Package::DataStatus(Status {
            sensor_state: SensorState::Idle,
            battery_percent: 80,
            charging: false,
            storage_free_kib: 1024,
            uptime_seconds: 5,
            timestamp: 1,
        })
        .is_bulk_data());
        assert!(!Package::DataFsFile {
            index: 0,
            size: 10,
            filename: Bytes::from_static(b"rec"),
        }
        .is_bulk_data());
    }

    #[test]
    fn type_name_matches_command_name() {
        assert_eq!(Package::CmdGetDeviceInfo.type_name(), "CmdGetDeviceInfo");
        assert_eq!(
            Package::SensorError(SensorErrorInfo {
                command: 0x0105,
                error_code: 1
            })
            .type_name(),
            "SensorError"
        );
    }
}
