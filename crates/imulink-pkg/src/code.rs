//! Command codes of the IMU wire protocol.
//!
//! Codes 0x01xx are host-to-sensor commands, 0x02xx the matching
//! acknowledgements, 0x03xx sensor-to-host data packages.

pub const CMD_GET_DEVICE_INFO: u16 = 0x0101;
pub const CMD_SET_ABSOLUTE_TIME: u16 = 0x0102;
pub const CMD_SET_MEASUREMENT_MODE: u16 = 0x0103;
pub const CMD_SET_RECORDING_CONFIG: u16 = 0x0104;
pub const CMD_START_RECORDING: u16 = 0x0105;
pub const CMD_STOP_RECORDING: u16 = 0x0106;
pub const CMD_START_STREAMING: u16 = 0x0107;
pub const CMD_STOP_STREAMING_AND_CLEAR_BUFFER: u16 = 0x0108;
pub const CMD_START_REAL_TIME_STREAMING: u16 = 0x0109;
pub const CMD_FS_LIST_FILES: u16 = 0x0110;
pub const CMD_FS_GET_SIZE: u16 = 0x0111;
pub const CMD_FS_GET_BYTES: u16 = 0x0112;
pub const CMD_FS_STOP_GET_BYTES: u16 = 0x0113;
pub const CMD_FS_DELETE_FILE: u16 = 0x0114;
pub const CMD_FS_FORMAT_FILESYSTEM: u16 = 0x0115;

pub const ACK_START_RECORDING: u16 = 0x0205;
pub const ACK_STOP_RECORDING: u16 = 0x0206;
pub const ACK_STOP_STREAMING_AND_CLEAR_BUFFER: u16 = 0x0208;
pub const ACK_FS_DELETE_FILE: u16 = 0x0214;
pub const ACK_FS_FORMAT_FILESYSTEM: u16 = 0x0215;

pub const DATA_STATUS: u16 = 0x0301;
pub const DATA_DEVICE_INFO: u16 = 0x0302;
pub const DATA_CLOCK_ROUNDTRIP: u16 = 0x0303;
pub const DATA_MEASUREMENT_MODE: u16 = 0x0304;
pub const DATA_RECORDING_CONFIG: u16 = 0x0305;
pub const DATA_QUAT_FIXED_RT: u16 = 0x0306;
pub const DATA_FULL_PACKED: u16 = 0x0307;
pub const DATA_RAW_BURST: u16 = 0x0308;
pub const DATA_ACC_Z_BURST: u16 = 0x0309;
pub const DATA_FS_FILE_COUNT: u16 = 0x0310;
pub const DATA_FS_FILE: u16 = 0x0311;
pub const DATA_FS_SIZE: u16 = 0x0312;
pub const DATA_FS_BYTES: u16 = 0x0313;
pub const SENSOR_ERROR: u16 = 0x03FF;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u16) -> &'static str {
    match code {
        CMD_GET_DEVICE_INFO => "CmdGetDeviceInfo",
        CMD_SET_ABSOLUTE_TIME => "CmdSetAbsoluteTime",
        CMD_SET_MEASUREMENT_MODE => "CmdSetMeasurementMode",
        CMD_SET_RECORDING_CONFIG => "CmdSetRecordingConfig",
        CMD_START_RECORDING => "CmdStartRecording",
        CMD_STOP_RECORDING => "CmdStopRecording",
        CMD_START_STREAMING => "CmdStartStreaming",
        CMD_STOP_STREAMING_AND_CLEAR_BUFFER => "CmdStopStreamingAndClearBuffer",
        CMD_START_REAL_TIME_STREAMING => "CmdStartRealTimeStreaming",
        CMD_FS_LIST_FILES => "CmdFsListFiles",
        CMD_FS_GET_SIZE => "CmdFsGetSize",
        CMD_FS_GET_BYTES => "CmdFsGetBytes",
        CMD_FS_STOP_GET_BYTES => "CmdFsStopGetBytes",
        CMD_FS_DELETE_FILE => "CmdFsDeleteFile",
        CMD_FS_FORMAT_FILESYSTEM => "CmdFsFormatFilesystem",
        ACK_START_RECORDING => "AckStartRecording",
        ACK_STOP_RECORDING => "AckStopRecording",
        ACK_STOP_STREAMING_AND_CLEAR_BUFFER => "AckStopStreamingAndClearBuffer",
        ACK_FS_DELETE_FILE => "AckFsDeleteFile",
        ACK_FS_FORMAT_FILESYSTEM => "AckFsFormatFilesystem",
        DATA_STATUS => "DataStatus",
        DATA_DEVICE_INFO => "DataDeviceInfo",
        DATA_CLOCK_ROUNDTRIP => "DataClockRoundtrip",
        DATA_MEASUREMENT_MODE => "DataMeasurementMode",
        DATA_RECORDING_CONFIG => "DataRecordingConfig",
        DATA_QUAT_FIXED_RT => "DataQuatFixedRt",
        DATA_FULL_PACKED => "DataFullPacked",
        DATA_RAW_BURST => "DataRawBurst",
        DATA_ACC_Z_BURST => "DataAccZBurst",
        DATA_FS_FILE_COUNT => "DataFsFileCount",
        DATA_FS_FILE => "DataFsFile",
        DATA_FS_SIZE => "DataFsSize",
        DATA_FS_BYTES => "DataFsBytes",
        SENSOR_ERROR => "SensorError",
        _ => "Unknown",
    }
}
