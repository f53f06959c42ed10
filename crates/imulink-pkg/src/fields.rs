//! Named field views over decoded packages, for logging and offline tools.

use bytes::Bytes;

use crate::package::Package;

/// A single field value in display order.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I16(i16),
    I64(i64),
    Bool(bool),
    /// Opaque bytes, rendered as length + hex prefix by callers.
    Bytes(Bytes),
    Str(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::U8(v) => write!(f, "{v}"),
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Bytes(v) => write!(f, "[{} bytes]", v.len()),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

fn name_field(raw: &Bytes) -> FieldValue {
    match std::str::from_utf8(raw) {
        Ok(s) => FieldValue::Str(s.to_owned()),
        Err(_) => FieldValue::Bytes(raw.clone()),
    }
}

impl Package {
    /// Field names and values in wire order. Empty for payload-free
    /// commands and acknowledgements.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::*;
        match self {
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
            | Package::AckFsFormatFilesystem => Vec::new(),
            Package::CmdSetAbsoluteTime { new_timestamp } => {
                vec![("new_timestamp", I64(*new_timestamp))]
            }
            Package::CmdSetMeasurementMode(mode) | Package::DataMeasurementMode(mode) => vec![
                ("timestamp", U64(mode.timestamp)),
                ("sync_id", U64(mode.sync_id)),
                ("full_float_200hz_enabled", Bool(mode.full_float_200hz_enabled)),
                ("full_fixed_mode", U8(mode.full_fixed_mode)),
                ("full_packed_mode", U8(mode.full_packed_mode)),
                ("quat_float_mode", U8(mode.quat_float_mode)),
                ("quat_fixed_mode", U8(mode.quat_fixed_mode)),
                ("quat_packed_mode", U8(mode.quat_packed_mode)),
                ("status_mode", U8(mode.status_mode)),
                ("calib_data_mode", U8(mode.calib_data_mode)),
                ("process_extension_mode", U8(mode.process_extension_mode)),
                ("sync_mode", U8(mode.sync_mode)),
                ("disable_bias_estimation", Bool(mode.disable_bias_estimation)),
                (
                    "disable_mag_dist_rejection",
                    Bool(mode.disable_mag_dist_rejection),
                ),
                ("disable_mag_data", Bool(mode.disable_mag_data)),
            ],
            Package::CmdSetRecordingConfig { filename }
            | Package::DataRecordingConfig { filename }
            | Package::CmdFsGetSize { filename }
            | Package::CmdFsDeleteFile { filename } => {
                vec![("filename", name_field(filename))]
            }
            Package::CmdStartRealTimeStreaming { mode, rate_limit } => vec![
                ("mode", U8(*mode)),
                ("rate_limit", U16(*rate_limit)),
            ],
            Package::CmdFsGetBytes {
                start_pos,
                end_pos,
                filename,
            } => vec![
                ("start_pos", U32(*start_pos)),
                ("end_pos", U32(*end_pos)),
                ("filename", name_field(filename)),
            ],
            Package::DataStatus(status) => vec![
                ("sensor_state", U8(status.sensor_state.as_raw())),
                ("battery_percent", U8(status.battery_percent)),
                ("charging", Bool(status.charging)),
                ("storage_free_kib", U32(status.storage_free_kib)),
                ("uptime_seconds", U32(status.uptime_seconds)),
                ("timestamp", U64(status.timestamp)),
            ],
            Package::DataDeviceInfo(info) => vec![
                ("serial", U32(info.serial)),
                ("hw_version", U8(info.hw_version)),
                ("fw_major", U8(info.fw_major)),
                ("fw_minor", U8(info.fw_minor)),
                ("fw_patch", U8(info.fw_patch)),
            ],
            Package::DataClockRoundtrip(roundtrip) => vec![
                ("sensor_timestamp", U64(roundtrip.sensor_timestamp)),
                ("host_send_timestamp", I64(roundtrip.host_send_timestamp)),
                (
                    "host_receive_timestamp",
                    I64(roundtrip.host_receive_timestamp),
                ),
            ],
            Package::DataQuatFixedRt(quat) => vec![
                ("timestamp", U64(quat.timestamp)),
                ("quat", U64(quat.quat)),
                ("heading_delta_centirad", I16(quat.heading_delta_centirad)),
            ],
            Package::DataFullPacked { timestamp, samples }
            | Package::DataRawBurst { timestamp, samples }
            | Package::DataAccZBurst { timestamp, samples } => vec![
                ("timestamp", U64(*timestamp)),
                ("samples", FieldValue::Bytes(samples.clone())),
            ],
            Package::DataFsFileCount { file_count } => {
                vec![("file_count", U16(*file_count))]
            }
            Package::DataFsFile {
                index,
                size,
                filename,
            } => vec![
                ("index", U16(*index)),
                ("size", U32(*size)),
                ("filename", name_field(filename)),
            ],
            Package::DataFsSize {
                file_size,
                filename,
            } => vec![
                ("file_size", U32(*file_size)),
                ("filename", name_field(filename)),
            ],
            Package::DataFsBytes { offset, payload } => vec![
                ("offset", U32(*offset)),
                ("payload", FieldValue::Bytes(payload.clone())),
            ],
            Package::SensorError(err) => vec![
                ("command", U16(err.command)),
                ("error_code", U8(err.error_code)),
            ],
        }
    }
}
