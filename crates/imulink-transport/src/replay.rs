//! Offline playback of recorded frame streams.
//!
//! Recordings are the raw byte stream as captured, optionally
//! gzip-compressed. Files may start mid-frame when the capture began
//! while the sensor was already sending, so playback resynchronizes
//! over leading garbage.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tokio::task::JoinHandle;

use imulink_codec::{CodecError, Unpacker};
use imulink_device::{Device, DeviceError, DeviceState, Latch, Link, ListenerId, Session};
use imulink_pkg::Package;

use crate::error::Result;

const READ_CHUNK: usize = 8192;

fn open_reader(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Iterator over the packages of a recorded stream.
pub struct ReplayDevice {
    reader: Box<dyn Read + Send>,
    unpacker: Unpacker,
    failed: bool,
}

impl ReplayDevice {
    /// Open a recording. Paths ending in `.gz` are decompressed on the
    /// fly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_reader(open_reader(path.as_ref())?))
    }

    /// Play back from any byte source.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            unpacker: Unpacker::with_resync(),
            failed: false,
        }
    }

    /// Next package, or `Ok(None)` at end of stream.
    pub fn next_package(&mut self) -> imulink_codec::Result<Option<Package>> {
        loop {
            if let Some(pkg) = self.unpacker.next_package()? {
                return Ok(Some(pkg));
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).map_err(CodecError::Io)?;
            if n == 0 {
                if self.unpacker.buffered() > 0 {
                    tracing::warn!(
                        bytes = self.unpacker.buffered(),
                        "recording ends with a partial frame"
                    );
                }
                return Ok(None);
            }
            self.unpacker.feed(&chunk[..n]);
        }
    }
}

/// A [`Device`] playing back a recording through a live session, for
/// exercising session consumers without hardware. Outgoing commands are
/// ignored.
pub type PlaybackDevice = Device<ReplayLink>;

/// Build a playback device for a recording on disk.
pub fn playback_device(path: impl AsRef<Path>) -> Result<PlaybackDevice> {
    Ok(Device::new(ReplayLink::open(path)?))
}

/// Transport link that pumps a recorded stream into the session and
/// then disconnects.
pub struct ReplayLink {
    source: Option<Box<dyn Read + Send>>,
    listener: Option<(Arc<Session>, ListenerId)>,
    pump: Option<JoinHandle<()>>,
}

impl ReplayLink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_reader(open_reader(path.as_ref())?))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            source: Some(Box::new(reader)),
            listener: None,
            pump: None,
        }
    }
}

impl Link for ReplayLink {
    async fn open(&mut self, session: Arc<Session>) -> imulink_device::Result<()> {
        let mut source = self.source.take().ok_or(DeviceError::NotConnected)?;

        // The session resets its parser when the connect sentinel goes
        // in, so the pump must not feed before that happened.
        let ready = Arc::new(Latch::default());
        let id = session.add_state_listener(Arc::new({
            let ready = ready.clone();
            move |state: DeviceState| {
                if state == DeviceState::Connected {
                    ready.set();
                }
            }
        }));
        self.listener = Some((session.clone(), id));

        let pump = tokio::spawn(async move {
            ready.wait().await;
            let feed_session = session.clone();
            let fed = tokio::task::spawn_blocking(move || -> imulink_device::Result<()> {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    let n = source.read(&mut chunk).map_err(DeviceError::transport)?;
                    if n == 0 {
                        return Ok(());
                    }
                    feed_session.feed(&chunk[..n], false, None)?;
                }
            })
            .await;
            match fed {
                Ok(Ok(())) => tracing::debug!("replay stream finished"),
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "replay stream ended with a decode error")
                }
                Err(err) => tracing::warn!(error = %err, "replay pump failed"),
            }
            session.mark_disconnected();
        });
        self.pump = Some(pump);
        Ok(())
    }

    async fn close(&mut self) -> imulink_device::Result<()> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some((session, id)) = self.listener.take() {
            session.remove_state_listener(id);
        }
        Ok(())
    }

    async fn write(&mut self, _frame: Bytes) -> imulink_device::Result<()> {
        // A recording cannot answer.
        tracing::warn!("ignoring command sent to a replay device");
        Ok(())
    }
}

impl Iterator for ReplayDevice {
    type Item = imulink_codec::Result<Package>;

    /// Yields packages until end of stream. A decode failure is yielded
    /// once and ends the iteration, mid-recording corruption is not
    /// recoverable.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_package() {
            Ok(Some(pkg)) => Some(Ok(pkg)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use imulink_codec::encode_to_bytes;
    use imulink_pkg::package::{DeviceInfo, SensorState, Status};

    fn sample_stream() -> Vec<u8> {
        let mut wire = Vec::new();
        wire.extend_from_slice(
            &encode_to_bytes(&Package::DataDeviceInfo(DeviceInfo {
                serial: 7,
                hw_version: 1,
                fw_major: 0,
                fw_minor: 9,
                fw_patch: 1,
            }))
            .unwrap(),
        );
        wire.extend_from_slice(
            &encode_to_bytes(&Package::DataStatus(Status {
                sensor_state: SensorState::Recording,
                battery_percent: 61,
                charging: false,
                storage_free_kib: 100,
                uptime_seconds: 30,
                timestamp: 9000,
            }))
            .unwrap(),
        );
        wire
    }

    #[test]
    fn plays_back_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bin");
        std::fs::write(&path, sample_stream()).unwrap();

        let packages: Vec<_> = ReplayDevice::open(&path)
            .unwrap()
            .collect::<imulink_codec::Result<_>>()
            .unwrap();
        assert_eq!(packages.len(), 2);
        assert!(matches!(packages[0], Package::DataDeviceInfo(_)));
        assert!(matches!(packages[1], Package::DataStatus(_)));
    }

    #[test]
    fn plays_back_gzip_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bin.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&sample_stream()).unwrap();
        encoder.finish().unwrap();

        let packages: Vec<_> = ReplayDevice::open(&path)
            .unwrap()
            .collect::<imulink_codec::Result<_>>()
            .unwrap();
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn tolerates_leading_garbage() {
        let mut wire = vec![0x31, 0x32, 0x33];
        wire.extend(sample_stream());

        let packages: Vec<_> = ReplayDevice::from_reader(std::io::Cursor::new(wire))
            .collect::<imulink_codec::Result<_>>()
            .unwrap();
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn corruption_ends_iteration_after_one_error() {
        let mut wire = sample_stream();
        let tail = wire.len() - 4;
        wire[tail] ^= 0xff; // Corrupt the second frame's payload.

        let mut replay = ReplayDevice::from_reader(std::io::Cursor::new(wire));
        assert!(matches!(replay.next(), Some(Ok(Package::DataDeviceInfo(_)))));
        assert!(matches!(replay.next(), Some(Err(_))));
        assert!(replay.next().is_none());
    }

    #[tokio::test]
    async fn playback_feeds_a_live_session_then_disconnects() {
        let link = ReplayLink::from_reader(std::io::Cursor::new(sample_stream()));
        let mut device = Device::new(link);
        device.connect().await.unwrap();

        // Writes are swallowed, the recording cannot answer.
        device.send(&Package::CmdGetDeviceInfo).await.unwrap();

        let mut names = Vec::new();
        while let Some(pkg) = device.session().apoll().await {
            names.push(pkg.type_name());
        }
        assert_eq!(names, ["DataDeviceInfo", "DataStatus"]);
        assert_eq!(device.session().state(), DeviceState::Disconnected);
        assert_eq!(device.session().name().as_deref(), Some("IMU_000007"));
    }

    #[test]
    fn truncated_tail_is_end_of_stream() {
        let mut wire = sample_stream();
        wire.truncate(wire.len() - 3);

        let packages: Vec<_> = ReplayDevice::from_reader(std::io::Cursor::new(wire))
            .collect::<imulink_codec::Result<_>>()
            .unwrap();
        assert_eq!(packages.len(), 1);
    }
}
