//! Generic device handle over a transport link.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::oneshot;

use imulink_codec::encode_to_bytes;
use imulink_pkg::package::{DeviceInfo, SensorState};
use imulink_pkg::Package;

use crate::error::{DeviceError, Result};
use crate::listener::ListenerId;
use crate::queue::QueueEntry;
use crate::session::{DeviceState, Session};

/// Default deadline for command acknowledgements.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// A byte transport carrying the framing protocol.
///
/// `open` hands the link the shared [`Session`]; the link feeds every
/// received chunk into it from its own task until closed.
#[allow(async_fn_in_trait)]
pub trait Link {
    async fn open(&mut self, session: Arc<Session>) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    async fn write(&mut self, frame: Bytes) -> Result<()>;
}

/// Knobs for [`Device::init`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Stop an in-progress recording instead of failing.
    pub abort_recording: bool,
    /// Stop an in-progress offload stream instead of failing.
    pub abort_streaming: bool,
    /// Push the host clock to the sensor once initialized.
    pub set_time: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            abort_recording: false,
            abort_streaming: false,
            set_time: true,
        }
    }
}

/// One sensor behind one transport link.
pub struct Device<L: Link> {
    link: L,
    session: Arc<Session>,
    ack_timeout: Duration,
}

impl<L: Link> Device<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            session: Arc::new(Session::new()),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn set_ack_timeout(&mut self, timeout: Duration) {
        self.ack_timeout = timeout;
    }

    /// Bring the link up. No-op if already connected or connecting.
    ///
    /// The connect sentinel is queued and per-connection state reset
    /// before the link opens, so frames the transport delivers while
    /// still opening belong to the new connection.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.state() != DeviceState::Disconnected {
            return Ok(());
        }
        self.session.begin_connection();
        if let Err(err) = self.link.open(self.session.clone()).await {
            self.session.set_state(DeviceState::Disconnected);
            return Err(err);
        }
        self.session.mark_connected();
        Ok(())
    }

    /// Tear the link down and queue the disconnect sentinel.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.session.state() == DeviceState::Disconnected {
            return Ok(());
        }
        self.link.close().await?;
        self.session.mark_disconnected();
        Ok(())
    }

    /// Encode and write one command frame.
    pub async fn send(&mut self, pkg: &Package) -> Result<()> {
        if self.session.state() != DeviceState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let frame = encode_to_bytes(pkg)?;
        self.link.write(frame).await
    }

    /// Send a command and wait for its acknowledgement.
    ///
    /// Resolves on the first package with `ack_code`, or fails early if
    /// the sensor reports an error for this command. The correlation
    /// listener is registered before the write and deregistered on every
    /// exit path, including timeout.
    pub async fn send_and_await_ack(&mut self, pkg: &Package, ack_code: u16) -> Result<Package> {
        let command = pkg.code();
        let (tx, rx) = oneshot::channel::<Result<Package>>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let id = self.session.add_package_listener(Arc::new({
            let tx = tx.clone();
            move |incoming: &Package| {
                let resolution = if incoming.code() == ack_code {
                    Some(Ok(incoming.clone()))
                } else if let Package::SensorError(err) = incoming {
                    (err.command == command).then(|| {
                        Err(DeviceError::Sensor {
                            command: err.command,
                            error_code: err.error_code,
                        })
                    })
                } else {
                    None
                };
                if let Some(result) = resolution {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(result);
                    }
                }
            }
        }));
        let _guard = ListenerGuard {
            session: self.session.clone(),
            id,
        };

        self.send(pkg).await?;
        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(result)) => result,
            // The sender cannot drop while the guard holds the listener.
            Ok(Err(_)) | Err(_) => Err(DeviceError::AckTimeout(self.ack_timeout)),
        }
    }

    /// Bring a freshly connected sensor into a known idle state.
    ///
    /// Waits for the first status, resolves a recording or streaming
    /// carry-over per `opts`, makes sure the device identity is known,
    /// and optionally pushes the host clock. Returns the device info.
    ///
    /// The internal waits carry no deadline. A sensor that never
    /// reports shows up as a hanging call the caller may cancel by
    /// dropping the future.
    pub async fn init(&mut self, opts: &InitOptions) -> Result<DeviceInfo> {
        self.send(&Package::CmdGetDeviceInfo).await?;
        let status = self.session.wait_status().await?;
        match status.sensor_state {
            SensorState::Recording => {
                if !opts.abort_recording {
                    return Err(DeviceError::Recording);
                }
                tracing::info!("sensor is recording, stopping it");
                self.send(&Package::CmdStopRecording).await?;
            }
            SensorState::Streaming => {
                if !opts.abort_streaming {
                    return Err(DeviceError::Streaming);
                }
                tracing::info!("sensor is streaming, draining the stale stream");
                self.abort_streaming().await?;
            }
            SensorState::Idle | SensorState::Unknown(_) => {}
        }

        let info = self.session.wait_device_info().await?;

        if opts.set_time {
            self.send(&Package::CmdSetAbsoluteTime {
                new_timestamp: now_nanos(),
            })
            .await?;
        }
        Ok(info)
    }

    /// Stop a stale offload stream and drop its buffered bulk data.
    ///
    /// The parser discards bytes until the stop ack; packages already
    /// queued are drained here, keeping everything that is not bulk
    /// measurement data and restoring it afterwards in order.
    async fn abort_streaming(&mut self) -> Result<()> {
        self.session.arm_stop_streaming_drain();
        self.send(&Package::CmdStopStreamingAndClearBuffer).await?;

        let mut kept = Vec::new();
        loop {
            match self.session.queue().pop().await {
                QueueEntry::Package(Package::AckStopStreamingAndClearBuffer) => {
                    kept.push(QueueEntry::Package(Package::AckStopStreamingAndClearBuffer));
                    break;
                }
                QueueEntry::Package(pkg) if pkg.is_bulk_data() => {
                    tracing::debug!(package = pkg.type_name(), "discarding stale streaming package");
                }
                QueueEntry::Package(pkg) => kept.push(QueueEntry::Package(pkg)),
                QueueEntry::Connect => {}
                QueueEntry::Disconnect => return Err(DeviceError::NotConnected),
            }
        }
        self.session.queue().push_front_all(kept);

        // The drain may have swallowed the device info reply with the
        // stale bytes.
        if !self.session.device_info_received() {
            self.send(&Package::CmdGetDeviceInfo).await?;
        }
        Ok(())
    }
}

struct ListenerGuard {
    session: Arc<Session>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.session.remove_package_listener(self.id);
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
