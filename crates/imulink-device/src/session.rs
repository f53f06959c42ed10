//! Shared session state between the transport task and the API surface.

use std::sync::Mutex;

use tokio::sync::Notify;

use imulink_pkg::package::{DeviceInfo, Status};
use imulink_pkg::Package;

use imulink_codec::Unpacker;

use crate::error::{DeviceError, Result};
use crate::listener::{
    ListenerId, Listeners, PackageListener, RawChunkListener, RawDataListener, StateListener,
};
use crate::queue::{PackageQueue, QueueEntry};

/// Connection state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState::Disconnected
    }
}

/// One-way flag that can be awaited, reset on reconnect.
#[derive(Debug, Default)]
pub struct Latch {
    set: Mutex<bool>,
    notify: Notify,
}

impl Latch {
    pub fn set(&self) {
        *self.set.lock().unwrap() = true;
        self.notify.notify_waiters();
    }

    pub fn reset(&self) {
        *self.set.lock().unwrap() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock().unwrap()
    }

    /// Resolve once the latch is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Session state shared between one transport task and one consumer.
///
/// The transport feeds raw bytes in; the session decodes them, keeps the
/// latest status and device identity, fires listeners, and queues
/// packages for [`Session::poll`] / [`Session::apoll`].
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<DeviceState>,
    unpacker: Mutex<Unpacker>,
    queue: PackageQueue,
    package_listeners: Listeners<PackageListener>,
    state_listeners: Listeners<StateListener>,
    raw_chunk_listeners: Listeners<RawChunkListener>,
    raw_data_listeners: Listeners<RawDataListener>,
    status_latch: Latch,
    device_info_latch: Latch,
    last_status: Mutex<Option<Status>>,
    last_device_info: Mutex<Option<DeviceInfo>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DeviceState {
        *self.state.lock().unwrap()
    }

    /// Switch state and notify state listeners.
    pub fn set_state(&self, state: DeviceState) {
        *self.state.lock().unwrap() = state;
        for listener in self.state_listeners.snapshot() {
            listener(state);
        }
    }

    /// Start a new connection: queue the connect sentinel and reset
    /// per-connection state. This runs before the transport opens, so
    /// bytes arriving while the link is still coming up land behind the
    /// sentinel and survive into the new connection.
    pub fn begin_connection(&self) {
        self.queue.push(QueueEntry::Connect);
        self.status_latch.reset();
        self.device_info_latch.reset();
        self.unpacker.lock().unwrap().clear();
        self.set_state(DeviceState::Connecting);
    }

    /// Transport is up.
    pub fn mark_connected(&self) {
        self.set_state(DeviceState::Connected);
    }

    /// Transport is down. Queues the disconnect sentinel exactly once;
    /// returns false if the session was already disconnected.
    pub fn mark_disconnected(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if *state == DeviceState::Disconnected {
                return false;
            }
            *state = DeviceState::Disconnected;
        }
        for listener in self.state_listeners.snapshot() {
            listener(DeviceState::Disconnected);
        }
        self.queue.push(QueueEntry::Disconnect);
        true
    }

    /// Decode a transport chunk and dispatch the packages it completes.
    ///
    /// With `extract_rt` set, the chunk is treated as a real-time
    /// notification: the leading frames are queued ahead of the stream
    /// and the remainder continues the ordinary frame stream. A fatal
    /// codec error leaves the parser untouched, so the transport sees
    /// it again on the next chunk and can tear the connection down.
    pub fn feed(
        &self,
        chunk: &[u8],
        extract_rt: bool,
        host_receive_timestamp: Option<i64>,
    ) -> Result<()> {
        let ts = host_receive_timestamp.unwrap_or(0);
        let mut unpacker = self.unpacker.lock().unwrap();
        let data = if extract_rt {
            for listener in self.raw_chunk_listeners.snapshot() {
                listener(chunk, ts);
            }
            unpacker.extract_rt_packages(chunk, host_receive_timestamp)?
        } else {
            chunk
        };
        for listener in self.raw_data_listeners.snapshot() {
            listener(data, ts);
        }
        unpacker.feed(data);
        while let Some(pkg) = unpacker.next_package()? {
            self.dispatch(pkg, host_receive_timestamp);
        }
        Ok(())
    }

    fn dispatch(&self, mut pkg: Package, host_receive_timestamp: Option<i64>) {
        match &mut pkg {
            Package::DataStatus(status) => {
                *self.last_status.lock().unwrap() = Some(status.clone());
                self.status_latch.set();
            }
            Package::DataDeviceInfo(info) => {
                *self.last_device_info.lock().unwrap() = Some(info.clone());
                self.device_info_latch.set();
            }
            Package::DataClockRoundtrip(roundtrip) => {
                if roundtrip.host_receive_timestamp == 0 {
                    if let Some(ts) = host_receive_timestamp {
                        roundtrip.host_receive_timestamp = ts;
                    }
                }
            }
            _ => {}
        }
        for listener in self.package_listeners.snapshot() {
            listener(&pkg);
        }
        self.queue.push(QueueEntry::Package(pkg));
    }

    /// Arm the stop-streaming drain on the parser. All bytes are
    /// discarded until the `AckStopStreamingAndClearBuffer` frame.
    pub fn arm_stop_streaming_drain(&self) {
        self.unpacker.lock().unwrap().wait_for_stop_streaming_ack();
    }

    pub fn add_package_listener(&self, listener: std::sync::Arc<PackageListener>) -> ListenerId {
        self.package_listeners.add(listener)
    }

    pub fn remove_package_listener(&self, id: ListenerId) -> bool {
        self.package_listeners.remove(id)
    }

    pub fn package_listener_count(&self) -> usize {
        self.package_listeners.len()
    }

    pub fn add_state_listener(&self, listener: std::sync::Arc<StateListener>) -> ListenerId {
        self.state_listeners.add(listener)
    }

    pub fn remove_state_listener(&self, id: ListenerId) -> bool {
        self.state_listeners.remove(id)
    }

    pub fn add_raw_chunk_listener(&self, listener: std::sync::Arc<RawChunkListener>) -> ListenerId {
        self.raw_chunk_listeners.add(listener)
    }

    pub fn remove_raw_chunk_listener(&self, id: ListenerId) -> bool {
        self.raw_chunk_listeners.remove(id)
    }

    pub fn add_raw_data_listener(&self, listener: std::sync::Arc<RawDataListener>) -> ListenerId {
        self.raw_data_listeners.add(listener)
    }

    pub fn remove_raw_data_listener(&self, id: ListenerId) -> bool {
        self.raw_data_listeners.remove(id)
    }

    /// Latest status package, if any arrived on this connection.
    pub fn last_status(&self) -> Option<Status> {
        self.last_status.lock().unwrap().clone()
    }

    /// Device identity, if the sensor reported it on this connection.
    pub fn last_device_info(&self) -> Option<DeviceInfo> {
        self.last_device_info.lock().unwrap().clone()
    }

    /// Device name derived from the reported serial, e.g. `IMU_ab1234`.
    pub fn name(&self) -> Option<String> {
        self.last_device_info().map(|info| info.device_name())
    }

    /// Wait for the first status package of this connection. There is
    /// no deadline; the caller cancels by dropping the future.
    pub async fn wait_status(&self) -> Result<Status> {
        self.status_latch.wait().await;
        self.last_status().ok_or(DeviceError::NotConnected)
    }

    /// Wait for the device identity of this connection. There is no
    /// deadline; the caller cancels by dropping the future.
    pub async fn wait_device_info(&self) -> Result<DeviceInfo> {
        self.device_info_latch.wait().await;
        self.last_device_info().ok_or(DeviceError::NotConnected)
    }

    pub fn device_info_received(&self) -> bool {
        self.device_info_latch.is_set()
    }

    pub(crate) fn queue(&self) -> &PackageQueue {
        &self.queue
    }

    /// Next queued package without waiting, skipping connection
    /// sentinels. `None` when the queue holds no package.
    pub fn poll(&self) -> Option<Package> {
        loop {
            match self.queue.try_pop()? {
                QueueEntry::Package(pkg) => return Some(pkg),
                QueueEntry::Connect | QueueEntry::Disconnect => continue,
            }
        }
    }

    /// Next queued package, waiting if necessary. Returns `None` only at
    /// end of stream: a disconnect sentinel with nothing queued behind
    /// it. A disconnect followed by more entries means the device
    /// reconnected and the stream continues.
    pub async fn apoll(&self) -> Option<Package> {
        loop {
            match self.queue.pop().await {
                QueueEntry::Package(pkg) => return Some(pkg),
                QueueEntry::Connect => continue,
                QueueEntry::Disconnect => {
                    if self.queue.is_empty() {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use imulink_codec::encode_to_bytes;
    use imulink_pkg::package::{ClockRoundtrip, SensorState};

    fn connect(session: &Session) {
        session.begin_connection();
        session.mark_connected();
    }

    fn status_frame(state: SensorState) -> Vec<u8> {
        encode_to_bytes(&Package::DataStatus(Status {
            sensor_state: state,
            battery_percent: 90,
            charging: true,
            storage_free_kib: 2048,
            uptime_seconds: 10,
            timestamp: 5_000,
        }))
        .unwrap()
        .to_vec()
    }

    #[test]
    fn feed_updates_status_cache_and_listeners() {
        let session = Session::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            session.add_package_listener(Arc::new(move |_: &Package| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert!(session.last_status().is_none());
        session.feed(&status_frame(SensorState::Idle), false, None).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let status = session.last_status().unwrap();
        assert_eq!(status.sensor_state, SensorState::Idle);
        assert!(matches!(session.poll(), Some(Package::DataStatus(_))));
        assert!(session.poll().is_none());
    }

    #[test]
    fn clock_roundtrip_backfilled_once() {
        let session = Session::new();
        let frame = encode_to_bytes(&Package::DataClockRoundtrip(ClockRoundtrip {
            sensor_timestamp: 1,
            host_send_timestamp: 100,
            host_receive_timestamp: 0,
        }))
        .unwrap();
        session.feed(&frame, false, Some(7_000)).unwrap();

        match session.poll() {
            Some(Package::DataClockRoundtrip(rt)) => {
                assert_eq!(rt.host_receive_timestamp, 7_000)
            }
            other => panic!("expected roundtrip, got {other:?}"),
        }

        // A roundtrip the sensor already stamped is left alone.
        let stamped = encode_to_bytes(&Package::DataClockRoundtrip(ClockRoundtrip {
            sensor_timestamp: 2,
            host_send_timestamp: 100,
            host_receive_timestamp: 42,
        }))
        .unwrap();
        session.feed(&stamped, false, Some(7_000)).unwrap();
        match session.poll() {
            Some(Package::DataClockRoundtrip(rt)) => assert_eq!(rt.host_receive_timestamp, 42),
            other => panic!("expected roundtrip, got {other:?}"),
        }
    }

    #[test]
    fn rt_chunk_remainder_continues_the_frame_stream() {
        let session = Session::new();
        let data = Arc::new(Mutex::new(Vec::new()));
        let chunks = Arc::new(Mutex::new(Vec::new()));
        {
            let data = data.clone();
            session.add_raw_data_listener(Arc::new(move |chunk: &[u8], ts: i64| {
                data.lock().unwrap().push((chunk.to_vec(), ts));
            }));
        }
        {
            let chunks = chunks.clone();
            session.add_raw_chunk_listener(Arc::new(move |chunk: &[u8], ts: i64| {
                chunks.lock().unwrap().push((chunk.to_vec(), ts));
            }));
        }

        let frame = status_frame(SensorState::Idle);
        let mut chunk = vec![0xff]; // No leading real-time frames.
        chunk.extend_from_slice(&frame);
        session.feed(&chunk, true, Some(55)).unwrap();

        // Chunk listeners see the wire bytes untouched, data listeners
        // the remainder past the count byte.
        assert_eq!(chunks.lock().unwrap().as_slice(), &[(chunk.clone(), 55)]);
        assert_eq!(data.lock().unwrap().as_slice(), &[(frame, 55)]);
        // The remainder is part of the ordinary frame stream.
        assert!(matches!(session.poll(), Some(Package::DataStatus(_))));
        assert!(session.poll().is_none());
    }

    #[test]
    fn data_listeners_fire_on_plain_chunks_too() {
        let session = Session::new();
        let data = Arc::new(Mutex::new(Vec::new()));
        let chunks = Arc::new(Mutex::new(Vec::new()));
        {
            let data = data.clone();
            session.add_raw_data_listener(Arc::new(move |chunk: &[u8], ts: i64| {
                data.lock().unwrap().push((chunk.to_vec(), ts));
            }));
        }
        {
            let chunks = chunks.clone();
            session.add_raw_chunk_listener(Arc::new(move |chunk: &[u8], ts: i64| {
                chunks.lock().unwrap().push((chunk.to_vec(), ts));
            }));
        }

        let frame = status_frame(SensorState::Idle);
        session.feed(&frame, false, Some(7)).unwrap();

        assert_eq!(data.lock().unwrap().as_slice(), &[(frame, 7)]);
        // Chunk listeners are a real-time hook, plain chunks pass them by.
        assert!(chunks.lock().unwrap().is_empty());
    }

    #[test]
    fn bytes_fed_while_opening_land_behind_the_connect_sentinel() {
        let session = Session::new();
        session.begin_connection();
        session.feed(&status_frame(SensorState::Idle), false, None).unwrap();
        session.mark_connected();

        // The early status survives the handshake and sits behind the
        // connect sentinel.
        assert!(session.status_latch.is_set());
        assert!(matches!(
            session.queue().try_pop(),
            Some(QueueEntry::Connect)
        ));
        assert!(matches!(
            session.queue().try_pop(),
            Some(QueueEntry::Package(Package::DataStatus(_)))
        ));
    }

    #[tokio::test]
    async fn apoll_ends_only_on_trailing_disconnect() {
        let session = Session::new();
        connect(&session);
        session.feed(&status_frame(SensorState::Idle), false, None).unwrap();
        session.mark_disconnected();
        // Reconnect before the consumer catches up.
        connect(&session);
        session.feed(&status_frame(SensorState::Recording), false, None).unwrap();

        assert!(matches!(
            session.apoll().await,
            Some(Package::DataStatus(Status {
                sensor_state: SensorState::Idle,
                ..
            }))
        ));
        // The mid-stream disconnect is not the end, more followed it.
        assert!(matches!(
            session.apoll().await,
            Some(Package::DataStatus(Status {
                sensor_state: SensorState::Recording,
                ..
            }))
        ));

        session.mark_disconnected();
        assert!(session.apoll().await.is_none());
    }

    #[test]
    fn disconnect_sentinel_is_queued_once() {
        let session = Session::new();
        connect(&session);
        assert!(session.mark_disconnected());
        assert!(!session.mark_disconnected());
        assert_eq!(session.queue().len(), 2); // Connect + one Disconnect.
    }

    #[test]
    fn reconnect_resets_latches() {
        let session = Session::new();
        connect(&session);
        session.feed(&status_frame(SensorState::Idle), false, None).unwrap();
        assert!(session.status_latch.is_set());

        session.mark_disconnected();
        connect(&session);
        assert!(!session.status_latch.is_set());
        assert!(!session.device_info_received());
    }
}
