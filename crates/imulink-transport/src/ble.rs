//! BLE transport over a proprietary UART-style service.
//!
//! The sensor exposes one service with a write characteristic for
//! commands and a notify characteristic for the measurement stream.
//! Notifications use the real-time chunk format: a frame count byte,
//! complete frames, then raw samples.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use uuid::Uuid;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};

use imulink_device::{Device, DeviceError, Link, Session};

use crate::error::{Result, TransportError};
use crate::now_nanos;

/// Primary service advertised by the sensor.
pub const IMU_SERVICE_UUID: Uuid = Uuid::from_u128(0x80030001_e629_4c98_9324_aa7fc0c66de7);
/// Host-to-sensor command characteristic (write without response).
pub const IMU_RX_CHAR_UUID: Uuid = Uuid::from_u128(0x80030002_e629_4c98_9324_aa7fc0c66de7);
/// Sensor-to-host stream characteristic (notify).
pub const IMU_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x80030003_e629_4c98_9324_aa7fc0c66de7);

/// A [`Device`] running over BLE.
pub type BleDevice = Device<BleLink>;

/// Build a device around a discovered peripheral.
pub fn ble_device(peripheral: Peripheral) -> BleDevice {
    Device::new(BleLink::new(peripheral))
}

/// Transport link over one BLE peripheral.
pub struct BleLink {
    peripheral: Peripheral,
    rx_char: Option<Characteristic>,
    notify_task: Option<JoinHandle<()>>,
}

impl BleLink {
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            rx_char: None,
            notify_task: None,
        }
    }
}

impl Link for BleLink {
    async fn open(&mut self, session: Arc<Session>) -> imulink_device::Result<()> {
        self.peripheral
            .connect()
            .await
            .map_err(DeviceError::transport)?;
        self.peripheral
            .discover_services()
            .await
            .map_err(DeviceError::transport)?;

        let characteristics = self.peripheral.characteristics();
        let rx_char = characteristics
            .iter()
            .find(|c| c.uuid == IMU_RX_CHAR_UUID)
            .cloned()
            .ok_or_else(|| {
                DeviceError::transport(TransportError::CharacteristicMissing(IMU_RX_CHAR_UUID))
            })?;
        let tx_char = characteristics
            .iter()
            .find(|c| c.uuid == IMU_TX_CHAR_UUID)
            .cloned()
            .ok_or_else(|| {
                DeviceError::transport(TransportError::CharacteristicMissing(IMU_TX_CHAR_UUID))
            })?;

        self.peripheral
            .subscribe(&tx_char)
            .await
            .map_err(DeviceError::transport)?;
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(DeviceError::transport)?;

        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != IMU_TX_CHAR_UUID {
                    continue;
                }
                let timestamp = now_nanos();
                if let Err(err) = session.feed(&notification.value, true, Some(timestamp)) {
                    tracing::warn!(error = %err, "undecodable notification, dropping connection");
                    break;
                }
            }
            // The notification stream ends when the peripheral goes away.
            if session.mark_disconnected() {
                tracing::info!("ble peripheral disconnected");
            }
        });

        self.rx_char = Some(rx_char);
        self.notify_task = Some(task);
        Ok(())
    }

    async fn close(&mut self) -> imulink_device::Result<()> {
        // Stop the notification task first so the remote-disconnect path
        // cannot race the deliberate one.
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        self.rx_char = None;
        self.peripheral
            .disconnect()
            .await
            .map_err(DeviceError::transport)?;
        Ok(())
    }

    async fn write(&mut self, frame: Bytes) -> imulink_device::Result<()> {
        let rx_char = self.rx_char.as_ref().ok_or(DeviceError::NotConnected)?;
        self.peripheral
            .write(rx_char, &frame, WriteType::WithoutResponse)
            .await
            .map_err(DeviceError::transport)
    }
}

/// Adapter-wide discovery of IMU sensors.
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    /// Use the first bluetooth adapter on the host.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        Ok(Self { adapter })
    }

    /// Scan for peripherals advertising the IMU service.
    pub async fn discover(&self, scan_time: Duration) -> Result<Vec<Peripheral>> {
        self.adapter
            .start_scan(ScanFilter {
                services: vec![IMU_SERVICE_UUID],
            })
            .await?;
        tokio::time::sleep(scan_time).await;
        self.adapter.stop_scan().await?;
        Ok(self.adapter.peripherals().await?)
    }

    /// Scan and resolve advertised name and signal strength for each
    /// sensor found.
    pub async fn discover_sensors(&self, scan_time: Duration) -> Result<Vec<DiscoveredSensor>> {
        let mut sensors = Vec::new();
        for peripheral in self.discover(scan_time).await? {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let Some(name) = props.local_name else {
                continue;
            };
            sensors.push(DiscoveredSensor {
                name,
                rssi: props.rssi,
                peripheral,
            });
        }
        Ok(sensors)
    }

    /// Find one sensor by its advertised name, e.g. `IMU_ab1234`.
    pub async fn find_by_name(&self, name: &str, scan_time: Duration) -> Result<Peripheral> {
        self.discover_sensors(scan_time)
            .await?
            .into_iter()
            .find(|sensor| sensor.name == name)
            .map(|sensor| sensor.peripheral)
            .ok_or_else(|| TransportError::DeviceNotFound(name.to_owned()))
    }
}

/// One sensor seen during a scan.
#[derive(Debug, Clone)]
pub struct DiscoveredSensor {
    /// Advertised local name, `IMU_` followed by the serial in hex.
    pub name: String,
    /// Signal strength at scan time, if the adapter reported it.
    pub rssi: Option<i16>,
    pub peripheral: Peripheral,
}
