//! USB serial transport.
//!
//! The sensor enumerates as a CDC serial port and speaks the plain
//! frame stream with no real-time chunk framing. `serialport` reads are
//! blocking, so a dedicated thread pulls chunks off the wire and hands
//! them to an async pump task over a channel.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use serialport::SerialPort;

use imulink_device::{Device, DeviceError, Link, Session};

use crate::now_nanos;

/// The sensor ignores the configured rate; the convention is to ask for
/// the maximum.
pub const USB_BAUD_RATE: u32 = 2_147_483_647;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 4096;

/// A [`Device`] running over a serial port.
pub type UsbDevice = Device<UsbLink>;

/// Build a device for the serial port at `path`, e.g. `/dev/ttyACM0`.
pub fn usb_device(path: impl Into<String>) -> UsbDevice {
    Device::new(UsbLink::new(path))
}

enum UsbEvent {
    Data { timestamp: i64, chunk: Vec<u8> },
    Eof,
}

/// Transport link over one serial port.
pub struct UsbLink {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
    pump: Option<JoinHandle<()>>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl UsbLink {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: USB_BAUD_RATE,
            port: None,
            pump: None,
            shutdown: None,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

impl Link for UsbLink {
    async fn open(&mut self, session: Arc<Session>) -> imulink_device::Result<()> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(DeviceError::transport)?;
        let mut reader = port.try_clone().map_err(DeviceError::transport)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reader_shutdown = shutdown.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                if reader_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(UsbEvent::Eof);
                        break;
                    }
                    Ok(n) => {
                        let event = UsbEvent::Data {
                            timestamp: now_nanos(),
                            chunk: buf[..n].to_vec(),
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::TimedOut => continue,
                    Err(err) => {
                        tracing::warn!(error = %err, "serial read failed");
                        let _ = tx.send(UsbEvent::Eof);
                        break;
                    }
                }
            }
        });

        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    UsbEvent::Data { timestamp, chunk } => {
                        if let Err(err) = session.feed(&chunk, false, Some(timestamp)) {
                            tracing::warn!(error = %err, "corrupt serial stream, dropping connection");
                            break;
                        }
                    }
                    UsbEvent::Eof => break,
                }
            }
            if session.mark_disconnected() {
                tracing::info!("serial device disconnected");
            }
        });

        self.port = Some(port);
        self.pump = Some(pump);
        self.shutdown = Some(shutdown);
        Ok(())
    }

    async fn close(&mut self) -> imulink_device::Result<()> {
        // Stop the pump before dropping the port, otherwise its Eof path
        // races the deliberate disconnect sentinel.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.store(true, Ordering::Relaxed);
        }
        self.port = None;
        Ok(())
    }

    async fn write(&mut self, frame: Bytes) -> imulink_device::Result<()> {
        let port = self.port.as_mut().ok_or(DeviceError::NotConnected)?;
        port.write_all(&frame).map_err(DeviceError::transport)?;
        port.flush().map_err(DeviceError::transport)?;
        Ok(())
    }
}
