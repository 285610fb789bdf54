//! # Serial Bridge Backend
//!
//! Host-side [`UartHardware`] backend that maps driver ports onto serial
//! devices (USB-UART adapters, a flat-sat harness, a ground-station modem).
//!
//! This module handles:
//! - Opening each device at the baud rate the driver configures (8N1)
//! - A writer task per port that sends queued bytes and raises
//!   transmit-complete events
//! - A reader task per port that raises receive events

pub mod line;

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{CommsError, Result};
use crate::uart::{IrqHandle, PortId, UartHardware};
use line::{LineWriter, SerialLine};

/// Read chunk size of the reader task
const READ_CHUNK_SIZE: usize = 64;

/// Running I/O tasks of one configured port
struct PortLink {
    device_path: String,
    queue: mpsc::UnboundedSender<u8>,
    irq: IrqHandle,
    tasks: [JoinHandle<()>; 2],
}

impl Drop for PortLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Serial device bridge
///
/// Tasks are spawned on the runtime behind `runtime`, so the driver itself
/// can run on a plain thread and busy-wait.
pub struct SerialBackend {
    runtime: Handle,
    devices: HashMap<PortId, String>,
    links: HashMap<PortId, PortLink>,
}

impl std::fmt::Debug for SerialBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBackend")
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl SerialBackend {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            devices: HashMap::new(),
            links: HashMap::new(),
        }
    }

    /// Map `port` onto the serial device at `path`
    pub fn with_device(mut self, port: PortId, path: impl Into<String>) -> Self {
        self.devices.insert(port, path.into());
        self
    }

    /// Device mapped to `port`
    pub fn device_path(&self, port: PortId) -> Option<&str> {
        self.devices.get(&port).map(String::as_str)
    }

    /// `true` while `port` has an open device
    pub fn is_open(&self, port: PortId) -> bool {
        self.links.contains_key(&port)
    }

    /// Open a specific serial port, 8N1 without flow control
    ///
    /// Must be called from within the runtime context.
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| CommsError::Hardware(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl UartHardware for SerialBackend {
    fn configure(&mut self, port: PortId, baud_rate: u32, irq: IrqHandle) -> Result<()> {
        let path = self
            .devices
            .get(&port)
            .cloned()
            .ok_or_else(|| CommsError::Hardware(format!("No serial device mapped to UART {}", port)))?;

        // Closes the previous device, if any, before reopening
        self.links.remove(&port);

        let _guard = self.runtime.enter();
        let stream = Self::open_port(&path, baud_rate)?;
        let (read_half, write_half) = tokio::io::split(stream);
        let (queue, queued) = mpsc::unbounded_channel();

        let writer = self.runtime.spawn(run_writer(
            SerialLine::new(write_half),
            queued,
            irq.clone(),
            port,
        ));
        let reader = self.runtime.spawn(run_reader(read_half, irq.clone(), port));

        info!("UART {} bridged to {} at {} baud", port, path, baud_rate);
        self.links.insert(
            port,
            PortLink {
                device_path: path,
                queue,
                irq,
                tasks: [writer, reader],
            },
        );
        Ok(())
    }

    fn start_transmit(&mut self, port: PortId, byte: u8) {
        match self.links.get(&port) {
            Some(link) => {
                if link.queue.send(byte).is_err() {
                    // Complete the FIFO by hand so the port does not stay busy
                    let mut dropped = 1;
                    while link.irq.transmit_complete(port).is_some() {
                        dropped += 1;
                    }
                    warn!(
                        "UART {} writer for {} has stopped, {} bytes dropped",
                        port, link.device_path, dropped
                    );
                }
            }
            None => warn!("UART {} has no open serial device, byte dropped", port),
        }
    }

    fn idle(&mut self) {
        std::thread::yield_now();
    }
}

/// Send bytes handed over by `start_transmit`, chaining the FIFO through
/// `transmit_complete` until the port goes idle
///
/// A failed write still completes the byte so blocking writers are not
/// stranded; the loss is logged.
pub(crate) async fn run_writer<L: LineWriter>(
    mut line: L,
    mut queued: mpsc::UnboundedReceiver<u8>,
    irq: IrqHandle,
    port: PortId,
) {
    while let Some(first) = queued.recv().await {
        let mut next = Some(first);
        while let Some(byte) = next {
            if let Err(e) = line.send_byte(byte).await {
                warn!("UART {} failed to send 0x{:02X}: {}", port, byte, e);
            }
            next = irq.transmit_complete(port);
        }
    }
    debug!("UART {} writer stopped", port);
}

/// Forward received bytes to the driver until the device closes
pub(crate) async fn run_reader<R: AsyncRead + Unpin>(mut reader: R, irq: IrqHandle, port: PortId) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("UART {} device closed", port);
                break;
            }
            Ok(n) => {
                for &byte in &buf[..n] {
                    irq.byte_received(port, byte);
                }
            }
            Err(e) => {
                warn!("UART {} read failed: {}", port, e);
                break;
            }
        }
    }
}
