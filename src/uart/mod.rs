//! # UART Driver
//!
//! Interrupt-driven UART transport with blocking and non-blocking byte,
//! buffer and string I/O.
//!
//! This module handles:
//! - Per-port transmit FIFO and receive buffer state
//! - Busy tracking for the transmitter
//! - Blocking calls that wait on the hardware backend
//! - Non-blocking calls that report availability instead of waiting
//!
//! Hardware access goes through [`UartHardware`]. The interrupt path reaches
//! the port table through an [`IrqHandle`] handed to the backend on `init`.

mod hardware;
mod port;
mod sim;

pub use hardware::UartHardware;
pub use port::{IrqHandle, PortId, UART_NUM_PORTS};
pub use sim::SimulatedUart;

#[cfg(test)]
pub use hardware::MockUartHardware;

use tracing::{debug, error, info, warn};

use crate::error::{CommsError, Result};
use port::{new_port_table, PortTable};

/// Baud rates the driver accepts
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600,
];

/// Default transmit FIFO depth (matches the 16-byte hardware FIFO)
pub const DEFAULT_TX_FIFO_DEPTH: usize = 16;

/// Default receive buffer size in bytes
pub const DEFAULT_RX_BUFFER_SIZE: usize = 256;

/// Buffer sizing shared by every port of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    /// Bytes the transmit path can hold, the one being sent included
    pub tx_fifo_depth: usize,
    pub rx_buffer_size: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            tx_fifo_depth: DEFAULT_TX_FIFO_DEPTH,
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
        }
    }
}

/// Returns `true` if `baud_rate` is one of [`SUPPORTED_BAUD_RATES`]
pub fn is_supported_baud_rate(baud_rate: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud_rate)
}

/// Bytes of `text` up to, not including, the first NUL
fn until_terminator(text: &[u8]) -> &[u8] {
    match text.iter().position(|&b| b == 0) {
        Some(end) => &text[..end],
        None => text,
    }
}

/// UART driver owning the port table and the hardware backend
pub struct UartDriver<H: UartHardware> {
    hardware: H,
    ports: PortTable,
    settings: DriverSettings,
}

impl<H: UartHardware> std::fmt::Debug for UartDriver<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartDriver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<H: UartHardware> UartDriver<H> {
    /// Create a driver with every port unconfigured
    ///
    /// # Errors
    ///
    /// [`CommsError::InvalidSettings`] if either buffer size in `settings` is zero.
    pub fn new(hardware: H, settings: DriverSettings) -> Result<Self> {
        if settings.tx_fifo_depth == 0 {
            return Err(CommsError::InvalidSettings(
                "tx_fifo_depth must be greater than 0".to_string(),
            ));
        }
        if settings.rx_buffer_size == 0 {
            return Err(CommsError::InvalidSettings(
                "rx_buffer_size must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            hardware,
            ports: new_port_table(settings.rx_buffer_size, settings.tx_fifo_depth),
            settings,
        })
    }

    pub fn settings(&self) -> DriverSettings {
        self.settings
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Handle the interrupt path uses to reach this driver's ports
    pub fn irq_handle(&self) -> IrqHandle {
        IrqHandle::new(self.ports.clone())
    }

    /// Configure `port` at `baud_rate`
    ///
    /// Re-initialising a port is allowed: its buffers are cleared and the
    /// hardware is reconfigured.
    ///
    /// # Errors
    ///
    /// - [`CommsError::InvalidPort`] for an index outside the port table
    /// - [`CommsError::UnsupportedBaudRate`] for a rate not in
    ///   [`SUPPORTED_BAUD_RATES`]
    /// - any error the backend raises; the port is left uninitialised
    pub fn init(&mut self, port: u8, baud_rate: u32) -> Result<()> {
        let id = PortId::new(port)?;
        if !is_supported_baud_rate(baud_rate) {
            error!("UART {} init rejected: unsupported baud rate {}", id, baud_rate);
            return Err(CommsError::UnsupportedBaudRate(baud_rate));
        }

        let was_initialised = {
            let mut state = self.ports[id.slot()].lock();
            let was_initialised = state.initialised;
            state.reset(baud_rate);
            was_initialised
        };
        if was_initialised {
            warn!("UART {} already initialised, reconfiguring at {} baud", id, baud_rate);
        }

        let irq = self.irq_handle();
        self.hardware.configure(id, baud_rate, irq)?;
        self.ports[id.slot()].lock().initialised = true;

        info!("UART {} initialised at {} baud", id, baud_rate);
        Ok(())
    }

    /// Validate `port` and check it has been initialised
    fn checked(&self, port: u8) -> Result<PortId> {
        let id = PortId::new(port)?;
        if !self.ports[id.slot()].lock().initialised {
            return Err(CommsError::PortNotInitialised(port));
        }
        Ok(id)
    }

    fn is_busy(&self, id: PortId) -> bool {
        self.ports[id.slot()].lock().busy()
    }

    /// `true` while a byte is being transmitted on `port`
    pub fn busy(&self, port: u8) -> Result<bool> {
        let id = self.checked(port)?;
        Ok(self.is_busy(id))
    }

    /// Number of received bytes waiting to be read from `port`
    pub fn chars_avail(&self, port: u8) -> Result<usize> {
        let id = self.checked(port)?;
        Ok(self.ports[id.slot()].lock().chars_avail())
    }

    /// Received bytes dropped on `port` because its buffer was full
    pub fn overruns(&self, port: u8) -> Result<u32> {
        let id = self.checked(port)?;
        Ok(self.ports[id.slot()].lock().overruns())
    }

    /// Baud rate `port` was initialised with
    pub fn baud_rate(&self, port: u8) -> Result<u32> {
        let id = self.checked(port)?;
        Ok(self.ports[id.slot()].lock().baud_rate)
    }

    /// Read one byte, waiting until one is received
    pub fn getc(&mut self, port: u8) -> Result<u8> {
        let id = self.checked(port)?;
        loop {
            let received = self.ports[id.slot()].lock().pop_rx();
            if let Some(byte) = received {
                return Ok(byte);
            }
            self.hardware.idle();
        }
    }

    /// Read one byte if one is available
    ///
    /// Returns `Ok(None)` without consuming anything when the receive buffer
    /// is empty.
    pub fn getc_nonblocking(&mut self, port: u8) -> Result<Option<u8>> {
        let id = self.checked(port)?;
        Ok(self.ports[id.slot()].lock().pop_rx())
    }

    /// Send one byte and wait until it has left the line
    pub fn putc(&mut self, port: u8, byte: u8) -> Result<()> {
        self.putb(port, &[byte])
    }

    /// Queue one byte for transmission
    ///
    /// Returns `Ok(false)` when the transmit FIFO is full. The pending
    /// transmission is not affected and the caller retries later.
    pub fn putc_nonblocking(&mut self, port: u8, byte: u8) -> Result<bool> {
        self.putb_nonblocking(port, &[byte])
    }

    /// Send `data` and wait until every byte has left the line
    ///
    /// `data` may contain any byte value, zero included.
    pub fn putb(&mut self, port: u8, data: &[u8]) -> Result<()> {
        let id = self.checked(port)?;
        let mut remaining = data;

        while !remaining.is_empty() {
            let (kick, queued) = {
                let mut state = self.ports[id.slot()].lock();
                let queued = state.tx_free().min(remaining.len());
                (state.enqueue(&remaining[..queued]), queued)
            };
            if let Some(byte) = kick {
                self.hardware.start_transmit(id, byte);
            }

            remaining = &remaining[queued..];
            if !remaining.is_empty() {
                self.hardware.idle();
            }
        }

        while self.is_busy(id) {
            self.hardware.idle();
        }

        debug!("UART {} sent {} bytes", id, data.len());
        Ok(())
    }

    /// Queue all of `data` for transmission, or nothing
    ///
    /// Returns `Ok(false)` when the transmit FIFO cannot take the whole
    /// buffer; nothing is queued in that case.
    pub fn putb_nonblocking(&mut self, port: u8, data: &[u8]) -> Result<bool> {
        let id = self.checked(port)?;
        let kick = {
            let mut state = self.ports[id.slot()].lock();
            if state.tx_free() < data.len() {
                return Ok(false);
            }
            state.enqueue(data)
        };

        if let Some(byte) = kick {
            self.hardware.start_transmit(id, byte);
        }
        Ok(true)
    }

    /// Send `text` up to its first NUL byte (or its end) and wait for completion
    pub fn puts(&mut self, port: u8, text: impl AsRef<[u8]>) -> Result<()> {
        self.putb(port, until_terminator(text.as_ref()))
    }

    /// Queue `text` up to its first NUL byte (or its end), all or nothing
    pub fn puts_nonblocking(&mut self, port: u8, text: impl AsRef<[u8]>) -> Result<bool> {
        self.putb_nonblocking(port, until_terminator(text.as_ref()))
    }
}
