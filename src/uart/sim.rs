//! Simulated UART hardware for host runs and tests
//!
//! Each port has a one-byte shift register. A byte leaves the line when the
//! port is ticked, either explicitly with [`SimulatedUart::tick`] or from
//! [`UartHardware::idle`] while auto-completion is on.

use std::collections::VecDeque;
use std::sync::Arc;

use spin::Mutex;
use tracing::{debug, warn};

use super::hardware::UartHardware;
use super::port::{IrqHandle, PortId, UART_NUM_PORTS};
use crate::error::{CommsError, Result};

#[derive(Debug, Default)]
struct SimLine {
    irq: Option<IrqHandle>,
    baud_rate: Option<u32>,
    shifting: Option<u8>,
    wire: Vec<u8>,
    pending_rx: VecDeque<u8>,
}

#[derive(Debug)]
struct SimState {
    lines: [SimLine; UART_NUM_PORTS],
    loopback: bool,
    auto_complete: bool,
    configure_failure: Option<String>,
}

/// In-memory UART backend
///
/// Clones share the same simulated hardware, so a test can keep one clone
/// while the driver owns another.
///
/// # Example
///
/// ```
/// use obc_comms::uart::{DriverSettings, SimulatedUart, UartDriver, PortId};
///
/// let sim = SimulatedUart::new();
/// let mut driver = UartDriver::new(sim.clone(), DriverSettings::default())?;
/// driver.init(0, 115_200)?;
///
/// driver.puts(0, "hello")?;
/// assert_eq!(sim.transmitted(PortId::new(0)?), b"hello");
///
/// sim.inject_rx(PortId::new(0)?, b"ok");
/// assert_eq!(driver.getc(0)?, b'o');
/// # Ok::<(), obc_comms::error::CommsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedUart {
    inner: Arc<Mutex<SimState>>,
}

impl Default for SimulatedUart {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedUart {
    /// Simulated hardware with auto-completion on and loopback off
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                lines: Default::default(),
                loopback: false,
                auto_complete: true,
                configure_failure: None,
            })),
        }
    }

    /// Simulated hardware that feeds every sent byte back into the same port
    pub fn loopback() -> Self {
        let sim = Self::new();
        sim.inner.lock().loopback = true;
        sim
    }

    /// Enable or disable completing in-flight bytes from `idle`
    pub fn set_auto_complete(&self, enabled: bool) {
        self.inner.lock().auto_complete = enabled;
    }

    /// Make subsequent `configure` calls fail with `message`
    pub fn set_configure_failure(&self, message: Option<&str>) {
        self.inner.lock().configure_failure = message.map(str::to_string);
    }

    /// Deliver `data` to `port` immediately, as a burst of receive interrupts
    pub fn inject_rx(&self, port: PortId, data: &[u8]) {
        let irq = self.inner.lock().lines[port.slot()].irq.clone();
        match irq {
            Some(irq) => data.iter().for_each(|&byte| irq.byte_received(port, byte)),
            None => warn!("Simulated UART {} not configured, dropped {} bytes", port, data.len()),
        }
    }

    /// Queue `data` for `port`; one byte is delivered per `idle` call
    pub fn schedule_rx(&self, port: PortId, data: &[u8]) {
        self.inner.lock().lines[port.slot()]
            .pending_rx
            .extend(data.iter().copied());
    }

    /// Finish sending the byte in the shift register of `port`
    ///
    /// Returns `false` when the line was idle.
    pub fn tick(&self, port: PortId) -> bool {
        let (byte, irq, loopback) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            let line = &mut state.lines[port.slot()];
            match line.shifting.take() {
                Some(byte) => {
                    line.wire.push(byte);
                    (byte, line.irq.clone(), state.loopback)
                }
                None => return false,
            }
        };

        if let Some(irq) = irq {
            if loopback {
                irq.byte_received(port, byte);
            }
            if let Some(next) = irq.transmit_complete(port) {
                self.inner.lock().lines[port.slot()].shifting = Some(next);
            }
        }
        true
    }

    /// Bytes that have left the line of `port`
    pub fn transmitted(&self, port: PortId) -> Vec<u8> {
        self.inner.lock().lines[port.slot()].wire.clone()
    }

    /// Byte currently in the shift register of `port`
    pub fn in_flight(&self, port: PortId) -> Option<u8> {
        self.inner.lock().lines[port.slot()].shifting
    }

    /// Baud rate `port` was last configured with
    pub fn baud_rate(&self, port: PortId) -> Option<u32> {
        self.inner.lock().lines[port.slot()].baud_rate
    }

    fn deliver_scheduled(&self, port: PortId) {
        let next = {
            let mut guard = self.inner.lock();
            let line = &mut guard.lines[port.slot()];
            match (&line.irq, line.pending_rx.pop_front()) {
                (Some(irq), Some(byte)) => Some((irq.clone(), byte)),
                (None, Some(byte)) => {
                    line.pending_rx.push_front(byte);
                    None
                }
                _ => None,
            }
        };

        if let Some((irq, byte)) = next {
            irq.byte_received(port, byte);
        }
    }
}

impl UartHardware for SimulatedUart {
    fn configure(&mut self, port: PortId, baud_rate: u32, irq: IrqHandle) -> Result<()> {
        let mut state = self.inner.lock();
        if let Some(message) = &state.configure_failure {
            return Err(CommsError::Hardware(message.clone()));
        }

        let line = &mut state.lines[port.slot()];
        line.irq = Some(irq);
        line.baud_rate = Some(baud_rate);
        line.shifting = None;
        debug!("Simulated UART {} configured at {} baud", port, baud_rate);
        Ok(())
    }

    fn start_transmit(&mut self, port: PortId, byte: u8) {
        let mut state = self.inner.lock();
        let line = &mut state.lines[port.slot()];
        if let Some(lost) = line.shifting.replace(byte) {
            warn!("Simulated UART {} transmitter overwritten, lost 0x{:02X}", port, lost);
        }
    }

    fn idle(&mut self) {
        let auto_complete = self.inner.lock().auto_complete;
        for port in PortId::all() {
            if auto_complete {
                self.tick(port);
            }
            self.deliver_scheduled(port);
        }
    }
}
