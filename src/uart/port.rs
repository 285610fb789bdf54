//! Per-port buffer state shared between the foreground driver and the
//! interrupt path.
//!
//! Every access goes through the port's spin lock, which stands in for the
//! interrupt-disable critical section on the flight hardware.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use spin::Mutex;
use tracing::warn;

use crate::error::{CommsError, Result};

/// Number of UART ports in the driver's port table
pub const UART_NUM_PORTS: usize = 3;

/// Validated UART port index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(u8);

impl PortId {
    /// Validate a raw port index
    ///
    /// # Errors
    ///
    /// [`CommsError::InvalidPort`] if `index >= UART_NUM_PORTS`.
    pub fn new(index: u8) -> Result<Self> {
        if (index as usize) < UART_NUM_PORTS {
            Ok(Self(index))
        } else {
            Err(CommsError::InvalidPort(index))
        }
    }

    /// All ports of the table, in index order
    pub fn all() -> impl Iterator<Item = PortId> {
        (0..UART_NUM_PORTS as u8).map(PortId)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buffer state of one port
#[derive(Debug)]
pub(crate) struct PortState {
    pub initialised: bool,
    pub baud_rate: u32,
    rx: VecDeque<u8>,
    rx_capacity: usize,
    tx: VecDeque<u8>,
    /// Bytes the transmit path holds, the one in the shift register included
    tx_depth: usize,
    in_flight: bool,
    overruns: u32,
}

impl PortState {
    pub fn new(rx_capacity: usize, tx_depth: usize) -> Self {
        Self {
            initialised: false,
            baud_rate: 0,
            rx: VecDeque::with_capacity(rx_capacity),
            rx_capacity,
            tx: VecDeque::with_capacity(tx_depth),
            tx_depth,
            in_flight: false,
            overruns: 0,
        }
    }

    /// Drop all buffered data and mark the port unconfigured
    pub fn reset(&mut self, baud_rate: u32) {
        self.initialised = false;
        self.baud_rate = baud_rate;
        self.rx.clear();
        self.tx.clear();
        self.in_flight = false;
        self.overruns = 0;
    }

    pub fn busy(&self) -> bool {
        self.in_flight
    }

    pub fn chars_avail(&self) -> usize {
        self.rx.len()
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Free slots in the transmit path
    pub fn tx_free(&self) -> usize {
        self.tx_depth - self.tx.len() - usize::from(self.in_flight)
    }

    /// Queue `bytes` for transmission
    ///
    /// The caller checks [`tx_free`](Self::tx_free) first. Returns the byte
    /// the caller must hand to the hardware when the line was idle.
    pub fn enqueue(&mut self, bytes: &[u8]) -> Option<u8> {
        debug_assert!(bytes.len() <= self.tx_free());

        let mut kick = None;
        let mut rest = bytes;
        if !self.in_flight {
            if let Some((&first, tail)) = rest.split_first() {
                self.in_flight = true;
                kick = Some(first);
                rest = tail;
            }
        }
        self.tx.extend(rest.iter().copied());
        kick
    }

    pub fn pop_rx(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    /// Store a received byte; `false` when the buffer was full
    pub fn push_rx(&mut self, byte: u8) -> bool {
        if self.rx.len() >= self.rx_capacity {
            self.overruns = self.overruns.saturating_add(1);
            return false;
        }
        self.rx.push_back(byte);
        true
    }

    /// The in-flight byte left the line; returns the next byte to send
    pub fn complete_tx(&mut self) -> Option<u8> {
        match self.tx.pop_front() {
            Some(next) => Some(next),
            None => {
                self.in_flight = false;
                None
            }
        }
    }
}

/// Port table shared by the driver and its interrupt handle
pub(crate) type PortTable = Arc<[Mutex<PortState>]>;

pub(crate) fn new_port_table(rx_capacity: usize, tx_depth: usize) -> PortTable {
    (0..UART_NUM_PORTS)
        .map(|_| Mutex::new(PortState::new(rx_capacity, tx_depth)))
        .collect::<Vec<_>>()
        .into()
}

/// Interrupt-side entry points into the driver
///
/// Hardware backends receive a handle in [`UartHardware::configure`] and call
/// it from their receive and transmit-complete events.
///
/// [`UartHardware::configure`]: super::UartHardware::configure
#[derive(Clone)]
pub struct IrqHandle {
    ports: PortTable,
}

impl fmt::Debug for IrqHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqHandle").finish_non_exhaustive()
    }
}

impl IrqHandle {
    pub(crate) fn new(ports: PortTable) -> Self {
        Self { ports }
    }

    /// A byte arrived on `port`
    ///
    /// When the receive buffer is full the byte is dropped and counted as an
    /// overrun.
    pub fn byte_received(&self, port: PortId, byte: u8) {
        let (stored, overruns) = {
            let mut state = self.ports[port.slot()].lock();
            let stored = state.push_rx(byte);
            (stored, state.overruns())
        };

        if !stored {
            warn!("UART {} receive overrun, dropped 0x{:02X} ({} total)", port, byte, overruns);
        }
    }

    /// The byte in the shift register of `port` has been sent
    ///
    /// Returns the next byte the hardware must start sending, or `None` when
    /// the transmit path is now empty and the port is no longer busy.
    pub fn transmit_complete(&self, port: PortId) -> Option<u8> {
        self.ports[port.slot()].lock().complete_tx()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_id_bounds() {
        assert!(PortId::new(0).is_ok());
        assert!(PortId::new(UART_NUM_PORTS as u8 - 1).is_ok());
        assert!(matches!(
            PortId::new(UART_NUM_PORTS as u8),
            Err(CommsError::InvalidPort(3))
        ));
        assert_eq!(PortId::all().count(), UART_NUM_PORTS);
    }

    #[test]
    fn test_enqueue_kicks_only_when_idle() {
        let mut state = PortState::new(8, 4);
        assert_eq!(state.tx_free(), 4);

        assert_eq!(state.enqueue(b"ab"), Some(b'a'));
        assert!(state.busy());
        assert_eq!(state.tx_free(), 2);

        assert_eq!(state.enqueue(b"c"), None);
        assert_eq!(state.tx_free(), 1);

        assert_eq!(state.complete_tx(), Some(b'b'));
        assert_eq!(state.complete_tx(), Some(b'c'));
        assert!(state.busy());
        assert_eq!(state.complete_tx(), None);
        assert!(!state.busy());
        assert_eq!(state.tx_free(), 4);
    }

    #[test]
    fn test_enqueue_empty_is_noop() {
        let mut state = PortState::new(8, 4);
        assert_eq!(state.enqueue(&[]), None);
        assert!(!state.busy());
    }

    #[test]
    fn test_rx_overrun_counts_dropped_bytes() {
        let mut state = PortState::new(2, 4);
        assert!(state.push_rx(1));
        assert!(state.push_rx(2));
        assert!(!state.push_rx(3));
        assert_eq!(state.chars_avail(), 2);
        assert_eq!(state.overruns(), 1);
        assert_eq!(state.pop_rx(), Some(1));
        assert!(state.push_rx(4));
        assert_eq!(state.pop_rx(), Some(2));
        assert_eq!(state.pop_rx(), Some(4));
        assert_eq!(state.pop_rx(), None);
    }

    #[test]
    fn test_reset_clears_buffers() {
        let mut state = PortState::new(4, 4);
        state.push_rx(9);
        state.enqueue(b"xy");
        state.reset(9600);
        assert_eq!(state.chars_avail(), 0);
        assert!(!state.busy());
        assert_eq!(state.tx_free(), 4);
        assert_eq!(state.baud_rate, 9600);
        assert!(!state.initialised);
    }

    #[test]
    fn test_irq_handle_routes_to_port() {
        let table = new_port_table(4, 4);
        let irq = IrqHandle::new(table.clone());
        let port = PortId::new(2).unwrap();

        irq.byte_received(port, 0x55);
        assert_eq!(table[2].lock().chars_avail(), 1);
        assert_eq!(table[0].lock().chars_avail(), 0);

        table[2].lock().enqueue(b"q");
        assert_eq!(irq.transmit_complete(port), None);
        assert!(!table[2].lock().busy());
    }
}
