//! Trait abstraction for UART hardware so the driver logic can run against a
//! simulated backend on the host.

use super::port::{IrqHandle, PortId};
use crate::error::Result;

/// UART hardware backend
///
/// The driver never calls into the backend while holding a port lock, so a
/// backend may call the [`IrqHandle`] synchronously from any of these methods.
#[cfg_attr(test, mockall::automock)]
pub trait UartHardware: Send {
    /// Configure `port` for `baud_rate` and attach its interrupt handle
    fn configure(&mut self, port: PortId, baud_rate: u32, irq: IrqHandle) -> Result<()>;

    /// Load `byte` into the idle transmitter of `port`
    ///
    /// Completion is reported through [`IrqHandle::transmit_complete`].
    fn start_transmit(&mut self, port: PortId, byte: u8);

    /// Called by blocking operations between polls
    fn idle(&mut self) {
        std::hint::spin_loop();
    }
}

impl<H: UartHardware + ?Sized> UartHardware for Box<H> {
    fn configure(&mut self, port: PortId, baud_rate: u32, irq: IrqHandle) -> Result<()> {
        (**self).configure(port, baud_rate, irq)
    }

    fn start_transmit(&mut self, port: PortId, byte: u8) {
        (**self).start_transmit(port, byte)
    }

    fn idle(&mut self) {
        (**self).idle()
    }
}
