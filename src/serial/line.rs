//! Byte-level transmit seam between the writer task and a serial device

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Transmit side of one UART line
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineWriter: Send {
    /// Shift `byte` out and return once the device has accepted it
    async fn send_byte(&mut self, byte: u8) -> io::Result<()>;
}

/// [`LineWriter`] over any async byte sink, such as the write half of a
/// `tokio_serial::SerialStream`
///
/// Every byte is flushed on its own so that a transmit-complete event is
/// only raised once the byte has left the host.
pub struct SerialLine<W> {
    sink: W,
}

impl<W> SerialLine<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWriter for SerialLine<W> {
    async fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        self.sink.write_all(&[byte]).await?;
        self.sink.flush().await
    }
}
