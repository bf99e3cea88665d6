//! One command/response exchange with the module.

use core::fmt::Display;

use log::{debug, error, trace};

use crate::bus::ModuleBus;
use crate::command::{build_command, build_send};
use crate::config::Timing;
use crate::error::{Error, TransportFault};
use crate::framer;

pub const TX_BUFFER_SIZE: usize = 1024;
pub const RX_BUFFER_SIZE: usize = 1024;

/// Bus plus the two scratch buffers shared by every exchange.
///
/// Commands are built into the transmit buffer, replies land in the receive
/// buffer and stay readable through [`Transport::response`] until the next
/// exchange.
pub struct Transport<B> {
    bus: B,
    timing: Timing,
    pub(crate) tx: [u8; TX_BUFFER_SIZE],
    pub(crate) rx: [u8; RX_BUFFER_SIZE],
}

impl<B: ModuleBus> Transport<B> {
    pub fn new(bus: B, timing: Timing) -> Self {
        Self {
            bus,
            timing,
            tx: [0; TX_BUFFER_SIZE],
            rx: [0; RX_BUFFER_SIZE],
        }
    }

    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Block until the ready line is asserted or the timeout elapses.
    pub fn wait_ready(&mut self) -> Result<(), Error> {
        let mut waited = 0;
        while !self.bus.is_ready()? {
            if waited >= self.timing.ready_timeout_ms {
                error!(
                    "ES-WiFi ready line stayed low for {} ms",
                    self.timing.ready_timeout_ms
                );
                return Err(TransportFault::ReadyTimeout {
                    timeout_ms: self.timing.ready_timeout_ms,
                }
                .into());
            }
            let step = self.timing.ready_poll_ms.max(1);
            self.bus.delay_ms(step);
            waited = waited.saturating_add(step);
        }
        Ok(())
    }

    /// Reset the module and read whatever it prints while booting.
    ///
    /// # Returns
    /// Length of the boot output, readable through [`Transport::response`]
    pub fn reset(&mut self) -> Result<usize, Error> {
        self.bus.reset()?;
        self.wait_ready()?;
        self.receive(RX_BUFFER_SIZE)
    }

    /// Send `tx[..command_len]` and read the reply.
    ///
    /// The command goes out as `command_len` rounded up to an even byte count,
    /// so an odd command ends with one transmit pad byte. At most
    /// `response_capacity` bytes (capped to the receive buffer) are read.
    ///
    /// # Returns
    /// Length of the trimmed reply, readable through [`Transport::response`]
    pub fn exchange(&mut self, command_len: usize, response_capacity: usize) -> Result<usize, Error> {
        let declared_size = command_len + command_len % 2;

        self.wait_ready()?;
        self.bus.select()?;
        let sent = framer::transmit(&mut self.bus, &mut self.tx, command_len, declared_size);
        let released = self.bus.deselect();
        sent?;
        released?;

        self.wait_ready()?;
        self.receive(response_capacity)
    }

    /// Read one reply while the module holds the ready line.
    fn receive(&mut self, response_capacity: usize) -> Result<usize, Error> {
        let capacity = response_capacity.min(RX_BUFFER_SIZE);

        self.bus.select()?;
        let received = self.read_selected(capacity);
        let released = self.bus.deselect();
        let len = received?;
        released?;

        trace!("ES-WiFi <- {:?}", self.response_bytes(len));
        Ok(len)
    }

    fn read_selected(&mut self, capacity: usize) -> Result<usize, Error> {
        let len = framer::decode(&mut self.bus, &mut self.rx, capacity)?;
        if self.bus.is_ready()? {
            error!(
                "ES-WiFi reply exceeds the {} byte receive buffer",
                capacity
            );
            return Err(Error::ResponseOverflow { capacity });
        }
        Ok(len)
    }

    /// Build `<code>=<args>\r` and exchange it.
    pub fn command(&mut self, code: &str, args: &[&dyn Display]) -> Result<usize, Error> {
        let len = build_command(&mut self.tx, code, args)?;
        debug!("ES-WiFi -> {:?}", self.command_text(len));
        self.exchange(len, RX_BUFFER_SIZE)
    }

    /// Send `payload` with the `S3` data command.
    pub fn send_data(&mut self, payload: &str) -> Result<usize, Error> {
        let len = build_send(&mut self.tx, payload)?;
        debug!("ES-WiFi -> S3 with {} payload bytes", payload.len());
        self.exchange(len, RX_BUFFER_SIZE)
    }

    /// Reply text of the last exchange.
    pub fn response(&self, len: usize) -> Result<&str, Error> {
        core::str::from_utf8(self.response_bytes(len)).map_err(|_| Error::Parse {
            details: "reply is not valid UTF-8",
        })
    }

    fn response_bytes(&self, len: usize) -> &[u8] {
        &self.rx[..len.min(RX_BUFFER_SIZE)]
    }

    fn command_text(&self, len: usize) -> &str {
        core::str::from_utf8(&self.tx[..len]).unwrap_or("<binary>")
    }
}
