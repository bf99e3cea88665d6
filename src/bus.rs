//! Hardware seam of the driver.
//!
//! The ES-WiFi module sits on an SPI bus configured for 16-bit words, with a
//! chip-select output, a reset output and a CMD/DATA ready input. The
//! [`ModuleBus`] trait captures the primitives the transport needs;
//! [`SpiModuleBus`] implements it on top of the `embedded-hal` 1.0 blocking
//! traits.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::error;

use crate::config::Timing;
use crate::error::{Error, TransportFault};

/// Blocking primitives used to talk to the module.
///
/// Every call either completes or fails; timeouts are the implementation's
/// business and surface as [`TransportFault`]s.
pub trait ModuleBus {
    /// Assert chip-select.
    fn select(&mut self) -> Result<(), Error>;

    /// Release chip-select.
    fn deselect(&mut self) -> Result<(), Error>;

    /// Pulse the reset line and wait for the module to boot.
    fn reset(&mut self) -> Result<(), Error>;

    /// Sample the CMD/DATA ready line.
    fn is_ready(&mut self) -> Result<bool, Error>;

    /// Clock out 16-bit words.
    fn send(&mut self, words: &[u16]) -> Result<(), Error>;

    /// Clock in 16-bit words.
    fn receive(&mut self, words: &mut [u16]) -> Result<(), Error>;

    fn delay_ms(&mut self, ms: u32);
}

impl<T: ModuleBus + ?Sized> ModuleBus for &mut T {
    fn select(&mut self) -> Result<(), Error> {
        T::select(self)
    }

    fn deselect(&mut self) -> Result<(), Error> {
        T::deselect(self)
    }

    fn reset(&mut self) -> Result<(), Error> {
        T::reset(self)
    }

    fn is_ready(&mut self) -> Result<bool, Error> {
        T::is_ready(self)
    }

    fn send(&mut self, words: &[u16]) -> Result<(), Error> {
        T::send(self, words)
    }

    fn receive(&mut self, words: &mut [u16]) -> Result<(), Error> {
        T::receive(self, words)
    }

    fn delay_ms(&mut self, ms: u32) {
        T::delay_ms(self, ms)
    }
}

/// [`ModuleBus`] over an exclusive SPI bus and three GPIO lines.
///
/// The SPI peripheral must already be configured for 16-bit frames; the
/// chip-select line is driven by this adapter, not by the SPI peripheral.
pub struct SpiModuleBus<SPI, CS, RDY, RST, D> {
    spi: SPI,
    cs: CS,
    ready: RDY,
    reset: RST,
    delay: D,
    timing: Timing,
}

impl<SPI, CS, RDY, RST, D> SpiModuleBus<SPI, CS, RDY, RST, D>
where
    SPI: SpiBus<u16>,
    CS: OutputPin,
    RDY: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, ready: RDY, reset: RST, delay: D, timing: Timing) -> Self {
        Self {
            spi,
            cs,
            ready,
            reset,
            delay,
            timing,
        }
    }

    /// Give the hardware back.
    pub fn release(self) -> (SPI, CS, RDY, RST, D) {
        (self.spi, self.cs, self.ready, self.reset, self.delay)
    }
}

impl<SPI, CS, RDY, RST, D> ModuleBus for SpiModuleBus<SPI, CS, RDY, RST, D>
where
    SPI: SpiBus<u16>,
    CS: OutputPin,
    RDY: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn select(&mut self) -> Result<(), Error> {
        self.cs.set_low().map_err(|e| {
            error!("ES-WiFi chip-select assert failed: {:?}", e);
            TransportFault::Pin { pin: "chip-select" }
        })?;
        self.delay.delay_ms(self.timing.select_settle_ms);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Error> {
        self.cs.set_high().map_err(|e| {
            error!("ES-WiFi chip-select release failed: {:?}", e);
            TransportFault::Pin { pin: "chip-select" }
        })?;
        self.delay.delay_ms(self.timing.select_settle_ms);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Error> {
        let fault = |e| {
            error!("ES-WiFi reset line failed: {:?}", e);
            TransportFault::Pin { pin: "reset" }
        };
        self.reset.set_low().map_err(fault)?;
        self.delay.delay_ms(self.timing.reset_pulse_ms);
        self.reset.set_high().map_err(fault)?;
        self.delay.delay_ms(self.timing.reset_settle_ms);
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, Error> {
        let ready = self.ready.is_high().map_err(|e| {
            error!("ES-WiFi ready line read failed: {:?}", e);
            TransportFault::Pin { pin: "ready" }
        })?;
        Ok(ready)
    }

    fn send(&mut self, words: &[u16]) -> Result<(), Error> {
        self.spi
            .write(words)
            .and_then(|()| self.spi.flush())
            .map_err(|e| {
                error!("ES-WiFi SPI write of {} words failed: {:?}", words.len(), e);
                TransportFault::Bus
            })?;
        Ok(())
    }

    fn receive(&mut self, words: &mut [u16]) -> Result<(), Error> {
        self.spi.read(words).map_err(|e| {
            error!("ES-WiFi SPI read failed: {:?}", e);
            TransportFault::Bus
        })?;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
