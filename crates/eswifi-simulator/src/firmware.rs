//! Emulated ES-WiFi firmware behind `embedded-hal` traits.
//!
//! One [`Firmware`] instance is shared by the SPI bus, the three GPIO lines and
//! the delay, the same way the real module sits behind those peripherals.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
use log::{debug, info, trace};

const RX_PAD: u8 = 0x15;

const BANNER: &str = "\r\n> ";
const OK: &str = "\r\nOK\r\n> ";
const EMPTY_MESSAGE: &str = "\r\n[SOMA][EOMA]\r\nOK\r\n> ";
const ERROR: &str = "\r\nERROR\r\n> ";

/// Address handed out when joining a network.
pub const STATION_ADDRESS: &str = "192.168.1.42";
/// Address of the access point interface.
pub const AP_ADDRESS: &str = "192.168.10.1";

/// Module state shared between the peripheral handles.
#[derive(Debug)]
pub struct Firmware {
    ready: bool,
    selected: bool,
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
    ssid: String,
    server_running: bool,
    client_every: u32,
    polls: u32,
    /// Bytes published with `S3` outside a served request
    pub published: Vec<String>,
    /// Virtual time spent in delays, in milliseconds
    pub elapsed_ms: u64,
}

impl Firmware {
    /// A module whose web server sees a client on every `client_every`th poll.
    pub fn new(client_every: u32) -> Self {
        Self {
            ready: false,
            selected: false,
            incoming: Vec::new(),
            outgoing: VecDeque::new(),
            ssid: String::new(),
            server_running: false,
            client_every: client_every.max(1),
            polls: 0,
            published: Vec::new(),
            elapsed_ms: 0,
        }
    }

    fn reply(&mut self, text: &str) {
        self.outgoing = text.bytes().collect();
        if self.outgoing.len() % 2 == 1 {
            self.outgoing.push_back(RX_PAD);
        }
        self.ready = true;
    }

    fn boot(&mut self) {
        info!("firmware: booting");
        self.incoming.clear();
        self.server_running = false;
        self.polls = 0;
        self.reply(BANNER);
    }

    fn execute(&mut self) {
        let bytes = std::mem::take(&mut self.incoming);
        let line = String::from_utf8_lossy(&bytes).into_owned();
        trace!("firmware: <- {:?}", line);

        // Everything behind the first `\r` is `S3` payload (plus word padding).
        let (command, data) = line.split_once('\r').unwrap_or((line.as_str(), ""));
        let (code, args) = command.split_once('=').unwrap_or((command, ""));

        let reply = match code {
            "C1" | "AS" => {
                let ssid = args.strip_prefix("0,").unwrap_or(args);
                self.ssid = ssid.to_owned();
                OK.to_owned()
            }
            "C0" => {
                info!("firmware: joined {}", self.ssid);
                format!("\r\n[JOIN   ] {},{},0,0{}", self.ssid, STATION_ADDRESS, OK)
            }
            "AD" => {
                info!("firmware: access point {} up", self.ssid);
                format!(
                    "\r\n[AP     ] {},{},255.255.255.0{}",
                    self.ssid, AP_ADDRESS, OK
                )
            }
            "P5" => {
                self.server_running = args.starts_with('1');
                debug!("firmware: server running = {}", self.server_running);
                OK.to_owned()
            }
            "MR" => self.poll(),
            "R0" => format!(
                "\r\nGET /status HTTP/1.1\r\nHost: {}\r\n{}",
                STATION_ADDRESS, OK
            ),
            "S3" => {
                let len = args.parse::<usize>().unwrap_or(0);
                let payload = data.get(..len).unwrap_or(data);
                debug!("firmware: S3 with {} bytes", payload.len());
                if !self.server_running {
                    self.published.push(payload.to_owned());
                }
                OK.to_owned()
            }
            "C2" | "C3" | "C4" | "C5" | "C6" | "C7" | "C8" | "C9" | "A1" | "A2" | "P0" | "P1"
            | "P2" | "P3" | "P4" | "P6" | "PM" => OK.to_owned(),
            _ => ERROR.to_owned(),
        };
        self.reply(&reply);
    }

    fn poll(&mut self) -> String {
        if !self.server_running {
            return ERROR.to_owned();
        }
        self.polls += 1;
        if self.polls % self.client_every == 0 {
            format!(
                "\r\n[SOMA]Accepted Request from 192.168.1.7:51000[EOMA]{}",
                OK
            )
        } else {
            EMPTY_MESSAGE.to_owned()
        }
    }
}

pub type Shared = Rc<RefCell<Firmware>>;

/// SPI side of the module, 16-bit frames.
pub struct SimSpi(pub Shared);

impl SpiErrorType for SimSpi {
    type Error = Infallible;
}

impl SpiBus<u16> for SimSpi {
    fn read(&mut self, words: &mut [u16]) -> Result<(), Infallible> {
        let mut fw = self.0.borrow_mut();
        for word in words.iter_mut() {
            let low = fw.outgoing.pop_front().unwrap_or(RX_PAD);
            let high = fw.outgoing.pop_front().unwrap_or(RX_PAD);
            *word = u16::from_le_bytes([low, high]);
        }
        if fw.outgoing.is_empty() {
            fw.ready = false;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u16]) -> Result<(), Infallible> {
        let mut fw = self.0.borrow_mut();
        if fw.selected {
            for word in words {
                fw.incoming.extend_from_slice(&word.to_le_bytes());
            }
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u16], write: &[u16]) -> Result<(), Infallible> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u16]) -> Result<(), Infallible> {
        let out = words.to_vec();
        self.write(&out)?;
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Chip-select input of the module.
pub struct SimChipSelect(pub Shared);

impl PinErrorType for SimChipSelect {
    type Error = Infallible;
}

impl OutputPin for SimChipSelect {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut fw = self.0.borrow_mut();
        fw.selected = false;
        if !fw.incoming.is_empty() {
            fw.execute();
        } else if fw.outgoing.is_empty() {
            fw.ready = true;
        }
        Ok(())
    }
}

/// Reset input of the module; the rising edge boots the firmware.
pub struct SimReset {
    pub firmware: Shared,
    held: bool,
}

impl SimReset {
    pub fn new(firmware: Shared) -> Self {
        Self {
            firmware,
            held: false,
        }
    }
}

impl PinErrorType for SimReset {
    type Error = Infallible;
}

impl OutputPin for SimReset {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.held = true;
        self.firmware.borrow_mut().ready = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if self.held {
            self.held = false;
            self.firmware.borrow_mut().boot();
        }
        Ok(())
    }
}

/// CMD/DATA ready output of the module.
pub struct SimReady(pub Shared);

impl PinErrorType for SimReady {
    type Error = Infallible;
}

impl InputPin for SimReady {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().ready)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().ready)
    }
}

/// Delay that only advances the firmware's virtual clock.
pub struct SimDelay(pub Shared);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().elapsed_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().elapsed_ms += u64::from(ms);
    }
}
