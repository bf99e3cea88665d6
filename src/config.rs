//! Driver settings and the caller-owned module configuration.

use heapless::String;

use crate::transport::RX_BUFFER_SIZE;

/// Dotted-decimal address text (`255.255.255.255` fits with room to spare).
pub type AddressString = String<16>;

pub const SSID_CAPACITY: usize = 32;
pub const PASSPHRASE_CAPACITY: usize = 64;
pub const TOPIC_CAPACITY: usize = 64;
pub const CREDENTIAL_CAPACITY: usize = 32;

// =============================================================================
// Driver Settings
// =============================================================================

/// Delays applied by the bus adapter and the transport, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Longest wait for the ready line before giving up
    pub ready_timeout_ms: u32,
    /// Step between two samples of the ready line
    pub ready_poll_ms: u32,
    /// Settle time after every chip-select toggle
    pub select_settle_ms: u32,
    /// How long the reset line is held low
    pub reset_pulse_ms: u32,
    /// Boot time granted to the module after reset
    pub reset_settle_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 5000,
            ready_poll_ms: 1,
            select_settle_ms: 10,
            reset_pulse_ms: 10,
            reset_settle_ms: 500,
        }
    }
}

/// Firmware output the driver matches against.
///
/// The texts differ between firmware builds, so they are configurable and
/// compared verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    /// Prompt printed once the module has booted
    pub banner: &'static str,
    /// Generic OK reply, also the first idle sentinel of the status poll
    pub ok: &'static str,
    /// Empty asynchronous message reply, the second idle sentinel
    pub empty: &'static str,
    /// Suffix closing every successful command reply
    pub ok_trailer: &'static str,
    /// Status poll substring announcing an accepted client connection
    pub accept: &'static str,
    /// Substring announcing a failure
    pub error: &'static str,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            banner: "\r\n> ",
            ok: "\r\n\r\nOK\r\n> ",
            empty: "\r\n[SOMA][EOMA]\r\nOK\r\n> ",
            ok_trailer: "\r\nOK\r\n> ",
            accept: "Accepted",
            error: "ERROR",
        }
    }
}

/// Bounds for one web server listen cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Delay between two status polls
    pub poll_interval_ms: u32,
    /// Number of status polls before the cycle reports that no request arrived
    pub max_polls: u32,
    /// Largest request read back with `R0`, capped to the receive buffer
    pub read_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_polls: 600,
            read_capacity: RX_BUFFER_SIZE,
        }
    }
}

/// Everything the driver needs besides the hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub timing: Timing,
    pub markers: Markers,
    pub listener: ListenerConfig,
}

// =============================================================================
// Module Configuration
// =============================================================================

/// Wi-Fi security mode, encoded as the module expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SecurityType {
    Open = 0,
    Wep = 1,
    #[default]
    Wpa2Aes = 2,
    WpaMixed = 3,
}

impl SecurityType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IpVersion {
    #[default]
    V4 = 0,
    V6 = 1,
}

impl IpVersion {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Socket protocol selector used by `P1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Protocol {
    #[default]
    Tcp = 0,
    Udp = 1,
    Mqtt = 4,
}

impl Protocol {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Network side of the module configuration.
///
/// Address fields are written back by [`crate::EsWifi::join_network`] and
/// [`crate::EsWifi::create_access_point`].
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub ssid: String<SSID_CAPACITY>,
    pub passphrase: String<PASSPHRASE_CAPACITY>,
    pub security: SecurityType,
    pub dhcp: bool,
    pub ip_version: IpVersion,
    pub protocol: Protocol,
    pub local_port: u16,
    pub remote_port: u16,
    pub ip_address: AddressString,
    pub mask: AddressString,
    pub gateway: AddressString,
    pub dns: AddressString,
    pub remote_ip_address: AddressString,
}

impl NetworkConfig {
    /// Station configuration using DHCP and serving HTTP on port 80.
    ///
    /// Credentials longer than the field capacity are cut off.
    pub fn station(ssid: &str, passphrase: &str) -> Self {
        Self {
            ssid: truncated(ssid),
            passphrase: truncated(passphrase),
            dhcp: true,
            local_port: 80,
            ..Self::default()
        }
    }

    /// Access point configuration serving HTTP on port 80.
    pub fn access_point(ssid: &str, passphrase: &str) -> Self {
        Self {
            dhcp: false,
            ..Self::station(ssid, passphrase)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MqttConfig {
    pub publish_topic: String<TOPIC_CAPACITY>,
    pub subscribe_topic: String<TOPIC_CAPACITY>,
    pub security: u8,
    pub user: String<CREDENTIAL_CAPACITY>,
    pub password: String<CREDENTIAL_CAPACITY>,
    pub client_id: String<CREDENTIAL_CAPACITY>,
    /// Keep-alive interval in seconds
    pub keep_alive: u16,
}

/// Caller-owned record describing the module's network setup.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    pub network: NetworkConfig,
    pub mqtt: Option<MqttConfig>,
}

impl ModuleConfig {
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            mqtt: None,
        }
    }

    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = Some(mqtt);
        self
    }
}

/// Copy as much of `text` as fits, stopping on a character boundary.
pub fn truncated<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
