use thiserror_no_std::Error;

/// Low-level failure on the bus or one of the control lines.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// A word transfer on the SPI bus failed
    #[error("SPI word transfer failed")]
    Bus,
    /// Driving chip-select/reset or sampling the ready line failed
    #[error("GPIO access failed on the {pin} line")]
    Pin { pin: &'static str },
    /// The ready line did not assert within the configured timeout
    #[error("module did not raise the ready line within {timeout_ms} ms")]
    ReadyTimeout { timeout_ms: u32 },
}

/// Errors surfaced by the driver. None of them are retried internally.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("transport fault: {0}")]
    Transport(#[from] TransportFault),

    /// The module still had data pending after the receive buffer filled up
    #[error("response did not fit the {capacity} byte receive buffer")]
    ResponseOverflow { capacity: usize },

    /// A command (or an outgoing payload) does not fit the transmit buffer
    #[error("command does not fit the {capacity} byte transmit buffer")]
    CommandOverflow { capacity: usize },

    #[error("malformed response: {details}")]
    Parse { details: &'static str },

    /// The status poll reported an error marker
    #[error("listener status poll reported an error")]
    Listener,

    /// The power-up banner did not match the expected text
    #[error("unexpected power-up banner")]
    ProtocolMismatch,

    /// A configuration command was answered without the success trailer
    #[error("module rejected the {code} command")]
    Rejected { code: &'static str },

    #[error("MQTT requested but the module configuration has no MQTT section")]
    MissingMqttConfig,
}
