//! AT command formatting and response field extraction.
//!
//! Commands are single lines of the form `<code>=<arg>,<arg>\r` (or a bare
//! `<code>\r`). Data is sent with `S3=<len>\r` followed by the raw bytes.

use core::fmt::{self, Display, Write};

use heapless::String;
use log::{error, warn};

use crate::error::Error;
use crate::trim::TERMINATOR;

/// Line terminator of every command
pub const COMMAND_TERMINATOR: char = '\r';

// =============================================================================
// Command Codes
// =============================================================================

pub const CMD_JOIN: &str = "C0";
pub const CMD_SSID: &str = "C1";
pub const CMD_PASSPHRASE: &str = "C2";
pub const CMD_SECURITY: &str = "C3";
pub const CMD_DHCP: &str = "C4";
pub const CMD_IP_VERSION: &str = "C5";
pub const CMD_IP_ADDRESS: &str = "C6";
pub const CMD_MASK: &str = "C7";
pub const CMD_GATEWAY: &str = "C8";
pub const CMD_DNS: &str = "C9";

pub const CMD_AP_SECURITY: &str = "A1";
pub const CMD_AP_PASSPHRASE: &str = "A2";
pub const CMD_AP_SSID: &str = "AS";
pub const CMD_AP_ACTIVATE: &str = "AD";

pub const CMD_SOCKET: &str = "P0";
pub const CMD_PROTOCOL: &str = "P1";
pub const CMD_LOCAL_PORT: &str = "P2";
pub const CMD_REMOTE_HOST: &str = "P3";
pub const CMD_REMOTE_PORT: &str = "P4";
pub const CMD_SERVER: &str = "P5";
pub const CMD_CLIENT: &str = "P6";
pub const CMD_MQTT: &str = "PM";

pub const CMD_READ: &str = "R0";
pub const CMD_SEND: &str = "S3";
pub const CMD_MESSAGE_READ: &str = "MR";

/// Length of the `S3=nnnn\r` header in front of outgoing data
pub const SEND_HEADER_LEN: usize = 8;

/// Bytes kept free behind a command: one transmit pad byte and the terminator.
const RESERVED: usize = 2;

// =============================================================================
// Builder
// =============================================================================

/// `fmt::Write` sink over a byte buffer that keeps room for framing.
pub struct BufferWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Room left for text.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.len + RESERVED)
    }

    /// Terminate the text and return its length.
    pub fn finish(self) -> usize {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = TERMINATOR;
        }
        self.len
    }
}

impl Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if bytes.len() > self.remaining() {
            return Err(fmt::Error);
        }
        self.buffer[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

/// Format `<code>=<args joined by ','>\r` into `buffer`.
///
/// # Returns
/// Length of the command, excluding the terminator
pub fn build_command(buffer: &mut [u8], code: &str, args: &[&dyn Display]) -> Result<usize, Error> {
    let capacity = buffer.len();
    let mut writer = BufferWriter::new(buffer);

    write_command(&mut writer, code, args).map_err(|_| {
        error!("ES-WiFi command {} does not fit {} bytes", code, capacity);
        Error::CommandOverflow { capacity }
    })?;

    Ok(writer.finish())
}

fn write_command(writer: &mut BufferWriter<'_>, code: &str, args: &[&dyn Display]) -> fmt::Result {
    writer.write_str(code)?;
    for (i, arg) in args.iter().enumerate() {
        writer.write_char(if i == 0 { '=' } else { ',' })?;
        write!(writer, "{}", arg)?;
    }
    writer.write_char(COMMAND_TERMINATOR)
}

/// Outgoing data command whose payload is written in place.
///
/// The `S3=nnnn\r` header is reserved up front and completed by
/// [`SendFrame::finish`] once the payload length is known.
pub struct SendFrame<'a> {
    writer: BufferWriter<'a>,
}

impl<'a> SendFrame<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Result<Self, Error> {
        let capacity = buffer.len();
        let mut writer = BufferWriter::new(buffer);
        writer
            .write_str("S3=0000\r")
            .map_err(|_| Error::CommandOverflow { capacity })?;
        Ok(Self { writer })
    }

    pub fn payload_len(&self) -> usize {
        self.writer.len() - SEND_HEADER_LEN
    }

    /// Patch the length into the header and terminate the command.
    ///
    /// # Returns
    /// Length of the full command, excluding the terminator
    pub fn finish(self) -> Result<usize, Error> {
        let payload_len = self.payload_len();
        patch_send_header(&mut *self.writer.buffer, payload_len)?;
        Ok(self.writer.finish())
    }
}

impl Write for SendFrame<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writer.write_str(s)
    }
}

/// Write the four-digit payload length into a reserved `S3=0000\r` header.
fn patch_send_header(buffer: &mut [u8], payload_len: usize) -> Result<(), Error> {
    if payload_len > 9999 || buffer.len() < SEND_HEADER_LEN {
        return Err(Error::CommandOverflow {
            capacity: buffer.len(),
        });
    }
    let mut digits = payload_len;
    for slot in buffer[3..7].iter_mut().rev() {
        *slot = b'0' + (digits % 10) as u8;
        digits /= 10;
    }
    Ok(())
}

/// Build `S3=<len>\r<payload>` into `buffer`.
///
/// # Returns
/// Length of the command, excluding the terminator
pub fn build_send(buffer: &mut [u8], payload: &str) -> Result<usize, Error> {
    let capacity = buffer.len();
    let mut frame = SendFrame::new(buffer)?;
    frame.write_str(payload).map_err(|_| {
        error!(
            "ES-WiFi payload of {} bytes does not fit the transmit buffer",
            payload.len()
        );
        Error::CommandOverflow { capacity }
    })?;
    frame.finish()
}

// =============================================================================
// Parser
// =============================================================================

/// Extract the text between the first and second comma of `response`.
///
/// The field is cut off at the capacity of `dest`.
pub fn extract_field<const N: usize>(response: &str, dest: &mut String<N>) -> Result<(), Error> {
    let (_, rest) = response.split_once(',').ok_or(Error::Parse {
        details: "first comma missing",
    })?;
    let (field, _) = rest.split_once(',').ok_or(Error::Parse {
        details: "second comma missing",
    })?;

    dest.clear();
    for c in field.chars() {
        if dest.push(c).is_err() {
            warn!(
                "ES-WiFi response field truncated to {} bytes: {}",
                N, field
            );
            break;
        }
    }
    Ok(())
}

/// Strip the generic reply framing (`\r\n` in front, `trailer` behind).
pub fn payload<'a>(response: &'a str, trailer: &str) -> &'a str {
    let body = response.strip_prefix("\r\n").unwrap_or(response);
    body.strip_suffix(trailer).unwrap_or(body)
}
