//! Word-aligned framing of text on the module's 16-bit SPI link.
//!
//! Every transfer carries two bytes. Outgoing text of odd length is completed
//! with [`TX_PADDING`], incoming replies of odd length arrive completed with
//! [`RX_PADDING`]. This module inserts and strips those filler bytes.

use log::error;

use crate::bus::ModuleBus;
use crate::error::Error;
use crate::trim::{TERMINATOR, trim};

/// Filler byte appended to outgoing frames
pub const TX_PADDING: u8 = 0x0A;
/// Filler byte the module uses to complete its last word
pub const RX_PADDING: u8 = 0x15;

/// Words moved per bus call when transmitting.
const STAGING_WORDS: usize = 32;

/// Prepare `buffer[..text_len]` for transmission as a frame of `declared_size`
/// bytes.
///
/// The frame region spans `declared_size / 2 * 2 + 1` bytes. Everything past
/// the text inside it is cleared, and when `declared_size` is even one
/// [`TX_PADDING`] byte is placed right after the text. Note the parity check
/// looks at the declared size, not at the text length. Text longer than the
/// declared size is rejected.
///
/// # Returns
/// Length of the frame: the text plus the pad byte, if one was added
pub fn encode(buffer: &mut [u8], text_len: usize, declared_size: usize) -> Result<usize, Error> {
    let region = declared_size / 2 * 2 + 1;
    if region > buffer.len() || text_len > declared_size {
        error!(
            "ES-WiFi frame of {} bytes does not fit the {} byte transmit buffer",
            declared_size,
            buffer.len()
        );
        return Err(Error::CommandOverflow {
            capacity: buffer.len(),
        });
    }

    buffer[text_len..region].fill(TERMINATOR);

    if declared_size % 2 == 0 {
        // `text_len <= declared_size < region` for an even declared size.
        buffer[text_len] = TX_PADDING;
        Ok(text_len + 1)
    } else {
        Ok(text_len)
    }
}

/// Encode `buffer[..text_len]` and clock out `declared_size / 2` words.
pub fn transmit<B: ModuleBus>(
    bus: &mut B,
    buffer: &mut [u8],
    text_len: usize,
    declared_size: usize,
) -> Result<(), Error> {
    encode(buffer, text_len, declared_size)?;

    let words = declared_size / 2;
    let mut staging = [0u16; STAGING_WORDS];
    for chunk in buffer[..words * 2].chunks(STAGING_WORDS * 2) {
        let count = chunk.len() / 2;
        for (word, pair) in staging.iter_mut().zip(chunk.chunks_exact(2)) {
            *word = u16::from_le_bytes([pair[0], pair[1]]);
        }
        bus.send(&staging[..count])?;
    }
    Ok(())
}

/// Clock in the module's reply while the ready line is asserted.
///
/// The buffer is cleared first. Each word lands little-endian at the cursor,
/// which then advances by two; reading stops, without failing, once the next
/// word would push the cursor past `capacity - 2`, so the reply always keeps
/// a terminator. Whether the module still had data is left for the caller to
/// check on the ready line.
///
/// # Returns
/// Length of the reply with [`RX_PADDING`] stripped from both ends
pub fn decode<B: ModuleBus>(bus: &mut B, buffer: &mut [u8], capacity: usize) -> Result<usize, Error> {
    let capacity = capacity.min(buffer.len());
    buffer[..capacity].fill(TERMINATOR);

    let limit = capacity.saturating_sub(2);
    let mut cursor = 0;
    while bus.is_ready()? {
        if cursor + 2 > limit {
            break;
        }
        let mut word = [0u16; 1];
        bus.receive(&mut word)?;
        buffer[cursor..cursor + 2].copy_from_slice(&word[0].to_le_bytes());
        cursor += 2;
    }

    Ok(trim(buffer, capacity, RX_PADDING))
}
