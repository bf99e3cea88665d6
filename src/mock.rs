//! Scripted stand-in for an ES-WiFi module, used by the unit tests.

extern crate std;

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use crate::bus::ModuleBus;
use crate::error::{Error, TransportFault};
use crate::framer::{RX_PADDING, TX_PADDING};

pub const DEFAULT_REPLY: &[u8] = b"\r\nOK\r\n> ";
pub const BANNER: &[u8] = b"\r\n> ";

/// Module double driven entirely by [`ModuleBus`] calls.
///
/// Words clocked in while selected form a command; releasing chip-select
/// records it and loads the next scripted reply (or [`DEFAULT_REPLY`]). The
/// ready line stays high while reply bytes are pending.
pub struct FakeModule {
    ready: bool,
    words_in: Vec<u16>,
    last_frame: Vec<u16>,
    outgoing: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    pub commands: Vec<String>,
    pub resets: usize,
    pub selected: bool,
    pub delayed_ms: u64,
    pub banner: Vec<u8>,
    pub fail_send: bool,
    pub fail_receive: bool,
    pub never_ready: bool,
}

impl FakeModule {
    pub fn new() -> Self {
        Self {
            ready: true,
            words_in: Vec::new(),
            last_frame: Vec::new(),
            outgoing: VecDeque::new(),
            replies: VecDeque::new(),
            commands: Vec::new(),
            resets: 0,
            selected: false,
            delayed_ms: 0,
            banner: BANNER.to_vec(),
            fail_send: false,
            fail_receive: false,
            never_ready: false,
        }
    }

    /// Queue the reply for the next command.
    pub fn script(&mut self, reply: &[u8]) -> &mut Self {
        self.replies.push_back(reply.to_vec());
        self
    }

    /// Make `reply` pending right away, padded to a whole number of words.
    pub fn load_reply(&mut self, reply: &[u8]) {
        self.outgoing = reply.iter().copied().collect();
        if self.outgoing.len() % 2 == 1 {
            self.outgoing.push_back(RX_PADDING);
        }
        self.ready = true;
    }

    /// Words of the command currently being clocked in, or of the last one.
    pub fn clocked_in(&self) -> &[u16] {
        if self.words_in.is_empty() {
            &self.last_frame
        } else {
            &self.words_in
        }
    }

    fn finish_command(&mut self) {
        let mut bytes: Vec<u8> = self
            .words_in
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        if bytes.last() == Some(&TX_PADDING) {
            bytes.pop();
        }
        self.commands.push(String::from_utf8_lossy(&bytes).into_owned());
        self.last_frame = core::mem::take(&mut self.words_in);

        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| DEFAULT_REPLY.to_vec());
        self.load_reply(&reply);
    }
}

impl ModuleBus for FakeModule {
    fn select(&mut self) -> Result<(), Error> {
        self.selected = true;
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Error> {
        self.selected = false;
        if !self.words_in.is_empty() {
            self.finish_command();
        } else if self.outgoing.is_empty() {
            self.ready = true;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.resets += 1;
        self.words_in.clear();
        let banner = self.banner.clone();
        self.load_reply(&banner);
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, Error> {
        Ok(self.ready && !self.never_ready)
    }

    fn send(&mut self, words: &[u16]) -> Result<(), Error> {
        if self.fail_send {
            return Err(TransportFault::Bus.into());
        }
        self.words_in.extend_from_slice(words);
        Ok(())
    }

    fn receive(&mut self, words: &mut [u16]) -> Result<(), Error> {
        if self.fail_receive {
            return Err(TransportFault::Bus.into());
        }
        for word in words.iter_mut() {
            let low = self.outgoing.pop_front().unwrap_or(RX_PADDING);
            let high = self.outgoing.pop_front().unwrap_or(RX_PADDING);
            *word = u16::from_le_bytes([low, high]);
        }
        if self.outgoing.is_empty() {
            self.ready = false;
        }
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }
}
