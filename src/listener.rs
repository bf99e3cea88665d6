//! Web server on top of the module's status poll.
//!
//! The module does not interrupt the host when a client connects. Instead the
//! status command `MR` is polled until its reply announces an accepted
//! connection, after which the request is read with `R0`, handed to a
//! [`RequestHandler`] and answered with `S3`.

use core::fmt;

use log::{debug, error, info, warn};

use crate::bus::ModuleBus;
use crate::command::{
    CMD_LOCAL_PORT, CMD_MESSAGE_READ, CMD_PROTOCOL, CMD_READ, CMD_SEND, CMD_SERVER, CMD_SOCKET,
    SendFrame, build_command, payload,
};
use crate::config::{Markers, ModuleConfig};
use crate::error::Error;
use crate::transport::{RX_BUFFER_SIZE, TX_BUFFER_SIZE};
use crate::wifi::EsWifi;

/// Where a listen cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenState {
    #[default]
    Idle,
    /// Issuing status polls
    Polling,
    /// A poll announced a client connection
    Accepted,
    /// A poll reported an error; the cycle ended with [`Error::Listener`]
    Errored,
    /// Reading the request and sending the reply
    Draining,
}

/// Meaning of one status poll reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    NoEvent,
    Accepted,
    Error,
    Unrecognized,
}

/// Classify a status poll reply.
///
/// Idle sentinels must match exactly; the error marker wins over the accept
/// marker when a reply carries both.
pub fn classify(response: &str, markers: &Markers) -> PollStatus {
    if response == markers.ok || response == markers.empty {
        PollStatus::NoEvent
    } else if response.contains(markers.error) {
        PollStatus::Error
    } else if response.contains(markers.accept) {
        PollStatus::Accepted
    } else {
        PollStatus::Unrecognized
    }
}

/// Result of one [`EsWifi::web_server_listen`] cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// The poll budget ran out without a client connecting
    NoRequest { polls: u32 },
    /// A request was read and answered
    Served { request_len: usize, reply_len: usize },
}

/// Produces the reply to one HTTP request.
///
/// The reply is formatted straight into the transmit buffer; a write error
/// means it did not fit.
pub trait RequestHandler {
    fn handle(&mut self, request: &str, reply: &mut dyn fmt::Write) -> fmt::Result;
}

impl<F> RequestHandler for F
where
    F: FnMut(&str, &mut dyn fmt::Write) -> fmt::Result,
{
    fn handle(&mut self, request: &str, reply: &mut dyn fmt::Write) -> fmt::Result {
        self(request, reply)
    }
}

impl<B: ModuleBus> EsWifi<B> {
    pub fn listen_state(&self) -> ListenState {
        self.listen_state
    }

    /// Open the server socket described by `config` and start listening.
    pub fn web_server_init(&mut self, config: &ModuleConfig) -> Result<(), Error> {
        let network = &config.network;
        self.configure(CMD_SOCKET, &[&0])?;
        self.configure(CMD_PROTOCOL, &[&network.protocol.code()])?;
        self.configure(CMD_LOCAL_PORT, &[&network.local_port])?;
        self.configure(CMD_SERVER, &[&1])?;

        self.server_running = true;
        self.set_listen_state(ListenState::Idle);
        info!("ES-WiFi web server listening on port {}", network.local_port);
        Ok(())
    }

    /// Run one listen cycle: poll until a client connects, then serve it.
    ///
    /// At most `max_polls` status polls are issued, `poll_interval_ms` apart.
    /// After serving a request the server is stopped; the next call starts it
    /// again.
    pub fn web_server_listen<H>(&mut self, handler: &mut H) -> Result<ListenOutcome, Error>
    where
        H: RequestHandler + ?Sized,
    {
        let result = self.listen_cycle(handler);
        if let Err(e) = result
            && e != Error::Listener
        {
            self.set_listen_state(ListenState::Idle);
        }
        result
    }

    fn listen_cycle<H>(&mut self, handler: &mut H) -> Result<ListenOutcome, Error>
    where
        H: RequestHandler + ?Sized,
    {
        if !self.server_running {
            debug!("ES-WiFi restarting stopped web server");
            self.configure(CMD_SERVER, &[&1])?;
            self.server_running = true;
        }

        let listener = self.settings.listener;
        let markers = self.settings.markers;
        self.set_listen_state(ListenState::Polling);

        for poll in 0..listener.max_polls {
            if poll > 0 {
                self.transport.bus().delay_ms(listener.poll_interval_ms);
            }

            let len = self.transport.command(CMD_MESSAGE_READ, &[])?;
            let response = self.transport.response(len)?;

            match classify(response, &markers) {
                PollStatus::NoEvent => {}
                PollStatus::Unrecognized => {
                    warn!("ES-WiFi unrecognized status reply: {:?}", response);
                }
                PollStatus::Error => {
                    error!("ES-WiFi status poll reported an error: {:?}", response);
                    self.set_listen_state(ListenState::Errored);
                    return Err(Error::Listener);
                }
                PollStatus::Accepted => {
                    self.set_listen_state(ListenState::Accepted);
                    return self.drain(handler, &markers);
                }
            }
        }

        debug!(
            "ES-WiFi no client after {} status polls",
            listener.max_polls
        );
        self.set_listen_state(ListenState::Idle);
        Ok(ListenOutcome::NoRequest {
            polls: listener.max_polls,
        })
    }

    fn drain<H>(&mut self, handler: &mut H, markers: &Markers) -> Result<ListenOutcome, Error>
    where
        H: RequestHandler + ?Sized,
    {
        self.set_listen_state(ListenState::Draining);

        let command_len = build_command(&mut self.transport.tx, CMD_READ, &[])?;
        debug!("ES-WiFi -> {:?}", CMD_READ);
        let read_len = self
            .transport
            .exchange(command_len, self.settings.listener.read_capacity)?;

        let rx = &self.transport.rx;
        let response = core::str::from_utf8(&rx[..read_len]).map_err(|_| Error::Parse {
            details: "request is not valid UTF-8",
        })?;
        let request = payload(response, markers.ok_trailer);
        info!("ES-WiFi serving request of {} bytes", request.len());

        let mut frame = SendFrame::new(&mut self.transport.tx)?;
        handler.handle(request, &mut frame).map_err(|_| {
            error!(
                "ES-WiFi reply does not fit the {} byte transmit buffer",
                TX_BUFFER_SIZE
            );
            Error::CommandOverflow {
                capacity: TX_BUFFER_SIZE,
            }
        })?;
        let request_len = request.len();
        let reply_len = frame.payload_len();
        let send_len = frame.finish()?;

        let len = self.transport.exchange(send_len, RX_BUFFER_SIZE)?;
        self.expect_ok(CMD_SEND, len)?;

        self.configure(CMD_SERVER, &[&0])?;
        self.server_running = false;
        self.set_listen_state(ListenState::Idle);

        Ok(ListenOutcome::Served {
            request_len,
            reply_len,
        })
    }

    fn set_listen_state(&mut self, state: ListenState) {
        if self.listen_state != state {
            debug!("ES-WiFi listener {:?} -> {:?}", self.listen_state, state);
            self.listen_state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::String;
    use std::vec::Vec;

    use super::*;
    use crate::config::{ListenerConfig, NetworkConfig, Settings};
    use crate::mock::FakeModule;

    const IDLE: &[u8] = b"\r\n\r\nOK\r\n> ";
    const EMPTY: &[u8] = b"\r\n[SOMA][EOMA]\r\nOK\r\n> ";
    const ACCEPTED: &[u8] = b"\r\n[SOMA]Accepted req=/x from 192.168.1.7:51000[EOMA]\r\nOK\r\n> ";
    const REQUEST: &[u8] = b"\r\nGET /x HTTP/1.1\r\nHost: 10.0.0.5\r\n\r\nOK\r\n> ";

    #[derive(Default)]
    struct Recorder {
        requests: Vec<String>,
    }

    impl RequestHandler for Recorder {
        fn handle(&mut self, request: &str, reply: &mut dyn fmt::Write) -> fmt::Result {
            self.requests.push(String::from(request));
            reply.write_str("HTTP/1.1 200 OK\r\n\r\nhi")
        }
    }

    fn serving(max_polls: u32) -> EsWifi<FakeModule> {
        let settings = Settings {
            listener: ListenerConfig {
                max_polls,
                ..ListenerConfig::default()
            },
            ..Settings::default()
        };
        let mut wifi = EsWifi::new(FakeModule::new(), settings);
        let config = ModuleConfig::new(NetworkConfig::station("lab", "secret"));
        wifi.web_server_init(&config).unwrap();
        wifi.transport().bus().commands.clear();
        wifi
    }

    #[test]
    fn test_classify() {
        let markers = Markers::default();

        assert_eq!(classify("\r\n\r\nOK\r\n> ", &markers), PollStatus::NoEvent);
        assert_eq!(
            classify("\r\n[SOMA][EOMA]\r\nOK\r\n> ", &markers),
            PollStatus::NoEvent
        );
        assert_eq!(
            classify("\r\n[SOMA]Accepted[EOMA]\r\nOK\r\n> ", &markers),
            PollStatus::Accepted
        );
        assert_eq!(classify("\r\nERROR\r\n> ", &markers), PollStatus::Error);
        assert_eq!(
            classify("Accepted, then ERROR", &markers),
            PollStatus::Error
        );
        assert_eq!(classify("\r\nOK\r\n> ", &markers), PollStatus::Unrecognized);
        // Sentinels only count when they match exactly.
        assert_eq!(
            classify("\r\n\r\nOK\r\n> \r\n", &markers),
            PollStatus::Unrecognized
        );
    }

    #[test]
    fn test_web_server_init_commands() {
        let mut wifi = EsWifi::new(FakeModule::new(), Settings::default());
        let config = ModuleConfig::new(NetworkConfig::station("lab", "secret"));

        wifi.web_server_init(&config).unwrap();

        assert_eq!(
            wifi.transport().bus().commands,
            ["P0=0\r", "P1=0\r", "P2=80\r", "P5=1\r"]
        );
        assert_eq!(wifi.listen_state(), ListenState::Idle);
    }

    #[test]
    fn test_drains_at_first_accepted_poll() {
        let mut wifi = serving(10);
        let mut handler = Recorder::default();
        {
            let bus = wifi.transport().bus();
            bus.script(IDLE).script(IDLE).script(IDLE).script(ACCEPTED);
            bus.script(REQUEST);
        }

        let outcome = wifi.web_server_listen(&mut handler).unwrap();

        assert_eq!(handler.requests, ["GET /x HTTP/1.1\r\nHost: 10.0.0.5\r\n"]);
        assert_eq!(
            outcome,
            ListenOutcome::Served {
                request_len: 33,
                reply_len: 21,
            }
        );
        let commands = &wifi.transport().bus().commands;
        assert_eq!(&commands[..5], ["MR\r", "MR\r", "MR\r", "MR\r", "R0\r"]);
        assert_eq!(commands[5], "S3=0021\rHTTP/1.1 200 OK\r\n\r\nhi");
        assert_eq!(commands[6], "P5=0\r");
        assert_eq!(commands.len(), 7);
        assert_eq!(wifi.listen_state(), ListenState::Idle);
    }

    #[test]
    fn test_polls_are_spaced_by_the_interval() {
        let mut wifi = serving(10);
        wifi.transport().bus().delayed_ms = 0;
        wifi.transport().bus().script(EMPTY).script(EMPTY).script(ACCEPTED);

        wifi.web_server_listen(&mut Recorder::default()).unwrap();

        assert!(wifi.transport().bus().delayed_ms >= 200);
    }

    #[test]
    fn test_error_marker_is_a_listener_fault() {
        let mut wifi = serving(10);
        wifi.transport()
            .bus()
            .script(IDLE)
            .script(b"\r\nERROR: socket closed\r\n> ");
        let mut handler = Recorder::default();

        assert_eq!(wifi.web_server_listen(&mut handler), Err(Error::Listener));
        assert_eq!(wifi.listen_state(), ListenState::Errored);
        assert!(handler.requests.is_empty());
        assert_eq!(wifi.transport().bus().commands, ["MR\r", "MR\r"]);
    }

    #[test]
    fn test_poll_budget_exhausted() {
        let mut wifi = serving(3);

        for _ in 0..3 {
            wifi.transport().bus().script(IDLE);
        }
        let outcome = wifi.web_server_listen(&mut Recorder::default()).unwrap();

        assert_eq!(outcome, ListenOutcome::NoRequest { polls: 3 });
        assert_eq!(wifi.transport().bus().commands.len(), 3);
        assert_eq!(wifi.listen_state(), ListenState::Idle);
    }

    #[test]
    fn test_unrecognized_replies_are_polled_again() {
        let mut wifi = serving(10);
        wifi.transport()
            .bus()
            .script(b"\r\n[SOMA]garbage[EOMA]\r\nOK\r\n> ")
            .script(ACCEPTED)
            .script(REQUEST);
        let mut handler = Recorder::default();

        wifi.web_server_listen(&mut handler).unwrap();

        assert_eq!(handler.requests.len(), 1);
        assert_eq!(&wifi.transport().bus().commands[..3], ["MR\r", "MR\r", "R0\r"]);
    }

    #[test]
    fn test_stopped_server_is_restarted() {
        let mut wifi = serving(10);
        wifi.transport().bus().script(ACCEPTED).script(REQUEST);
        wifi.web_server_listen(&mut Recorder::default()).unwrap();
        wifi.transport().bus().commands.clear();

        wifi.transport().bus().script(b"\r\nOK\r\n> ").script(IDLE);
        let mut closure = |_: &str, reply: &mut dyn fmt::Write| reply.write_str("unused");
        let outcome = wifi.web_server_listen(&mut closure).unwrap();

        assert_eq!(outcome, ListenOutcome::NoRequest { polls: 10 });
        assert_eq!(wifi.transport().bus().commands[0], "P5=1\r");
        assert_eq!(wifi.transport().bus().commands[1], "MR\r");
    }

    #[test]
    fn test_closure_handler_replies() {
        let mut wifi = serving(10);
        wifi.transport().bus().script(ACCEPTED).script(REQUEST);
        let mut seen = 0;
        let mut handler = |request: &str, reply: &mut dyn fmt::Write| {
            seen = request.len();
            write!(reply, "len={}", request.len())
        };

        wifi.web_server_listen(&mut handler).unwrap();

        assert_eq!(seen, 33);
        assert_eq!(wifi.transport().bus().commands[2], "S3=0006\rlen=33");
    }

    #[test]
    fn test_reply_too_large_for_transmit_buffer() {
        let mut wifi = serving(10);
        wifi.transport().bus().script(ACCEPTED).script(REQUEST);
        let mut handler = |_: &str, reply: &mut dyn fmt::Write| {
            for _ in 0..TX_BUFFER_SIZE {
                reply.write_char('x')?;
            }
            Ok(())
        };

        assert_eq!(
            wifi.web_server_listen(&mut handler),
            Err(Error::CommandOverflow {
                capacity: TX_BUFFER_SIZE
            })
        );
        assert_eq!(wifi.listen_state(), ListenState::Idle);
    }
}
