//! Session object and the network bring-up commands.

use core::fmt::Display;

use log::{debug, error, info};

use crate::bus::ModuleBus;
use crate::command::{
    CMD_AP_ACTIVATE, CMD_AP_PASSPHRASE, CMD_AP_SECURITY, CMD_AP_SSID, CMD_DHCP, CMD_DNS,
    CMD_GATEWAY, CMD_IP_ADDRESS, CMD_IP_VERSION, CMD_JOIN, CMD_MASK, CMD_PASSPHRASE,
    CMD_SECURITY, CMD_SSID, extract_field,
};
use crate::config::{ModuleConfig, Settings};
use crate::error::Error;
use crate::listener::ListenState;
use crate::transport::Transport;

/// A session with one ES-WiFi module.
///
/// Owns the bus and the scratch buffers; every operation takes `&mut self`,
/// so one command is in flight at a time. The [`ModuleConfig`] describing the
/// network stays with the caller and is only borrowed per call.
pub struct EsWifi<B> {
    pub(crate) transport: Transport<B>,
    pub(crate) settings: Settings,
    pub(crate) listen_state: ListenState,
    pub(crate) server_running: bool,
}

impl<B: ModuleBus> EsWifi<B> {
    pub fn new(bus: B, settings: Settings) -> Self {
        Self {
            transport: Transport::new(bus, settings.timing),
            settings,
            listen_state: ListenState::Idle,
            server_running: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Raw access to the command channel.
    pub fn transport(&mut self) -> &mut Transport<B> {
        &mut self.transport
    }

    /// Give the bus back.
    pub fn release(self) -> B {
        self.transport.release()
    }

    /// Reset the module and check its power-up banner.
    pub fn init(&mut self) -> Result<(), Error> {
        let len = self.transport.reset()?;
        let banner = self.transport.response(len)?;

        if banner != self.settings.markers.banner {
            error!("ES-WiFi unexpected power-up banner: {:?}", banner);
            return Err(Error::ProtocolMismatch);
        }

        self.listen_state = ListenState::Idle;
        self.server_running = false;
        info!("ES-WiFi module ready");
        Ok(())
    }

    /// Open an access point and record its address in `config`.
    pub fn create_access_point(&mut self, config: &mut ModuleConfig) -> Result<(), Error> {
        {
            let network = &config.network;
            self.configure(CMD_AP_SSID, &[&0, &network.ssid])?;
            self.configure(CMD_AP_SECURITY, &[&network.security.code()])?;
            self.configure(CMD_AP_PASSPHRASE, &[&network.passphrase])?;
        }

        let len = self.configure(CMD_AP_ACTIVATE, &[])?;
        let response = self.transport.response(len)?;
        extract_field(response, &mut config.network.ip_address)?;

        info!(
            "ES-WiFi access point {} up at {}",
            config.network.ssid, config.network.ip_address
        );
        Ok(())
    }

    /// Join the configured network and record the assigned address in `config`.
    pub fn join_network(&mut self, config: &mut ModuleConfig) -> Result<(), Error> {
        {
            let network = &config.network;
            self.configure(CMD_SSID, &[&network.ssid])?;
            self.configure(CMD_PASSPHRASE, &[&network.passphrase])?;
            self.configure(CMD_SECURITY, &[&network.security.code()])?;
            self.configure(CMD_DHCP, &[&u8::from(network.dhcp)])?;
            self.configure(CMD_IP_VERSION, &[&network.ip_version.code()])?;

            if !network.dhcp {
                self.configure(CMD_IP_ADDRESS, &[&network.ip_address])?;
                self.configure(CMD_MASK, &[&network.mask])?;
                self.configure(CMD_GATEWAY, &[&network.gateway])?;
                self.configure(CMD_DNS, &[&network.dns])?;
            }
        }

        let len = self.configure(CMD_JOIN, &[])?;
        let response = self.transport.response(len)?;
        extract_field(response, &mut config.network.ip_address)?;

        info!(
            "ES-WiFi joined {} as {}",
            config.network.ssid, config.network.ip_address
        );
        Ok(())
    }

    /// Send a configuration command and require the success trailer.
    ///
    /// # Returns
    /// Length of the reply, readable through [`Transport::response`]
    pub(crate) fn configure(&mut self, code: &'static str, args: &[&dyn Display]) -> Result<usize, Error> {
        let len = self.transport.command(code, args)?;
        self.expect_ok(code, len)?;
        Ok(len)
    }

    pub(crate) fn expect_ok(&self, code: &'static str, len: usize) -> Result<(), Error> {
        let response = self.transport.response(len)?;
        if response.ends_with(self.settings.markers.ok_trailer) {
            debug!("ES-WiFi {} accepted", code);
            Ok(())
        } else {
            error!("ES-WiFi {} rejected: {:?}", code, response);
            Err(Error::Rejected { code })
        }
    }
}
