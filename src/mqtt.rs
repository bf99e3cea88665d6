//! MQTT client mode of the module.

use log::{error, info};

use crate::bus::ModuleBus;
use crate::command::{
    CMD_CLIENT, CMD_MQTT, CMD_PROTOCOL, CMD_REMOTE_HOST, CMD_REMOTE_PORT, CMD_SEND, CMD_SOCKET,
};
use crate::config::{ModuleConfig, Protocol};
use crate::error::Error;
use crate::wifi::EsWifi;

// `PM` sub-commands
const MQTT_PUBLISH_TOPIC: u8 = 0;
const MQTT_SUBSCRIBE_TOPIC: u8 = 1;
const MQTT_SECURITY: u8 = 2;
const MQTT_CREDENTIALS: u8 = 3;
const MQTT_CLIENT_ID: u8 = 4;
const MQTT_KEEP_ALIVE: u8 = 5;

impl<B: ModuleBus> EsWifi<B> {
    /// Configure the MQTT client from `config.mqtt` and connect to the broker
    /// at `remote_ip_address:remote_port`.
    pub fn mqtt_init(&mut self, config: &ModuleConfig) -> Result<(), Error> {
        let Some(mqtt) = config.mqtt.as_ref() else {
            error!("ES-WiFi MQTT requested without an MQTT configuration");
            return Err(Error::MissingMqttConfig);
        };
        let network = &config.network;

        self.configure(CMD_SOCKET, &[&0])?;
        self.configure(CMD_PROTOCOL, &[&Protocol::Mqtt.code()])?;
        self.configure(CMD_REMOTE_HOST, &[&network.remote_ip_address])?;
        self.configure(CMD_REMOTE_PORT, &[&network.remote_port])?;
        self.configure(CMD_MQTT, &[&MQTT_PUBLISH_TOPIC, &mqtt.publish_topic])?;
        self.configure(CMD_MQTT, &[&MQTT_SUBSCRIBE_TOPIC, &mqtt.subscribe_topic])?;
        self.configure(CMD_MQTT, &[&MQTT_SECURITY, &mqtt.security])?;
        self.configure(CMD_MQTT, &[&MQTT_CREDENTIALS, &mqtt.user, &mqtt.password])?;
        self.configure(CMD_MQTT, &[&MQTT_CLIENT_ID, &mqtt.client_id])?;
        self.configure(CMD_MQTT, &[&MQTT_KEEP_ALIVE, &mqtt.keep_alive])?;
        self.configure(CMD_CLIENT, &[&1])?;

        info!(
            "ES-WiFi MQTT client connected to {}:{}",
            network.remote_ip_address, network.remote_port
        );
        Ok(())
    }

    /// Publish `payload` on the configured topic.
    pub fn mqtt_publish(&mut self, payload: &str) -> Result<(), Error> {
        let len = self.transport.send_data(payload)?;
        self.expect_ok(CMD_SEND, len)
    }
}
