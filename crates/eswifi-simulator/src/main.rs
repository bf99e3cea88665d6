//! Desktop simulator for the eswifi-rs driver.
//!
//! Runs the full driver stack against emulated module firmware wired up
//! through `embedded-hal` traits: boot, join the network, serve a few HTTP
//! requests through the polling web server, then publish over MQTT.
//!
//! Credentials come from `ESWIFI_SSID` and `ESWIFI_PASSPHRASE`, read from the
//! environment or a `.env` file. Set `RUST_LOG=debug` to see every command.

mod firmware;

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use log::{error, info, warn};

use eswifi::config::truncated;
use eswifi::{
    EsWifi, Error, ListenOutcome, ModuleConfig, MqttConfig, NetworkConfig, Settings, SpiModuleBus,
};

use firmware::{Firmware, SimChipSelect, SimDelay, SimReady, SimReset, SimSpi};

/// Number of listen cycles to run before switching to MQTT.
const LISTEN_CYCLES: u32 = 3;

/// The emulated server sees a client on every this many polls.
const CLIENT_EVERY: u32 = 4;

const BROKER_ADDRESS: &str = "192.168.1.10";
const BROKER_PORT: u16 = 1883;

fn module_config() -> ModuleConfig {
    let ssid = std::env::var("ESWIFI_SSID").unwrap_or_else(|_| String::from("simulated-lab"));
    let passphrase =
        std::env::var("ESWIFI_PASSPHRASE").unwrap_or_else(|_| String::from("correct-horse"));

    let mut network = NetworkConfig::station(&ssid, &passphrase);
    network.remote_ip_address = truncated(BROKER_ADDRESS);
    network.remote_port = BROKER_PORT;

    ModuleConfig::new(network).with_mqtt(MqttConfig {
        publish_topic: truncated("eswifi/sim/status"),
        subscribe_topic: truncated("eswifi/sim/cmd"),
        security: 0,
        user: truncated("sim"),
        password: truncated("sim"),
        client_id: truncated("eswifi-simulator"),
        keep_alive: 60,
    })
}

fn run() -> Result<(), Error> {
    let firmware = Rc::new(RefCell::new(Firmware::new(CLIENT_EVERY)));
    let settings = Settings::default();
    let bus = SpiModuleBus::new(
        SimSpi(firmware.clone()),
        SimChipSelect(firmware.clone()),
        SimReady(firmware.clone()),
        SimReset::new(firmware.clone()),
        SimDelay(firmware.clone()),
        settings.timing,
    );

    let mut wifi = EsWifi::new(bus, settings);
    let mut config = module_config();

    wifi.init()?;
    wifi.join_network(&mut config)?;
    wifi.web_server_init(&config)?;

    let mut served = 0u32;
    let mut handler = |request: &str, reply: &mut dyn std::fmt::Write| {
        served += 1;
        let path = request
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("/");
        info!("request #{} for {}", served, path);
        write!(
            reply,
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nserved {} from {}\r\n",
            served, path
        )
    };

    for cycle in 1..=LISTEN_CYCLES {
        match wifi.web_server_listen(&mut handler)? {
            ListenOutcome::Served {
                request_len,
                reply_len,
            } => info!(
                "cycle {}: answered {} byte request with {} bytes",
                cycle, request_len, reply_len
            ),
            ListenOutcome::NoRequest { polls } => {
                warn!("cycle {}: no client after {} polls", cycle, polls)
            }
        }
    }

    wifi.mqtt_init(&config)?;
    let mut status: heapless::String<64> = heapless::String::new();
    write!(status, "{{\"ip\":\"{}\",\"served\":{}}}", config.network.ip_address, served)
        .map_err(|_| Error::CommandOverflow { capacity: 64 })?;
    wifi.mqtt_publish(&status)?;

    let fw = firmware.borrow();
    info!(
        "published {:?} after {} ms of simulated time",
        fw.published, fw.elapsed_ms
    );
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting eswifi-rs simulator");

    if let Err(e) = run() {
        error!("simulation failed: {}", e);
        std::process::exit(1);
    }
}
