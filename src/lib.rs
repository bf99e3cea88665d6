//! Blocking driver for Inventek ES-WiFi modules on a 16-bit SPI link
//!
//! The module speaks a line-oriented AT command set. This crate frames those
//! commands onto the word-oriented bus, reads the replies back while the
//! module holds its ready line, and builds network bring-up, a polling web
//! server and MQTT publishing on top.
//!
//! It is `#![no_std]` and allocation free. Hardware access goes through the
//! [`ModuleBus`] trait; [`SpiModuleBus`] implements it with `embedded-hal` 1.0.

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod framer;
pub mod listener;
pub mod mqtt;
pub mod transport;
pub mod trim;
pub mod wifi;

#[cfg(test)]
mod mock;

pub use bus::{ModuleBus, SpiModuleBus};
pub use config::{
    IpVersion, ListenerConfig, Markers, ModuleConfig, MqttConfig, NetworkConfig, Protocol,
    SecurityType, Settings, Timing,
};
pub use error::{Error, TransportFault};
pub use listener::{ListenOutcome, ListenState, RequestHandler};
pub use wifi::EsWifi;
