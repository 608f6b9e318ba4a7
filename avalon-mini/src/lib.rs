//! Monitor and control for the Canaan Avalon Mini 3 heater-miner.
//!
//! The miner exposes a cgminer-style text API on TCP port 4028. This crate
//! polls it, turns the semi-structured status text into typed entities
//! (power switch, mode and level selects, hashrate/temperature/power
//! sensors), and relays control commands back to the device.

pub mod api;
pub mod api_client;
pub mod config;
pub mod daemon;
pub mod entity;
pub mod monitor;
pub mod normalize;
pub mod protocol;
pub mod tracing;
pub mod types;
