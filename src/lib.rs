//! BLE GATT echo peripheral core.
//!
//! Tracks connected centrals, routes writes on the RX characteristic to an
//! application callback and sends notifications on the TX characteristic.
//! The radio itself sits behind [`api::peripheral::PeripheralStack`].

pub mod api;
pub mod config;
mod error;
pub mod server;
pub mod simulated;

pub use config::ServerConfig;
pub use error::{Error, ErrorType, Result};
pub use server::BluetoothServer;
