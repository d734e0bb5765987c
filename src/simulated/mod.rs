//! In-memory stand-in for a BLE stack.
//!
//! Plays both sides of the radio: it implements [`PeripheralStack`] for the
//! server and exposes central-side helpers (`connect`, `write`, ...) that push
//! events the way a real stack's interrupt handler would.
//!
//! [`PeripheralStack`]: crate::api::peripheral::PeripheralStack

mod stack;

pub use stack::{Notification, SimulatedStack};
