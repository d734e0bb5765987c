//! Server configuration.
//!
//! Defaults match the stock echo peripheral: a Generic Access service carrying
//! the device name and one custom service with a single read/write/notify
//! characteristic used for both directions.

use std::time::Duration;

use uuid::Uuid;

use crate::api::characteristic::{
    AttributePermission, Characteristic, CharacteristicProperty, CharacteristicRole,
};
use crate::api::service::{Service, uuid_from_u16};

pub const GENERIC_ACCESS_SERVICE: u16 = 0x1800;
pub const DEVICE_NAME_CHARACTERISTIC: u16 = 0x2A00;

pub const DEFAULT_DEVICE_NAME: &str = "Pico W Bluetooth Server";
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x87654321_4321_4321_4321_cba987654321);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub event_queue_capacity: usize,
    /// Status poll period while at least one central is connected.
    pub connected_poll_interval: Duration,
    /// Status poll period while waiting for a connection.
    pub idle_poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service_uuid: DEFAULT_SERVICE_UUID,
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            event_queue_capacity: 256,
            connected_poll_interval: Duration::from_secs(5),
            idle_poll_interval: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }

    pub fn with_poll_intervals(mut self, connected: Duration, idle: Duration) -> Self {
        self.connected_poll_interval = connected;
        self.idle_poll_interval = idle;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    /// Services to register, in the order the stack must see them.
    pub fn services(&self) -> Vec<Service> {
        let device_name = Characteristic::read_only(
            uuid_from_u16(DEVICE_NAME_CHARACTERISTIC),
            self.device_name.as_bytes().to_vec(),
        )
        .with_roles(&[CharacteristicRole::DeviceName]);

        let data = Characteristic {
            uuid: self.characteristic_uuid,
            properties: vec![
                CharacteristicProperty::Read,
                CharacteristicProperty::WriteWithoutResponse,
                CharacteristicProperty::Write,
                CharacteristicProperty::Notify,
            ],
            permissions: vec![
                AttributePermission::Readable,
                AttributePermission::Writeable,
            ],
            value: None,
            roles: vec![CharacteristicRole::Rx, CharacteristicRole::Tx],
        };

        vec![
            Service::primary(uuid_from_u16(GENERIC_ACCESS_SERVICE), vec![device_name]),
            Service::primary(self.service_uuid, vec![data]),
        ]
    }
}
