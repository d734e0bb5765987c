use uuid::Uuid;

use crate::api::characteristic::Characteristic;

const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand an assigned 16 bit UUID (e.g. `0x1800`) to its full 128 bit form.
pub fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

#[derive(Debug, Ord, Eq, PartialEq, PartialOrd, Clone)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn primary(uuid: Uuid, characteristics: Vec<Characteristic>) -> Self {
        Service {
            uuid,
            primary: true,
            characteristics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuid_expands_onto_base() {
        assert_eq!(
            uuid_from_u16(0x1800).to_string(),
            "00001800-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            uuid_from_u16(0x2A00).to_string(),
            "00002a00-0000-1000-8000-00805f9b34fb"
        );
    }
}
