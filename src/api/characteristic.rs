use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicHandle(pub u16);

impl fmt::Display for CharacteristicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "char#{}", self.0)
    }
}

#[derive(Debug, Ord, Eq, PartialEq, PartialOrd, Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: Vec<CharacteristicProperty>,
    pub permissions: Vec<AttributePermission>,
    /// Static value served on reads, e.g. the device name.
    pub value: Option<Vec<u8>>,
    pub roles: Vec<CharacteristicRole>,
}

impl Default for Characteristic {
    fn default() -> Self {
        Characteristic {
            uuid: Uuid::nil(),
            properties: vec![
                CharacteristicProperty::Read,
                CharacteristicProperty::Write,
                CharacteristicProperty::Notify,
            ],
            permissions: vec![
                AttributePermission::Readable,
                AttributePermission::Writeable,
            ],
            value: None,
            roles: Vec::new(),
        }
    }
}

impl Characteristic {
    pub fn read_only(uuid: Uuid, value: Vec<u8>) -> Self {
        Characteristic {
            uuid,
            properties: vec![CharacteristicProperty::Read],
            permissions: vec![AttributePermission::Readable],
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn with_roles(mut self, roles: &[CharacteristicRole]) -> Self {
        self.roles = roles.to_vec();
        self
    }

    pub fn has_property(&self, property: &CharacteristicProperty) -> bool {
        self.properties.contains(property)
    }
}

#[derive(Debug, Clone, Copy, PartialOrd, Ord, Eq, PartialEq, Hash)]
pub enum CharacteristicRole {
    DeviceName,
    Rx,
    Tx,
}

#[derive(Debug, Clone, PartialOrd, Ord, Eq, PartialEq)]
pub enum CharacteristicProperty {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    AuthenticatedSignedWrites,
    Notify,
    NotifyEncryptionRequired,
    Indicate,
    IndicateEncryptionRequired,
    ExtendedProperties,
}

#[derive(Debug, Clone, Ord, PartialOrd, PartialEq, Eq)]
pub enum AttributePermission {
    Readable,
    Writeable,
    ReadEncryptionRequired,
    WriteEncryptionRequired,
}
