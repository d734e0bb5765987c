use std::fmt;

use crate::api::characteristic::CharacteristicHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u16);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTarget {
    /// Every connected central; the stack decides the fan-out.
    Broadcast,
    Connection(ConnectionHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    CentralConnected {
        connection: ConnectionHandle,
    },
    CentralDisconnected {
        connection: ConnectionHandle,
    },
    // value is read from the GATT table when the stack raises the event
    CharacteristicWrite {
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
    },
    CharacteristicReadRequest {
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
    },
    SubscriptionUpdate {
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        subscribed: bool,
    },
}

impl PeripheralEvent {
    pub fn connection(&self) -> ConnectionHandle {
        match self {
            PeripheralEvent::CentralConnected { connection }
            | PeripheralEvent::CentralDisconnected { connection }
            | PeripheralEvent::CharacteristicWrite { connection, .. }
            | PeripheralEvent::CharacteristicReadRequest { connection, .. }
            | PeripheralEvent::SubscriptionUpdate { connection, .. } => *connection,
        }
    }
}
