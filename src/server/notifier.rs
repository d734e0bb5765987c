use std::sync::{Arc, Mutex, PoisonError};

use crate::api::characteristic::CharacteristicHandle;
use crate::api::peripheral::PeripheralStack;
use crate::api::peripheral_event::{ConnectionHandle, NotifyTarget};
use crate::server::session::SessionRegistry;
use crate::{Error, ErrorType, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub len: usize,
}

/// Pushes payloads out over the TX characteristic.
///
/// Cheap to clone, so write callbacks can capture one and reply without
/// holding a reference to the whole server.
#[derive(Clone)]
pub struct Notifier {
    stack: Arc<dyn PeripheralStack>,
    sessions: Arc<Mutex<SessionRegistry>>,
    tx: CharacteristicHandle,
}

impl Notifier {
    pub(crate) fn new(
        stack: Arc<dyn PeripheralStack>,
        sessions: Arc<Mutex<SessionRegistry>>,
        tx: CharacteristicHandle,
    ) -> Self {
        Self {
            stack,
            sessions,
            tx,
        }
    }

    /// Text is sent as its UTF-8 bytes, anything else as-is.
    pub fn send(&self, payload: impl AsRef<[u8]>) -> Result<Sent> {
        let payload = payload.as_ref();

        let connected = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count();
        if connected == 0 {
            return Err(Error::new("No central connected", ErrorType::NotConnected));
        }
        self.push(NotifyTarget::Broadcast, payload)
    }

    pub fn send_to(&self, connection: ConnectionHandle, payload: impl AsRef<[u8]>) -> Result<Sent> {
        let registered = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&connection);
        if !registered {
            return Err(Error::from_string(
                format!("{connection} is not connected"),
                ErrorType::NotConnected,
            ));
        }
        self.push(NotifyTarget::Connection(connection), payload.as_ref())
    }

    fn push(&self, target: NotifyTarget, payload: &[u8]) -> Result<Sent> {
        self.stack.notify(target, self.tx, payload).map_err(|e| {
            Error::from_string(
                format!("Notify on {} failed: {}", self.tx, e.message),
                ErrorType::Transport,
            )
        })?;
        Ok(Sent { len: payload.len() })
    }

    pub fn send_data(&self, payload: impl AsRef<[u8]>) -> bool {
        let payload = payload.as_ref();
        match self.send(payload) {
            Ok(sent) => {
                log::info!("Sent {} bytes: {:?}", sent.len, String::from_utf8_lossy(payload));
                true
            }
            Err(e) if e.is_not_connected() => {
                log::info!("Not connected, dropping {} bytes", payload.len());
                false
            }
            Err(e) => {
                log::error!("Send failed: {e}");
                false
            }
        }
    }
}
