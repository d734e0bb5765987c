use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::executor;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

use crate::api::characteristic::{CharacteristicHandle, CharacteristicProperty};
use crate::api::peripheral::PeripheralStack;
use crate::api::peripheral_event::{ConnectionHandle, NotifyTarget, PeripheralEvent};
use crate::api::service::Service;
use crate::{Error, ErrorType, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: NotifyTarget,
    pub characteristic: CharacteristicHandle,
    pub value: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    powered: bool,
    sender: Option<Sender<PeripheralEvent>>,
    values: HashMap<CharacteristicHandle, Vec<u8>>,
    notifiable: Vec<CharacteristicHandle>,
    // Handle 0 is never assigned.
    next_handle: u16,
    notifications: Vec<Notification>,
    fail_notify: bool,
    reject_registration: bool,
}

impl State {
    fn allocate(&mut self, count: u16) -> Result<u16> {
        self.next_handle = self
            .next_handle
            .checked_add(count)
            .ok_or_else(|| Error::new("Attribute handles exhausted", ErrorType::Stack))?;
        Ok(self.next_handle)
    }
}

#[derive(Debug, Default)]
pub struct SimulatedStack {
    state: Mutex<State>,
}

impl SimulatedStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_powered(&self) -> bool {
        self.state().powered
    }

    pub fn fail_notify(&self, fail: bool) {
        self.state().fail_notify = fail;
    }

    pub fn reject_registration(&self, reject: bool) {
        self.state().reject_registration = reject;
    }

    /// Overwrite a characteristic value without raising an event.
    pub fn set_value(&self, characteristic: CharacteristicHandle, value: &[u8]) {
        self.state().values.insert(characteristic, value.to_vec());
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    /// Push an event, blocking while the channel is full.
    ///
    /// Meant for foreign threads; from inside an async task prefer
    /// [`SimulatedStack::try_deliver`].
    pub fn deliver(&self, event: PeripheralEvent) -> Result<()> {
        let sender = self.sender()?;
        executor::block_on(async {
            sender.send(event).await.map_err(|e| {
                Error::from_string(format!("Error sending stack event: {e}"), ErrorType::Channel)
            })
        })
    }

    pub fn try_deliver(&self, event: PeripheralEvent) -> Result<()> {
        let sender = self.sender()?;
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => Error::new("Event queue full", ErrorType::Channel),
            TrySendError::Closed(_) => Error::new("Event queue closed", ErrorType::Channel),
        })
    }

    pub fn connect(&self, connection: ConnectionHandle) -> Result<()> {
        self.try_deliver(PeripheralEvent::CentralConnected { connection })
    }

    pub fn disconnect(&self, connection: ConnectionHandle) -> Result<()> {
        self.try_deliver(PeripheralEvent::CentralDisconnected { connection })
    }

    /// Store `value` as a central's write would, then raise the write event
    /// carrying the stored value.
    pub fn write(
        &self,
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        value: &[u8],
    ) -> Result<()> {
        self.set_value(characteristic, value);
        let value = self.read_characteristic(characteristic)?;
        self.try_deliver(PeripheralEvent::CharacteristicWrite {
            connection,
            characteristic,
            value,
        })
    }

    pub fn subscribe(
        &self,
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        subscribed: bool,
    ) -> Result<()> {
        self.try_deliver(PeripheralEvent::SubscriptionUpdate {
            connection,
            characteristic,
            subscribed,
        })
    }

    /// Drop the registered event channel, as a powered down stack would.
    pub fn detach(&self) {
        self.state().sender = None;
    }

    fn sender(&self) -> Result<Sender<PeripheralEvent>> {
        self.state()
            .sender
            .clone()
            .ok_or_else(|| Error::new("No event handler registered", ErrorType::Channel))
    }
}

#[async_trait]
impl PeripheralStack for SimulatedStack {
    async fn enable_radio(&self) -> Result<()> {
        self.state().powered = true;
        log::debug!("Radio enabled");
        Ok(())
    }

    async fn register_services(&self, services: &[Service]) -> Result<Vec<CharacteristicHandle>> {
        let mut state = self.state();
        if !state.powered {
            return Err(Error::new("Radio is not enabled", ErrorType::Stack));
        }
        if state.reject_registration {
            state.reject_registration = false;
            return Err(Error::new("GATT table rejected", ErrorType::Stack));
        }

        let mut handles = Vec::new();
        for service in services {
            if service.characteristics.is_empty() {
                return Err(Error::from_string(
                    format!("Service {} has no characteristics", service.uuid),
                    ErrorType::Stack,
                ));
            }
            // one handle for the service declaration
            state.allocate(1)?;
            for characteristic in &service.characteristics {
                // declaration, then value
                let handle = CharacteristicHandle(state.allocate(2)?);
                state
                    .values
                    .insert(handle, characteristic.value.clone().unwrap_or_default());
                if characteristic.has_property(&CharacteristicProperty::Notify) {
                    state.notifiable.push(handle);
                    // CCCD
                    state.allocate(1)?;
                }
                handles.push(handle);
            }
        }
        log::debug!("Registered {} services: {handles:?}", services.len());
        Ok(handles)
    }

    fn read_characteristic(&self, characteristic: CharacteristicHandle) -> Result<Vec<u8>> {
        self.state().values.get(&characteristic).cloned().ok_or_else(|| {
            Error::from_string(format!("Unknown {characteristic}"), ErrorType::Stack)
        })
    }

    fn notify(
        &self,
        target: NotifyTarget,
        characteristic: CharacteristicHandle,
        value: &[u8],
    ) -> Result<()> {
        let mut state = self.state();
        if state.fail_notify {
            return Err(Error::new("Notification queue rejected", ErrorType::Stack));
        }
        if !state.notifiable.is_empty() && !state.notifiable.contains(&characteristic) {
            return Err(Error::from_string(
                format!("{characteristic} does not support notify"),
                ErrorType::Stack,
            ));
        }
        state.notifications.push(Notification {
            target,
            characteristic,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn on_event(&self, sender_tx: Sender<PeripheralEvent>) {
        self.state().sender = Some(sender_tx);
    }
}
